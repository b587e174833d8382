//! Request identification and routing-relevant headers.
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - An inbound `x-request-id` is kept; otherwise a UUID v4 is generated

use axum::http::{HeaderMap, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Request id header, set on the way in and echoed on the way out.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Original external path supplied by a rewriting front end.
pub const X_ORIGINAL_URI: &str = "x-original-uri";

/// Generates UUID v4 request ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Request id for log fields.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// `X-Original-URI` value, if present and valid UTF-8.
pub fn original_uri(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_ORIGINAL_URI).and_then(|v| v.to_str().ok())
}
