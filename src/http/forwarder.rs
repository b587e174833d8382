//! Upstream forwarding for matched proxy rules.
//!
//! # Responsibilities
//! - Build the upstream URL from the rule target and resolved subpath
//! - Apply the rule's header, cookie and authorization options
//! - Enforce the rule's timeout (or the configured default)
//! - Stream request and response bodies without buffering
//!
//! # Design Decisions
//! - The dispatch engine never sees the outcome; errors become 502/504 here
//! - Redirects are returned to the client, not followed
//! - No retries: a failed upstream call is answered immediately

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

use crate::config::ForwardingConfig;
use crate::http::request::request_id;
use crate::http::response::strip_hop_by_hop;
use crate::model::{ForwardOptions, Rule};
use crate::observability::metrics;

/// Hands a request to the backend named by a rule.
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Proxy `request` to `rule`'s target at `subpath`. Owns the response.
    async fn forward(&self, request: Request<Body>, rule: &Rule, subpath: &str) -> Response;
}

/// Errors raised while forwarding.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid target url '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ForwardError::InvalidTarget { .. } | ForwardError::Upstream(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

/// Build the upstream URL: target base path + subpath, then the target's own
/// query followed by the original query.
pub fn upstream_url(target: &str, subpath: &str, query: Option<&str>) -> Result<Url, ForwardError> {
    let invalid = |reason: String| ForwardError::InvalidTarget {
        url: target.to_string(),
        reason,
    };

    let mut url = Url::parse(target).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }

    let base = url.path().trim_end_matches('/');
    let path = if subpath.starts_with('/') {
        format!("{base}{subpath}")
    } else {
        format!("{base}/{subpath}")
    };
    let merged = match (url.query().filter(|q| !q.is_empty()), query.filter(|q| !q.is_empty())) {
        (Some(own), Some(inbound)) => Some(format!("{own}&{inbound}")),
        (own, inbound) => own.or(inbound).map(str::to_string),
    };
    url.set_path(&path);
    url.set_query(merged.as_deref());
    Ok(url)
}

/// Headers to send upstream for an inbound request.
pub fn upstream_headers(
    inbound: &HeaderMap,
    options: &ForwardOptions,
    client: Option<SocketAddr>,
) -> HeaderMap {
    let mut headers = inbound.clone();
    strip_hop_by_hop(&mut headers);

    let inbound_host = headers.remove(header::HOST);
    if let Some(host) = inbound_host {
        if !headers.contains_key("x-forwarded-host") {
            headers.insert("x-forwarded-host", host);
        }
    }
    if !headers.contains_key("x-forwarded-proto") {
        headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
    }
    if let Some(addr) = client {
        let chain = match headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{prior}, {}", addr.ip()),
            None => addr.ip().to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert("x-forwarded-for", value);
        }
    }

    for name in &options.remove_headers {
        if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
            headers.remove(name);
        }
    }
    if !options.forward_cookies {
        headers.remove(header::COOKIE);
    }
    if let Some(auth) = &options.authorization {
        match HeaderValue::from_str(auth) {
            Ok(value) => {
                headers.insert(header::AUTHORIZATION, value);
            }
            Err(_) => tracing::warn!("Ignoring invalid authorization override"),
        }
    }
    for (name, value) in &options.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Ignoring invalid header override"),
        }
    }

    headers
}

/// [`Forwarder`] over a pooled `reqwest` client.
#[derive(Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HttpForwarder {
    pub fn new(config: &ForwardingConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;
        Ok(Self {
            client,
            default_timeout: Duration::from_millis(config.default_timeout_ms),
        })
    }

    async fn try_forward(
        &self,
        request: Request<Body>,
        rule: &Rule,
        subpath: &str,
    ) -> Result<Response, ForwardError> {
        let (parts, body) = request.into_parts();
        let url = upstream_url(&rule.target_url, subpath, parts.uri.query())?;
        let client = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let headers = upstream_headers(&parts.headers, &rule.forward, client);

        let has_body = parts.headers.contains_key(header::CONTENT_LENGTH)
            || parts.headers.contains_key(header::TRANSFER_ENCODING);

        let mut upstream = self
            .client
            .request(parts.method.clone(), url.clone())
            .headers(headers);
        if has_body {
            upstream = upstream.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let timeout = rule
            .forward
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);

        tracing::debug!(
            request_id = %request_id(&parts.headers),
            rule_id = %rule.id,
            upstream = %url,
            timeout_ms = timeout.as_millis() as u64,
            "Forwarding request"
        );

        let upstream_response = tokio::time::timeout(timeout, upstream.send())
            .await
            .map_err(|_| ForwardError::Timeout(timeout))??;

        let mut builder = Response::builder().status(upstream_response.status());
        if let Some(headers) = builder.headers_mut() {
            *headers = upstream_response.headers().clone();
            strip_hop_by_hop(headers);
            if !rule.forward.forward_cookies {
                headers.remove(header::SET_COOKIE);
            }
        }
        let body = Body::from_stream(upstream_response.bytes_stream());

        Ok(builder
            .body(body)
            .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response()))
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, request: Request<Body>, rule: &Rule, subpath: &str) -> Response {
        let start = Instant::now();
        let id = request_id(request.headers()).to_string();

        let response = match self.try_forward(request, rule, subpath).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    request_id = %id,
                    rule_id = %rule.id,
                    target = %rule.target_url,
                    error = %e,
                    "Upstream error"
                );
                (e.status(), e.status().canonical_reason().unwrap_or("Upstream error"))
                    .into_response()
            }
        };

        metrics::record_forward(response.status().as_u16(), start);
        response
    }
}
