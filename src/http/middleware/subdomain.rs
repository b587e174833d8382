//! Wildcard subdomain front end.
//!
//! Maps `{alias}.{base_domain}/{path}` onto
//! `/public/subdomain-alias/{alias}/{path}` and records the external path in
//! `X-Original-URI`, the way a rewriting edge proxy would.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::config::SubdomainConfig;
use crate::http::middleware::proxy_rules::replace_path;
use crate::http::request::X_ORIGINAL_URI;
use crate::routing::parser::{PUBLIC_PREFIX, SUBDOMAIN_SEGMENT};

pub async fn subdomain_alias_middleware(
    State(config): State<Arc<SubdomainConfig>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if !config.enabled || req.uri().path().starts_with(PUBLIC_PREFIX) {
        return next.run(req).await;
    }

    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().host());
    let Some(alias) = host.and_then(|h| alias_label(h, &config.base_domain)) else {
        return next.run(req).await;
    };

    let original = req
        .uri()
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let path = format!("{PUBLIC_PREFIX}{SUBDOMAIN_SEGMENT}/{alias}{}", req.uri().path());

    if let Some(uri) = replace_path(req.uri(), &path) {
        if !req.headers().contains_key(X_ORIGINAL_URI) {
            if let Ok(value) = HeaderValue::from_str(&original) {
                req.headers_mut().insert(X_ORIGINAL_URI, value);
            }
        }
        tracing::trace!(alias = %alias, path = %path, "Subdomain request mapped");
        *req.uri_mut() = uri;
    }

    next.run(req).await
}

/// The single label in front of `base_domain`, lowercased.
pub fn alias_label(host: &str, base_domain: &str) -> Option<String> {
    let host = host.split(':').next().unwrap_or(host).to_ascii_lowercase();
    let base = base_domain.trim_matches('.').to_ascii_lowercase();
    let label = host.strip_suffix(&base)?.strip_suffix('.')?;
    if label.is_empty() || label.contains('.') {
        return None;
    }
    Some(label.to_string())
}
