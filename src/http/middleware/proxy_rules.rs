//! Proxy rule middleware.
//! Applies the dispatch decision for every inbound request.

use axum::{
    body::Body,
    extract::State,
    http::{uri::PathAndQuery, Request, Uri},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::http::forwarder::Forwarder;
use crate::http::request::{original_uri, request_id};
use crate::routing::{Dispatch, DispatchController};

/// State shared by the proxy rule middleware.
#[derive(Clone)]
pub struct ProxyState {
    pub dispatcher: Arc<DispatchController>,
    pub forwarder: Arc<dyn Forwarder>,
}

pub async fn proxy_rules_middleware(
    State(state): State<ProxyState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let dispatch = state
        .dispatcher
        .dispatch(&path, original_uri(req.headers()))
        .await;

    match dispatch {
        Dispatch::PassThrough => next.run(req).await,
        Dispatch::Rewrite { path: rewritten, rule } => {
            match replace_path(req.uri(), &rewritten) {
                Some(uri) => {
                    tracing::debug!(
                        request_id = %request_id(req.headers()),
                        rule_id = %rule.id,
                        from = %path,
                        to = %rewritten,
                        "Internal rewrite"
                    );
                    *req.uri_mut() = uri;
                }
                None => {
                    tracing::warn!(rule_id = %rule.id, to = %rewritten, "Rewritten path is not a valid URI, passing through");
                }
            }
            next.run(req).await
        }
        Dispatch::Forward { rule, subpath } => state.forwarder.forward(req, &rule, &subpath).await,
    }
}

/// `uri` with its path replaced and query kept.
pub(crate) fn replace_path(uri: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        http::StatusCode,
        middleware::from_fn_with_state,
        response::IntoResponse,
        Router,
    };
    use std::sync::Mutex;
    use tower::ServiceExt;

    use crate::model::Rule;
    use crate::repository::testing::{acme_snapshot, SHA};
    use crate::repository::InMemoryRepository;
    use crate::routing::cache::{RuleSetCache, DEFAULT_TTL};

    #[derive(Default)]
    struct RecordingForwarder {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Forwarder for RecordingForwarder {
        async fn forward(&self, _request: Request<Body>, rule: &Rule, subpath: &str) -> Response {
            self.calls
                .lock()
                .unwrap()
                .push((rule.id.clone(), subpath.to_string()));
            (StatusCode::ACCEPTED, "forwarded").into_response()
        }
    }

    fn app(forwarder: Arc<RecordingForwarder>) -> Router {
        let repository = Arc::new(InMemoryRepository::new(acme_snapshot()));
        let cache = Arc::new(RuleSetCache::new(repository.clone(), DEFAULT_TTL));
        let state = ProxyState {
            dispatcher: Arc::new(DispatchController::new(repository, cache)),
            forwarder,
        };
        // Echo the path the next stage saw.
        let assets = Router::new().fallback(|req: Request<Body>| async move {
            req.uri().path_and_query().map(|p| p.to_string()).unwrap_or_default()
        });
        Router::new()
            .fallback_service(assets)
            .layer(from_fn_with_state(state, proxy_rules_middleware))
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_forward_is_terminal() {
        let forwarder = Arc::new(RecordingForwarder::default());
        let response = app(forwarder.clone())
            .oneshot(get(&format!("/public/acme/site/{SHA}/api/users")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            *forwarder.calls.lock().unwrap(),
            vec![("r1".to_string(), "/api/users".to_string())]
        );
    }

    #[tokio::test]
    async fn test_rewrite_continues_with_new_path() {
        let forwarder = Arc::new(RecordingForwarder::default());
        let response = app(forwarder.clone())
            .oneshot(get("/public/acme/site/alias/production/env.json?v=3"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response).await,
            "/public/acme/site/alias/production/environments/production.json?v=3"
        );
        assert!(forwarder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pass_through_untouched() {
        let forwarder = Arc::new(RecordingForwarder::default());
        let response = app(forwarder.clone())
            .oneshot(get("/public/acme/site/main/index.html"))
            .await
            .unwrap();

        assert_eq!(body_text(response).await, "/public/acme/site/main/index.html");
        assert!(forwarder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_original_uri_header_used_for_matching() {
        let forwarder = Arc::new(RecordingForwarder::default());
        let request = Request::builder()
            .uri(format!("/public/acme/site/{SHA}/index.html"))
            .header("X-Original-URI", "/api/orders?page=1")
            .body(Body::empty())
            .unwrap();

        let response = app(forwarder.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(forwarder.calls.lock().unwrap()[0].1, "/api/orders");
    }

    #[test]
    fn test_replace_path_keeps_query() {
        let uri: Uri = "/a/b?x=1".parse().unwrap();
        assert_eq!(replace_path(&uri, "/c").unwrap(), "/c?x=1");
        let uri: Uri = "http://host/a".parse().unwrap();
        assert_eq!(replace_path(&uri, "/c").unwrap(), "http://host/c");
    }
}
