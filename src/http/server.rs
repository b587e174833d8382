//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: proxy rules in front of static assets
//! - Wire up middleware (tracing, timeout, request ID, subdomain mapping)
//! - Run the rule cache sweeper
//! - Serve until the shutdown signal fires
//!
//! # Layer order (outermost first)
//! ```text
//! SetRequestId → PropagateRequestId → Trace
//!     → subdomain mapping → proxy rules → Timeout → asset router (/healthz, static files)
//! ```
//! The proxy rule layer wraps the asset router from outside, so an internally
//! rewritten URI is routed again by the asset router. The request timeout
//! covers the asset router only; forwarded requests are bounded by their
//! rule's upstream timeout.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::from_fn_with_state,
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::forwarder::Forwarder;
use crate::http::middleware::{proxy_rules_middleware, subdomain_alias_middleware, ProxyState};
use crate::http::request::{request_id, UuidRequestId};
use crate::repository::Repository;
use crate::routing::{DispatchController, RuleSetCache};

/// HTTP server for the asset proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    cache: Arc<RuleSetCache>,
}

impl HttpServer {
    /// Create a new HTTP server over the given collaborators.
    pub fn new(
        config: ProxyConfig,
        repository: Arc<dyn Repository>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        let cache = Arc::new(RuleSetCache::new(
            repository.clone(),
            Duration::from_secs(config.rule_cache.ttl_secs),
        ));
        let state = ProxyState {
            dispatcher: Arc::new(DispatchController::new(repository, cache.clone())),
            forwarder,
        };

        let router = Self::build_router(&config, state, cache.clone());
        Self {
            router,
            config,
            cache,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: ProxyState, cache: Arc<RuleSetCache>) -> Router {
        let assets = Router::new()
            .route("/healthz", get(healthz))
            .with_state(cache)
            .fallback_service(ServeDir::new(&config.static_files.root))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        Router::new()
            .fallback_service(assets)
            .layer(from_fn_with_state(state, proxy_rules_middleware))
            .layer(from_fn_with_state(
                Arc::new(config.subdomain.clone()),
                subdomain_alias_middleware,
            ))
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    request_id = %request_id(req.headers()),
                    method = %req.method(),
                    path = %req.uri().path(),
                )
            }))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweeper = spawn_cache_sweeper(
            self.cache.clone(),
            Duration::from_secs(self.config.rule_cache.sweep_interval_secs),
            shutdown.resubscribe(),
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        sweeper.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn cache(&self) -> &Arc<RuleSetCache> {
        &self.cache
    }
}

async fn healthz(State(cache): State<Arc<RuleSetCache>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "cached_rule_sets": cache.len(),
    }))
}

/// Periodically drop rule sets whose TTL has elapsed.
fn spawn_cache_sweeper(
    cache: Arc<RuleSetCache>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = cache.purge_expired();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = cache.len(), "Swept expired rule sets");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    })
}
