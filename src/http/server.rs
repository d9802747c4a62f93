//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create Axum Router with the single catch-all dispatch handler
//! - Wire up middleware (tracing, CORS headers)
//! - Gate inbound requests (preflight, missing or invalid target)
//! - Resolve the origin, fetch its handler, forward, map failures to 502
//! - Drain the handler registry once the server has stopped

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::{ProxyConfig, UpstreamConfig};
use crate::dispatch::{
    forward, ForwardOutcome, ForwardingHandler, HandlerRegistry, OriginKey, ProxyError, Target,
};
use crate::http::request::target_param;
use crate::http::response::{preflight, with_cors_headers};
use crate::lifecycle::shutdown;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<HandlerRegistry>,
    pub upstream: UpstreamConfig,
}

/// HTTP server for the dispatcher.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    registry: Arc<HandlerRegistry>,
}

impl HttpServer {
    /// Create a new HTTP server with an empty handler registry.
    pub fn new(config: ProxyConfig) -> Self {
        Self::with_registry(config, Arc::new(HandlerRegistry::new()))
    }

    /// Create a server that dispatches through `registry`.
    pub fn with_registry(config: ProxyConfig, registry: Arc<HandlerRegistry>) -> Self {
        let state = AppState {
            registry: Arc::clone(&registry),
            upstream: config.upstream.clone(),
        };

        Self {
            router: Self::build_router(state),
            config,
            registry,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let router = Router::new()
            .route("/", any(dispatch))
            .route("/{*path}", any(dispatch))
            .with_state(state);

        with_cors_headers(router).layer(TraceLayer::new_for_http())
    }

    /// Router for in-process use (tests, embedding).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown_rx` fires, then drain the registry.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream_timeout_ms = self.config.upstream.timeout_ms,
            verify_tls = self.config.upstream.verify_tls,
            "Dynamic proxy listening, handler registry starts empty"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        let closed = self.registry.drain_all();
        tracing::info!(handlers_closed = closed, "HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: every path and method lands here.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();

    let response = handle(&state, request).await;

    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

async fn handle(state: &AppState, request: Request<Body>) -> Response {
    if request.method() == Method::OPTIONS {
        return preflight();
    }

    let target = match target_param(request.uri())
        .ok_or(ProxyError::MissingTarget)
        .and_then(|raw| Target::parse(&raw))
    {
        Ok(target) => target,
        Err(err) => {
            tracing::debug!(error = %err, "Rejected request");
            return err.into_response();
        }
    };

    let handler = match state.registry.get_or_create(target.origin(), |origin| {
        ForwardingHandler::new(origin.clone(), &state.upstream)
    }) {
        Ok(handler) => handler,
        Err(err) => return forwarding_failed(err),
    };

    match forward(request, &target, &handler).await {
        ForwardOutcome::Forwarded(response) => response,
        ForwardOutcome::Failed(err) => forwarding_failed(err),
    }
}

/// Log a failure against its origin and answer 502.
fn forwarding_failed(err: ProxyError) -> Response {
    tracing::error!(
        origin = err.origin().map(OriginKey::as_str).unwrap_or("-"),
        kind = err.kind(),
        error = %err,
        cause = %err.cause_chain(),
        "Forwarding failed"
    );
    metrics::record_forward_failure(err.kind());

    err.into_response()
}
