//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit, metrics)
//! - Apply access control to `/configs`
//! - Serve plain HTTP or TLS until shutdown

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::environment::EnvironmentResolver;
use crate::http::auth::access_control_middleware;
use crate::http::configs::serve_config;
use crate::http::error::ApiError;
use crate::http::request::{MakeRequestUuidV4, X_REQUEST_ID};
use crate::http::tls::load_tls_config;
use crate::observability::metrics;
use crate::security::AccessControl;
use crate::templates::TemplateRenderer;

const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a request needs, shared by all handlers.
pub struct ServerContext {
    config: AppConfig,
    resolver: EnvironmentResolver,
    access: AccessControl,
    renderer: Arc<dyn TemplateRenderer>,
}

impl std::fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerContext")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("access", &self.access)
            .finish_non_exhaustive()
    }
}

impl ServerContext {
    pub fn new(
        config: AppConfig,
        resolver: EnvironmentResolver,
        access: AccessControl,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        Self {
            config,
            resolver,
            access,
            renderer,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_dir(&self) -> &Path {
        self.resolver.config_dir()
    }

    pub fn resolver(&self) -> &EnvironmentResolver {
        &self.resolver
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn renderer(&self) -> &Arc<dyn TemplateRenderer> {
        &self.renderer
    }

    /// Drops parsed files and compiled templates.
    pub fn clear_caches(&self) {
        self.resolver.loader().cache().clear();
        self.renderer.clear_cache();
    }
}

/// HTTP server for the configuration endpoints.
pub struct HttpServer {
    router: Router,
    ctx: Arc<ServerContext>,
}

impl HttpServer {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        let router = Self::build_router(ctx.clone());
        Self { router, ctx }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(ctx: Arc<ServerContext>) -> Router {
        let server = &ctx.config().server;
        let timeout = Duration::from_secs(server.request_timeout_secs);
        let body_limit = server.max_body_size;

        let configs = Router::new()
            .route("/configs/{*path}", any(serve_config))
            .route_layer(middleware::from_fn_with_state(
                ctx.clone(),
                access_control_middleware,
            ));

        Router::new()
            .merge(configs)
            .route("/health", get(health))
            .fallback(not_found)
            .with_state(ctx)
            .layer(middleware::from_fn(track_metrics))
            .layer(DefaultBodyLimit::disable())
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TraceLayer::new_for_http().make_span_with(request_span))
                    .layer(RequestBodyLimitLayer::new(body_limit))
                    .layer(TimeoutLayer::new(timeout)),
            )
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        match &self.ctx.config().server.tls {
            Some(tls) => {
                let rustls = load_tls_config(tls).await?;
                let handle = axum_server::Handle::new();
                let drain = handle.clone();
                tokio::spawn(async move {
                    let _ = shutdown.recv().await;
                    drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
                });

                tracing::info!(address = %addr, tls = true, "HTTP server starting");
                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
            None => {
                tracing::info!(address = %addr, tls = false, "HTTP server starting");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                    })
                    .await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn request_span(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
    )
}

async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    metrics::record_request(response.status().as_u16(), start);
    response
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}
