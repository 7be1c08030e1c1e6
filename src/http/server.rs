//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, body cap, metrics)
//! - Serve plain or TLS connections until shutdown is signalled

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatekeeperConfig;
use crate::http::request::{make_span, propagate_request_id_layer, set_request_id_layer};
use crate::http::upload::{self, MULTIPART_OVERHEAD};
use crate::intake::Pipeline;
use crate::observability::metrics;

/// How long in-flight TLS connections get to finish after shutdown.
const TLS_DRAIN_SECS: u64 = 10;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

/// HTTP server for the gatekeeper.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server around a ready pipeline.
    pub fn new(config: GatekeeperConfig, pipeline: Arc<Pipeline>) -> Self {
        let state = AppState { pipeline };
        let router = Self::build_router(&config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatekeeperConfig, state: AppState) -> Router {
        let body_cap = config.limits.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

        Router::new()
            .route("/", get(upload::index))
            .route("/upload", post(upload::upload))
            .route("/health", get(upload::health))
            .with_state(state)
            .layer(DefaultBodyLimit::max(body_cap))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn(track_requests))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(set_request_id_layer())
    }

    /// The configured router, for embedding or tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS until `shutdown` fires.
    pub async fn run_tls(
        self,
        listener: TcpListener,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTPS server draining");
            drain.graceful_shutdown(Some(Duration::from_secs(TLS_DRAIN_SECS)));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::from_tcp_rustls(listener.into_std()?, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16());
    response
}
