//! HTTP front end for the orchestrator

pub mod error;
pub mod routes;

use crate::integration::{ServerConfig, TaskOrchestrator};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Request bodies carry base64 photos
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TaskOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<TaskOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/solve", post(routes::solve))
        .route("/health", get(routes::health))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves
pub async fn serve(
    config: &ServerConfig,
    orchestrator: Arc<TaskOrchestrator>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    let app = create_router(AppState::new(orchestrator));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}
