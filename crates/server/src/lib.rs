#![forbid(unsafe_code)]

pub mod error;
pub mod handlers;
pub mod legal;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use services::TrackingService;

pub use error::ApiError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub tracking: Arc<TrackingService>,
    pub legal_dir: PathBuf,
}

impl AppState {
    #[must_use]
    pub fn new(tracking: Arc<TrackingService>, legal_dir: impl Into<PathBuf>) -> Self {
        Self {
            tracking,
            legal_dir: legal_dir.into(),
        }
    }
}

/// Build the router with every funnel endpoint.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/create-session", post(handlers::create_session))
        .route("/api/save-email", post(handlers::save_email))
        .route("/api/update-dropoff", post(handlers::update_drop_off))
        .route("/api/update-lead", post(handlers::update_lead))
        .route("/api/legal-docs/{doc}", get(legal::legal_doc))
        .route("/api/health", get(handlers::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the router on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(%addr, legal_dir = %state.legal_dir.display(), "funnel api listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
