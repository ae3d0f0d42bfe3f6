use crate::config::Config;
use crate::reconciler::Reconciler;
use axum::{http::StatusCode, Json};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Lookup-then-create-or-update against Help Scout.
    pub reconciler: Arc<Reconciler>,
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-helpscout-sync",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}
