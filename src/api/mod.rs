// Thin namespace wrapper for API-layer components
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::handlers::AppState;

pub mod handlers {
    pub use crate::handlers::*;
}

pub mod webhook_handler {
    pub use crate::webhook_handler::*;
}

/// Identify batches from the pipeline stay well under this.
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Application routes with body limit and request tracing.
///
/// Rate limiting is layered on by the binary, which owns the peer-address
/// connect info the limiter keys on.
pub fn router(state: Arc<AppState>) -> Router {
    let ingest_routes = Router::new()
        .route("/v1/identify", post(crate::webhook_handler::identify))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)));

    Router::new()
        .route("/health", get(crate::handlers::health))
        .merge(ingest_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
