use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// Step of a reconciliation that talked to Help Scout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Lookup,
    Create,
    Update,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Lookup => write!(f, "lookup"),
            Stage::Create => write!(f, "create"),
            Stage::Update => write!(f, "update"),
        }
    }
}

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Missing or invalid configuration (API key, base URL). Raised before any network call.
    Configuration(String),
    /// An inbound event is missing a field required to resolve its identity.
    Validation(String),
    /// Help Scout answered with a non-2xx status.
    RemoteApi {
        /// Which reconciliation step issued the request.
        stage: Stage,
        /// HTTP status code returned by Help Scout.
        status: u16,
        /// Description of the failed request plus the response body.
        message: String,
    },
    /// The request failed before a status code was obtained.
    Transport {
        /// Which reconciliation step issued the request.
        stage: Stage,
        /// Underlying client error.
        message: String,
    },
    /// Unauthorized access error.
    Unauthorized(String),
    /// Error wrapped with the event it happened for.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// HTTP status carried by a remote failure, looking through context wrappers.
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            AppError::RemoteApi { status, .. } => Some(*status),
            AppError::WithContext { source, .. } => source.remote_status(),
            _ => None,
        }
    }

    /// Reconciliation step a remote or transport failure belongs to.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            AppError::RemoteApi { stage, .. } | AppError::Transport { stage, .. } => Some(*stage),
            AppError::WithContext { source, .. } => source.stage(),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::RemoteApi {
                stage,
                status,
                message,
            } => write!(
                f,
                "Help Scout {} failed with status {}: {}",
                stage, status, message
            ),
            AppError::Transport { stage, message } => {
                write!(f, "Help Scout {} request failed: {}", stage, message)
            }
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Remote and transport failures map to 502 and keep the failing stage in the body,
    /// so the caller can tell a lookup failure from a create/update failure.
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Service misconfigured" }),
                )
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::RemoteApi {
                stage,
                status,
                message,
            } => {
                tracing::error!("Help Scout {} returned {}: {}", stage, status, message);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({
                        "error": "Help Scout request failed",
                        "stage": stage,
                        "status": status,
                    }),
                )
            }
            AppError::Transport { stage, message } => {
                tracing::error!("Help Scout {} transport failure: {}", stage, message);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({
                        "error": "Help Scout unreachable",
                        "stage": stage,
                    }),
                )
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" }))
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return source.clone().into_response();
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}
