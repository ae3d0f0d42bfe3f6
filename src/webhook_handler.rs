use crate::errors::{AppError, ResultExt};
use crate::event_models::{EventPayload, EventResult, IdentifyEvent, SyncResponse};
use crate::handlers::AppState;
use crate::models::Outcome;
use crate::validation::validate_identify;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

/// Identify ingest handler
///
/// Receives identify events from the upstream pipeline and reconciles each one
/// into Help Scout.
///
/// Expected payload: Single event object OR array of events
/// Authentication: X-Webhook-Token header must match WEBHOOK_SECRET env var (if set)
///
/// A single event answers with the reconciled customer (201 created, 200 updated)
/// or the error of the stage that failed. A batch always answers 200 with a
/// per-event summary.
pub async fn identify(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<EventPayload>,
) -> Result<Response, AppError> {
    validate_webhook_secret(&state, &headers)?;

    match payload {
        EventPayload::Single(event) => {
            if !event.is_identify() {
                tracing::debug!("Ignoring '{}' message", event.event_type);
                return Ok((StatusCode::OK, Json(EventResult::ignored(event.message_id))).into_response());
            }

            let identify = validate_identify(&event)?;
            let reconciliation = state.reconciler.reconcile(identify).await?;
            let status = match reconciliation.outcome {
                Outcome::Created => StatusCode::CREATED,
                Outcome::Updated => StatusCode::OK,
            };
            Ok((status, Json(reconciliation)).into_response())
        }
        EventPayload::Batch(events) => {
            tracing::info!("Processing {} identify event(s)", events.len());

            let mut results = Vec::with_capacity(events.len());
            for event in events {
                results.push(process_event(&state, event).await);
            }

            let response = SyncResponse::from_results(results);
            tracing::info!(
                "Batch complete: {} received, {} created, {} updated, {} ignored, {} failed",
                response.received,
                response.created,
                response.updated,
                response.ignored,
                response.failed
            );
            Ok((StatusCode::OK, Json(response)).into_response())
        }
    }
}

/// Reconciles one batch entry; failures are reported, not propagated, so the
/// rest of the batch still runs.
async fn process_event(state: &AppState, event: IdentifyEvent) -> EventResult {
    let message_id = event.message_id.clone();
    if !event.is_identify() {
        return EventResult::ignored(message_id);
    }

    let result = match validate_identify(&event) {
        Ok(identify) => state.reconciler.reconcile(identify).await,
        Err(e) => Err(e),
    }
    .with_context(|| format!("message {}", message_id.as_deref().unwrap_or("-")));

    match result {
        Ok(reconciliation) => EventResult::reconciled(message_id, &reconciliation),
        Err(e) => {
            tracing::error!("Failed to reconcile identify event: {}", e);
            EventResult::failed(message_id, e.to_string())
        }
    }
}

/// Validate shared secret from X-Webhook-Token header
fn validate_webhook_secret(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    // If no secret is configured, skip validation (warn was already logged at startup)
    let Some(ref expected_secret) = state.config.webhook_secret else {
        return Ok(());
    };

    let token = headers
        .get("x-webhook-token")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing X-Webhook-Token header".to_string()))?;

    if !constant_time_compare(token, expected_secret) {
        tracing::warn!("Invalid webhook token received");
        return Err(AppError::Unauthorized("Invalid webhook token".to_string()));
    }

    Ok(())
}

/// Constant-time string comparison (length still leaks)
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
