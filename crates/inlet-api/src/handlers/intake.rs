//! Webhook intake handler.
//!
//! Resolves the source, verifies the signature over the exact raw
//! request bytes, and enqueues the payload for asynchronous processing.
//! The response acknowledges receipt only; processing success is never
//! implied.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use inlet_core::IntakeError;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::{error::ApiError, AppState};

/// Response for an accepted webhook.
#[derive(Debug, Serialize)]
pub struct IntakeResponse {
    /// Acknowledgement message
    pub message: String,
}

/// Receives a webhook from a registered source.
///
/// Verification runs over the raw body bytes before any parsing, so the
/// digest matches exactly what the sender signed. A verified payload is
/// enqueued and acknowledged with 202.
///
/// # Errors
///
/// - 404: source is not registered
/// - 400: signature header missing, or body is not a JSON object
/// - 401: signature does not match
/// - 501: source registered without a usable verifier
/// - 500: enqueue failed
#[instrument(
    name = "receive_webhook",
    skip(state, headers, body),
    fields(source = %source, content_length = body.len())
)]
pub async fn receive_webhook(
    Path(source): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let entry = state.registry.entry(&source)?;

    let signature = entry
        .verifier
        .header()
        .and_then(|header| headers.get(header))
        .and_then(|value| value.to_str().ok());

    entry.verifier.verify(&source, &body, signature)?;

    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        warn!(source, error = %e, "rejecting unparseable webhook body");
        IntakeError::MalformedPayload { reason: format!("body is not valid JSON: {e}") }
    })?;

    if !payload.is_object() {
        warn!(source, "rejecting non-object webhook body");
        return Err(ApiError(IntakeError::MalformedPayload {
            reason: "body must be a JSON object".into(),
        }));
    }

    state.queue.enqueue(entry.task.clone(), payload).await?;

    info!(source, task = %entry.task, "webhook verified and queued for processing");

    Ok((
        StatusCode::ACCEPTED,
        Json(IntakeResponse {
            message: "Webhook received and queued for processing.".to_string(),
        }),
    )
        .into_response())
}
