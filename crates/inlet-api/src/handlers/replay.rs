//! Event replay handler.
//!
//! Re-enqueues the recorded payload of a processed event as a fresh work
//! item. Verification is skipped: the payload was verified on its
//! original intake and is read back from the store, not from the
//! network.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use inlet_core::{EventId, IntakeError};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::{error::ApiError, AppState};

/// Response for an accepted replay.
#[derive(Debug, Serialize)]
pub struct ReplayResponse {
    /// Acknowledgement message
    pub message: String,
}

/// Re-queues a recorded event for processing.
///
/// The replayed item starts with a fresh attempt count; it is a new unit
/// of work, not a resumption of the original.
///
/// # Errors
///
/// - 404: no event record with the given id
/// - 400: the event's source no longer has a registered task
/// - 500: store read or enqueue failed
#[instrument(name = "replay_event", skip(state))]
pub async fn replay_event(
    Path(event_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let event_id = EventId(event_id);
    info!(%event_id, "attempting event replay");

    let record = state.store.find_by_id(event_id).await?.ok_or_else(|| {
        warn!(%event_id, "replay requested for missing event");
        IntakeError::EventNotFound { id: event_id }
    })?;

    // The source may have been unregistered since the event was recorded
    let entry = state.registry.entry(&record.source).map_err(|_| {
        error!(%event_id, source = %record.source, "replay unavailable, source has no task");
        IntakeError::UnknownTask { task: record.source.clone() }
    })?;

    state.queue.enqueue(entry.task.clone(), record.payload).await?;

    info!(%event_id, source = %record.source, "event re-queued for processing");

    Ok((
        StatusCode::ACCEPTED,
        Json(ReplayResponse {
            message: format!("Event {event_id} has been re-queued for processing."),
        }),
    )
        .into_response())
}
