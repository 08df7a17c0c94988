//! Domain models and strongly-typed identifiers.
//!
//! Defines event records, queued work items, and newtype wrappers for
//! compile-time type safety, together with their PostgreSQL serialization
//! and the work-item state transitions used by the retry pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

type PgDb = sqlx::Postgres;
type PgValueRef<'r> = sqlx::postgres::PgValueRef<'r>;
type PgTypeInfo = sqlx::postgres::PgTypeInfo;
type PgArgumentBuffer = sqlx::postgres::PgArgumentBuffer;
type EncodeResult =
    Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync + 'static>>;
type BoxDynError = sqlx::error::BoxDynError;

/// Strongly-typed event record identifier.
///
/// Assigned by the event store at persistence time from a database
/// sequence, so identifiers increase with insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EventId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl sqlx::Type<PgDb> for EventId {
    fn type_info() -> PgTypeInfo {
        <i64 as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for EventId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let id = <i64 as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(id))
    }
}

impl sqlx::Encode<'_, PgDb> for EventId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <i64 as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Strongly-typed work item identifier.
///
/// Wraps a UUID so work items cannot be confused with event records.
/// Assigned at enqueue time; a replayed event gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItemId(pub Uuid);

impl WorkItemId {
    /// Creates a new random work item id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for WorkItemId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for WorkItemId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for WorkItemId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for WorkItemId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Routing key identifying the processing task a work item is addressed
/// to.
///
/// Opaque to the queue; resolved back to a [`crate::ProcessingTask`]
/// through the source registry when a worker claims the item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskRef(pub String);

impl TaskRef {
    /// Creates a routing key from a task name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskRef {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl sqlx::Type<PgDb> for TaskRef {
    fn type_info() -> PgTypeInfo {
        <String as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for TaskRef {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let name = <String as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(name))
    }
}

impl sqlx::Encode<'_, PgDb> for TaskRef {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <String as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Work item lifecycle status.
///
/// Items progress through these states while owned by the queue:
///
/// ```text
/// Pending -> Running -> Completed
///                    -> Pending   (scheduled retry, attempt_count += 1)
///                    -> Failed    (permanent rejection or retries exhausted)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    /// Enqueued and waiting for a worker, or scheduled for a retry.
    Pending,

    /// Claimed by a worker for one attempt.
    ///
    /// Exactly one worker owns the item while it is running.
    Running,

    /// Processing succeeded and the event record is persisted. Terminal.
    Completed,

    /// Permanently rejected or retry budget exhausted. Terminal.
    ///
    /// The item row is kept with its failure reason so operators can
    /// inspect what was lost; it is never silently dropped.
    Failed,
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for WorkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown work status: {other}")),
        }
    }
}

impl sqlx::Type<PgDb> for WorkStatus {
    fn type_info() -> PgTypeInfo {
        <&str as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for WorkStatus {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <&str as sqlx::Decode<PgDb>>::decode(value)?;
        s.parse().map_err(Into::into)
    }
}

impl sqlx::Encode<'_, PgDb> for WorkStatus {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <String as sqlx::Encode<PgDb>>::encode_by_ref(&self.to_string(), buf)
    }
}

/// One unit of asynchronous processing work.
///
/// Owned by the queue from enqueue until a worker claims it; ownership
/// transfers to the worker for the duration of one attempt. The queue's
/// `attempt_count` is the authoritative attempt counter.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkItem {
    /// Unique identifier for this work item.
    pub id: WorkItemId,

    /// Routing key of the target processing task.
    pub task: TaskRef,

    /// The payload mapping to process, exactly as enqueued.
    pub payload: serde_json::Value,

    /// Number of failed attempts so far. Starts at 0.
    pub attempt_count: i32,

    /// Current lifecycle status.
    pub status: WorkStatus,

    /// Earliest time the next attempt may run, when a retry is scheduled.
    pub next_attempt_at: Option<DateTime<Utc>>,

    /// When this item was enqueued.
    pub enqueued_at: DateTime<Utc>,

    /// When this item reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,

    /// Why this item failed, for terminal failures.
    pub failure_reason: Option<String>,
}

/// Durable record of one successfully processed notification.
///
/// Created only by a successful processing run, in a single atomic
/// append. Immutable after creation; read back by the replay handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventRecord {
    /// Store-assigned identifier.
    pub id: EventId,

    /// Source identifier of the provider that sent the notification.
    pub source: String,

    /// The processed payload mapping.
    pub payload: serde_json::Value,

    /// Store-assigned persistence timestamp.
    pub received_at: DateTime<Utc>,
}
