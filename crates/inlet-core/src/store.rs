//! Durable event store for processed notifications.
//!
//! The store only holds records for payloads whose processing run
//! succeeded. Appends are atomic; a failed attempt leaves no partial
//! record behind. The trait keeps handlers and tasks testable without a
//! database.

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;
use sqlx::PgPool;

use crate::{
    error::Result,
    models::{EventId, EventRecord},
    time::Clock,
};

/// Persistence operations over processed event records.
///
/// Production code uses [`PostgresEventStore`]; tests use
/// [`mock::InMemoryEventStore`] for deterministic behavior and failure
/// injection.
pub trait EventStore: Send + Sync + 'static {
    /// Appends a record for a successfully processed payload.
    ///
    /// The store assigns the id and the `received_at` timestamp. Returns
    /// the record as persisted.
    fn append(
        &self,
        source: String,
        payload: Value,
    ) -> Pin<Box<dyn Future<Output = Result<EventRecord>> + Send + '_>>;

    /// Looks up a record by id. Returns `None` if no record exists.
    fn find_by_id(
        &self,
        id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<EventRecord>>> + Send + '_>>;

    /// Checks that the backing store is reachable.
    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production event store backed by PostgreSQL.
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl EventStore for PostgresEventStore {
    fn append(
        &self,
        source: String,
        payload: Value,
    ) -> Pin<Box<dyn Future<Output = Result<EventRecord>> + Send + '_>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let record = sqlx::query_as::<_, EventRecord>(
                r"
                INSERT INTO events (source, payload, received_at)
                VALUES ($1, $2, NOW())
                RETURNING id, source, payload, received_at
                ",
            )
            .bind(&source)
            .bind(&payload)
            .fetch_one(&pool)
            .await?;

            Ok(record)
        })
    }

    fn find_by_id(
        &self,
        id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<EventRecord>>> + Send + '_>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let record = sqlx::query_as::<_, EventRecord>(
                r"
                SELECT id, source, payload, received_at
                FROM events
                WHERE id = $1
                ",
            )
            .bind(id)
            .fetch_optional(&pool)
            .await?;

            Ok(record)
        })
    }

    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            sqlx::query("SELECT 1").execute(&pool).await?;
            Ok(())
        })
    }
}

pub mod mock {
    //! In-memory event store for testing.
    //!
    //! Deterministic store with sequential ids, an injectable clock, and
    //! configurable append failures for exercising the retry path.

    use std::{
        collections::HashMap,
        sync::atomic::{AtomicI64, Ordering},
    };

    use tokio::sync::RwLock;

    use super::{Arc, Clock, EventId, EventRecord, EventStore, Future, Pin, Result, Value};
    use crate::{error::IntakeError, time::RealClock};

    /// Event store holding records in memory.
    pub struct InMemoryEventStore {
        records: Arc<RwLock<HashMap<EventId, EventRecord>>>,
        next_id: AtomicI64,
        append_error: Arc<RwLock<Option<String>>>,
        healthy: Arc<RwLock<bool>>,
        clock: Arc<dyn Clock>,
    }

    impl InMemoryEventStore {
        /// Creates an empty store using the real clock.
        pub fn new() -> Self {
            Self::with_clock(Arc::new(RealClock))
        }

        /// Creates an empty store with an injected clock.
        pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
            Self {
                records: Arc::new(RwLock::new(HashMap::new())),
                next_id: AtomicI64::new(1),
                append_error: Arc::new(RwLock::new(None)),
                healthy: Arc::new(RwLock::new(true)),
                clock,
            }
        }

        /// Makes the next append fail with a database error.
        pub async fn inject_append_error(&self, error: impl Into<String>) {
            *self.append_error.write().await = Some(error.into());
        }

        /// Controls what [`EventStore::health_check`] reports.
        pub async fn set_healthy(&self, healthy: bool) {
            *self.healthy.write().await = healthy;
        }

        /// Number of records currently stored.
        pub async fn record_count(&self) -> usize {
            self.records.read().await.len()
        }
    }

    impl Default for InMemoryEventStore {
        fn default() -> Self {
            Self::new()
        }
    }

    impl EventStore for InMemoryEventStore {
        fn append(
            &self,
            source: String,
            payload: Value,
        ) -> Pin<Box<dyn Future<Output = Result<EventRecord>> + Send + '_>> {
            let records = self.records.clone();
            let append_error = self.append_error.clone();
            let clock = self.clock.clone();
            let id = EventId(self.next_id.fetch_add(1, Ordering::SeqCst));

            Box::pin(async move {
                if let Some(error) = append_error.write().await.take() {
                    return Err(IntakeError::Database(sqlx::Error::Protocol(error)));
                }

                let record = EventRecord {
                    id,
                    source,
                    payload,
                    received_at: clock.now_utc(),
                };
                records.write().await.insert(id, record.clone());
                Ok(record)
            })
        }

        fn find_by_id(
            &self,
            id: EventId,
        ) -> Pin<Box<dyn Future<Output = Result<Option<EventRecord>>> + Send + '_>> {
            let records = self.records.clone();
            Box::pin(async move { Ok(records.read().await.get(&id).cloned()) })
        }

        fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            let healthy = self.healthy.clone();
            Box::pin(async move {
                if *healthy.read().await {
                    Ok(())
                } else {
                    Err(IntakeError::Database(sqlx::Error::Protocol(
                        "connection refused".into(),
                    )))
                }
            })
        }
    }
}
