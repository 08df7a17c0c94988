//! HTTP intake and replay API for the inlet webhook service.
//!
//! Exposes the synchronous half of the pipeline: webhook intake with
//! per-source signature verification, event replay, and health probes.
//! Handlers resolve sources through the registry built at startup and
//! hand verified payloads to the task queue; nothing is processed
//! inline.

pub mod config;
pub mod error;
pub mod handlers;
pub mod server;

use std::sync::Arc;

use inlet_core::{registry::SourceRegistry, store::EventStore, time::Clock};
use inlet_queue::queue::TaskQueue;

pub use config::Config;
pub use error::ApiError;
pub use server::{create_router, start_server};

/// Shared application state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Source registry built at startup.
    pub registry: Arc<SourceRegistry>,
    /// Queue verified payloads are enqueued to.
    pub queue: Arc<dyn TaskQueue>,
    /// Store of processed event records, read by replay and health.
    pub store: Arc<dyn EventStore>,
    /// Time source for response timestamps.
    pub clock: Arc<dyn Clock>,
}
