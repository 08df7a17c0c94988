//! Core domain types for the inlet webhook service.
//!
//! Provides the source registry, verifier variants, processing-task
//! contract, event store, and error taxonomy shared by the intake API
//! and the processing workers. All other crates depend on these
//! foundational types for type safety and consistency.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod registry;
pub mod store;
pub mod task;
pub mod time;
pub mod verify;

pub use error::{IntakeError, Result};
pub use models::{EventId, EventRecord, TaskRef, WorkItem, WorkItemId, WorkStatus};
pub use registry::{SourceEntry, SourceRegistration, SourceRegistry};
pub use store::EventStore;
pub use task::{ProcessingTask, TaskOutcome};
pub use time::{Clock, RealClock, TestClock};
pub use verify::Verifier;
