//! HTTP request handlers for the intake API.

pub mod health;
pub mod intake;
pub mod replay;

pub use health::{health_check, service_banner};
pub use intake::receive_webhook;
pub use replay::replay_event;
