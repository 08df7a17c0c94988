//! Error taxonomy for webhook intake and processing.
//!
//! Routing and authentication failures are resolved synchronously inside
//! the intake path and never enqueued. Processing failures are split into
//! permanent rejections (never retried) and transient failures that feed
//! the retry state machine.

use std::fmt;

use crate::models::EventId;

/// Result type alias using [`IntakeError`].
pub type Result<T> = std::result::Result<T, IntakeError>;

/// Error taxonomy covering registry, verification, processing, and replay.
///
/// `Display`, `Error`, and `From` are implemented by hand rather than via
/// `thiserror`: the derive treats any field named `source` as the error
/// source, which would require `String: std::error::Error`. The `source`
/// fields here are webhook source identifiers, not causes.
#[derive(Debug)]
pub enum IntakeError {
    /// A source was registered twice during startup.
    ///
    /// This is a fatal configuration error raised at process
    /// initialization, never at request time.
    DuplicateSource {
        /// The source identifier that was registered twice
        source: String,
    },

    /// No registry entry exists for the requested source.
    UnknownSource {
        /// The unresolved source identifier
        source: String,
    },

    /// No processing task is registered under the given routing key.
    UnknownTask {
        /// The unresolved task routing key
        task: String,
    },

    /// The source is registered but its verifier is not implemented.
    VerifierUnavailable {
        /// The source whose verifier is missing
        source: String,
    },

    /// The request carried no signature header.
    MissingSignature {
        /// Name of the expected signature header
        header: String,
    },

    /// The signature header did not match the request body.
    InvalidSignature,

    /// The payload is structurally invalid for its source.
    ///
    /// Permanent: retrying cannot fix a malformed payload.
    MalformedPayload {
        /// Why the payload was rejected
        reason: String,
    },

    /// A processing attempt failed for a reason expected to clear.
    TransientProcessing {
        /// Why the attempt failed
        reason: String,
    },

    /// A work item exhausted its retry budget.
    RetriesExhausted {
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// Replay referenced an event that does not exist.
    EventNotFound {
        /// The missing event identifier
        id: EventId,
    },

    /// Database operation failed.
    Database(sqlx::Error),

    /// Generic error for wrapping other failures.
    Other(anyhow::Error),
}

impl fmt::Display for IntakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateSource { source } => {
                write!(f, "source '{source}' is already registered")
            }
            Self::UnknownSource { source } => write!(f, "source '{source}' is not supported"),
            Self::UnknownTask { task } => write!(f, "no processing task registered for '{task}'"),
            Self::VerifierUnavailable { source } => {
                write!(f, "verifier for source '{source}' is not implemented")
            }
            Self::MissingSignature { header } => write!(f, "{header} header is missing"),
            Self::InvalidSignature => write!(f, "invalid signature"),
            Self::MalformedPayload { reason } => write!(f, "malformed payload: {reason}"),
            Self::TransientProcessing { reason } => {
                write!(f, "transient processing failure: {reason}")
            }
            Self::RetriesExhausted { attempts } => {
                write!(f, "retries exhausted after {attempts} attempts")
            }
            Self::EventNotFound { id } => write!(f, "event {id} not found"),
            Self::Database(err) => write!(f, "database error: {err}"),
            Self::Other(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for IntakeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database(err) => Some(err),
            Self::Other(err) => AsRef::<dyn std::error::Error>::as_ref(err).source(),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for IntakeError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}

impl From<anyhow::Error> for IntakeError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err)
    }
}

impl IntakeError {
    /// Returns whether a processing attempt failing with this error should
    /// be retried.
    ///
    /// Only transient conditions are retryable; routing, authentication,
    /// and shape-validation failures are terminal.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientProcessing { .. } | Self::Database(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors_identified() {
        assert!(IntakeError::TransientProcessing { reason: "db down".into() }.is_retryable());

        assert!(!IntakeError::InvalidSignature.is_retryable());
        assert!(!IntakeError::MalformedPayload { reason: "missing field".into() }.is_retryable());
        assert!(!IntakeError::UnknownSource { source: "gitlab".into() }.is_retryable());
        assert!(!IntakeError::RetriesExhausted { attempts: 3 }.is_retryable());
    }

    #[test]
    fn display_names_the_source() {
        let err = IntakeError::UnknownSource { source: "gitlab".into() };
        assert_eq!(err.to_string(), "source 'gitlab' is not supported");

        let err = IntakeError::MissingSignature { header: "x-hub-signature-256".into() };
        assert_eq!(err.to_string(), "x-hub-signature-256 header is missing");
    }
}
