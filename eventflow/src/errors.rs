//! Error types for the command pipeline.
//!
//! Each subsystem owns its error enum so callers can react to the failures
//! that actually concern them:
//!
//! - **`EventStoreError`**: the store could not append or read
//! - **`HandlerError`**: what a command handler reports when it cannot run
//! - **`Fault`**: the failure captured inside a `Faulted` dispatch outcome
//! - **`RegistryError`**: handler registration mistakes found at start-up
//! - **`GateError`** / **`ChannelError`**: admission after disposal
//! - **`ConfigError`**: configuration that failed validation
//!
//! Handler failures never escape the dispatcher as errors; they are folded
//! into a [`DispatchOutcome`](crate::outcome::DispatchOutcome) instead.

use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur when interacting with the event store.
///
/// # Retry Strategy
///
/// The pipeline never retries store calls itself. A failed domain append is
/// reported to the caller as an internal error; a failed acknowledgement
/// append is handled according to the configured
/// [`AcknowledgementPolicy`](crate::config::AcknowledgementPolicy).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventStoreError {
    /// The connection to the event store failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Serialization of an event failed.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// A timeout occurred while waiting for the operation.
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The event store is temporarily unavailable.
    #[error("Event store unavailable: {0}")]
    Unavailable(String),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Type alias for event store results.
pub type EventStoreResult<T> = Result<T, EventStoreError>;

/// Failure reported by a command handler.
///
/// Returning `Failed` means the handler could not run (the equivalent of an
/// exception); it becomes a `Faulted` outcome. A handler that ran and declined
/// for domain reasons should instead return a
/// [`FunctionalResult::Failed`](crate::result::FunctionalResult::Failed).
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// The handler observed cancellation and stopped.
    #[error("command handling was cancelled")]
    Cancelled,

    /// The handler failed.
    #[error("{0}")]
    Failed(Arc<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Wraps any error as a handler failure.
    pub fn failed<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Failed(Arc::new(error))
    }

    /// Creates a handler failure from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::failed(HandlerFailure(message.into()))
    }
}

/// Plain-message error used by [`HandlerError::msg`].
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct HandlerFailure(String);

/// The failure captured by a `Faulted` dispatch outcome.
#[derive(Debug, Clone, Error)]
pub enum Fault {
    /// The handler returned an error.
    #[error("handler failed: {0}")]
    Handler(Arc<dyn std::error::Error + Send + Sync>),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// The handler succeeded but its events could not be appended.
    #[error("failed to append events: {0}")]
    Append(#[from] EventStoreError),
}

/// Errors found while building a handler registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two handlers were registered for the same command kind.
    #[error("a handler is already registered for command kind {kind}")]
    DuplicateHandler {
        /// Debug rendering of the contested kind.
        kind: String,
    },
}

/// Errors returned by the admission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    /// The gate was closed before or while waiting for it.
    #[error("gate closed")]
    Closed,
}

/// Errors returned when submitting commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The command channel has been disposed.
    #[error("command channel closed")]
    Closed,
}

impl From<GateError> for ChannelError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Closed => Self::Closed,
        }
    }
}

/// Configuration that could not be parsed or failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configuration text was not valid.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Invalid(err.to_string())
    }
}
