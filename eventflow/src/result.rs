//! Result types exposed to callers.
//!
//! [`FunctionalResult`] is what a handler reports about its own domain
//! decision. [`OperationResult`] is what a caller waiting on a command
//! eventually receives; it folds every way processing can end into four cases.

use serde::{Deserialize, Serialize};

/// A handler's verdict on the command it processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionalResult {
    /// The command was accepted.
    Ok(String),
    /// The handler ran and declined the command for domain reasons.
    Failed(String),
}

impl FunctionalResult {
    /// Accepts the command with the given message.
    pub fn ok(message: impl Into<String>) -> Self {
        Self::Ok(message.into())
    }

    /// Declines the command with the given reason.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Returns `true` for [`FunctionalResult::Ok`].
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// The message carried by either variant.
    pub fn message(&self) -> &str {
        match self {
            Self::Ok(message) | Self::Failed(message) => message,
        }
    }
}

/// How a submitted command was ultimately resolved.
///
/// - `Ok`: handled and, if it produced events, durably appended
/// - `Error`: the handler declined the command for domain reasons
/// - `InternalError`: no handler, handler failure, or the events could not be
///   stored
/// - `Cancelled`: processing was cancelled or the pipeline shut down first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationResult<T> {
    /// Processing succeeded.
    Ok(T),
    /// Domain-level rejection.
    Error(String),
    /// Infrastructure or routing failure.
    InternalError(String),
    /// Cancelled before completion.
    Cancelled(String),
}

impl<T> OperationResult<T> {
    /// Returns `true` for [`OperationResult::Ok`].
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Returns `true` for [`OperationResult::Cancelled`].
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// The failure message, if this is not `Ok`.
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Error(message) | Self::InternalError(message) | Self::Cancelled(message) => {
                Some(message)
            }
        }
    }

    /// Transforms the success value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OperationResult<U> {
        match self {
            Self::Ok(value) => OperationResult::Ok(f(value)),
            Self::Error(message) => OperationResult::Error(message),
            Self::InternalError(message) => OperationResult::InternalError(message),
            Self::Cancelled(message) => OperationResult::Cancelled(message),
        }
    }

    /// Chains another operation on success; failures short-circuit.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> OperationResult<U>) -> OperationResult<U> {
        match self {
            Self::Ok(value) => f(value),
            Self::Error(message) => OperationResult::Error(message),
            Self::InternalError(message) => OperationResult::InternalError(message),
            Self::Cancelled(message) => OperationResult::Cancelled(message),
        }
    }

    /// Converts into a standard `Result`, keeping the failing case intact.
    pub fn into_result(self) -> Result<T, Self> {
        match self {
            Self::Ok(value) => Ok(value),
            other => Err(other),
        }
    }

    /// Collects many results into one: `Ok` with every value in order, or the
    /// first failure encountered.
    pub fn aggregate<I>(results: I) -> OperationResult<Vec<T>>
    where
        I: IntoIterator<Item = Self>,
    {
        let mut values = Vec::new();
        for result in results {
            match result {
                Self::Ok(value) => values.push(value),
                Self::Error(message) => return OperationResult::Error(message),
                Self::InternalError(message) => return OperationResult::InternalError(message),
                Self::Cancelled(message) => return OperationResult::Cancelled(message),
            }
        }
        OperationResult::Ok(values)
    }
}

impl<T> std::fmt::Display for OperationResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok(_) => write!(f, "ok"),
            Self::Error(message) => write!(f, "error: {message}"),
            Self::InternalError(message) => write!(f, "internal error: {message}"),
            Self::Cancelled(message) => write!(f, "cancelled: {message}"),
        }
    }
}
