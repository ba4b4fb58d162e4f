//! The normalized result of dispatching one command.
//!
//! Every way a dispatch can end is folded into exactly one
//! [`DispatchOutcome`] variant, and every variant maps to exactly one
//! [`CommandProcessed`] acknowledgement.

use crate::errors::Fault;
use crate::event::CommandProcessed;
use crate::result::{FunctionalResult, OperationResult};
use crate::types::CommandId;

/// Message used when an unhandled outcome carries none.
pub const NO_HANDLER_MESSAGE: &str = "No command processor registered";

/// Message used when a cancelled outcome carries none.
pub const CANCELLED_MESSAGE: &str = "Command was cancelled";

/// How dispatching a command ended.
#[derive(Debug, Clone)]
pub enum DispatchOutcome<E> {
    /// The handler ran to completion.
    Processed {
        /// The dispatched command.
        command_id: CommandId,
        /// Events to append, in order.
        events: Vec<E>,
        /// The handler's verdict.
        functional_result: FunctionalResult,
        /// Detail reported back to the caller.
        result_message: Option<String>,
    },
    /// No handler is registered for the command's kind.
    Unhandled {
        /// The dispatched command.
        command_id: CommandId,
        /// Detail reported back to the caller.
        result_message: Option<String>,
    },
    /// The handler failed, panicked, or its events could not be stored.
    Faulted {
        /// The dispatched command.
        command_id: CommandId,
        /// What went wrong.
        fault: Fault,
        /// Detail reported back to the caller.
        result_message: Option<String>,
    },
    /// The command was cancelled before or while being handled.
    Cancelled {
        /// The dispatched command.
        command_id: CommandId,
        /// Detail reported back to the caller.
        result_message: Option<String>,
    },
}

impl<E> DispatchOutcome<E> {
    /// Builds a `Faulted` outcome whose message describes the fault.
    pub fn faulted(command_id: CommandId, fault: Fault) -> Self {
        let result_message = Some(format!("Command execution failed: {fault}"));
        Self::Faulted {
            command_id,
            fault,
            result_message,
        }
    }

    /// The dispatched command's id.
    pub const fn command_id(&self) -> CommandId {
        match self {
            Self::Processed { command_id, .. }
            | Self::Unhandled { command_id, .. }
            | Self::Faulted { command_id, .. }
            | Self::Cancelled { command_id, .. } => *command_id,
        }
    }

    /// The result message, if any.
    pub fn result_message(&self) -> Option<&str> {
        match self {
            Self::Processed { result_message, .. }
            | Self::Unhandled { result_message, .. }
            | Self::Faulted { result_message, .. }
            | Self::Cancelled { result_message, .. } => result_message.as_deref(),
        }
    }

    /// Short variant name for logs.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Processed { .. } => "processed",
            Self::Unhandled { .. } => "unhandled",
            Self::Faulted { .. } => "faulted",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// The result a waiting caller observes for this outcome.
    pub fn operation_result(&self) -> OperationResult<()> {
        match self {
            Self::Processed {
                functional_result: FunctionalResult::Ok(_),
                ..
            } => OperationResult::Ok(()),
            Self::Processed {
                functional_result: FunctionalResult::Failed(reason),
                ..
            } => OperationResult::Error(reason.clone()),
            Self::Unhandled { result_message, .. } => OperationResult::InternalError(
                result_message
                    .clone()
                    .unwrap_or_else(|| NO_HANDLER_MESSAGE.to_string()),
            ),
            Self::Faulted {
                fault,
                result_message,
                ..
            } => OperationResult::InternalError(
                result_message
                    .clone()
                    .unwrap_or_else(|| format!("Command execution failed: {fault}")),
            ),
            Self::Cancelled { result_message, .. } => OperationResult::Cancelled(
                result_message
                    .clone()
                    .unwrap_or_else(|| CANCELLED_MESSAGE.to_string()),
            ),
        }
    }

    /// The acknowledgement to append for this outcome.
    pub fn to_acknowledgement(&self) -> CommandProcessed {
        CommandProcessed::new(
            self.command_id(),
            self.operation_result(),
            self.result_message().map(str::to_string),
        )
    }
}
