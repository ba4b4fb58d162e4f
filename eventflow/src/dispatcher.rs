//! Routing a command to its handler inside a failure boundary.
//!
//! [`CommandDispatcher::dispatch`] never fails: every way a handler can end
//! (including a panic or the command being cancelled mid-flight) is folded
//! into a [`DispatchOutcome`].

use crate::command::{Command, CommandEnvelope};
use crate::errors::{Fault, HandlerError};
use crate::handler::{HandlerContext, HandlerOutput, HandlerRegistry};
use crate::outcome::{DispatchOutcome, CANCELLED_MESSAGE};
use crate::types::CommandId;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Resolves and invokes the handler for each command.
pub struct CommandDispatcher<C: Command, E> {
    registry: Arc<HandlerRegistry<C, E>>,
}

impl<C: Command, E> Clone for CommandDispatcher<C, E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<C: Command, E> std::fmt::Debug for CommandDispatcher<C, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("registry", &self.registry)
            .finish()
    }
}

impl<C: Command, E: Send + 'static> CommandDispatcher<C, E> {
    /// Creates a dispatcher over a built registry.
    pub fn new(registry: impl Into<Arc<HandlerRegistry<C, E>>>) -> Self {
        Self {
            registry: registry.into(),
        }
    }

    /// The registry this dispatcher routes through.
    pub fn registry(&self) -> &HandlerRegistry<C, E> {
        &self.registry
    }

    /// Dispatches one command and reports how it ended.
    #[instrument(skip_all, fields(command_id = %envelope.id(), kind = ?envelope.kind()))]
    pub async fn dispatch(&self, envelope: &CommandEnvelope<C>) -> DispatchOutcome<E> {
        let command_id = envelope.id();
        let kind = envelope.kind();

        let cancellation = envelope.cancellation().clone();
        if cancellation.is_cancelled() {
            debug!("command cancelled before dispatch");
            return cancelled(command_id);
        }

        let Some(handler) = self.registry.get(kind) else {
            debug!("no handler registered");
            return DispatchOutcome::Unhandled {
                command_id,
                result_message: Some(format!(
                    "No command processor registered for command kind {kind:?}"
                )),
            };
        };

        let context = HandlerContext::new(command_id, cancellation.clone());
        let invocation =
            AssertUnwindSafe(handler.handle(envelope.command(), &context)).catch_unwind();

        let completed = tokio::select! {
            biased;
            () = cancellation.cancelled() => {
                debug!("command cancelled during dispatch");
                return cancelled(command_id);
            }
            completed = invocation => completed,
        };

        match completed {
            Ok(Ok(HandlerOutput {
                events,
                functional_result,
                result_message,
            })) => DispatchOutcome::Processed {
                command_id,
                events,
                functional_result,
                result_message,
            },
            Ok(Err(HandlerError::Cancelled)) => cancelled(command_id),
            Ok(Err(HandlerError::Failed(error))) => {
                DispatchOutcome::faulted(command_id, Fault::Handler(error))
            }
            Err(panic) => {
                DispatchOutcome::faulted(command_id, Fault::Panicked(panic_message(&*panic)))
            }
        }
    }
}

fn cancelled<E>(command_id: CommandId) -> DispatchOutcome<E> {
    DispatchOutcome::Cancelled {
        command_id,
        result_message: Some(CANCELLED_MESSAGE.to_string()),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked with a non-string payload".to_string())
}
