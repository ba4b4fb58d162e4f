//! Command handlers and the registry that routes to them.
//!
//! A handler receives a command by reference together with a
//! [`HandlerContext`] and returns a [`HandlerOutput`]: the domain events it
//! produced plus its functional verdict. Handlers are registered by command
//! kind once, at start-up; the built [`HandlerRegistry`] is immutable and is
//! shared behind an `Arc` by every dispatch task.
//!
//! # Example
//!
//! ```rust,ignore
//! struct CreateAccountHandler;
//!
//! #[async_trait]
//! impl CommandHandler<BankCommand, BankEvent> for CreateAccountHandler {
//!     async fn handle(
//!         &self,
//!         command: &BankCommand,
//!         _context: &HandlerContext,
//!     ) -> Result<HandlerOutput<BankEvent>, HandlerError> {
//!         let BankCommand::CreateAccount(create) = command else {
//!             return Err(HandlerError::msg("unexpected command"));
//!         };
//!         Ok(HandlerOutput::ok(vec![BankEvent::AccountCreated(create.into())]))
//!     }
//! }
//!
//! let registry = HandlerRegistry::builder()
//!     .register(BankCommandKind::CreateAccount, CreateAccountHandler)?
//!     .build();
//! ```

use crate::command::Command;
use crate::errors::{HandlerError, RegistryError};
use crate::result::FunctionalResult;
use crate::types::CommandId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What a handler knows about the command it is handling besides its payload.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    command_id: CommandId,
    cancellation: CancellationToken,
}

impl HandlerContext {
    /// Creates a context for one invocation.
    pub const fn new(command_id: CommandId, cancellation: CancellationToken) -> Self {
        Self {
            command_id,
            cancellation,
        }
    }

    /// The id of the command being handled.
    pub const fn command_id(&self) -> CommandId {
        self.command_id
    }

    /// Token a long-running handler may poll or await.
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns `true` once the command has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// The result of a handler that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOutput<E> {
    /// Domain events to append, in order. Ignored unless the functional
    /// result is `Ok`.
    pub events: Vec<E>,
    /// The handler's verdict.
    pub functional_result: FunctionalResult,
    /// Optional detail reported back to the caller.
    pub result_message: Option<String>,
}

impl<E> HandlerOutput<E> {
    /// Accepts the command, producing `events`.
    pub fn ok(events: Vec<E>) -> Self {
        Self {
            events,
            functional_result: FunctionalResult::ok(String::new()),
            result_message: None,
        }
    }

    /// Declines the command for a domain reason; no events are produced.
    pub fn failed(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            events: Vec::new(),
            functional_result: FunctionalResult::failed(reason.clone()),
            result_message: Some(reason),
        }
    }

    /// Attaches a result message; an accepted output carries it as its
    /// functional message too.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        if let FunctionalResult::Ok(ok) = &mut self.functional_result {
            ok.clone_from(&message);
        }
        self.result_message = Some(message);
        self
    }
}

/// Handles one kind of command.
///
/// Returning `Err(HandlerError::Failed(..))` or panicking makes the command
/// fault; returning [`HandlerOutput::failed`] is a normal, functional
/// rejection.
#[async_trait]
pub trait CommandHandler<C: Command, E>: Send + Sync {
    /// Handles `command`.
    async fn handle(
        &self,
        command: &C,
        context: &HandlerContext,
    ) -> Result<HandlerOutput<E>, HandlerError>;
}

#[async_trait]
impl<C, E, H> CommandHandler<C, E> for Arc<H>
where
    C: Command,
    E: Send + 'static,
    H: CommandHandler<C, E> + ?Sized,
{
    async fn handle(
        &self,
        command: &C,
        context: &HandlerContext,
    ) -> Result<HandlerOutput<E>, HandlerError> {
        (**self).handle(command, context).await
    }
}

/// Immutable lookup from command kind to handler.
pub struct HandlerRegistry<C: Command, E> {
    handlers: HashMap<C::Kind, Arc<dyn CommandHandler<C, E>>>,
}

impl<C: Command, E> HandlerRegistry<C, E> {
    /// Starts building a registry.
    pub fn builder() -> HandlerRegistryBuilder<C, E> {
        HandlerRegistryBuilder {
            handlers: HashMap::new(),
        }
    }

    /// The handler registered for `kind`, if any.
    pub fn get(&self, kind: C::Kind) -> Option<&Arc<dyn CommandHandler<C, E>>> {
        self.handlers.get(&kind)
    }

    /// Returns `true` when a handler is registered for `kind`.
    pub fn contains(&self, kind: C::Kind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<C: Command, E> std::fmt::Debug for HandlerRegistry<C, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`HandlerRegistry`].
pub struct HandlerRegistryBuilder<C: Command, E> {
    handlers: HashMap<C::Kind, Arc<dyn CommandHandler<C, E>>>,
}

impl<C: Command, E: 'static> HandlerRegistryBuilder<C, E> {
    /// Registers `handler` for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateHandler`] if `kind` already has a
    /// handler.
    pub fn register<H>(mut self, kind: C::Kind, handler: H) -> Result<Self, RegistryError>
    where
        H: CommandHandler<C, E> + 'static,
    {
        if self.handlers.contains_key(&kind) {
            return Err(RegistryError::DuplicateHandler {
                kind: format!("{kind:?}"),
            });
        }
        self.handlers.insert(kind, Arc::new(handler));
        Ok(self)
    }

    /// Freezes the registry.
    pub fn build(self) -> HandlerRegistry<C, E> {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}

impl<C: Command, E> std::fmt::Debug for HandlerRegistryBuilder<C, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistryBuilder")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
