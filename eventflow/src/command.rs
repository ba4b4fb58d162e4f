//! Commands and the envelope they travel in.
//!
//! A command is a caller's intent to change state. The pipeline is agnostic
//! of what a command contains; it only needs to know its *kind* so that the
//! dispatcher can route it. Kinds are a closed, explicit discriminant (usually
//! a fieldless enum) rather than anything discovered at runtime.
//!
//! # Example
//!
//! ```rust,ignore
//! #[derive(Debug, Clone)]
//! enum BankCommand {
//!     CreateAccount(CreateAccount),
//!     TransferMoney(TransferMoney),
//! }
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum BankCommandKind {
//!     CreateAccount,
//!     TransferMoney,
//! }
//!
//! impl Command for BankCommand {
//!     type Kind = BankCommandKind;
//!
//!     fn kind(&self) -> BankCommandKind {
//!         match self {
//!             Self::CreateAccount(_) => BankCommandKind::CreateAccount,
//!             Self::TransferMoney(_) => BankCommandKind::TransferMoney,
//!         }
//!     }
//! }
//! ```

use crate::types::CommandId;
use std::fmt::Debug;
use std::hash::Hash;
use tokio_util::sync::CancellationToken;

/// A command value that can be routed by kind.
pub trait Command: Debug + Send + Sync + 'static {
    /// Discriminant used to look up the handler.
    type Kind: Debug + Copy + Eq + Hash + Send + Sync + 'static;

    /// The kind of this command.
    fn kind(&self) -> Self::Kind;
}

/// A command together with its identity and cancellation state.
///
/// Envelopes are immutable once created; the pipeline shares them behind an
/// `Arc` with every subscriber of the command channel.
#[derive(Debug, Clone)]
pub struct CommandEnvelope<C> {
    id: CommandId,
    command: C,
    cancellation: CancellationToken,
}

impl<C: Command> CommandEnvelope<C> {
    /// Wraps a command with a fresh identifier.
    pub fn new(command: C) -> Self {
        Self::with_id(CommandId::new(), command)
    }

    /// Wraps a command with a caller-chosen identifier.
    pub fn with_id(id: CommandId, command: C) -> Self {
        Self {
            id,
            command,
            cancellation: CancellationToken::new(),
        }
    }

    /// Ties the envelope to an existing cancellation token.
    ///
    /// Cancelling the token (or any parent of it) before or during handling
    /// makes the command resolve as cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The command's identifier.
    pub const fn id(&self) -> CommandId {
        self.id
    }

    /// The wrapped command.
    pub const fn command(&self) -> &C {
        &self.command
    }

    /// The kind of the wrapped command.
    pub fn kind(&self) -> C::Kind {
        self.command.kind()
    }

    /// Token observed by the dispatcher.
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Marks the command as cancelled.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Returns `true` once the command has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl<C: Command> From<C> for CommandEnvelope<C> {
    fn from(command: C) -> Self {
        Self::new(command)
    }
}
