//! `EventFlow` - command dispatch and event sourcing with correlated
//! acknowledgements
//!
//! Callers submit commands through a serialized [`CommandChannel`]. A
//! [`CommandProcessor`] routes each command to the single handler registered
//! for its kind, the [`OutcomeWriter`] appends the handler's events followed by
//! exactly one [`CommandProcessed`] acknowledgement, and callers that used
//! [`send_and_wait`] resolve once their acknowledgement is read back from the
//! store.
//!
//! Most applications only need [`Pipeline`], which wires all of this over one
//! [`EventStore`]:
//!
//! ```rust,ignore
//! let registry = HandlerRegistry::builder()
//!     .register(BankCommandKind::CreateAccount, CreateAccountHandler)?
//!     .register(BankCommandKind::TransferMoney, TransferMoneyHandler)?
//!     .build();
//!
//! let pipeline = Pipeline::builder(InMemoryEventStore::new(), registry).start();
//! let result = pipeline.send_and_wait(create_account).await;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod channel;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod event;
pub mod event_store;
pub mod fan_out;
pub mod gate;
pub mod handler;
pub mod outcome;
pub mod pipeline;
pub mod poller;
pub mod processor;
pub mod replay;
pub mod result;
pub mod types;
pub mod waiter;
pub mod wake_up;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use channel::{CommandChannel, CommandSubscription};
pub use command::{Command, CommandEnvelope};
pub use config::{
    AcknowledgementPolicy, MaxConcurrentDispatches, PipelineConfig, PollBatchSize, PollIntervalMs,
};
pub use dispatcher::CommandDispatcher;
pub use errors::{
    ChannelError, ConfigError, EventStoreError, EventStoreResult, Fault, GateError, HandlerError,
    RegistryError,
};
pub use event::{CommandProcessed, EventPayload, RecordedEvent, ACKNOWLEDGEMENT_STREAM};
pub use event_store::{EventStore, ReadOptions, StoredEvent};
pub use fan_out::{FanOut, Subscription};
pub use gate::{Gate, GateGuard};
pub use handler::{CommandHandler, HandlerContext, HandlerOutput, HandlerRegistry};
pub use outcome::DispatchOutcome;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use poller::{EventPoller, EventSubscription};
pub use processor::CommandProcessor;
pub use replay::replay_acknowledgements;
pub use result::{FunctionalResult, OperationResult};
pub use types::{CommandId, EventId, EventVersion, GlobalPosition, StreamId, Timestamp};
pub use waiter::{send_and_wait, AcknowledgementStream};
pub use wake_up::WakeUp;
pub use writer::{OutcomeWriter, WriteReport};

/// Re-exported so handler implementations need no direct dependency.
pub use async_trait::async_trait;
/// Re-exported for [`CommandEnvelope::with_cancellation`].
pub use tokio_util::sync::CancellationToken;
