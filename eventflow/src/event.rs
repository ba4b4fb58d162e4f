//! Events appended by the pipeline.
//!
//! Two kinds of record reach the store: the domain events a handler produced
//! and the [`CommandProcessed`] acknowledgement written for every dispatched
//! command. [`RecordedEvent`] carries either so a single store and a single
//! replayable log hold both.

use crate::result::OperationResult;
use crate::types::{CommandId, StreamId};
use serde::{Deserialize, Serialize};

/// Name of the stream that holds every acknowledgement.
pub const ACKNOWLEDGEMENT_STREAM: &str = "$command-processed";

/// A domain event produced by a command handler.
pub trait EventPayload: Clone + Send + Sync + 'static {
    /// The stream this event is appended to.
    fn stream_id(&self) -> StreamId;
}

/// Acknowledgement summarizing how one command was resolved.
///
/// Callers correlate on `command_id`; exactly one is written per dispatched
/// command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandProcessed {
    /// The command this acknowledges.
    pub command_id: CommandId,
    /// The outcome, as the waiting caller sees it.
    pub operation_result: OperationResult<()>,
    /// Human-readable detail, if any.
    pub result_message: Option<String>,
}

impl CommandProcessed {
    /// Creates an acknowledgement.
    pub const fn new(
        command_id: CommandId,
        operation_result: OperationResult<()>,
        result_message: Option<String>,
    ) -> Self {
        Self {
            command_id,
            operation_result,
            result_message,
        }
    }
}

/// Anything the pipeline appends to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordedEvent<E> {
    /// A handler-produced domain event.
    Domain(E),
    /// A command acknowledgement.
    Acknowledgement(CommandProcessed),
}

impl<E: EventPayload> RecordedEvent<E> {
    /// The stream this record belongs to.
    pub fn stream_id(&self) -> StreamId {
        match self {
            Self::Domain(event) => event.stream_id(),
            Self::Acknowledgement(_) => acknowledgement_stream(),
        }
    }
}

impl<E> RecordedEvent<E> {
    /// The domain event, if this is one.
    pub const fn as_domain(&self) -> Option<&E> {
        match self {
            Self::Domain(event) => Some(event),
            Self::Acknowledgement(_) => None,
        }
    }

    /// The acknowledgement, if this is one.
    pub const fn as_acknowledgement(&self) -> Option<&CommandProcessed> {
        match self {
            Self::Domain(_) => None,
            Self::Acknowledgement(ack) => Some(ack),
        }
    }
}

/// The stream identifier acknowledgements are appended to.
pub fn acknowledgement_stream() -> StreamId {
    StreamId::try_new(ACKNOWLEDGEMENT_STREAM).expect("acknowledgement stream name is valid")
}
