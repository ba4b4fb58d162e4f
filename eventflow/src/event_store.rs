//! Event store abstraction.
//!
//! The `EventStore` trait is the port between the pipeline and whatever keeps
//! events durably. The pipeline only appends; readers (the
//! [`EventPoller`](crate::poller::EventPoller), projections, replay) read the
//! store-wide log by global position or a single stream by id.

use crate::errors::EventStoreResult;
use crate::event::{CommandProcessed, RecordedEvent};
use crate::types::{EventId, EventVersion, GlobalPosition, StreamId, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A record as it exists in the store, with ordering metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent<E> {
    /// Unique identifier for this event.
    pub event_id: EventId,
    /// The stream this event belongs to.
    pub stream_id: StreamId,
    /// The version of this event within its stream.
    pub event_version: EventVersion,
    /// Position in the store-wide log.
    pub position: GlobalPosition,
    /// When this event was stored.
    pub timestamp: Timestamp,
    /// The record itself.
    pub payload: RecordedEvent<E>,
}

impl<E> StoredEvent<E> {
    /// The domain event, if this record holds one.
    pub const fn domain(&self) -> Option<&E> {
        self.payload.as_domain()
    }

    /// The acknowledgement, if this record holds one.
    pub const fn acknowledgement(&self) -> Option<&CommandProcessed> {
        self.payload.as_acknowledgement()
    }
}

/// Configuration for reading the store-wide log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Only return events strictly after this position.
    pub after: GlobalPosition,
    /// Maximum number of events to return (None = no limit).
    pub max_events: Option<usize>,
}

impl ReadOptions {
    /// Reads everything from the beginning.
    pub fn new() -> Self {
        Self {
            after: GlobalPosition::start(),
            max_events: None,
        }
    }

    /// Starts reading after the given position.
    #[must_use]
    pub const fn after(mut self, position: GlobalPosition) -> Self {
        self.after = position;
        self
    }

    /// Sets the maximum number of events to read.
    #[must_use]
    pub const fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = Some(max_events);
        self
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Port for event store implementations.
///
/// Implementations decide their own durability and transaction discipline;
/// the pipeline awaits each call to completion and never second-guesses it.
///
/// - `eventflow-memory`: in-memory backend for tests and examples
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// The domain event type stored alongside acknowledgements.
    type Event: Clone + Send + Sync + 'static;

    /// Appends a batch atomically, assigning versions and global positions.
    ///
    /// Either every record of the batch is stored or none is.
    async fn append_events(
        &self,
        events: Vec<RecordedEvent<Self::Event>>,
    ) -> EventStoreResult<Vec<StoredEvent<Self::Event>>>;

    /// Reads the store-wide log in position order.
    async fn read_all(&self, options: ReadOptions)
        -> EventStoreResult<Vec<StoredEvent<Self::Event>>>;

    /// Reads one stream in version order.
    async fn read_stream(
        &self,
        stream_id: &StreamId,
    ) -> EventStoreResult<Vec<StoredEvent<Self::Event>>>;
}

#[async_trait]
impl<S> EventStore for std::sync::Arc<S>
where
    S: EventStore + ?Sized,
{
    type Event = S::Event;

    async fn append_events(
        &self,
        events: Vec<RecordedEvent<Self::Event>>,
    ) -> EventStoreResult<Vec<StoredEvent<Self::Event>>> {
        (**self).append_events(events).await
    }

    async fn read_all(
        &self,
        options: ReadOptions,
    ) -> EventStoreResult<Vec<StoredEvent<Self::Event>>> {
        (**self).read_all(options).await
    }

    async fn read_stream(
        &self,
        stream_id: &StreamId,
    ) -> EventStoreResult<Vec<StoredEvent<Self::Event>>> {
        (**self).read_stream(stream_id).await
    }
}
