//! In-memory adapter for the `EventFlow` pipeline
//!
//! This crate provides an in-memory implementation of the `EventStore` trait
//! from the eventflow crate, useful for tests, examples and development
//! scenarios where persistence is not required. The [`chaos`] module wraps any
//! store with deterministic failure injection.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chaos;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use eventflow::errors::EventStoreResult;
use eventflow::event::{EventPayload, RecordedEvent};
use eventflow::event_store::{EventStore, ReadOptions, StoredEvent};
use eventflow::types::{EventId, EventVersion, GlobalPosition, StreamId, Timestamp};
use parking_lot::RwLock;
use tracing::trace;

pub use chaos::{ChaosConfig, ChaosEventStore, ChaosEventStoreExt, Probability};

struct Log<E> {
    // Every stored event in global position order
    events: Vec<StoredEvent<E>>,
    // Maps stream IDs to the indices of their events in `events`
    streams: HashMap<StreamId, Vec<usize>>,
}

impl<E> Log<E> {
    fn version_of(&self, stream_id: &StreamId) -> EventVersion {
        self.streams
            .get(stream_id)
            .and_then(|indices| indices.last())
            .map_or_else(EventVersion::initial, |&index| {
                self.events[index].event_version
            })
    }

    fn head(&self) -> GlobalPosition {
        self.events
            .last()
            .map_or_else(GlobalPosition::start, |event| event.position)
    }
}

/// Thread-safe in-memory event store for testing
///
/// Clones share the same log.
pub struct InMemoryEventStore<E> {
    log: Arc<RwLock<Log<E>>>,
}

impl<E> Clone for InMemoryEventStore<E> {
    fn clone(&self) -> Self {
        Self {
            log: Arc::clone(&self.log),
        }
    }
}

impl<E> std::fmt::Debug for InMemoryEventStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let log = self.log.read();
        f.debug_struct("InMemoryEventStore")
            .field("events", &log.events.len())
            .field("streams", &log.streams.len())
            .finish()
    }
}

impl<E: EventPayload> InMemoryEventStore<E> {
    /// Create a new empty in-memory event store.
    pub fn new() -> Self {
        Self {
            log: Arc::new(RwLock::new(Log {
                events: Vec::new(),
                streams: HashMap::new(),
            })),
        }
    }

    /// Number of stored events, acknowledgements included.
    pub fn len(&self) -> usize {
        self.log.read().events.len()
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.log.read().events.is_empty()
    }

    /// Position of the most recently stored event.
    pub fn head(&self) -> GlobalPosition {
        self.log.read().head()
    }

    /// Current version of `stream_id`; an unknown stream is at the initial
    /// version.
    pub fn stream_version(&self, stream_id: &StreamId) -> EventVersion {
        self.log.read().version_of(stream_id)
    }

    /// Every stored event, in position order.
    pub fn snapshot(&self) -> Vec<StoredEvent<E>> {
        self.log.read().events.clone()
    }
}

impl<E: EventPayload> Default for InMemoryEventStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: EventPayload> EventStore for InMemoryEventStore<E> {
    type Event = E;

    async fn append_events(
        &self,
        events: Vec<RecordedEvent<E>>,
    ) -> EventStoreResult<Vec<StoredEvent<E>>> {
        let mut log = self.log.write();
        let mut position = log.head();
        let mut stored = Vec::with_capacity(events.len());

        for payload in events {
            let stream_id = payload.stream_id();
            let event_version = log.version_of(&stream_id).next();
            position = position.next();

            let event = StoredEvent {
                event_id: EventId::new(),
                stream_id: stream_id.clone(),
                event_version,
                position,
                timestamp: Timestamp::now(),
                payload,
            };

            let index = log.events.len();
            log.events.push(event.clone());
            log.streams.entry(stream_id).or_default().push(index);
            stored.push(event);
        }
        drop(log);

        trace!(count = stored.len(), %position, "appended events");
        Ok(stored)
    }

    async fn read_all(&self, options: ReadOptions) -> EventStoreResult<Vec<StoredEvent<E>>> {
        let log = self.log.read();
        let start = log
            .events
            .partition_point(|event| event.position <= options.after);
        let limit = options.max_events.unwrap_or(usize::MAX);

        Ok(log.events[start..].iter().take(limit).cloned().collect())
    }

    async fn read_stream(&self, stream_id: &StreamId) -> EventStoreResult<Vec<StoredEvent<E>>> {
        let log = self.log.read();

        Ok(log
            .streams
            .get(stream_id)
            .map(|indices| {
                indices
                    .iter()
                    .map(|&index| log.events[index].clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventflow::event::{acknowledgement_stream, CommandProcessed};
    use eventflow::result::OperationResult;
    use eventflow::types::CommandId;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Deposited {
        account: String,
        amount: u64,
    }

    impl EventPayload for Deposited {
        fn stream_id(&self) -> StreamId {
            StreamId::try_new(format!("account-{}", self.account)).unwrap()
        }
    }

    fn deposit(account: &str, amount: u64) -> RecordedEvent<Deposited> {
        RecordedEvent::Domain(Deposited {
            account: account.to_string(),
            amount,
        })
    }

    #[tokio::test]
    async fn appends_assign_versions_per_stream_and_positions_globally() {
        let store = InMemoryEventStore::<Deposited>::new();
        let stored = store
            .append_events(vec![deposit("a", 1), deposit("b", 2), deposit("a", 3)])
            .await
            .unwrap();

        let versions: Vec<u64> = stored.iter().map(|e| e.event_version.into()).collect();
        let positions: Vec<u64> = stored.iter().map(|e| e.position.into()).collect();
        assert_eq!(versions, vec![1, 1, 2]);
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(
            store.stream_version(&StreamId::try_new("account-a").unwrap()),
            EventVersion::new(2)
        );
    }

    #[tokio::test]
    async fn acknowledgements_land_in_their_own_stream() {
        let store = InMemoryEventStore::<Deposited>::new();
        let command_id = CommandId::new();
        store
            .append_events(vec![RecordedEvent::Acknowledgement(CommandProcessed::new(
                command_id,
                OperationResult::Ok(()),
                None,
            ))])
            .await
            .unwrap();

        let acks = store.read_stream(&acknowledgement_stream()).await.unwrap();
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].acknowledgement().unwrap().command_id, command_id);
    }

    #[tokio::test]
    async fn read_all_resumes_after_a_position() {
        let store = InMemoryEventStore::<Deposited>::new();
        store
            .append_events((1..=5).map(|n| deposit("a", n)).collect())
            .await
            .unwrap();

        let tail = store
            .read_all(ReadOptions::new().after(GlobalPosition::new(2)).with_max_events(2))
            .await
            .unwrap();

        let amounts: Vec<u64> = tail.iter().map(|e| e.domain().unwrap().amount).collect();
        assert_eq!(amounts, vec![3, 4]);
    }

    #[tokio::test]
    async fn unknown_streams_read_empty() {
        let store = InMemoryEventStore::<Deposited>::new();
        let events = store
            .read_stream(&StreamId::try_new("nobody").unwrap())
            .await
            .unwrap();
        assert!(events.is_empty());
        assert!(store.is_empty());
        assert_eq!(store.head(), GlobalPosition::start());
    }

    #[tokio::test]
    async fn clones_share_the_log() {
        let store = InMemoryEventStore::<Deposited>::new();
        let other = store.clone();
        store.append_events(vec![deposit("a", 1)]).await.unwrap();

        assert_eq!(other.len(), 1);
        assert_eq!(other.snapshot()[0].domain().unwrap().amount, 1);
    }

    proptest! {
        #[test]
        fn positions_are_strictly_increasing(batches in prop::collection::vec(1usize..5, 1..10)) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let store = InMemoryEventStore::<Deposited>::new();
            runtime.block_on(async {
                for (batch, size) in batches.iter().enumerate() {
                    let events = (0..*size)
                        .map(|n| deposit(&batch.to_string(), u64::try_from(n).unwrap()))
                        .collect();
                    store.append_events(events).await.unwrap();
                }
            });

            let all = store.snapshot();
            prop_assert_eq!(all.len(), batches.iter().sum::<usize>());
            prop_assert!(all.windows(2).all(|pair| pair[0].position < pair[1].position));
        }
    }
}
