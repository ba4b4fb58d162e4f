//! In-crate fixtures for unit tests.

use crate::errors::{EventStoreError, EventStoreResult};
use crate::event::{EventPayload, RecordedEvent};
use crate::event_store::{EventStore, ReadOptions, StoredEvent};
use crate::types::{EventId, EventVersion, GlobalPosition, StreamId, Timestamp};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Domain event used across unit tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    pub stream: &'static str,
    pub n: u32,
}

impl Tick {
    pub const fn on(stream: &'static str, n: u32) -> Self {
        Self { stream, n }
    }
}

impl EventPayload for Tick {
    fn stream_id(&self) -> StreamId {
        StreamId::try_new(self.stream).unwrap()
    }
}

/// Log-backed store whose domain or acknowledgement appends can be made to
/// fail.
#[derive(Debug)]
pub struct RecordingStore<E> {
    log: Mutex<Vec<StoredEvent<E>>>,
    fail_domain: AtomicBool,
    fail_acknowledgements: AtomicBool,
}

impl<E: EventPayload> RecordingStore<E> {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            fail_domain: AtomicBool::new(false),
            fail_acknowledgements: AtomicBool::new(false),
        }
    }

    pub fn failing_domain_appends(self) -> Self {
        self.fail_domain.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_acknowledgements(self) -> Self {
        self.fail_acknowledgements.store(true, Ordering::SeqCst);
        self
    }

    pub fn records(&self) -> Vec<RecordedEvent<E>> {
        self.log.lock().iter().map(|stored| stored.payload.clone()).collect()
    }
}

#[async_trait]
impl<E: EventPayload> EventStore for RecordingStore<E> {
    type Event = E;

    async fn append_events(
        &self,
        events: Vec<RecordedEvent<E>>,
    ) -> EventStoreResult<Vec<StoredEvent<E>>> {
        let acknowledging = events
            .iter()
            .any(|record| record.as_acknowledgement().is_some());
        let failing = if acknowledging {
            &self.fail_acknowledgements
        } else {
            &self.fail_domain
        };
        if failing.load(Ordering::SeqCst) {
            return Err(EventStoreError::Unavailable("injected failure".to_string()));
        }

        let mut log = self.log.lock();
        let mut stored = Vec::with_capacity(events.len());
        for payload in events {
            let stream_id = payload.stream_id();
            let version = log
                .iter()
                .filter(|existing| existing.stream_id == stream_id)
                .fold(EventVersion::initial(), |version, _| version.next())
                .next();
            let position = GlobalPosition::new(log.len() as u64 + 1);
            let event = StoredEvent {
                event_id: EventId::new(),
                stream_id,
                event_version: version,
                position,
                timestamp: Timestamp::now(),
                payload,
            };
            log.push(event.clone());
            stored.push(event);
        }
        Ok(stored)
    }

    async fn read_all(&self, options: ReadOptions) -> EventStoreResult<Vec<StoredEvent<E>>> {
        let log = self.log.lock();
        Ok(log
            .iter()
            .filter(|stored| stored.position > options.after)
            .take(options.max_events.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn read_stream(&self, stream_id: &StreamId) -> EventStoreResult<Vec<StoredEvent<E>>> {
        let log = self.log.lock();
        Ok(log
            .iter()
            .filter(|stored| &stored.stream_id == stream_id)
            .cloned()
            .collect())
    }
}
