//! Interval-polling reader over the store-wide log.
//!
//! The [`EventPoller`] remembers the last global position it delivered and
//! repeatedly reads the records after it. Every stored record is fanned out to
//! event subscribers (projections) and every acknowledgement additionally to
//! acknowledgement subscribers, which makes the poller the store-backed
//! [`AcknowledgementStream`].
//!
//! Between polls the reader sleeps for the configured interval unless the
//! [`WakeUp`] signal fires first. A full batch is followed immediately by
//! another read.

use crate::config::{PollBatchSize, PollIntervalMs};
use crate::event::CommandProcessed;
use crate::event_store::{EventStore, ReadOptions, StoredEvent};
use crate::fan_out::{FanOut, Subscription};
use crate::types::GlobalPosition;
use crate::waiter::AcknowledgementStream;
use crate::wake_up::WakeUp;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Stream of stored records handed to an event subscriber.
pub type EventSubscription<E> = Subscription<Arc<StoredEvent<E>>>;

struct Shared<E> {
    events: FanOut<Arc<StoredEvent<E>>>,
    acknowledgements: FanOut<CommandProcessed>,
}

/// Polls a store and republishes what it reads.
pub struct EventPoller<S: EventStore> {
    shared: Arc<Shared<S::Event>>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<GlobalPosition>>>,
}

impl<S: EventStore> std::fmt::Debug for EventPoller<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPoller")
            .field("event_subscribers", &self.shared.events.subscriber_count())
            .field(
                "acknowledgement_subscribers",
                &self.shared.acknowledgements.subscriber_count(),
            )
            .field("stopped", &self.shutdown.is_cancelled())
            .finish()
    }
}

/// Builder for [`EventPoller`].
#[derive(Debug)]
pub struct EventPollerBuilder<S> {
    store: S,
    wake_up: WakeUp,
    interval: PollIntervalMs,
    batch_size: PollBatchSize,
    after: GlobalPosition,
}

impl<S: EventStore> EventPollerBuilder<S> {
    /// Uses `wake_up` to cut idle intervals short.
    #[must_use]
    pub fn wake_up(mut self, wake_up: WakeUp) -> Self {
        self.wake_up = wake_up;
        self
    }

    /// Sets the idle interval.
    #[must_use]
    pub const fn interval(mut self, interval: PollIntervalMs) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the number of records read per poll.
    #[must_use]
    pub const fn batch_size(mut self, batch_size: PollBatchSize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Starts delivering after `position` instead of from the beginning.
    #[must_use]
    pub const fn starting_after(mut self, position: GlobalPosition) -> Self {
        self.after = position;
        self
    }

    /// Spawns the polling task on the current runtime.
    pub fn start(self) -> EventPoller<S> {
        let shared = Arc::new(Shared {
            events: FanOut::new(),
            acknowledgements: FanOut::new(),
        });
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            self.store,
            Arc::clone(&shared),
            self.wake_up,
            self.interval,
            self.batch_size,
            self.after,
            shutdown.clone(),
        ));

        EventPoller {
            shared,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }
}

impl<S: EventStore> EventPoller<S> {
    /// Starts configuring a poller over `store`.
    pub fn builder(store: S) -> EventPollerBuilder<S> {
        EventPollerBuilder {
            store,
            wake_up: WakeUp::new(),
            interval: PollIntervalMs::default(),
            batch_size: PollBatchSize::default(),
            after: GlobalPosition::start(),
        }
    }

    /// Subscribes to every record read from now on.
    pub fn subscribe_events(&self) -> EventSubscription<S::Event> {
        self.shared.events.subscribe()
    }

    /// Subscribes to every acknowledgement read from now on.
    pub fn subscribe_acknowledgements(&self) -> Subscription<CommandProcessed> {
        self.shared.acknowledgements.subscribe()
    }

    /// Stops polling after draining what is already in the store, then
    /// completes every subscription.
    ///
    /// Returns the last position delivered, or `None` if the poller was
    /// already shut down.
    pub async fn shutdown(&self) -> Option<GlobalPosition> {
        self.shutdown.cancel();
        let task = self.task.lock().take()?;
        match task.await {
            Ok(position) => Some(position),
            Err(err) => {
                warn!(error = %err, "event poller task ended abnormally");
                self.shared.events.complete();
                self.shared.acknowledgements.complete();
                None
            }
        }
    }
}

impl<S: EventStore> AcknowledgementStream for EventPoller<S> {
    fn acknowledgements(&self) -> BoxStream<'static, CommandProcessed> {
        self.subscribe_acknowledgements().boxed()
    }
}

impl<S: EventStore> Drop for EventPoller<S> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn poll_loop<S: EventStore>(
    store: S,
    shared: Arc<Shared<S::Event>>,
    wake_up: WakeUp,
    interval: PollIntervalMs,
    batch_size: PollBatchSize,
    mut position: GlobalPosition,
    shutdown: CancellationToken,
) -> GlobalPosition {
    let interval = interval.as_duration();
    let batch_size: usize = batch_size.into();
    debug!(%position, "event poller started");

    loop {
        let draining = shutdown.is_cancelled();
        let delivered = poll_once(&store, &shared, &mut position, batch_size).await;

        if draining && delivered.map_or(true, |count| count < batch_size) {
            break;
        }
        if delivered == Some(batch_size) {
            continue;
        }

        tokio::select! {
            biased;
            () = shutdown.cancelled() => {}
            woken = wake_up.wait(interval) => {
                if woken {
                    trace!("event poller woken early");
                }
            }
        }
    }

    shared.events.complete();
    shared.acknowledgements.complete();
    debug!(%position, "event poller stopped");
    position
}

/// Reads one batch and publishes it; returns how many records were read, or
/// `None` if the read failed.
async fn poll_once<S: EventStore>(
    store: &S,
    shared: &Shared<S::Event>,
    position: &mut GlobalPosition,
    batch_size: usize,
) -> Option<usize> {
    let options = ReadOptions::new()
        .after(*position)
        .with_max_events(batch_size);
    match store.read_all(options).await {
        Ok(batch) => {
            let count = batch.len();
            for stored in batch {
                *position = stored.position;
                let stored = Arc::new(stored);
                shared.events.publish(Arc::clone(&stored));
                if let Some(ack) = stored.acknowledgement() {
                    shared.acknowledgements.publish(ack.clone());
                }
            }
            if count > 0 {
                trace!(count, %position, "event poller delivered records");
            }
            Some(count)
        }
        Err(err) => {
            warn!(error = %err, %position, "event poller read failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RecordedEvent;
    use crate::result::OperationResult;
    use crate::test_support::{RecordingStore, Tick};
    use crate::types::CommandId;
    use std::time::Duration;

    fn fast() -> PollIntervalMs {
        PollIntervalMs::try_new(10).unwrap()
    }

    fn ack(command_id: CommandId) -> RecordedEvent<Tick> {
        RecordedEvent::Acknowledgement(CommandProcessed::new(
            command_id,
            OperationResult::Ok(()),
            None,
        ))
    }

    #[tokio::test]
    async fn delivers_records_appended_after_subscribing() {
        let store = Arc::new(RecordingStore::<Tick>::new());
        let poller = EventPoller::builder(Arc::clone(&store)).interval(fast()).start();
        let mut events = poller.subscribe_events();
        let mut acks = poller.subscribe_acknowledgements();

        let command_id = CommandId::new();
        store
            .append_events(vec![RecordedEvent::Domain(Tick::on("a", 1)), ack(command_id)])
            .await
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.domain(), Some(&Tick::on("a", 1)));
        let acknowledged = tokio::time::timeout(Duration::from_secs(5), acks.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(acknowledged.command_id, command_id);

        poller.shutdown().await;
    }

    #[tokio::test]
    async fn wake_up_cuts_the_interval_short() {
        let store = Arc::new(RecordingStore::<Tick>::new());
        let wake_up = WakeUp::new();
        let poller = EventPoller::builder(Arc::clone(&store))
            .interval(PollIntervalMs::try_new(60_000).unwrap())
            .wake_up(wake_up.clone())
            .start();
        let mut events = poller.subscribe_events();
        tokio::time::sleep(Duration::from_millis(20)).await;

        store
            .append_events(vec![RecordedEvent::Domain(Tick::on("a", 1))])
            .await
            .unwrap();
        wake_up.there_is_work_to_do();

        let delivered = tokio::time::timeout(Duration::from_secs(5), events.next()).await;
        assert!(delivered.is_ok());

        poller.shutdown().await;
    }

    #[tokio::test]
    async fn positions_advance_across_small_batches() {
        let store = Arc::new(RecordingStore::<Tick>::new());
        let records = (0..5).map(|n| RecordedEvent::Domain(Tick::on("a", n))).collect();
        store.append_events(records).await.unwrap();

        let poller = EventPoller::builder(Arc::clone(&store))
            .interval(fast())
            .batch_size(PollBatchSize::try_new(2).unwrap())
            .start();
        let events = poller.subscribe_events();
        let position = poller.shutdown().await;

        assert_eq!(position, Some(GlobalPosition::new(5)));
        let seen: Vec<u32> = events
            .map(|stored| stored.domain().map_or(0, |tick| tick.n))
            .collect()
            .await;
        assert!(seen.len() <= 5);
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn shutdown_completes_subscriptions() {
        let store = Arc::new(RecordingStore::<Tick>::new());
        let poller = EventPoller::builder(store).interval(fast()).start();
        let acks = poller.acknowledgements();

        assert_eq!(poller.shutdown().await, Some(GlobalPosition::start()));
        assert_eq!(acks.collect::<Vec<_>>().await.len(), 0);
        assert_eq!(poller.shutdown().await, None);
    }

    #[tokio::test]
    async fn starting_after_skips_earlier_records() {
        let store = Arc::new(RecordingStore::<Tick>::new());
        store
            .append_events(vec![
                RecordedEvent::Domain(Tick::on("a", 1)),
                RecordedEvent::Domain(Tick::on("a", 2)),
            ])
            .await
            .unwrap();

        let poller = EventPoller::builder(Arc::clone(&store))
            .interval(fast())
            .starting_after(GlobalPosition::new(1))
            .start();
        let mut events = poller.subscribe_events();
        store
            .append_events(vec![RecordedEvent::Domain(Tick::on("a", 3))])
            .await
            .unwrap();

        let mut seen = Vec::new();
        while seen.last() != Some(&3) {
            let stored = tokio::time::timeout(Duration::from_secs(5), events.next())
                .await
                .unwrap()
                .unwrap();
            seen.push(stored.domain().unwrap().n);
        }
        assert!(!seen.contains(&1));

        poller.shutdown().await;
    }
}
