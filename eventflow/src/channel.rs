//! The command channel: serialized admission, multicast delivery.
//!
//! [`CommandChannel::send`] takes the admission [`Gate`] and publishes the
//! envelope to every current subscriber while holding it, so concurrent
//! callers are admitted in a strict total order and every subscriber sees the
//! same sequence. Subscribers only see commands admitted after they
//! subscribed.

use crate::command::{Command, CommandEnvelope};
use crate::errors::ChannelError;
use crate::fan_out::{FanOut, Subscription};
use crate::gate::Gate;
use futures::future::try_join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Stream of admitted commands handed to a subscriber.
pub type CommandSubscription<C> = Subscription<Arc<CommandEnvelope<C>>>;

/// Multicast publish point for commands.
#[derive(Debug)]
pub struct CommandChannel<C> {
    gate: Gate,
    commands: FanOut<Arc<CommandEnvelope<C>>>,
    closed: CancellationToken,
}

impl<C: Command> CommandChannel<C> {
    /// Creates an open channel with no subscribers.
    pub fn new() -> Self {
        Self {
            gate: Gate::new(),
            commands: FanOut::new(),
            closed: CancellationToken::new(),
        }
    }

    /// Registers a subscriber for every command admitted from now on.
    pub fn subscribe(&self) -> CommandSubscription<C> {
        self.commands.subscribe()
    }

    /// Admits one command.
    ///
    /// Fails with [`ChannelError::Closed`] once the channel is disposed,
    /// including for callers that were waiting for the gate at that moment.
    pub async fn send(&self, envelope: impl Into<CommandEnvelope<C>>) -> Result<(), ChannelError> {
        let envelope = Arc::new(envelope.into());
        let command_id = envelope.id();
        let delivered = self
            .gate
            .guarded(|| self.commands.publish(envelope))
            .await?;

        if delivered == 0 {
            debug!(%command_id, "command admitted with no active subscribers");
        } else {
            trace!(%command_id, subscribers = delivered, "command admitted");
        }
        Ok(())
    }

    /// Admits a batch, completing once every element has been admitted.
    ///
    /// Elements are submitted concurrently; each one still passes through the
    /// gate on its own, so no two admissions interleave.
    pub async fn send_many<I>(&self, envelopes: I) -> Result<(), ChannelError>
    where
        I: IntoIterator,
        I::Item: Into<CommandEnvelope<C>>,
    {
        try_join_all(envelopes.into_iter().map(|envelope| self.send(envelope))).await?;
        Ok(())
    }

    /// Disposes the channel.
    ///
    /// Pending and future sends fail, every subscription completes, and
    /// [`CommandChannel::closed`] resolves.
    pub fn dispose(&self) {
        self.gate.close();
        self.commands.complete();
        self.closed.cancel();
    }

    /// Returns `true` once the channel has been disposed.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves when the channel is disposed.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.commands.subscriber_count()
    }
}

impl<C: Command> Default for CommandChannel<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct Numbered(u32);

    impl Command for Numbered {
        type Kind = ();

        fn kind(&self) {}
    }

    fn payloads(received: &[Arc<CommandEnvelope<Numbered>>]) -> Vec<u32> {
        received.iter().map(|envelope| envelope.command().0).collect()
    }

    #[tokio::test]
    async fn subscribers_only_see_commands_after_subscribing() {
        let channel: CommandChannel<Numbered> = CommandChannel::new();
        let mut early = channel.subscribe();

        channel.send(Numbered(1)).await.unwrap();
        let mut late = channel.subscribe();
        channel.send(Numbered(2)).await.unwrap();
        channel.dispose();

        let early: Vec<_> = early.by_ref().collect().await;
        let late: Vec<_> = late.by_ref().collect().await;
        assert_eq!(payloads(&early), vec![1, 2]);
        assert_eq!(payloads(&late), vec![2]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_senders_are_seen_in_one_order_by_everyone() {
        let channel: Arc<CommandChannel<Numbered>> = Arc::new(CommandChannel::new());
        let subscriptions: Vec<_> = (0..3).map(|_| channel.subscribe()).collect();

        let senders: Vec<_> = (0..10)
            .map(|task| {
                let channel = Arc::clone(&channel);
                tokio::spawn(async move {
                    for n in 0..20 {
                        channel.send(Numbered(task * 100 + n)).await.unwrap();
                    }
                })
            })
            .collect();
        for sender in senders {
            sender.await.unwrap();
        }
        channel.dispose();

        let mut observed = Vec::new();
        for subscription in subscriptions {
            let received: Vec<_> = subscription.collect().await;
            observed.push(payloads(&received));
        }
        assert_eq!(observed[0].len(), 200);
        assert!(observed.iter().all(|sequence| sequence == &observed[0]));

        // Each sender's own commands keep their submission order.
        for task in 0..10 {
            let own: Vec<_> = observed[0]
                .iter()
                .copied()
                .filter(|n| n / 100 == task)
                .collect();
            let expected: Vec<_> = (0..20).map(|n| task * 100 + n).collect();
            assert_eq!(own, expected);
        }
    }

    #[tokio::test]
    async fn send_many_admits_every_element() {
        let channel: CommandChannel<Numbered> = CommandChannel::new();
        let subscription = channel.subscribe();

        channel.send_many((0..5).map(Numbered)).await.unwrap();
        channel.dispose();

        let mut received = payloads(&subscription.collect::<Vec<_>>().await);
        received.sort_unstable();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn sending_after_dispose_fails() {
        let channel: CommandChannel<Numbered> = CommandChannel::new();
        channel.dispose();

        assert_eq!(channel.send(Numbered(1)).await, Err(ChannelError::Closed));
        assert!(channel.is_closed());
        channel.closed().await;
    }

    #[tokio::test]
    async fn envelopes_keep_their_identity() {
        let channel: CommandChannel<Numbered> = CommandChannel::new();
        let mut subscription = channel.subscribe();
        let envelope = CommandEnvelope::new(Numbered(9));
        let id = envelope.id();

        channel.send(envelope).await.unwrap();

        let received = subscription.next().await.unwrap();
        assert_eq!(received.id(), id);
    }
}
