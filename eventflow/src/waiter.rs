//! Submitting a command and waiting for its acknowledgement.
//!
//! The waiter bridges the publish/subscribe boundary between the command
//! channel and the acknowledgement stream. It subscribes *before* sending so
//! the acknowledgement cannot slip past, then resolves with the
//! [`OperationResult`] of the first acknowledgement carrying its command id.
//!
//! There is deliberately no timeout here; callers wrap the future in
//! `tokio::time::timeout` when they want one.

use crate::channel::CommandChannel;
use crate::command::{Command, CommandEnvelope};
use crate::event::CommandProcessed;
use crate::fan_out::FanOut;
use crate::result::OperationResult;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, instrument};

/// A source of acknowledgements.
///
/// Each call returns a fresh stream that yields every acknowledgement
/// observed from that moment on and ends when the source shuts down.
pub trait AcknowledgementStream: Send + Sync {
    /// Subscribes to acknowledgements.
    fn acknowledgements(&self) -> BoxStream<'static, CommandProcessed>;
}

impl AcknowledgementStream for FanOut<CommandProcessed> {
    fn acknowledgements(&self) -> BoxStream<'static, CommandProcessed> {
        self.subscribe().boxed()
    }
}

impl<A: AcknowledgementStream + ?Sized> AcknowledgementStream for std::sync::Arc<A> {
    fn acknowledgements(&self) -> BoxStream<'static, CommandProcessed> {
        (**self).acknowledgements()
    }
}

/// Sends `envelope` and waits for its acknowledgement.
///
/// Resolves with [`OperationResult::Cancelled`] if the send fails, the
/// channel is disposed before the acknowledgement arrives, or the
/// acknowledgement stream ends without one.
#[instrument(skip_all, fields(command_id = tracing::field::Empty))]
pub async fn send_and_wait<C, A>(
    channel: &CommandChannel<C>,
    envelope: impl Into<CommandEnvelope<C>>,
    acknowledgements: &A,
) -> OperationResult<()>
where
    C: Command,
    A: AcknowledgementStream + ?Sized,
{
    let envelope = envelope.into();
    let command_id = envelope.id();
    tracing::Span::current().record("command_id", tracing::field::display(command_id));

    let mut stream = acknowledgements.acknowledgements();

    if let Err(err) = channel.send(envelope).await {
        debug!(error = %err, "send failed");
        return OperationResult::Cancelled(format!("Command could not be sent: {err}"));
    }

    let matching = async move {
        while let Some(ack) = stream.next().await {
            if ack.command_id == command_id {
                return Some(ack);
            }
        }
        None
    };

    tokio::select! {
        biased;
        ack = matching => match ack {
            Some(ack) => ack.operation_result,
            None => {
                debug!("acknowledgement stream ended before the command was acknowledged");
                OperationResult::Cancelled("Acknowledgement stream ended".to_string())
            }
        },
        () = channel.closed() => {
            debug!("command channel closed while waiting");
            OperationResult::Cancelled("Command channel closed".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct Ping;

    impl Command for Ping {
        type Kind = Self;

        fn kind(&self) -> Self {
            *self
        }
    }

    /// Acknowledges every command it sees with the given result.
    fn responder(
        channel: &CommandChannel<Ping>,
        acks: Arc<FanOut<CommandProcessed>>,
        result: OperationResult<()>,
    ) -> tokio::task::JoinHandle<()> {
        let mut commands = channel.subscribe();
        tokio::spawn(async move {
            while let Some(envelope) = commands.next().await {
                // An unrelated acknowledgement first, which must be ignored.
                acks.publish(CommandProcessed::new(
                    crate::types::CommandId::new(),
                    OperationResult::Error("someone else".to_string()),
                    None,
                ));
                acks.publish(CommandProcessed::new(envelope.id(), result.clone(), None));
            }
        })
    }

    #[tokio::test]
    async fn resolves_with_the_matching_acknowledgement() {
        let channel = CommandChannel::new();
        let acks = Arc::new(FanOut::new());
        let _responder = responder(&channel, Arc::clone(&acks), OperationResult::Ok(()));

        let result = send_and_wait(&channel, Ping, &acks).await;

        assert_eq!(result, OperationResult::Ok(()));
    }

    #[tokio::test]
    async fn concurrent_waiters_each_get_their_own_result() {
        let channel = CommandChannel::new();
        let acks = Arc::new(FanOut::new());
        let _responder = responder(
            &channel,
            Arc::clone(&acks),
            OperationResult::InternalError("no handler".to_string()),
        );

        let (first, second) = tokio::join!(
            send_and_wait(&channel, Ping, &acks),
            send_and_wait(&channel, Ping, &acks)
        );

        assert_eq!(first, OperationResult::InternalError("no handler".to_string()));
        assert_eq!(second, OperationResult::InternalError("no handler".to_string()));
    }

    #[tokio::test]
    async fn disposing_the_channel_cancels_pending_waiters() {
        let channel = Arc::new(CommandChannel::<Ping>::new());
        let acks: Arc<FanOut<CommandProcessed>> = Arc::new(FanOut::new());
        let _silent = channel.subscribe();

        let waiter = {
            let channel = Arc::clone(&channel);
            let acks = Arc::clone(&acks);
            tokio::spawn(async move { send_and_wait(&channel, Ping, &acks).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        channel.dispose();

        let result = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_cancelled());
    }

    #[tokio::test]
    async fn sending_to_a_disposed_channel_is_cancelled() {
        let channel = CommandChannel::<Ping>::new();
        let acks: FanOut<CommandProcessed> = FanOut::new();
        channel.dispose();

        let result = send_and_wait(&channel, Ping, &acks).await;

        assert!(result.is_cancelled());
    }

    #[tokio::test]
    async fn ended_acknowledgement_stream_is_cancelled() {
        let channel = CommandChannel::<Ping>::new();
        let acks: FanOut<CommandProcessed> = FanOut::new();
        acks.complete();

        let result = send_and_wait(&channel, Ping, &acks).await;

        assert_eq!(
            result,
            OperationResult::Cancelled("Acknowledgement stream ended".to_string())
        );
    }
}
