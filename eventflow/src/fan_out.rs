//! Multicast fan-out with late-subscriber exclusion.
//!
//! A [`FanOut`] keeps an explicit registry of live listener channels. Every
//! published item is delivered to the listeners registered at that moment and
//! to nobody else: there is no history, so a listener that subscribes after an
//! item was published never sees it. The number of live listeners is the
//! reference count behind the hot/cold state: with no listeners the fan-out is
//! cold and published items are simply dropped.
//!
//! Publishing happens under the registry lock, so all listeners observe items
//! in the same order. Dropping a [`Subscription`] unregisters it; completing
//! the fan-out ends every subscription's stream.

use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

struct Registry<T> {
    next_id: u64,
    listeners: Vec<(u64, mpsc::UnboundedSender<T>)>,
    completed: bool,
}

/// Hot multicast publisher.
pub struct FanOut<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> std::fmt::Debug for FanOut<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("FanOut")
            .field("listeners", &registry.listeners.len())
            .field("completed", &registry.completed)
            .finish()
    }
}

/// Clones share the listener registry.
impl<T> Clone for FanOut<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T: Clone + Send + 'static> FanOut<T> {
    /// Creates a cold fan-out with no listeners.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
                completed: false,
            })),
        }
    }

    /// Registers a listener for every item published from now on.
    ///
    /// Subscribing to a completed fan-out yields a stream that ends at once.
    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        if !registry.completed {
            registry.listeners.push((id, sender));
        }
        drop(registry);

        Subscription {
            id,
            receiver,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Delivers `item` to every current listener.
    ///
    /// Returns how many listeners received it; zero means the fan-out was
    /// cold and the item was dropped.
    pub fn publish(&self, item: T) -> usize {
        let mut registry = self.registry.lock();
        registry
            .listeners
            .retain(|(_, sender)| sender.send(item.clone()).is_ok());
        registry.listeners.len()
    }

    /// Number of live listeners.
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().listeners.len()
    }

    /// Returns `true` while at least one listener is registered.
    pub fn is_hot(&self) -> bool {
        self.subscriber_count() > 0
    }

    /// Ends every subscription and refuses new listeners.
    pub fn complete(&self) {
        let mut registry = self.registry.lock();
        registry.completed = true;
        registry.listeners.clear();
    }

    /// Returns `true` once [`FanOut::complete`] has been called.
    pub fn is_completed(&self) -> bool {
        self.registry.lock().completed
    }
}

impl<T: Clone + Send + 'static> Default for FanOut<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A listener registered with a [`FanOut`].
///
/// Yields items in publication order and ends when the fan-out completes.
pub struct Subscription<T> {
    id: u64,
    receiver: mpsc::UnboundedReceiver<T>,
    registry: Weak<Mutex<Registry<T>>>,
}

impl<T> Subscription<T> {
    /// Receives the next item, or `None` once the fan-out has completed.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .listeners
                .retain(|(id, _)| *id != self.id);
        }
    }
}
