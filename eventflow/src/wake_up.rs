//! "Poll now" signal for interval-polling store readers.
//!
//! The writer calls [`WakeUp::there_is_work_to_do`] after each successful
//! acknowledgement append; the reader waits on [`WakeUp::wait`] with its poll
//! interval as the upper bound. Signals raised while the reader is busy are
//! coalesced into a single early wake.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Cloneable wake-up handle shared by writers and one reader.
#[derive(Debug, Clone, Default)]
pub struct WakeUp {
    notify: Arc<Notify>,
}

impl WakeUp {
    /// Creates a new signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the reader to poll as soon as possible. Never blocks.
    pub fn there_is_work_to_do(&self) {
        self.notify.notify_one();
    }

    /// Waits for a signal or for `interval` to elapse.
    ///
    /// Returns `true` when woken by a signal.
    pub async fn wait(&self, interval: Duration) -> bool {
        tokio::time::timeout(interval, self.notify.notified())
            .await
            .is_ok()
    }
}
