//! Mutual-exclusion gate serializing command admission.
//!
//! The gate is a single-permit semaphore. [`Gate::acquire`] waits for the
//! permit and hands back a [`GateGuard`]; dropping the guard releases the
//! permit on every exit path, including when the awaiting future itself is
//! dropped. The gate is not reentrant: acquiring it again from the flow that
//! already holds it waits forever, so callers never nest critical sections.
//!
//! Closing the gate fails every pending and future `acquire` with
//! [`GateError::Closed`]. A guard that is already held stays valid until it
//! is dropped.

use crate::errors::GateError;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Single-permit async lock.
#[derive(Debug)]
pub struct Gate {
    permit: Semaphore,
}

/// Proof that the holder is inside the gate's critical section.
#[derive(Debug)]
pub struct GateGuard<'a> {
    _permit: SemaphorePermit<'a>,
}

impl Gate {
    /// Creates an open gate.
    pub fn new() -> Self {
        Self {
            permit: Semaphore::new(1),
        }
    }

    /// Waits for exclusive access.
    pub async fn acquire(&self) -> Result<GateGuard<'_>, GateError> {
        let permit = self.permit.acquire().await.map_err(|_| GateError::Closed)?;
        Ok(GateGuard { _permit: permit })
    }

    /// Runs `f` inside the critical section.
    pub async fn guarded<T>(&self, f: impl FnOnce() -> T) -> Result<T, GateError> {
        let _guard = self.acquire().await?;
        Ok(f())
    }

    /// Closes the gate; waiters and later callers get [`GateError::Closed`].
    pub fn close(&self) {
        self.permit.close();
    }

    /// Returns `true` once [`Gate::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.permit.is_closed()
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}
