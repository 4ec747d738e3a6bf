//! In-order delivery queue between the receive loop and the application.
//!
//! The receive loop appends accepted payloads and raises the
//! data-available signal; [`DeliveryQueue::recv_one`] pops them in FIFO
//! order.  The signal is a [`Notify`] used with `notify_waiters`, so a
//! signal raised while nobody waits is not stored.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;

use crate::connection::ConnError;

#[derive(Debug, Default)]
pub struct DeliveryQueue {
    items: Mutex<VecDeque<Vec<u8>>>,
    ready: Notify,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an accepted payload.  Does not signal; see [`Self::wake`].
    pub fn push(&self, payload: Vec<u8>) {
        self.lock().push_back(payload);
    }

    /// Pop the front payload, if any.
    pub fn pop(&self) -> Option<Vec<u8>> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wake every consumer currently suspended in [`Self::recv_one`].
    pub fn wake(&self) {
        self.ready.notify_waiters();
    }

    /// Pop the front payload, suspending at most once for it.
    ///
    /// With an empty queue the call waits for one wake-up (bounded by
    /// `wait` when set), re-checks the queue once and returns
    /// [`ConnError::WouldBlock`] if it is still empty.  `closed` is
    /// consulted so a dead connection reports [`ConnError::Closed`] instead.
    ///
    /// A wake-up reaches every consumer suspended at that moment, not just
    /// one: `Notify::notify_one` would store a permit when nobody waits,
    /// which the single-slot signal must not do.  With several concurrent
    /// callers and one new payload, one caller gets it and the others
    /// return [`ConnError::WouldBlock`] after their single re-check.
    pub async fn recv_one(
        &self,
        wait: Option<Duration>,
        closed: impl Fn() -> bool,
    ) -> Result<Vec<u8>, ConnError> {
        let ready = self.ready.notified();
        tokio::pin!(ready);
        // Register before checking so a push racing this call still wakes us.
        ready.as_mut().enable();

        if let Some(payload) = self.pop() {
            return Ok(payload);
        }
        if closed() {
            return Err(ConnError::Closed);
        }

        match wait {
            Some(window) => {
                let _ = tokio::time::timeout(window, ready).await;
            }
            None => ready.await,
        }

        self.pop().ok_or_else(|| {
            if closed() {
                ConnError::Closed
            } else {
                ConnError::WouldBlock
            }
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Vec<u8>>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
