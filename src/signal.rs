//! Edge-triggered wake flag.
//!
//! A [`Signal`] is a single boolean slot shared between one writer (a trigger
//! endpoint) and one long-running waiter (a stream producer). `set` raises the
//! flag, `wait` blocks until it is raised or a timeout elapses and clears it
//! in the same step it observes it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{self, Instant};

#[derive(Debug, Default)]
pub struct Signal {
    flag: AtomicBool,
    notify: Notify,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake the pending waiter, if any.
    ///
    /// Setting an already-set signal is a no-op: the next `wait` observes a
    /// single wake no matter how many times `set` was called before it.
    pub fn set(&self) {
        self.flag.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Lower the flag without waking anybody.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Wait until the flag is raised or `timeout` elapses.
    ///
    /// Returns `true` when the flag was observed (and cleared), `false` when
    /// the timeout expired first. A timeout leaves the flag untouched. `None`,
    /// or a timeout too large to schedule, waits indefinitely.
    ///
    /// Dropping the returned future before it resolves never consumes a
    /// pending `set`.
    pub async fn wait(&self, timeout: Option<Duration>) -> bool {
        // A deadline past what `Instant` can represent is no deadline at all.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a `set` racing with the
            // check still wakes this iteration.
            notified.as_mut().enable();

            if self.flag.swap(false, Ordering::AcqRel) {
                return true;
            }

            match deadline {
                None => notified.await,
                Some(deadline) => {
                    if time::timeout_at(deadline, notified).await.is_err() {
                        return false;
                    }
                }
            }
        }
    }
}
