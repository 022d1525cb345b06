//! Time-delay value stabilizer.
//!
//! A [`Debouncer`] holds at most one pending value. Every [`Debouncer::push`]
//! replaces it and moves the deadline to `now + delay`, so a burst of pushes
//! yields exactly one value, `delay` after the last push.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

#[derive(Debug)]
struct Pending<T> {
    value: T,
    deadline: Instant,
}

/// Delays values until their producer has been quiet for a while.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<Pending<T>>,
}

impl<T> Debouncer<T> {
    /// A debouncer that waits `delay` after the last push.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Configured quiet period.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace the pending value and restart the quiet period.
    pub fn push(&mut self, value: T) {
        self.pending = Some(Pending {
            value,
            deadline: Instant::now() + self.delay,
        });
    }

    /// Swap the pending value without restarting the quiet period.
    ///
    /// Returns `false` (and drops `value`) when nothing is pending.
    pub fn replace(&mut self, value: T) -> bool {
        match &mut self.pending {
            Some(pending) => {
                pending.value = value;
                true
            }
            None => false,
        }
    }

    /// Drop the pending value, if any.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|pending| pending.value)
    }

    /// A value is waiting for its deadline.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending value stabilizes.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    /// Wait until the pending value has been quiet for `delay` and take it.
    ///
    /// Never resolves while nothing is pending. Cancel safe: dropping the
    /// future before it resolves leaves the pending value in place.
    pub async fn stabilized(&mut self) -> T {
        loop {
            let Some(deadline) = self.deadline() else {
                return std::future::pending().await;
            };
            sleep_until(deadline).await;
            if let Some(pending) = self.pending.take() {
                return pending.value;
            }
        }
    }
}
