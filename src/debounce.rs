//! Restartable delay.
//!
//! A [`Debouncer`] holds at most one pending value. Queuing again replaces
//! the value and restarts the delay, so a burst of events yields a single
//! firing `delay_ms` after the last one. Time is passed in explicitly as
//! milliseconds so the event loop and tests drive the clock.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debouncer<T> {
    delay_ms: u64,
    pending: Option<(T, u64)>,
}

impl<T> Debouncer<T> {
    pub const fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    pub const fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// Queue `value`, cancelling whatever was pending.
    pub fn queue(&mut self, value: T, now_ms: u64) {
        self.pending = Some((value, now_ms));
    }

    /// Take the pending value once its delay has elapsed.
    pub fn take_ready(&mut self, now_ms: u64) -> Option<T> {
        let queued_at = self.pending.as_ref()?.1;
        if now_ms.saturating_sub(queued_at) >= self.delay_ms {
            self.pending.take().map(|(value, _)| value)
        } else {
            None
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
