//! # Debounce Timer
//!
//! Coalesces bursts of signals into a single firing once the signals have
//! been quiet for a fixed period. Each call to [`Debouncer::signal`] pushes
//! the deadline out again; [`Debouncer::fired`] completes once the deadline
//! passes and disarms the timer.
//!
//! The timer is designed to sit in one arm of a `tokio::select!` loop owned
//! by a single coordinator. `fired()` is cancellation safe: when another arm
//! wins, the pending deadline is kept and polled again on the next iteration.
//!
//! ```rust
//! use core_async::debounce::Debouncer;
//! use core_async::time::Duration;
//!
//! # async fn example() {
//! let mut debouncer = Debouncer::new(Duration::from_millis(400));
//! debouncer.signal();
//! debouncer.signal(); // restarts the quiet period
//! debouncer.fired().await; // completes once, 400ms after the last signal
//! assert!(!debouncer.is_armed());
//! # }
//! ```

use std::future::pending;
use std::pin::Pin;

use tokio::time::{sleep_until, Duration, Instant, Sleep};

/// Resettable one-shot timer for debouncing signals.
#[derive(Debug)]
pub struct Debouncer {
    period: Duration,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl Debouncer {
    /// Creates a disarmed debouncer with the given quiet period.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            deadline: None,
        }
    }

    /// Quiet period a burst must observe before the timer fires.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Arms the timer, or pushes an armed timer's deadline out by one period.
    pub fn signal(&mut self) {
        let deadline = Instant::now() + self.period;
        match self.deadline.as_mut() {
            Some(sleep) => sleep.as_mut().reset(deadline),
            None => self.deadline = Some(Box::pin(sleep_until(deadline))),
        }
    }

    /// Disarms the timer without firing.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Returns `true` while a firing is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Waits until the armed deadline elapses, then disarms.
    ///
    /// Never completes while the timer is disarmed.
    pub async fn fired(&mut self) {
        match self.deadline.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.deadline = None;
            }
            None => pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_never_fires() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let result = timeout(Duration::from_secs(5), debouncer.fired()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_quiet_period() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let start = Instant::now();
        debouncer.signal();
        debouncer.fired().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(!debouncer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_pushes_deadline_out() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let start = Instant::now();
        debouncer.signal();
        advance(Duration::from_millis(60)).await;
        debouncer.signal();
        advance(Duration::from_millis(60)).await;
        debouncer.signal();
        debouncer.fired().await;
        assert!(start.elapsed() >= Duration::from_millis(220));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_disarms() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        debouncer.signal();
        debouncer.cancel();
        assert!(!debouncer.is_armed());
        let result = timeout(Duration::from_secs(1), debouncer.fired()).await;
        assert!(result.is_err());
    }
}
