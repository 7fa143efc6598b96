//! Time-related abstractions.
//!
//! `Instant` here is tokio's instant so that code measured against it honours
//! a paused test clock (`#[tokio::test(start_paused = true)]`).
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(10)).await;
//!     assert!(start.elapsed() >= Duration::from_millis(10));
//! }
//! ```

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};
pub use tokio::time::{
    error::Elapsed, interval, sleep, sleep_until, timeout, Instant, Interval, Sleep, Timeout,
};

/// Returns the current wall-clock time as milliseconds since UNIX_EPOCH.
///
/// Clocks set before the epoch report zero instead of panicking.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Returns the current wall-clock time as seconds since UNIX_EPOCH.
pub fn now_secs() -> u64 {
    now_millis() / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_secs_matches_millis() {
        let millis = now_millis();
        let secs = now_secs();
        assert!(secs >= millis / 1000);
        assert!(secs <= millis / 1000 + 1);
    }
}
