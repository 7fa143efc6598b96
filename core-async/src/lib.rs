//! Async facade for the media queue core.
//!
//! All core-* crates depend on this crate instead of reaching for tokio
//! directly. It re-exports the executor primitives the scheduling layer needs
//! and adds the one primitive tokio does not ship: a resettable debounce timer.
//!
//! # Modules
//!
//! - `task`: Task spawning, join sets and abort handles
//! - `time`: Sleep, instants and wall-clock helpers
//! - `sync`: Channels, locks and cancellation tokens
//! - `runtime`: Blocking entry points for sync contexts
//! - `debounce`: Timer-reset-on-signal coalescing
//! - `future`: Shared/boxed future helpers
//!
//! The `select!` and `join!` macros are re-exported so coordinator loops do
//! not need a direct tokio dependency.
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(5)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod debounce;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

/// Future combinators used when several callers must await one computation.
pub mod future {
    pub use futures::future::{pending, BoxFuture, FutureExt, Shared};
}

pub use debounce::Debouncer;
pub use tokio::{join, select};
pub use task::spawn;
pub use time::{sleep, Duration, Instant};
