//! Task spawning abstractions.
//!
//! Background work (metadata resolution, source construction, page fetches)
//! is spawned through this module. `JoinSet` is the preferred container when a
//! coordinator owns a group of loaders: dropping the set aborts every task in
//! it, which is how a disposed coordinator cancels outstanding work.
//!
//! # Examples
//!
//! ```rust
//! use core_async::task::{spawn, JoinSet};
//!
//! # async fn example() {
//! let mut loaders = JoinSet::new();
//! loaders.spawn(async { 1 });
//! loaders.spawn(async { 2 });
//!
//! let mut total = 0;
//! while let Some(result) = loaders.join_next().await {
//!     total += result.unwrap();
//! }
//! assert_eq!(total, 3);
//!
//! let handle = spawn(async { "done" });
//! assert_eq!(handle.await.unwrap(), "done");
//! # }
//! ```

pub use tokio::task::{spawn_blocking, yield_now, AbortHandle, JoinError, JoinHandle, JoinSet};

/// Spawns a new asynchronous task on the current runtime.
///
/// The spawned task may run on a different worker thread, so the future and
/// its output must be `Send`.
///
/// # Panics
///
/// Panics when called outside of a runtime context.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
