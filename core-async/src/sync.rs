//! Synchronization primitives.
//!
//! Async-aware locks and channels from `tokio::sync`, plus the
//! `CancellationToken` used to stop long-lived coordinator loops.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{mpsc, CancellationToken};
//!
//! # async fn example() {
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! tx.send(7u32).unwrap();
//! assert_eq!(rx.recv().await, Some(7));
//!
//! let token = CancellationToken::new();
//! let child = token.child_token();
//! token.cancel();
//! assert!(child.is_cancelled());
//! # }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, OnceCell, RwLock, Semaphore,
};
pub use tokio_util::sync::CancellationToken;
