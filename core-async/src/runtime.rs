//! Runtime utilities for sync contexts that need to drive a future.
//!
//! Downstream crates use [`Handle::try_current`] to detect whether they are
//! already inside a runtime and fall back to [`block_on`] otherwise.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a throwaway current-thread runtime.
///
/// Returns `Err` when the runtime cannot be built (for example when the
/// process is out of file descriptors for the timer driver).
pub fn block_on<F>(future: F) -> std::io::Result<F::Output>
where
    F: std::future::Future,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}
