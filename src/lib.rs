//! Workspace facade crate.
//!
//! Re-exports the media-source scheduling core so host applications can depend
//! on `mediaq-workspace` alone. Enable the `logging` feature to pull in the
//! runtime logging and event bus helpers as well.

pub use core_playback::*;

#[cfg(feature = "logging")]
pub use core_runtime as runtime;
