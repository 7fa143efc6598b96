//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the media queue core:
//! - Logging and tracing infrastructure
//! - Session event bus
//!
//! ## Overview
//!
//! Other crates depend on this one for their logging conventions and for the
//! broadcast channel that exposes playback session transitions to observers.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
