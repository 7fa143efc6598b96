//! # Host Bridge Traits
//!
//! Capabilities the media queue core requires from its host.
//!
//! ## Overview
//!
//! The scheduling core never talks to the network, the clock or the host log
//! pipeline directly. Each of those is a trait defined here and injected at
//! construction time, which keeps the core deterministic under test.
//!
//! ## Traits
//!
//! - [`StreamInfoResolver`](stream::StreamInfoResolver) - Turns a queue entry's
//!   `(service id, url)` into full [`StreamInfo`](stream::StreamInfo) metadata
//! - [`Clock`](time::Clock) - Time source for expiry and retry deadlines
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should map platform failures onto the closest variant; the core decides
//! whether to retry a failed resolution from that variant alone.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` since the same implementation is
//! shared by the coordination task and every background loader.

pub mod error;
pub mod platform;
pub mod stream;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use stream::{MediaStream, StreamInfo, StreamInfoResolver, StreamSummary, StreamType};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
