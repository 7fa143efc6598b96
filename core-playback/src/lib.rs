//! # Media Source Scheduling
//!
//! Turns an observable play queue into a window of playable media sources
//! around the cursor, and gates the player until the current item is ready.
//!
//! ## Overview
//!
//! This module handles:
//! - Queue items with deduplicated, cached metadata resolution (`item`)
//! - The observable play queue and its change events (`queue`)
//! - Per-slot resolution state mirroring the queue (`media_source`)
//! - The coordination actor driving resolution and the player gate (`manager`)
//! - The player-facing contract (`traits`)

pub mod config;
pub mod error;
pub mod item;
pub mod manager;
pub mod media_source;
pub mod queue;
pub mod traits;

pub use config::ManagerConfig;
pub use error::{PlaybackError, Result};
pub use item::{PlayQueueItem, StreamDescriptor, RECOVERY_UNSET};
pub use manager::{window_indices, ManagerStatus, MediaSourceManager, MediaSourceManagerBuilder};
pub use media_source::{ManagedMediaSource, MediaSourcePlaylist};
pub use queue::{FetchedPage, PlayQueue, PlayQueueEvent, QueueFetcher};
pub use traits::{ManifestFormat, MediaSource, PlaybackListener};
