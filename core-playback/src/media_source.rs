//! # Managed Media Sources
//!
//! Every slot of the play queue has exactly one [`ManagedMediaSource`]
//! describing how far its resolution got. The manager keeps them in a
//! [`MediaSourcePlaylist`] whose order and length mirror the queue.
//!
//! ## Slot States
//!
//! - `Placeholder`: nothing resolved yet
//! - `Loaded`: metadata and a playable source, valid until `expires_at`
//! - `Failed`: resolution failed; eligible again from `retry_at`, or never
//!
//! Whether a slot may be overwritten by a new resolution is a pure function
//! of the state and the current time, see [`ManagedMediaSource::can_replace`].

use std::sync::Arc;

use bridge_traits::stream::StreamInfo;
use chrono::{DateTime, Utc};

use crate::error::PlaybackError;
use crate::item::PlayQueueItem;
use crate::traits::MediaSource;

/// Resolution state of a single queue slot.
#[derive(Debug, Clone, Default)]
pub enum ManagedMediaSource {
    #[default]
    Placeholder,
    Loaded {
        item: Arc<PlayQueueItem>,
        info: Arc<StreamInfo>,
        source: MediaSource,
        expires_at: DateTime<Utc>,
    },
    Failed {
        item: Arc<PlayQueueItem>,
        error: PlaybackError,
        /// `None` when the slot must not be retried for the same item.
        retry_at: Option<DateTime<Utc>>,
    },
}

impl ManagedMediaSource {
    /// Whether a fresh resolution may overwrite this slot at `now`.
    pub fn can_replace(&self, now: DateTime<Utc>) -> bool {
        match self {
            ManagedMediaSource::Placeholder => true,
            ManagedMediaSource::Loaded { expires_at, .. } => now >= *expires_at,
            ManagedMediaSource::Failed { retry_at, .. } => {
                retry_at.is_some_and(|retry_at| now >= retry_at)
            }
        }
    }

    /// Whether this slot holds the result for exactly this queue entry.
    pub fn is_stream_equal(&self, item: &Arc<PlayQueueItem>) -> bool {
        self.item().is_some_and(|own| Arc::ptr_eq(own, item))
    }

    /// Whether `item` should be resolved into this slot: the slot belongs to
    /// another entry, or its own result may be replaced.
    pub fn should_be_replaced_with(&self, item: &Arc<PlayQueueItem>, now: DateTime<Utc>) -> bool {
        !self.is_stream_equal(item) || self.can_replace(now)
    }

    pub fn item(&self) -> Option<&Arc<PlayQueueItem>> {
        match self {
            ManagedMediaSource::Placeholder => None,
            ManagedMediaSource::Loaded { item, .. } | ManagedMediaSource::Failed { item, .. } => {
                Some(item)
            }
        }
    }

    pub fn info(&self) -> Option<&Arc<StreamInfo>> {
        match self {
            ManagedMediaSource::Loaded { info, .. } => Some(info),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<&MediaSource> {
        match self {
            ManagedMediaSource::Loaded { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&PlaybackError> {
        match self {
            ManagedMediaSource::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ManagedMediaSource::Placeholder)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, ManagedMediaSource::Loaded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ManagedMediaSource::Failed { .. })
    }
}

// ============================================================================
// Playlist
// ============================================================================

/// Ordered slot collection mirroring a play queue.
///
/// Out-of-range indices are ignored, matching the queue's tolerance of stale
/// indices.
#[derive(Debug, Clone, Default)]
pub struct MediaSourcePlaylist {
    sources: Vec<ManagedMediaSource>,
}

impl MediaSourcePlaylist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Playlist of `len` placeholders.
    pub fn with_placeholders(len: usize) -> Self {
        Self {
            sources: vec![ManagedMediaSource::Placeholder; len],
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ManagedMediaSource> {
        self.sources.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManagedMediaSource> {
        self.sources.iter()
    }

    /// Discard every slot and start over with `len` placeholders.
    pub fn reset(&mut self, len: usize) {
        self.sources.clear();
        self.sources.resize(len, ManagedMediaSource::Placeholder);
    }

    /// Append one placeholder.
    pub fn expand(&mut self) {
        self.sources.push(ManagedMediaSource::Placeholder);
    }

    pub fn insert(&mut self, index: usize, source: ManagedMediaSource) {
        if index <= self.sources.len() {
            self.sources.insert(index, source);
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<ManagedMediaSource> {
        (index < self.sources.len()).then(|| self.sources.remove(index))
    }

    pub fn move_source(&mut self, source: usize, target: usize) {
        if source >= self.sources.len() || target >= self.sources.len() || source == target {
            return;
        }
        let moved = self.sources.remove(source);
        self.sources.insert(target, moved);
    }

    /// Replace the slot at `index`. The new source is inserted before the
    /// old one is removed, so the collection never has a gap.
    pub fn update(&mut self, index: usize, source: ManagedMediaSource) {
        if index >= self.sources.len() {
            return;
        }
        self.sources.insert(index + 1, source);
        self.sources.remove(index);
    }

    /// Drop the slot's result so it is resolved again.
    pub fn invalidate(&mut self, index: usize) {
        self.update(index, ManagedMediaSource::Placeholder);
    }

    /// Copy of the slots, handed to the player on unblock.
    pub fn snapshot(&self) -> Vec<ManagedMediaSource> {
        self.sources.clone()
    }
}
