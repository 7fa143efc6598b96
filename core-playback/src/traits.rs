//! # Player-Facing Traits
//!
//! The scheduling core never touches a decoder or renderer. It drives a
//! player through [`PlaybackListener`] and hands it [`MediaSource`] values
//! describing where to read each stream from.
//!
//! ## Threading Model
//!
//! Gate and sync notifications (`block`, `unblock`, `sync`, `shutdown`) are
//! plain calls made from the manager's coordination task, in order, and must
//! return promptly. [`PlaybackListener::source_of`] runs on background
//! loaders, possibly several at once, and may do I/O.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use bridge_traits::stream::StreamInfo;
//! use core_playback::{ManagedMediaSource, MediaSource, PlayQueueItem, PlaybackListener};
//!
//! struct Player;
//!
//! #[async_trait]
//! impl PlaybackListener for Player {
//!     fn block(&self) {}
//!     fn unblock(&self, _sources: Vec<ManagedMediaSource>) {}
//!     fn sync(&self, item: Arc<PlayQueueItem>, _info: Option<Arc<StreamInfo>>) {
//!         println!("now playing {}", item.title());
//!     }
//!     async fn source_of(&self, _item: &PlayQueueItem, info: &StreamInfo) -> Option<MediaSource> {
//!         MediaSource::from_info(info)
//!     }
//!     fn shutdown(&self) {}
//! }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::stream::{MediaStream, StreamInfo};
use serde::{Deserialize, Serialize};

use crate::item::PlayQueueItem;
use crate::media_source::ManagedMediaSource;

// ============================================================================
// Media Source Types
// ============================================================================

/// Manifest flavour of an adaptive stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    /// MPEG-DASH media presentation description
    Dash,
    /// HTTP Live Streaming playlist
    Hls,
}

/// Where the player reads a resolved stream from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaSource {
    /// Single file fetched over HTTP(S).
    Progressive {
        /// Full URL to the rendition
        url: String,
        /// HTTP headers to include in the request
        headers: HashMap<String, String>,
    },

    /// Manifest-driven stream whose segments the player fetches itself.
    Adaptive {
        manifest_url: String,
        format: ManifestFormat,
    },

    /// Stream already stored on the local filesystem.
    Local {
        /// Absolute path to the media file
        path: PathBuf,
    },
}

impl MediaSource {
    pub fn progressive(url: impl Into<String>) -> Self {
        MediaSource::Progressive {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    /// Returns `true` if this source requires network access.
    pub fn is_remote(&self) -> bool {
        !matches!(self, MediaSource::Local { .. })
    }

    /// URL or path the player opens first.
    pub fn location(&self) -> String {
        match self {
            MediaSource::Progressive { url, .. } => url.clone(),
            MediaSource::Adaptive { manifest_url, .. } => manifest_url.clone(),
            MediaSource::Local { path } => path.display().to_string(),
        }
    }

    /// Pick a source from resolved metadata.
    ///
    /// Live streams prefer HLS, then DASH. On-demand streams prefer the
    /// highest bitrate muxed rendition, then the highest bitrate audio-only
    /// rendition, then a manifest. Returns `None` when nothing is playable.
    pub fn from_info(info: &StreamInfo) -> Option<Self> {
        let hls = non_empty(&info.hls_url).map(|url| MediaSource::Adaptive {
            manifest_url: url.to_string(),
            format: ManifestFormat::Hls,
        });
        let dash = non_empty(&info.dash_mpd_url).map(|url| MediaSource::Adaptive {
            manifest_url: url.to_string(),
            format: ManifestFormat::Dash,
        });

        if info.stream_type.is_live() {
            return hls.or(dash);
        }

        best_rendition(&info.video_streams)
            .or_else(|| best_rendition(&info.audio_streams))
            .map(|stream| MediaSource::progressive(stream.url.clone()))
            .or(dash)
            .or(hls)
    }
}

fn non_empty(url: &Option<String>) -> Option<&str> {
    url.as_deref().filter(|url| !url.is_empty())
}

fn best_rendition(streams: &[MediaStream]) -> Option<&MediaStream> {
    streams
        .iter()
        .filter(|stream| !stream.url.is_empty())
        .max_by_key(|stream| stream.bitrate_kbps.unwrap_or(0))
}

// ============================================================================
// Playback Listener
// ============================================================================

/// Player-side contract driven by the media source manager.
#[async_trait]
pub trait PlaybackListener: Send + Sync {
    /// Halt playback until the current item is ready. May be called while
    /// already blocked.
    fn block(&self);

    /// Resume playback from the given ordered slot collection. Only called
    /// once the current slot is loaded and the queue is ready.
    fn unblock(&self, sources: Vec<ManagedMediaSource>);

    /// Align the player to `item`. `info` is `None` when the item could not
    /// be resolved and only its identity is known.
    fn sync(&self, item: Arc<PlayQueueItem>, info: Option<Arc<StreamInfo>>);

    /// Build a playable source for a resolved item. `None` marks the slot as
    /// failed.
    async fn source_of(&self, item: &PlayQueueItem, info: &StreamInfo) -> Option<MediaSource>;

    /// The queue is permanently empty.
    fn shutdown(&self);

    /// A slot of the collection handed over at `unblock` changed.
    fn on_source_updated(&self, _index: usize, _source: &ManagedMediaSource) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::stream::StreamType;

    fn info() -> StreamInfo {
        StreamInfo::new(0, "https://example.com/watch?v=1", "clip")
    }

    #[test]
    fn test_prefers_highest_bitrate_video() {
        let info = info()
            .with_video_stream(MediaStream::new("https://cdn/360.mp4", "video/mp4").with_bitrate(700))
            .with_video_stream(MediaStream::new("https://cdn/720.mp4", "video/mp4").with_bitrate(2500))
            .with_audio_stream(MediaStream::new("https://cdn/a.m4a", "audio/mp4").with_bitrate(128));

        assert_eq!(
            MediaSource::from_info(&info),
            Some(MediaSource::progressive("https://cdn/720.mp4"))
        );
    }

    #[test]
    fn test_falls_back_to_audio_then_manifest() {
        let audio = info().with_audio_stream(MediaStream::new("https://cdn/a.webm", "audio/webm"));
        assert_eq!(
            MediaSource::from_info(&audio).map(|source| source.location()),
            Some("https://cdn/a.webm".to_string())
        );

        let dash = info().with_dash_mpd_url("https://cdn/manifest.mpd");
        assert_eq!(
            MediaSource::from_info(&dash),
            Some(MediaSource::Adaptive {
                manifest_url: "https://cdn/manifest.mpd".into(),
                format: ManifestFormat::Dash,
            })
        );
    }

    #[test]
    fn test_live_prefers_hls() {
        let live = info()
            .with_stream_type(StreamType::Live)
            .with_dash_mpd_url("https://cdn/live.mpd")
            .with_hls_url("https://cdn/live.m3u8")
            .with_video_stream(MediaStream::new("https://cdn/ignored.mp4", "video/mp4"));

        assert_eq!(
            MediaSource::from_info(&live),
            Some(MediaSource::Adaptive {
                manifest_url: "https://cdn/live.m3u8".into(),
                format: ManifestFormat::Hls,
            })
        );
    }

    #[test]
    fn test_nothing_playable() {
        assert_eq!(MediaSource::from_info(&info()), None);
        assert!(MediaSource::from_info(&info().with_hls_url("")).is_none());
    }

    #[test]
    fn test_local_source_is_not_remote() {
        let local = MediaSource::Local {
            path: PathBuf::from("/media/clip.mp4"),
        };
        assert!(!local.is_remote());
        assert_eq!(local.location(), "/media/clip.mp4");
        assert!(MediaSource::progressive("https://cdn/a").is_remote());
    }
}
