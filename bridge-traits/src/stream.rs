//! Stream Metadata Abstractions
//!
//! The host owns the network client and the service-specific extractors. The
//! core only needs to turn a `(service id, url)` pair into a [`StreamInfo`]
//! bundle, which is exactly what [`StreamInfoResolver`] provides.

use serde::{Deserialize, Serialize};

use crate::{error::Result, platform::PlatformSendSync};

/// Kind of content a stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    #[default]
    Video,
    Audio,
    Live,
    AudioLive,
}

impl StreamType {
    pub fn is_live(&self) -> bool {
        matches!(self, StreamType::Live | StreamType::AudioLive)
    }
}

/// One concrete, directly fetchable rendition of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStream {
    pub url: String,
    /// MIME type of the container, e.g. `video/mp4`.
    pub mime_type: String,
    pub bitrate_kbps: Option<u32>,
    /// Resolution label such as `720p`. Audio-only renditions leave this empty.
    pub resolution: Option<String>,
}

impl MediaStream {
    pub fn new(url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime_type: mime_type.into(),
            bitrate_kbps: None,
            resolution: None,
        }
    }

    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = Some(kbps);
        self
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }
}

/// Listing entry for a related stream, as shown next to a playing item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSummary {
    pub service_id: u32,
    pub url: String,
    pub name: String,
    pub uploader: String,
    pub thumbnail_url: Option<String>,
    pub duration_secs: u64,
}

/// Full metadata bundle for a single stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub service_id: u32,
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub uploader: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration_secs: u64,
    #[serde(default)]
    pub stream_type: StreamType,
    /// Muxed audio+video renditions.
    #[serde(default)]
    pub video_streams: Vec<MediaStream>,
    #[serde(default)]
    pub audio_streams: Vec<MediaStream>,
    #[serde(default)]
    pub dash_mpd_url: Option<String>,
    #[serde(default)]
    pub hls_url: Option<String>,
    /// Position the service asked playback to start at (e.g. `t=` links).
    #[serde(default)]
    pub start_position_secs: u64,
    #[serde(default)]
    pub related_streams: Vec<StreamSummary>,
}

impl StreamInfo {
    pub fn new(service_id: u32, url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            service_id,
            url: url.into(),
            name: name.into(),
            uploader: String::new(),
            thumbnail_url: None,
            duration_secs: 0,
            stream_type: StreamType::default(),
            video_streams: Vec::new(),
            audio_streams: Vec::new(),
            dash_mpd_url: None,
            hls_url: None,
            start_position_secs: 0,
            related_streams: Vec::new(),
        }
    }

    pub fn with_uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = uploader.into();
        self
    }

    pub fn with_stream_type(mut self, stream_type: StreamType) -> Self {
        self.stream_type = stream_type;
        self
    }

    pub fn with_video_stream(mut self, stream: MediaStream) -> Self {
        self.video_streams.push(stream);
        self
    }

    pub fn with_audio_stream(mut self, stream: MediaStream) -> Self {
        self.audio_streams.push(stream);
        self
    }

    pub fn with_dash_mpd_url(mut self, url: impl Into<String>) -> Self {
        self.dash_mpd_url = Some(url.into());
        self
    }

    pub fn with_hls_url(mut self, url: impl Into<String>) -> Self {
        self.hls_url = Some(url.into());
        self
    }

    pub fn with_related(mut self, related: StreamSummary) -> Self {
        self.related_streams.push(related);
        self
    }

    /// Whether at least one rendition or manifest can be played.
    pub fn has_playable_stream(&self) -> bool {
        !self.video_streams.is_empty()
            || !self.audio_streams.is_empty()
            || self.dash_mpd_url.as_deref().is_some_and(|url| !url.is_empty())
            || self.hls_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

/// Stream metadata resolver
///
/// Implemented by the host on top of its extractor and HTTP stack. Calls may
/// be issued concurrently for different URLs; the core deduplicates calls for
/// the same queue item.
///
/// # Errors
///
/// Implementations should report transport problems as
/// [`BridgeError::Network`](crate::error::BridgeError::Network) and payloads
/// that cannot be understood as
/// [`BridgeError::Extraction`](crate::error::BridgeError::Extraction); the
/// scheduling core retries the former but not the latter.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::stream::{StreamInfo, StreamInfoResolver};
/// use bridge_traits::error::Result;
/// use async_trait::async_trait;
///
/// struct OfflineResolver;
///
/// #[async_trait]
/// impl StreamInfoResolver for OfflineResolver {
///     async fn resolve(&self, service_id: u32, url: &str) -> Result<StreamInfo> {
///         Ok(StreamInfo::new(service_id, url, "cached"))
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait StreamInfoResolver: PlatformSendSync {
    /// Fetch full metadata for the stream at `url` on service `service_id`.
    async fn resolve(&self, service_id: u32, url: &str) -> Result<StreamInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use mockall::mock;

    mock! {
        Resolver {}

        #[async_trait::async_trait]
        impl StreamInfoResolver for Resolver {
            async fn resolve(&self, service_id: u32, url: &str) -> Result<StreamInfo>;
        }
    }

    #[test]
    fn test_playable_stream_detection() {
        let bare = StreamInfo::new(0, "https://example.com/watch?v=1", "bare");
        assert!(!bare.has_playable_stream());

        let empty_manifest = bare.clone().with_dash_mpd_url("");
        assert!(!empty_manifest.has_playable_stream());

        let audio = bare
            .clone()
            .with_audio_stream(MediaStream::new("https://cdn/a.m4a", "audio/mp4").with_bitrate(128));
        assert!(audio.has_playable_stream());

        let live = bare.with_hls_url("https://cdn/live.m3u8");
        assert!(live.has_playable_stream());
    }

    #[test]
    fn test_stream_info_deserializes_with_defaults() {
        let json = r#"{"service_id":0,"url":"https://example.com/v","name":"v"}"#;
        let info: StreamInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.stream_type, StreamType::Video);
        assert!(info.related_streams.is_empty());
        assert_eq!(info.duration_secs, 0);
    }

    #[test]
    fn test_live_stream_types() {
        assert!(StreamType::Live.is_live());
        assert!(StreamType::AudioLive.is_live());
        assert!(!StreamType::Audio.is_live());
    }

    #[tokio::test]
    async fn test_resolver_trait_object() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_resolve()
            .withf(|service_id, url| *service_id == 2 && url == "https://example.com/v")
            .returning(|service_id, url| Ok(StreamInfo::new(service_id, url, "resolved")));
        resolver
            .expect_resolve()
            .returning(|_, url| Err(BridgeError::NotFound(url.to_string())));

        let resolver: Box<dyn StreamInfoResolver> = Box::new(resolver);
        let info = resolver.resolve(2, "https://example.com/v").await.unwrap();
        assert_eq!(info.name, "resolved");

        let missing = resolver.resolve(2, "https://example.com/gone").await;
        assert!(matches!(missing, Err(BridgeError::NotFound(_))));
    }
}
