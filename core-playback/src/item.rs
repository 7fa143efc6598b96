//! # Play Queue Items
//!
//! A [`PlayQueueItem`] is the queueable unit: an immutable [`StreamDescriptor`]
//! plus a lazily resolved, cached [`StreamInfo`].
//!
//! ## Resolution
//!
//! [`PlayQueueItem::resolve`] attaches every concurrent caller to a single
//! in-flight request, so the host's resolver sees at most one call per item at
//! a time. A successful result is cached for the lifetime of the item. A
//! failure is handed to every waiter but not cached, so the next call starts a
//! fresh attempt.
//!
//! ## Identity
//!
//! Items live in the queue behind an `Arc`. Slot identity (which slot of the
//! queue a result belongs to) is pointer identity of that `Arc`; stream
//! identity for deduplication is the `(service id, url)` pair.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use bridge_traits::stream::{StreamInfo, StreamInfoResolver, StreamSummary};
use core_async::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{PlaybackError, Result};

/// Recovery position of an item that has no resume point.
pub const RECOVERY_UNSET: i64 = i64::MIN;

type SharedResolution = Shared<BoxFuture<'static, Result<Arc<StreamInfo>>>>;

// ============================================================================
// Stream Descriptor
// ============================================================================

/// Display data known about a stream before it is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub service_id: u32,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub uploader: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration_secs: u64,
    /// Set for items queued by the related-stream autoplay heuristic rather
    /// than by the user.
    #[serde(default)]
    pub auto_queued: bool,
}

impl StreamDescriptor {
    pub fn new(service_id: u32, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            service_id,
            url: url.into(),
            title: title.into(),
            uploader: String::new(),
            thumbnail_url: None,
            duration_secs: 0,
            auto_queued: false,
        }
    }

    pub fn with_uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = uploader.into();
        self
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    pub fn with_duration_secs(mut self, duration_secs: u64) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    pub fn with_auto_queued(mut self, auto_queued: bool) -> Self {
        self.auto_queued = auto_queued;
        self
    }
}

impl From<&StreamInfo> for StreamDescriptor {
    fn from(info: &StreamInfo) -> Self {
        Self {
            service_id: info.service_id,
            url: info.url.clone(),
            title: info.name.clone(),
            uploader: info.uploader.clone(),
            thumbnail_url: info.thumbnail_url.clone(),
            duration_secs: info.duration_secs,
            auto_queued: false,
        }
    }
}

impl From<&StreamSummary> for StreamDescriptor {
    fn from(summary: &StreamSummary) -> Self {
        Self {
            service_id: summary.service_id,
            url: summary.url.clone(),
            title: summary.name.clone(),
            uploader: summary.uploader.clone(),
            thumbnail_url: summary.thumbnail_url.clone(),
            duration_secs: summary.duration_secs,
            auto_queued: false,
        }
    }
}

// ============================================================================
// Play Queue Item
// ============================================================================

#[derive(Default)]
struct Resolution {
    cached: Option<Arc<StreamInfo>>,
    in_flight: Option<(u64, SharedResolution)>,
    generation: u64,
}

/// One entry of a play queue.
pub struct PlayQueueItem {
    descriptor: StreamDescriptor,
    auto_queued: AtomicBool,
    recovery_position: AtomicI64,
    resolver: Arc<dyn StreamInfoResolver>,
    resolution: Mutex<Resolution>,
}

impl PlayQueueItem {
    /// Create an unresolved item.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidItem`] when the URL is empty.
    pub fn new(descriptor: StreamDescriptor, resolver: Arc<dyn StreamInfoResolver>) -> Result<Self> {
        if descriptor.url.trim().is_empty() {
            return Err(PlaybackError::InvalidItem(format!(
                "'{}' has an empty url",
                descriptor.title
            )));
        }

        Ok(Self {
            auto_queued: AtomicBool::new(descriptor.auto_queued),
            descriptor,
            recovery_position: AtomicI64::new(RECOVERY_UNSET),
            resolver,
            resolution: Mutex::new(Resolution::default()),
        })
    }

    /// Create an item from metadata that is already resolved. The metadata
    /// is cached, so [`resolve`](Self::resolve) never hits the resolver.
    pub fn from_info(info: StreamInfo, resolver: Arc<dyn StreamInfoResolver>) -> Result<Self> {
        let item = Self::new(StreamDescriptor::from(&info), resolver)?;
        item.resolution.lock().cached = Some(Arc::new(info));
        Ok(item)
    }

    /// Create an item for a related stream picked by autoplay.
    pub fn auto_queued(summary: &StreamSummary, resolver: Arc<dyn StreamInfoResolver>) -> Result<Self> {
        Self::new(StreamDescriptor::from(summary).with_auto_queued(true), resolver)
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    pub fn url(&self) -> &str {
        &self.descriptor.url
    }

    pub fn title(&self) -> &str {
        &self.descriptor.title
    }

    pub fn service_id(&self) -> u32 {
        self.descriptor.service_id
    }

    /// Whether the item was queued by autoplay and not touched by the user
    /// since. Moving an item within the queue clears the flag.
    pub fn is_auto_queued(&self) -> bool {
        self.auto_queued.load(Ordering::Acquire)
    }

    pub(crate) fn set_auto_queued(&self, auto_queued: bool) {
        self.auto_queued.store(auto_queued, Ordering::Release);
    }

    /// Whether both items refer to the same stream on the same service.
    pub fn is_same_stream(&self, other: &PlayQueueItem) -> bool {
        self.descriptor.service_id == other.descriptor.service_id
            && self.descriptor.url == other.descriptor.url
    }

    /// Resume position in milliseconds, or [`RECOVERY_UNSET`].
    pub fn recovery_position(&self) -> i64 {
        self.recovery_position.load(Ordering::Acquire)
    }

    pub(crate) fn set_recovery_position(&self, position: i64) {
        self.recovery_position.store(position, Ordering::Release);
    }

    /// Cached metadata, without triggering resolution.
    pub fn cached_info(&self) -> Option<Arc<StreamInfo>> {
        self.resolution.lock().cached.clone()
    }

    /// Whether a resolution is currently running for this item.
    pub fn is_resolving(&self) -> bool {
        self.resolution.lock().in_flight.is_some()
    }

    /// Resolve full stream metadata.
    ///
    /// Concurrent callers share one request. Success is cached; failure is
    /// not.
    pub async fn resolve(&self) -> Result<Arc<StreamInfo>> {
        let (generation, request) = {
            let mut resolution = self.resolution.lock();
            if let Some(info) = &resolution.cached {
                return Ok(info.clone());
            }

            match resolution.in_flight.clone() {
                Some(in_flight) => in_flight,
                None => {
                    resolution.generation += 1;
                    let generation = resolution.generation;
                    let request = self.start_request();
                    resolution.in_flight = Some((generation, request.clone()));
                    (generation, request)
                }
            }
        };

        let outcome = request.await;

        let mut resolution = self.resolution.lock();
        if matches!(&resolution.in_flight, Some((current, _)) if *current == generation) {
            resolution.in_flight = None;
            if let Ok(info) = &outcome {
                resolution.cached = Some(info.clone());
            }
        }
        outcome
    }

    fn start_request(&self) -> SharedResolution {
        let resolver = self.resolver.clone();
        let service_id = self.descriptor.service_id;
        let url = self.descriptor.url.clone();

        async move {
            resolver
                .resolve(service_id, &url)
                .await
                .map(Arc::new)
                .map_err(PlaybackError::from)
        }
        .boxed()
        .shared()
    }
}

impl fmt::Debug for PlayQueueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayQueueItem")
            .field("service_id", &self.descriptor.service_id)
            .field("url", &self.descriptor.url)
            .field("title", &self.descriptor.title)
            .field("recovery_position", &self.recovery_position())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use mockall::mock;

    mock! {
        Resolver {}

        #[async_trait]
        impl StreamInfoResolver for Resolver {
            async fn resolve(&self, service_id: u32, url: &str) -> BridgeResult<StreamInfo>;
        }
    }

    fn descriptor(url: &str) -> StreamDescriptor {
        StreamDescriptor::new(0, url, "title")
    }

    #[test]
    fn test_empty_url_is_rejected() {
        let resolver = Arc::new(MockResolver::new());
        let result = PlayQueueItem::new(descriptor("  "), resolver);
        assert!(matches!(result, Err(PlaybackError::InvalidItem(_))));
    }

    #[test]
    fn test_recovery_defaults_to_unset() {
        let item = PlayQueueItem::new(descriptor("https://a"), Arc::new(MockResolver::new())).unwrap();
        assert_eq!(item.recovery_position(), RECOVERY_UNSET);
        item.set_recovery_position(1500);
        assert_eq!(item.recovery_position(), 1500);
    }

    #[test]
    fn test_stream_identity_uses_service_and_url() {
        let resolver: Arc<dyn StreamInfoResolver> = Arc::new(MockResolver::new());
        let a = PlayQueueItem::new(descriptor("https://a"), resolver.clone()).unwrap();
        let b = PlayQueueItem::new(StreamDescriptor::new(0, "https://a", "other title"), resolver.clone())
            .unwrap();
        let c = PlayQueueItem::new(StreamDescriptor::new(1, "https://a", "title"), resolver).unwrap();
        assert!(a.is_same_stream(&b));
        assert!(!a.is_same_stream(&c));
    }

    #[tokio::test]
    async fn test_success_is_cached() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_resolve()
            .withf(|service_id, url| *service_id == 0 && url == "https://a")
            .times(1)
            .returning(|service_id, url| Ok(StreamInfo::new(service_id, url, "a")));

        let item = PlayQueueItem::new(descriptor("https://a"), Arc::new(resolver)).unwrap();
        assert!(item.cached_info().is_none());

        let first = item.resolve().await.unwrap();
        let second = item.resolve().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(item.cached_info().unwrap().name, "a");
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let mut resolver = MockResolver::new();
        let mut seq = mockall::Sequence::new();
        resolver
            .expect_resolve()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(BridgeError::Network("timeout".into())));
        resolver
            .expect_resolve()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|service_id, url| Ok(StreamInfo::new(service_id, url, "a")));

        let item = PlayQueueItem::new(descriptor("https://a"), Arc::new(resolver)).unwrap();
        let err = item.resolve().await.unwrap_err();
        assert!(err.is_transient());
        assert!(item.cached_info().is_none());
        assert!(!item.is_resolving());

        assert!(item.resolve().await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_request() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(|service_id, url| Ok(StreamInfo::new(service_id, url, "a")));

        let item = PlayQueueItem::new(descriptor("https://a"), Arc::new(resolver)).unwrap();
        let (first, second) = tokio::join!(item.resolve(), item.resolve());
        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
    }

    #[tokio::test]
    async fn test_from_info_is_pre_resolved() {
        let info = StreamInfo::new(3, "https://b", "b").with_uploader("someone");
        let item = PlayQueueItem::from_info(info, Arc::new(MockResolver::new())).unwrap();
        assert_eq!(item.descriptor().uploader, "someone");
        assert_eq!(item.service_id(), 3);
        assert_eq!(item.resolve().await.unwrap().name, "b");
    }

    #[test]
    fn test_auto_queued_from_summary() {
        let summary = StreamSummary {
            service_id: 0,
            url: "https://c".into(),
            name: "c".into(),
            uploader: String::new(),
            thumbnail_url: None,
            duration_secs: 90,
        };
        let item = PlayQueueItem::auto_queued(&summary, Arc::new(MockResolver::new())).unwrap();
        assert!(item.is_auto_queued());
        assert_eq!(item.descriptor().duration_secs, 90);
    }
}
