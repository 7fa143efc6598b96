//! Integration tests for play queue paging and event delivery

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::stream::{StreamInfo, StreamInfoResolver};
use core_playback::{
    FetchedPage, PlayQueue, PlayQueueEvent, PlayQueueItem, PlaybackError, QueueFetcher, Result,
    StreamDescriptor,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

struct EchoResolver;

#[async_trait]
impl StreamInfoResolver for EchoResolver {
    async fn resolve(&self, service_id: u32, url: &str) -> BridgeResult<StreamInfo> {
        Ok(StreamInfo::new(service_id, url, url))
    }
}

fn item(name: &str) -> Arc<PlayQueueItem> {
    let descriptor = StreamDescriptor::new(0, format!("https://example.com/{name}"), name);
    Arc::new(PlayQueueItem::new(descriptor, Arc::new(EchoResolver)).unwrap())
}

/// Serves pages of item names after a fixed delay, then fails.
struct SlowFetcher {
    pages: Mutex<Vec<(Vec<&'static str>, bool)>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowFetcher {
    fn new(pages: Vec<(Vec<&'static str>, bool)>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(pages),
            delay: Duration::from_secs(1),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueFetcher for SlowFetcher {
    async fn fetch_page(&self) -> Result<FetchedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        let mut pages = self.pages.lock();
        if pages.is_empty() {
            return Err(PlaybackError::QueueFetchFailed("channel has no more videos".into()));
        }
        let (names, is_last) = pages.remove(0);
        Ok(FetchedPage {
            items: names.into_iter().map(item).collect(),
            is_last,
        })
    }
}

fn titles(queue: &PlayQueue) -> Vec<String> {
    queue
        .streams()
        .iter()
        .map(|item| item.title().to_string())
        .collect()
}

fn drain(events: &mut UnboundedReceiver<PlayQueueEvent>) -> Vec<PlayQueueEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

#[tokio::test(start_paused = true)]
async fn test_fetch_appends_pages_until_last() {
    let fetcher = SlowFetcher::new(vec![(vec!["b", "c"], false), (vec!["d"], true)]);
    let queue = Arc::new(PlayQueue::with_fetcher(0, vec![item("a")], fetcher.clone()));
    let mut events = queue.subscribe();

    queue.fetch();
    assert!(queue.is_fetching());
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(!queue.is_fetching());
    assert!(!queue.is_complete());
    assert_eq!(titles(&queue), vec!["a", "b", "c"]);

    queue.fetch();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(queue.is_complete());
    assert_eq!(titles(&queue), vec!["a", "b", "c", "d"]);
    assert_eq!(
        drain(&mut events),
        vec![
            PlayQueueEvent::Init { size: 1 },
            PlayQueueEvent::Append { count: 2 },
            PlayQueueEvent::Append { count: 1 },
        ]
    );

    // Complete queues never fetch again.
    queue.fetch();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_fetches_are_coalesced() {
    let fetcher = SlowFetcher::new(vec![(vec!["b"], false), (vec!["c"], false)]);
    let queue = Arc::new(PlayQueue::with_fetcher(0, vec![item("a")], fetcher.clone()));

    queue.fetch();
    queue.fetch();
    queue.fetch();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(titles(&queue), vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetch_marks_queue_complete() {
    let fetcher = SlowFetcher::new(Vec::new());
    let queue = Arc::new(PlayQueue::with_fetcher(0, vec![item("a")], fetcher.clone()));
    let mut events = queue.subscribe();

    queue.fetch();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(queue.is_complete());
    assert_eq!(queue.len(), 1);
    assert_eq!(
        drain(&mut events),
        vec![PlayQueueEvent::Init { size: 1 }, PlayQueueEvent::Append { count: 0 }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_page_arriving_after_dispose_is_discarded() {
    let fetcher = SlowFetcher::new(vec![(vec!["b"], true)]);
    let queue = Arc::new(PlayQueue::with_fetcher(0, vec![item("a")], fetcher.clone()));

    queue.fetch();
    queue.dispose();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(titles(&queue), vec!["a"]);
    assert!(!queue.is_complete());
}

#[test]
fn test_fetch_outside_runtime_is_ignored() {
    let fetcher = SlowFetcher::new(vec![(vec!["b"], true)]);
    let queue = Arc::new(PlayQueue::with_fetcher(0, vec![item("a")], fetcher.clone()));

    queue.fetch();

    assert!(!queue.is_fetching());
    assert_eq!(fetcher.calls(), 0);
}

#[test]
fn test_queue_without_fetcher_does_not_fetch() {
    let queue = Arc::new(PlayQueue::new(0, vec![item("a")]));
    queue.fetch();
    assert!(!queue.is_fetching());
    assert!(queue.is_complete());
}

#[test]
fn test_every_subscriber_sees_events_in_order() {
    let queue = PlayQueue::new(0, vec![item("a"), item("b"), item("c")]);
    let mut first = queue.subscribe();

    queue.set_index(2);
    let mut second = queue.subscribe();
    queue.move_item(0, 1);
    queue.remove(2);

    assert_eq!(
        drain(&mut first),
        vec![
            PlayQueueEvent::Init { size: 3 },
            PlayQueueEvent::Select { old_index: 0, new_index: 2 },
            PlayQueueEvent::Move { from: 0, to: 1 },
            PlayQueueEvent::Remove { index: 2, queue_index: 0 },
        ]
    );
    assert_eq!(
        drain(&mut second),
        vec![
            PlayQueueEvent::Init { size: 3 },
            PlayQueueEvent::Move { from: 0, to: 1 },
            PlayQueueEvent::Remove { index: 2, queue_index: 0 },
        ]
    );
}

#[test]
fn test_dropped_subscriber_does_not_block_others() {
    let queue = PlayQueue::new(0, vec![item("a"), item("b")]);
    let dropped = queue.subscribe();
    let mut kept = queue.subscribe();
    drop(dropped);

    queue.set_index(1);

    assert_eq!(
        drain(&mut kept),
        vec![
            PlayQueueEvent::Init { size: 2 },
            PlayQueueEvent::Select { old_index: 0, new_index: 1 },
        ]
    );
}
