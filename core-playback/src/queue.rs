//! # Play Queue
//!
//! Ordered, observable sequence of [`PlayQueueItem`]s with a single cursor.
//!
//! ## Overview
//!
//! Every mutation is applied under one lock and published to all subscribers
//! as a [`PlayQueueEvent`] before the lock is released, so subscribers see
//! events in exactly the order the mutations happened. Each subscriber gets
//! its own unbounded channel; events are never dropped or coalesced.
//!
//! Out-of-range indices are ignored rather than rejected: UI removals race
//! with background callbacks that still hold old indices.
//!
//! ## Paged Queues
//!
//! A queue built with [`PlayQueue::with_fetcher`] starts incomplete and pulls
//! further items from a [`QueueFetcher`] when [`PlayQueue::fetch`] is called.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use core_playback::{PlayQueue, PlayQueueEvent, PlayQueueItem};
//!
//! # async fn example(items: Vec<Arc<PlayQueueItem>>) {
//! let queue = Arc::new(PlayQueue::new(0, items));
//! let mut events = queue.subscribe();
//! assert!(matches!(events.recv().await, Some(PlayQueueEvent::Init { .. })));
//!
//! queue.offset_index(1);
//! assert!(matches!(events.recv().await, Some(PlayQueueEvent::Select { .. })));
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use core_async::runtime::Handle;
use core_async::sync::mpsc;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::item::{PlayQueueItem, RECOVERY_UNSET};

// ============================================================================
// Events
// ============================================================================

/// Change notification published by a [`PlayQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayQueueEvent {
    /// First event on every subscription; `size` is the queue length at the
    /// moment of subscribing.
    Init { size: usize },
    /// `count` items were added at the end. A count of zero signals a change
    /// of the complete flag.
    Append { count: usize },
    /// The item at `index` was removed; `queue_index` is the cursor afterwards.
    Remove { index: usize, queue_index: usize },
    Move { from: usize, to: usize },
    /// The cursor was set. Emitted even when the index did not change.
    Select { old_index: usize, new_index: usize },
    /// The whole order changed (shuffle or unshuffle).
    Reorder { from: usize, to: usize },
    /// Playback of the item at `error_index` failed. Skippable errors advance
    /// the cursor; others remove the item.
    Error {
        error_index: usize,
        queue_index: usize,
        skippable: bool,
    },
    Recovery { index: usize, position: i64 },
}

impl PlayQueueEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PlayQueueEvent::Init { .. } => "init",
            PlayQueueEvent::Append { .. } => "append",
            PlayQueueEvent::Remove { .. } => "remove",
            PlayQueueEvent::Move { .. } => "move",
            PlayQueueEvent::Select { .. } => "select",
            PlayQueueEvent::Reorder { .. } => "reorder",
            PlayQueueEvent::Error { .. } => "error",
            PlayQueueEvent::Recovery { .. } => "recovery",
        }
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// One page of items produced by a [`QueueFetcher`].
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub items: Vec<Arc<PlayQueueItem>>,
    /// No further pages exist after this one.
    pub is_last: bool,
}

/// Upstream source of a paged queue (a remote playlist, a channel feed).
#[async_trait]
pub trait QueueFetcher: Send + Sync {
    async fn fetch_page(&self) -> Result<FetchedPage>;
}

// ============================================================================
// Play Queue
// ============================================================================

#[derive(Default)]
struct QueueState {
    streams: Vec<Arc<PlayQueueItem>>,
    /// Original order while shuffled.
    backup: Option<Vec<Arc<PlayQueueItem>>>,
    history: Vec<Arc<PlayQueueItem>>,
    index: usize,
    complete: bool,
    disposed: bool,
    subscribers: Vec<mpsc::UnboundedSender<PlayQueueEvent>>,
}

impl QueueState {
    fn broadcast(&mut self, event: PlayQueueEvent) {
        self.subscribers.retain(|subscriber| subscriber.send(event).is_ok());
    }

    fn position_of(&self, item: &Arc<PlayQueueItem>) -> Option<usize> {
        self.streams.iter().position(|stream| Arc::ptr_eq(stream, item))
    }

    /// Maps a requested cursor position onto the queue: past the end wraps
    /// on a complete queue and sticks to the last item otherwise.
    fn resolve_index(&self, requested: usize) -> usize {
        let size = self.streams.len();
        if requested < size {
            requested
        } else if size == 0 {
            0
        } else if self.complete {
            requested % size
        } else {
            size - 1
        }
    }

    fn move_cursor(&mut self, requested: usize) -> (usize, usize) {
        let old_index = self.index;
        let new_index = self.resolve_index(requested);
        self.index = new_index;
        if old_index != new_index {
            if let Some(item) = self.streams.get(new_index).cloned() {
                self.history.push(item);
            }
        }
        (old_index, new_index)
    }

    fn select(&mut self, requested: usize) {
        let (old_index, new_index) = self.move_cursor(requested);
        self.broadcast(PlayQueueEvent::Select {
            old_index,
            new_index,
        });
    }

    fn append(&mut self, mut items: Vec<Arc<PlayQueueItem>>) {
        if let Some(backup) = self.backup.as_mut() {
            backup.extend(items.iter().cloned());
            items.shuffle(&mut rand::thread_rng());
        }

        // A trailing autoplay pick gives way to items the user queues.
        let replaces_autoplay = self.streams.last().is_some_and(|last| last.is_auto_queued())
            && items.first().is_some_and(|first| !first.is_auto_queued());
        if replaces_autoplay {
            let last = self.streams.len() - 1;
            self.remove_at(last);
            self.broadcast(PlayQueueEvent::Remove {
                index: last,
                queue_index: self.index,
            });
        }

        let was_empty = self.streams.is_empty();
        let count = items.len();
        self.streams.extend(items);
        if was_empty {
            if let Some(current) = self.streams.get(self.index).cloned() {
                self.history.push(current);
            }
        }
        self.broadcast(PlayQueueEvent::Append { count });
    }

    fn remove_at(&mut self, index: usize) {
        let current = self.index;
        let last = self.streams.len() - 1;
        if current > index {
            self.index -= 1;
        } else if current == index && current == last {
            self.index = 0;
        }

        let removed = self.streams.remove(index);
        if let Some(backup) = self.backup.as_mut() {
            backup.retain(|item| !Arc::ptr_eq(item, &removed));
        }
        self.history.retain(|item| !Arc::ptr_eq(item, &removed));

        if self.index >= self.streams.len() {
            self.index = self.streams.len().saturating_sub(1);
        }
        if current == index {
            if let Some(item) = self.streams.get(self.index).cloned() {
                self.history.push(item);
            }
        }
    }
}

/// Observable play queue.
pub struct PlayQueue {
    state: Mutex<QueueState>,
    fetcher: Option<Arc<dyn QueueFetcher>>,
    fetching: AtomicBool,
}

impl PlayQueue {
    /// Create a complete queue holding `items`, with the cursor at `index`.
    pub fn new(index: usize, items: Vec<Arc<PlayQueueItem>>) -> Self {
        Self::build(index, items, true, None)
    }

    /// Create an incomplete queue that pulls further pages from `fetcher`.
    pub fn with_fetcher(
        index: usize,
        items: Vec<Arc<PlayQueueItem>>,
        fetcher: Arc<dyn QueueFetcher>,
    ) -> Self {
        Self::build(index, items, false, Some(fetcher))
    }

    fn build(
        index: usize,
        items: Vec<Arc<PlayQueueItem>>,
        complete: bool,
        fetcher: Option<Arc<dyn QueueFetcher>>,
    ) -> Self {
        let index = index.min(items.len().saturating_sub(1));
        let history = items.get(index).cloned().into_iter().collect();
        Self {
            state: Mutex::new(QueueState {
                streams: items,
                history,
                index,
                complete,
                ..Default::default()
            }),
            fetcher,
            fetching: AtomicBool::new(false),
        }
    }

    // ------------------------------------------------------------------------
    // Read operations
    // ------------------------------------------------------------------------

    pub fn index(&self) -> usize {
        self.state.lock().index
    }

    /// Item under the cursor, `None` when the queue is empty.
    pub fn item(&self) -> Option<Arc<PlayQueueItem>> {
        let state = self.state.lock();
        state.streams.get(state.index).cloned()
    }

    /// Cursor and current item, read under one lock.
    pub fn cursor(&self) -> Option<(usize, Arc<PlayQueueItem>)> {
        let state = self.state.lock();
        state
            .streams
            .get(state.index)
            .map(|item| (state.index, item.clone()))
    }

    /// Cursor and order, read under one lock.
    pub fn snapshot(&self) -> (usize, Vec<Arc<PlayQueueItem>>) {
        let state = self.state.lock();
        (state.index, state.streams.clone())
    }

    pub fn item_at(&self, index: usize) -> Option<Arc<PlayQueueItem>> {
        self.state.lock().streams.get(index).cloned()
    }

    /// Position of this exact entry. Another entry for the same stream does
    /// not match.
    pub fn index_of(&self, item: &Arc<PlayQueueItem>) -> Option<usize> {
        self.state.lock().position_of(item)
    }

    pub fn contains_stream(&self, service_id: u32, url: &str) -> bool {
        self.state
            .lock()
            .streams
            .iter()
            .any(|item| item.service_id() == service_id && item.url() == url)
    }

    pub fn len(&self) -> usize {
        self.state.lock().streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().streams.is_empty()
    }

    /// Whether every item the queue will ever hold has been loaded.
    pub fn is_complete(&self) -> bool {
        self.state.lock().complete
    }

    pub fn is_shuffled(&self) -> bool {
        self.state.lock().backup.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Snapshot of the current order.
    pub fn streams(&self) -> Vec<Arc<PlayQueueItem>> {
        self.state.lock().streams.clone()
    }

    /// Whether both queues hold the same streams in the same order.
    pub fn equal_streams(&self, other: &PlayQueue) -> bool {
        let ours = self.streams();
        let theirs = other.streams();
        ours.len() == theirs.len()
            && ours
                .iter()
                .zip(theirs.iter())
                .all(|(a, b)| a.is_same_stream(b))
    }

    pub fn equal_streams_and_index(&self, other: &PlayQueue) -> bool {
        self.equal_streams(other) && self.index() == other.index()
    }

    // ------------------------------------------------------------------------
    // Subscription
    // ------------------------------------------------------------------------

    /// Subscribe to queue events. The first event is always
    /// [`PlayQueueEvent::Init`]. After [`dispose`](Self::dispose) the
    /// returned receiver is already closed.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PlayQueueEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        if !state.disposed {
            let size = state.streams.len();
            if tx.send(PlayQueueEvent::Init { size }).is_ok() {
                state.subscribers.push(tx);
            }
        }
        rx
    }

    /// Close every subscription. Later mutations are still applied but no
    /// longer published.
    pub fn dispose(&self) {
        let mut state = self.state.lock();
        state.subscribers.clear();
        state.disposed = true;
        debug!("Play queue disposed");
    }

    // ------------------------------------------------------------------------
    // Write operations
    // ------------------------------------------------------------------------

    /// Move the cursor. Negative positions are not representable; positions
    /// past the end wrap on a complete queue and clamp to the last item
    /// otherwise. Always emits [`PlayQueueEvent::Select`].
    pub fn set_index(&self, index: usize) {
        self.state.lock().select(index);
    }

    /// Move the cursor relative to its current position. Offsets before the
    /// start clamp to 0.
    pub fn offset_index(&self, offset: isize) {
        let mut state = self.state.lock();
        let requested = state.index.checked_add_signed(offset).unwrap_or(0);
        state.select(requested);
    }

    pub fn append(&self, items: Vec<Arc<PlayQueueItem>>) {
        let mut state = self.state.lock();
        debug!(count = items.len(), size = state.streams.len(), "Appending to play queue");
        state.append(items);
    }

    pub fn remove(&self, index: usize) {
        let mut state = self.state.lock();
        if index >= state.streams.len() {
            return;
        }
        state.remove_at(index);
        let queue_index = state.index;
        state.broadcast(PlayQueueEvent::Remove { index, queue_index });
    }

    /// Move the item at `source` to `target`, keeping the cursor on the same
    /// item. A moved item is no longer considered auto-queued.
    pub fn move_item(&self, source: usize, target: usize) {
        let mut state = self.state.lock();
        let size = state.streams.len();
        if source >= size || target >= size {
            return;
        }

        let current = state.index;
        if source == current {
            state.index = target;
        } else if source < current && target >= current {
            state.index -= 1;
        } else if source > current && target <= current {
            state.index += 1;
        }

        let item = state.streams.remove(source);
        item.set_auto_queued(false);
        state.streams.insert(target, item);
        state.broadcast(PlayQueueEvent::Move {
            from: source,
            to: target,
        });
    }

    /// Report that the current item could not be played.
    ///
    /// A skippable error advances the cursor (wrapping like
    /// [`set_index`](Self::set_index)); otherwise the item is removed.
    pub fn error(&self, skippable: bool) {
        let mut state = self.state.lock();
        if state.streams.is_empty() {
            return;
        }

        let error_index = state.index;
        if skippable {
            state.move_cursor(error_index + 1);
        } else {
            state.remove_at(error_index);
        }
        let queue_index = state.index;
        warn!(error_index, queue_index, skippable, "Play queue item errored");
        state.broadcast(PlayQueueEvent::Error {
            error_index,
            queue_index,
            skippable,
        });
    }

    /// Store a resume position (milliseconds) on the item at `index`.
    pub fn set_recovery(&self, index: usize, position: i64) {
        let mut state = self.state.lock();
        let Some(item) = state.streams.get(index) else {
            return;
        };
        item.set_recovery_position(position);
        state.broadcast(PlayQueueEvent::Recovery { index, position });
    }

    pub fn unset_recovery(&self, index: usize) {
        self.set_recovery(index, RECOVERY_UNSET);
    }

    /// Mark the queue as holding every item it will ever hold.
    pub fn set_complete(&self) {
        let mut state = self.state.lock();
        if !state.complete {
            state.complete = true;
            state.broadcast(PlayQueueEvent::Append { count: 0 });
        }
    }

    /// Ask subscribers to re-evaluate the queue without changing it.
    pub fn notify_change(&self) {
        self.state.lock().broadcast(PlayQueueEvent::Append { count: 0 });
    }

    /// Shuffle the queue, keeping the current item playing at the front.
    ///
    /// The original order is backed up the first time, even when the queue
    /// is too short to reorder (two items or fewer), so shuffle mode can be
    /// entered on any queue.
    pub fn shuffle(&self) {
        let mut state = self.state.lock();
        if state.backup.is_none() {
            state.backup = Some(state.streams.clone());
        }
        if state.streams.len() <= 2 {
            return;
        }

        let original_index = state.index;
        let current = state.streams[original_index].clone();
        state.streams.shuffle(&mut rand::thread_rng());
        if let Some(position) = state.position_of(&current) {
            let item = state.streams.remove(position);
            state.streams.insert(0, item);
        }
        state.index = 0;
        state.history.push(current);
        state.broadcast(PlayQueueEvent::Reorder {
            from: original_index,
            to: 0,
        });
    }

    /// Restore the order from before [`shuffle`](Self::shuffle).
    pub fn unshuffle(&self) {
        let mut state = self.state.lock();
        let Some(backup) = state.backup.take() else {
            return;
        };

        let original_index = state.index;
        let current = state.streams.get(original_index).cloned();
        state.streams = backup;
        let index = current
            .and_then(|item| state.position_of(&item))
            .unwrap_or(0);
        state.index = index;
        if let Some(item) = state.streams.get(state.index).cloned() {
            state.history.push(item);
        }
        let to = state.index;
        state.broadcast(PlayQueueEvent::Reorder {
            from: original_index,
            to,
        });
    }

    /// Select the previously played item that is still in the queue.
    ///
    /// Returns `false` when there is nothing to go back to.
    pub fn previous(&self) -> bool {
        let mut state = self.state.lock();
        if state.history.len() <= 1 {
            return false;
        }

        state.history.pop();
        while let Some(last) = state.history.pop() {
            if let Some(index) = state.position_of(&last) {
                state.select(index);
                return true;
            }
        }
        false
    }

    // ------------------------------------------------------------------------
    // Paging
    // ------------------------------------------------------------------------

    /// Load the next page in the background. Does nothing on a complete
    /// queue, a queue without fetcher, or while a fetch is already running.
    pub fn fetch(self: &Arc<Self>) {
        let Some(fetcher) = self.fetcher.clone() else {
            return;
        };
        if self.is_complete() || self.is_disposed() {
            return;
        }
        if self.fetching.swap(true, Ordering::AcqRel) {
            return;
        }

        let Ok(handle) = Handle::try_current() else {
            warn!("Play queue fetch requested outside of a runtime");
            self.fetching.store(false, Ordering::Release);
            return;
        };

        let queue = Arc::clone(self);
        handle.spawn(async move {
            let page = fetcher.fetch_page().await;
            queue.apply_page(page);
            queue.fetching.store(false, Ordering::Release);
        });
    }

    /// Whether a page fetch is in progress.
    pub fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::Acquire)
    }

    fn apply_page(&self, page: Result<FetchedPage>) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }

        match page {
            Ok(page) => {
                debug!(count = page.items.len(), is_last = page.is_last, "Fetched play queue page");
                if page.is_last {
                    state.complete = true;
                }
                state.append(page.items);
            }
            Err(err) => {
                warn!(error = %err, "Play queue fetch failed, treating queue as complete");
                state.complete = true;
                state.broadcast(PlayQueueEvent::Append { count: 0 });
            }
        }
    }
}
