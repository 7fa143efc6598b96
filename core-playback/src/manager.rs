//! # Media Source Manager
//!
//! Keeps a bounded window of queue items around the cursor resolved into
//! playable sources, and gates the player until the current item is ready.
//!
//! ## Overview
//!
//! The manager is an actor. [`MediaSourceManager::spawn`] subscribes to the
//! [`PlayQueue`] and starts one coordination task that owns all mutable
//! state: the [`MediaSourcePlaylist`] mirroring the queue, the blocked flag,
//! the last synced item and the set of in-flight loads. The task reacts to,
//! one at a time:
//!
//! - queue events, pulled from the subscription only after the previous one
//!   has been handled completely
//! - commands from the [`MediaSourceManager`] handle (`load`, `reset`)
//! - finished loaders
//! - the load debounce timer
//!
//! Resolution (metadata fetch plus [`PlaybackListener::source_of`]) runs on
//! loader tasks; only their results come back to the coordination task, so
//! the playlist is never touched concurrently.
//!
//! ## Event Handling
//!
//! | Event | Playlist | Load |
//! |-------|----------|------|
//! | `Init`, `Reorder`, `Error` | rebuilt as placeholders | immediate |
//! | `Append` | placeholders appended | debounced |
//! | `Remove`, `Move` | slot spliced or moved | debounced |
//! | `Select` | expired current slot invalidated | immediate if invalidated, else debounced |
//! | `Recovery` | unchanged | debounced |
//!
//! After each event the manager blocks playback and asks the queue for more
//! items if the queue is not ready. An empty, complete queue shuts the
//! session down.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use core_playback::{ManagerConfig, MediaSourceManager, PlayQueue, PlaybackListener};
//!
//! # async fn example(player: Arc<dyn PlaybackListener>, queue: Arc<PlayQueue>) -> core_playback::Result<()> {
//! let manager = MediaSourceManager::builder(player, queue.clone())
//!     .with_config(ManagerConfig::aggressive_prefetch())
//!     .spawn()?;
//!
//! queue.offset_index(1);
//! manager.load()?;
//! manager.dispose().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use bridge_traits::stream::StreamInfo;
use bridge_traits::time::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use core_async::debounce::Debouncer;
use core_async::runtime::Handle;
use core_async::sync::{mpsc, watch, CancellationToken};
use core_async::task::{JoinError, JoinHandle, JoinSet};
use core_runtime::events::{CoreEvent, EventBus, SessionEvent, SourceEvent};
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ManagerConfig;
use crate::error::{PlaybackError, Result};
use crate::item::PlayQueueItem;
use crate::media_source::{ManagedMediaSource, MediaSourcePlaylist};
use crate::queue::{PlayQueue, PlayQueueEvent};
use crate::traits::PlaybackListener;

// ============================================================================
// Handle
// ============================================================================

/// Snapshot of the coordination state, published after every step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManagerStatus {
    pub is_blocked: bool,
    pub playlist_len: usize,
    /// URL of the item the player was last synced to.
    pub synced_url: Option<String>,
    /// Number of items currently being resolved.
    pub loading: usize,
    /// The queue became permanently empty and the listener was shut down.
    pub is_shut_down: bool,
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Load,
    Reset,
}

/// Handle to a running media source manager.
///
/// Dropping the handle stops the coordination task; [`dispose`](Self::dispose)
/// additionally waits for it to finish.
pub struct MediaSourceManager {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ManagerStatus>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MediaSourceManager {
    /// Start a manager with the given configuration and the system clock.
    pub fn spawn(
        listener: Arc<dyn PlaybackListener>,
        queue: Arc<PlayQueue>,
        config: ManagerConfig,
    ) -> Result<Self> {
        Self::builder(listener, queue).with_config(config).spawn()
    }

    pub fn builder(
        listener: Arc<dyn PlaybackListener>,
        queue: Arc<PlayQueue>,
    ) -> MediaSourceManagerBuilder {
        MediaSourceManagerBuilder {
            listener,
            queue,
            config: ManagerConfig::default(),
            clock: Arc::new(SystemClock),
            event_bus: None,
        }
    }

    /// Schedule a debounced load pass over the window.
    pub fn load(&self) -> Result<()> {
        self.send(Command::Load)
    }

    /// Block playback, rebuild every slot as a placeholder and load the
    /// window immediately.
    pub fn reset(&self) -> Result<()> {
        self.send(Command::Reset)
    }

    pub fn status(&self) -> ManagerStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn watch_status(&self) -> watch::Receiver<ManagerStatus> {
        self.status.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the coordination task and every outstanding loader.
    pub async fn dispose(&self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                if err.is_panic() {
                    error!(error = %err, "Media source manager task panicked");
                }
            }
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(PlaybackError::ManagerClosed);
        }
        self.commands
            .send(command)
            .map_err(|_| PlaybackError::ManagerClosed)
    }
}

impl Drop for MediaSourceManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Builder for [`MediaSourceManager`].
pub struct MediaSourceManagerBuilder {
    listener: Arc<dyn PlaybackListener>,
    queue: Arc<PlayQueue>,
    config: ManagerConfig,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
}

impl MediaSourceManagerBuilder {
    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock used for source expiry and retry deadlines.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish session and source events on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Validate the configuration, subscribe to the queue and start the
    /// coordination task on the current runtime.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::InvalidConfig`] when the configuration is invalid
    /// - [`PlaybackError::Internal`] when called outside of a runtime
    pub fn spawn(self) -> Result<MediaSourceManager> {
        self.config.validate()?;
        let handle = Handle::try_current().map_err(|_| {
            PlaybackError::Internal("media source manager must be spawned inside a runtime".into())
        })?;

        let events = self.queue.subscribe();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ManagerStatus::default());
        let cancel = CancellationToken::new();

        let coordinator = Coordinator {
            debouncer: Debouncer::new(self.config.load_debounce),
            listener: self.listener,
            queue: self.queue,
            config: Arc::new(self.config),
            clock: self.clock,
            event_bus: self.event_bus,
            playlist: MediaSourcePlaylist::new(),
            is_blocked: false,
            is_shut_down: false,
            synced: None,
            loading: Vec::new(),
            loaders: JoinSet::new(),
            status: status_tx,
        };
        let task = handle.spawn(coordinator.run(events, commands_rx, cancel.clone()));

        Ok(MediaSourceManager {
            commands: commands_tx,
            status: status_rx,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }
}

// ============================================================================
// Coordination Task
// ============================================================================

struct LoadOutcome {
    item: Arc<PlayQueueItem>,
    source: ManagedMediaSource,
}

enum Flow {
    Continue,
    Stop,
}

struct Coordinator {
    listener: Arc<dyn PlaybackListener>,
    queue: Arc<PlayQueue>,
    config: Arc<ManagerConfig>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    playlist: MediaSourcePlaylist,
    is_blocked: bool,
    is_shut_down: bool,
    synced: Option<Arc<PlayQueueItem>>,
    /// Items with a loader in flight, by slot identity.
    loading: Vec<Arc<PlayQueueItem>>,
    loaders: JoinSet<LoadOutcome>,
    debouncer: Debouncer,
    status: watch::Sender<ManagerStatus>,
}

impl Coordinator {
    #[instrument(name = "media_source_manager", skip_all)]
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<PlayQueueEvent>,
        mut commands: mpsc::UnboundedReceiver<Command>,
        cancel: CancellationToken,
    ) {
        info!(
            window_size = self.config.window_size,
            debounce_ms = self.config.load_debounce.as_millis() as u64,
            "Media source manager started"
        );

        loop {
            core_async::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Media source manager disposed");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("Play queue closed its subscription");
                        break;
                    };
                    if let Flow::Stop = self.on_queue_event(event) {
                        self.publish_status();
                        break;
                    }
                }
                Some(command) = commands.recv() => self.on_command(command),
                Some(joined) = self.loaders.join_next(), if !self.loaders.is_empty() => {
                    self.on_loader_finished(joined);
                }
                () = self.debouncer.fired() => self.load_window(),
            }
            self.publish_status();
        }

        self.debouncer.cancel();
        self.loaders.abort_all();
        self.loading.clear();
        self.publish_status();
    }

    // ------------------------------------------------------------------------
    // Queue events
    // ------------------------------------------------------------------------

    fn on_queue_event(&mut self, event: PlayQueueEvent) -> Flow {
        debug!(event = event.kind(), size = self.queue.len(), "Handling play queue event");

        if self.queue.is_empty() && self.queue.is_complete() {
            self.shutdown();
            return Flow::Stop;
        }

        match event {
            PlayQueueEvent::Init { size } => {
                self.reset(size);
                self.load_window();
            }
            PlayQueueEvent::Reorder { .. } => {
                self.reset(self.playlist.len());
                self.load_window();
            }
            PlayQueueEvent::Error { skippable, .. } => {
                let len = if skippable {
                    self.playlist.len()
                } else {
                    self.playlist.len().saturating_sub(1)
                };
                self.reset(len);
                self.load_window();
            }
            PlayQueueEvent::Append { count } => {
                for _ in 0..count {
                    self.playlist.expand();
                }
                self.debouncer.signal();
            }
            PlayQueueEvent::Remove { index, .. } => {
                self.playlist.remove(index);
                self.debouncer.signal();
            }
            PlayQueueEvent::Move { from, to } => {
                self.playlist.move_source(from, to);
                self.debouncer.signal();
            }
            PlayQueueEvent::Select { .. } => {
                if self.renew_current() {
                    self.load_window();
                } else {
                    self.debouncer.signal();
                }
            }
            PlayQueueEvent::Recovery { .. } => self.debouncer.signal(),
        }

        if !self.is_ready() {
            self.block();
            self.request_fetch();
        }
        Flow::Continue
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Load => self.debouncer.signal(),
            Command::Reset => {
                self.reset(self.playlist.len());
                self.load_window();
            }
        }
    }

    /// Whether enough of the queue is known to start playing.
    fn is_ready(&self) -> bool {
        if self.queue.is_complete() {
            return true;
        }
        let remaining = self.queue.len().saturating_sub(self.queue.index());
        remaining > self.config.window_size
    }

    fn reset(&mut self, len: usize) {
        debug!(len, "Rebuilding media source playlist");
        self.block();
        self.playlist.reset(len);
    }

    fn request_fetch(&self) {
        if self.queue.is_complete() {
            return;
        }
        let queue_size = self.queue.len();
        debug!(queue_size, "Play queue not ready, requesting more items");
        self.emit(CoreEvent::Session(SessionEvent::FetchRequested { queue_size }));
        self.queue.fetch();
    }

    /// Invalidate the current slot if its source has expired. Returns `true`
    /// when the slot was invalidated.
    fn renew_current(&mut self) -> bool {
        let Some((index, item)) = self.queue.cursor() else {
            return false;
        };
        let now = self.now();
        let expired = self.playlist.get(index).is_some_and(|slot| {
            slot.is_loaded() && slot.is_stream_equal(&item) && slot.can_replace(now)
        });
        if !expired {
            return false;
        }

        debug!(index, url = redact_url(item.url()), "Current media source expired");
        self.playlist.invalidate(index);
        self.listener
            .on_source_updated(index, &ManagedMediaSource::Placeholder);
        self.emit(CoreEvent::Source(SourceEvent::Invalidated {
            index,
            url: redact_url(item.url()).to_string(),
        }));
        true
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Load the current item first, then the rest of the window.
    fn load_window(&mut self) {
        let (index, streams) = self.queue.snapshot();
        let indices = window_indices(
            index,
            streams.len(),
            self.config.window_size,
            self.config.wrap_window,
        );
        let Some((&center, neighbours)) = indices.split_first() else {
            return;
        };

        let current = streams[center].clone();
        self.evict_loaders(&current);
        self.load_item(center, current);
        self.maybe_synchronize();

        for &neighbour in neighbours {
            self.load_item(neighbour, streams[neighbour].clone());
        }
    }

    fn load_item(&mut self, index: usize, item: Arc<PlayQueueItem>) {
        let Some(slot) = self.playlist.get(index) else {
            return;
        };
        if self.is_loading(&item) || !slot.should_be_replaced_with(&item, self.now()) {
            return;
        }

        debug!(index, url = redact_url(item.url()), "Loading media source");
        self.loading.push(item.clone());
        self.loaders.spawn(load_source(
            item,
            self.listener.clone(),
            self.clock.clone(),
            self.config.clone(),
        ));
    }

    fn is_loading(&self, item: &Arc<PlayQueueItem>) -> bool {
        self.loading.iter().any(|loading| Arc::ptr_eq(loading, item))
    }

    /// Abort every loader when too many are in flight and none of them is
    /// working on the current item.
    fn evict_loaders(&mut self, current: &Arc<PlayQueueItem>) {
        if self.loaders.len() <= self.config.loader_limit() || self.is_loading(current) {
            return;
        }
        debug!(count = self.loaders.len(), "Evicting outstanding media source loaders");
        drop(std::mem::take(&mut self.loaders));
        self.loading.clear();
    }

    fn on_loader_finished(&mut self, joined: std::result::Result<LoadOutcome, JoinError>) {
        let LoadOutcome { item, source } = match joined {
            Ok(outcome) => outcome,
            Err(err) if err.is_cancelled() => return,
            Err(err) => {
                // The panicking loader's item is unknown; forget all of them
                // so the next pass can start over.
                error!(error = %err, "Media source loader panicked");
                self.loading.clear();
                return;
            }
        };
        self.loading.retain(|loading| !Arc::ptr_eq(loading, &item));

        let url = redact_url(item.url()).to_string();
        let Some(index) = self.queue.index_of(&item) else {
            debug!(url = %url, "Dropping media source for removed item");
            return;
        };
        let wanted = self
            .playlist
            .get(index)
            .is_some_and(|slot| slot.should_be_replaced_with(&item, self.now()));
        if !wanted {
            debug!(index, url = %url, "Dropping stale media source");
            return;
        }

        match &source {
            ManagedMediaSource::Failed { error, retry_at, .. } => {
                warn!(index, url = %url, error = %error, "Media source failed to load");
                self.emit(CoreEvent::Source(SourceEvent::Failed {
                    index,
                    url,
                    message: error.to_string(),
                    retryable: retry_at.is_some(),
                }));
            }
            _ => {
                debug!(index, url = %url, "Media source loaded");
                self.emit(CoreEvent::Source(SourceEvent::Loaded { index, url }));
            }
        }

        self.playlist.update(index, source);
        if let Some(slot) = self.playlist.get(index) {
            self.listener.on_source_updated(index, slot);
        }
        self.maybe_synchronize();
    }

    // ------------------------------------------------------------------------
    // Player gate
    // ------------------------------------------------------------------------

    /// Unblock and sync once the current slot holds a result for the
    /// current item. A failed current slot only produces a degraded sync
    /// when playback is already running.
    fn maybe_synchronize(&mut self) {
        if !self.is_ready() || self.playlist.len() != self.queue.len() {
            return;
        }
        let Some((index, item)) = self.queue.cursor() else {
            return;
        };
        let Some(slot) = self.playlist.get(index) else {
            return;
        };
        if !slot.is_stream_equal(&item) {
            return;
        }

        match slot {
            ManagedMediaSource::Loaded { info, .. } => {
                let info = info.clone();
                self.unblock();
                self.sync(index, item, Some(info));
            }
            ManagedMediaSource::Failed { .. } if !self.is_blocked => {
                self.sync(index, item, None);
            }
            _ => {}
        }
    }

    fn block(&mut self) {
        if self.is_blocked {
            return;
        }
        debug!("Blocking playback");
        self.listener.block();
        self.is_blocked = true;
        self.synced = None;
        self.emit(CoreEvent::Session(SessionEvent::Blocked));
    }

    fn unblock(&mut self) {
        if !self.is_blocked {
            return;
        }
        let playlist_len = self.playlist.len();
        info!(playlist_len, "Unblocking playback");
        self.listener.unblock(self.playlist.snapshot());
        self.is_blocked = false;
        self.emit(CoreEvent::Session(SessionEvent::Unblocked { playlist_len }));
    }

    fn sync(&mut self, index: usize, item: Arc<PlayQueueItem>, info: Option<Arc<StreamInfo>>) {
        if self
            .synced
            .as_ref()
            .is_some_and(|synced| Arc::ptr_eq(synced, &item))
        {
            return;
        }

        let url = redact_url(item.url()).to_string();
        let degraded = info.is_none();
        info!(index, url = %url, degraded, "Syncing player to queue item");
        self.synced = Some(item.clone());
        self.listener.sync(item, info);
        self.emit(CoreEvent::Session(SessionEvent::Synced {
            index,
            url,
            degraded,
        }));
    }

    fn shutdown(&mut self) {
        info!("Play queue is empty and complete, shutting down playback");
        self.is_shut_down = true;
        self.listener.shutdown();
        self.emit(CoreEvent::Session(SessionEvent::Shutdown));
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn emit(&self, event: CoreEvent) {
        if let Some(bus) = &self.event_bus {
            // No subscribers is not an error.
            let _ = bus.emit(event);
        }
    }

    fn publish_status(&self) {
        self.status.send_replace(ManagerStatus {
            is_blocked: self.is_blocked,
            playlist_len: self.playlist.len(),
            synced_url: self.synced.as_ref().map(|item| item.url().to_string()),
            loading: self.loading.len(),
            is_shut_down: self.is_shut_down,
        });
    }
}

// ============================================================================
// Loader
// ============================================================================

/// Resolve one item into a slot value. Never fails; failures become
/// [`ManagedMediaSource::Failed`].
async fn load_source(
    item: Arc<PlayQueueItem>,
    listener: Arc<dyn PlaybackListener>,
    clock: Arc<dyn Clock>,
    config: Arc<ManagerConfig>,
) -> LoadOutcome {
    let result = match item.resolve().await {
        Ok(info) => match listener.source_of(&item, &info).await {
            Some(source) => Ok((info, source)),
            None => Err(PlaybackError::NoPlayableSource(
                redact_url(item.url()).to_string(),
            )),
        },
        Err(err) => Err(err),
    };

    let now = clock.now();
    let source = match result {
        Ok((info, source)) => ManagedMediaSource::Loaded {
            item: item.clone(),
            info,
            source,
            expires_at: deadline_after(now, config.source_expiration),
        },
        Err(error) => {
            let retry_at = (config.retry_source_errors || !error.is_source_error())
                .then(|| deadline_after(now, config.failed_retry_delay));
            ManagedMediaSource::Failed {
                item: item.clone(),
                error,
                retry_at,
            }
        }
    };

    LoadOutcome { item, source }
}

fn deadline_after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Queue positions a load pass covers, current index first.
///
/// The window spans `window` items on each side of `index`, clipped to the
/// queue. With `wrap`, the part of the right-hand side that runs past the
/// end continues from the start of the queue.
pub fn window_indices(index: usize, size: usize, window: usize, wrap: bool) -> Vec<usize> {
    if index >= size {
        return Vec::new();
    }

    let left = index.saturating_sub(window);
    let right_limit = index + window + 1;
    let right = right_limit.min(size);

    let mut indices = vec![index];
    indices.extend((left..right).filter(|&i| i != index));

    if wrap && right_limit > size {
        let excess = (right_limit - size).min(size);
        for i in 0..excess {
            if !indices.contains(&i) {
                indices.push(i);
            }
        }
    }
    indices
}
