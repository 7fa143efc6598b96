//! # Event Bus System
//!
//! Typed, broadcast notifications about a playback session, built on
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The media source manager talks to the player through the `PlaybackListener`
//! contract. Everything else that wants to observe a session (a queue UI, a
//! diagnostics overlay, tests) subscribes here instead:
//! - **Event Types**: [`SessionEvent`] for blocking/sync transitions and
//!   [`SourceEvent`] for per-slot resolution outcomes, wrapped in [`CoreEvent`]
//! - **EventBus**: Cloneable broadcast sender
//! - **EventStream**: Receiver wrapper with filtering
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut subscriber = bus.subscribe();
//!
//! bus.emit(CoreEvent::Session(SessionEvent::Blocked)).ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event, CoreEvent::Session(SessionEvent::Blocked));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events. Non-fatal.
//! - **`RecvError::Closed`**: every sender was dropped; the session is over.
//!
//! Emitting with no subscribers returns `Err`. Publishers treat that as a
//! no-op, since observing a session is optional.

use serde::{Deserialize, Serialize};
use std::fmt;
use core_async::sync::broadcast;

// Re-export commonly used types
pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback gating and synchronization transitions
    Session(SessionEvent),
    /// Resolution outcome for a single queue slot
    Source(SourceEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Session(e) => e.description(),
            CoreEvent::Source(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Source(SourceEvent::Failed { .. }) => EventSeverity::Warning,
            CoreEvent::Session(SessionEvent::Unblocked { .. })
            | CoreEvent::Session(SessionEvent::Shutdown) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Session Events
// ============================================================================

/// Transitions of the playback gate driven by the media source manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// Playback was halted until the current item resolves.
    Blocked,
    /// Playback resumed with a playlist of `playlist_len` slots.
    Unblocked { playlist_len: usize },
    /// The player was asked to align to the item at `index`.
    Synced {
        index: usize,
        url: String,
        /// `true` when no metadata was available for the item.
        degraded: bool,
    },
    /// The queue was asked to fetch more items.
    FetchRequested { queue_size: usize },
    /// The queue is permanently empty and playback was torn down.
    Shutdown,
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::Blocked => "Playback blocked",
            SessionEvent::Unblocked { .. } => "Playback unblocked",
            SessionEvent::Synced { .. } => "Player synced to queue item",
            SessionEvent::FetchRequested { .. } => "Queue fetch requested",
            SessionEvent::Shutdown => "Playback session shut down",
        }
    }
}

// ============================================================================
// Source Events
// ============================================================================

/// Resolution outcomes for individual playlist slots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SourceEvent {
    /// A slot now holds a playable source.
    Loaded { index: usize, url: String },
    /// A slot could not be resolved.
    Failed {
        index: usize,
        url: String,
        message: String,
        /// Whether a later load pass will retry this slot.
        retryable: bool,
    },
    /// An expired source was discarded so it can be resolved again.
    Invalidated { index: usize, url: String },
}

impl SourceEvent {
    fn description(&self) -> &str {
        match self {
            SourceEvent::Loaded { .. } => "Media source loaded",
            SourceEvent::Failed { .. } => "Media source failed",
            SourceEvent::Invalidated { .. } => "Media source invalidated",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to session events.
///
/// Clones share the same channel. Each `subscribe()` creates an independent
/// receiver that sees every event emitted after it was created.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` that skips events rejected by a filter.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(100);
/// let failures = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Source(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching events are currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(index: usize) -> CoreEvent {
        CoreEvent::Source(SourceEvent::Loaded {
            index,
            url: format!("https://example.com/watch?v={}", index),
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(CoreEvent::Session(SessionEvent::Blocked)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Session(SessionEvent::Unblocked { playlist_len: 3 });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_filter_skips_non_matching() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Source(_)));

        bus.emit(CoreEvent::Session(SessionEvent::Blocked)).ok();
        bus.emit(loaded(1)).ok();

        assert_eq!(stream.recv().await.unwrap(), loaded(1));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_event_stream_reports_lag() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());

        for index in 0..5 {
            bus.emit(loaded(index)).ok();
        }

        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Lagged(_)))));
        assert!(matches!(stream.try_recv(), Some(Ok(_))));
    }

    #[tokio::test]
    async fn test_event_stream_closed() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());
        drop(bus);
        assert!(matches!(stream.recv().await, Err(RecvError::Closed)));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Source(SourceEvent::Failed {
            index: 0,
            url: "https://example.com/a".to_string(),
            message: "timeout".to_string(),
            retryable: true,
        });
        assert_eq!(failed.severity(), EventSeverity::Warning);
        assert_eq!(
            CoreEvent::Session(SessionEvent::Shutdown).severity(),
            EventSeverity::Info
        );
        assert_eq!(loaded(0).severity(), EventSeverity::Debug);
        assert!(EventSeverity::Error > EventSeverity::Warning);
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = CoreEvent::Session(SessionEvent::Synced {
            index: 2,
            url: "https://example.com/c".to_string(),
            degraded: false,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Session");
        assert_eq!(json["payload"]["event"], "Synced");
        assert_eq!(json["payload"]["index"], 2);

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.description(), "Player synced to queue item");
    }
}
