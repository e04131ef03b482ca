//! # Event Bus System
//!
//! Typed events for the player core, broadcast over `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: [`PlaybackEvent`] and [`LibraryEvent`] wrapped in [`CoreEvent`]
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐    emit    ┌───────────┐
//! │ Track resolver   ├───────────>│           │
//! └──────────────────┘            │           │   subscribe   ┌────────────┐
//! ┌──────────────────┐    emit    │ EventBus  ├──────────────>│ UI / toast │
//! │ Queue controller ├───────────>│ (broadcast│               └────────────┘
//! └──────────────────┘            │  channel) │   subscribe   ┌────────────┐
//! ┌──────────────────┐    emit    │           ├──────────────>│ Subscriber │
//! │ Favorites store  ├───────────>│           │               └────────────┘
//! └──────────────────┘            └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Playback(PlaybackEvent::ResolutionFailed {
//!         index: 2,
//!         song_id: "1001".to_string(),
//!         reason: "no audio stream".to_string(),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Could not get play address, skipping");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; keep receiving.
//! - **`RecvError::Closed`**: every sender is gone; treat as shutdown.
//!
//! Emitting with no subscribers returns `Err`; publishers in this workspace
//! ignore that result.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published through the [`EventBus`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Queue and resolution events
    Playback(PlaybackEvent),
    /// Favorites store events
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::QueueExhausted { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::ResolutionFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::TrackStarted { .. }) => EventSeverity::Info,
            CoreEvent::Library(LibraryEvent::DataImported { .. }) => EventSeverity::Info,
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
// Playback Events
// ============================================================================

/// Events emitted by the resolver and the queue controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A placeholder entry was replaced by a playable URL.
    TrackResolved {
        index: usize,
        song_id: String,
    },
    /// A placeholder could not be resolved; the controller moves on.
    ResolutionFailed {
        index: usize,
        song_id: String,
        reason: String,
    },
    /// Playback was started at `index`.
    TrackStarted {
        index: usize,
        song_id: String,
        title: String,
    },
    /// Every position was tried and none could be resolved.
    QueueExhausted {
        attempted: usize,
    },
    /// The whole queue was replaced.
    QueueReplaced {
        length: usize,
    },
    /// Play mode changed (`order`, `shuffle`, `singleLoop`, `listLoop`).
    PlayModeChanged {
        mode: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TrackResolved { .. } => "Track resolved",
            PlaybackEvent::ResolutionFailed { .. } => "Could not get play address, skipping",
            PlaybackEvent::TrackStarted { .. } => "Playback started",
            PlaybackEvent::QueueExhausted { .. } => "No playable track in queue",
            PlaybackEvent::QueueReplaced { .. } => "Queue replaced",
            PlaybackEvent::PlayModeChanged { .. } => "Play mode changed",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Events emitted by the favorites store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    FavListCreated {
        list_id: String,
        title: String,
    },
    FavListUpdated {
        list_id: String,
        song_count: usize,
    },
    FavListDeleted {
        list_id: String,
    },
    /// A backup was merged into the store.
    DataImported {
        lists_created: usize,
        lists_merged: usize,
        songs_added: usize,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::FavListCreated { .. } => "Favorite list created",
            LibraryEvent::FavListUpdated { .. } => "Favorite list updated",
            LibraryEvent::FavListDeleted { .. } => "Favorite list deleted",
            LibraryEvent::DataImported { .. } => "Backup imported",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; every `subscribe()` creates an
/// independent receiver that sees events emitted after it was created.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

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

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let library_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Library(_)));
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

    /// Only events matching `predicate` are returned by `recv()`/`try_recv()`.
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

    /// Returns `None` if no matching event is currently available.
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
