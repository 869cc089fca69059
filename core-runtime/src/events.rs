//! # Event Bus System
//!
//! Typed events broadcast over `tokio::sync::broadcast` so that the sync engine
//! and the catalog store can notify observers without knowing who they are.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     emit      ┌───────────┐     subscribe    ┌────────────┐
//! │ Sync Engine ├──────────────>│           ├─────────────────>│ Progress UI│
//! └─────────────┘               │ EventBus  │                  └────────────┘
//! ┌─────────────┐     emit      │ (broadcast│     subscribe    ┌────────────┐
//! │Catalog Store├──────────────>│  channel) ├─────────────────>│ Live query │
//! └─────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! ## Event Types
//!
//! ### Sync Events
//! - `Started`, `PhaseChanged`, `Progress`, `Completed`, `Failed`, `Cancelled`
//!
//! ### Library Events
//! Invalidation notices raised after every catalog write:
//! - `EntitiesUpserted`: a batch of records was written
//! - `RelationsReplaced`: a parent's relation set changed
//! - `CursorsReset`: a resync rewound sync cursors
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus.emit(CoreEvent::Library(LibraryEvent::EntitiesUpserted {
//!     source_id: "home-server".to_string(),
//!     entity: "album".to_string(),
//!     count: 100,
//! })).ok();
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events and may continue.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.
//!
//! Emitting with no subscribers returns an error that emitters ignore with `.ok()`.

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

/// Top-level event published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Sync run lifecycle events
    Sync(SyncEvent),
    /// Catalog invalidation events
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Cancelled { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Sync(SyncEvent::Started { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// The source library the event concerns.
    pub fn source_id(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.source_id(),
            CoreEvent::Library(e) => e.source_id(),
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
// Sync Events
// ============================================================================

/// Lifecycle of one sync run against one source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    Started {
        run_id: String,
        source_id: String,
    },
    /// The engine moved to a new phase (`fetching_basic`, `fetching_dependent`, ...).
    PhaseChanged {
        run_id: String,
        source_id: String,
        phase: String,
    },
    /// Aggregate counters, emitted at phase boundaries.
    Progress {
        run_id: String,
        source_id: String,
        phase: String,
        items_fetched: u64,
        items_written: u64,
        pending_tasks: u64,
    },
    Completed {
        run_id: String,
        source_id: String,
        items_fetched: u64,
        items_written: u64,
        duration_secs: u64,
    },
    Failed {
        run_id: String,
        source_id: String,
        message: String,
        /// Whether re-running resumes from cursors
        recoverable: bool,
    },
    Cancelled {
        run_id: String,
        source_id: String,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::PhaseChanged { .. } => "Sync phase changed",
            SyncEvent::Progress { .. } => "Sync in progress",
            SyncEvent::Completed { .. } => "Sync completed successfully",
            SyncEvent::Failed { .. } => "Sync failed",
            SyncEvent::Cancelled { .. } => "Sync cancelled",
        }
    }

    fn source_id(&self) -> &str {
        match self {
            SyncEvent::Started { source_id, .. }
            | SyncEvent::PhaseChanged { source_id, .. }
            | SyncEvent::Progress { source_id, .. }
            | SyncEvent::Completed { source_id, .. }
            | SyncEvent::Failed { source_id, .. }
            | SyncEvent::Cancelled { source_id, .. } => source_id,
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Invalidation notices for view layers observing the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// A batch of records of one entity type was upserted.
    EntitiesUpserted {
        source_id: String,
        /// Entity kind in storage form (`artist`, `album_track`, ...)
        entity: String,
        count: u64,
    },
    /// The relation set of one parent changed.
    RelationsReplaced {
        source_id: String,
        /// Relation name (`playlist_tracks`, `similar_albums`)
        relation: String,
        parent_id: String,
    },
    /// Sync cursors were rewound by a resync request.
    CursorsReset {
        source_id: String,
        entity: Option<String>,
        count: u64,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::EntitiesUpserted { .. } => "Catalog records written",
            LibraryEvent::RelationsReplaced { .. } => "Catalog relations replaced",
            LibraryEvent::CursorsReset { .. } => "Sync cursors reset",
        }
    }

    fn source_id(&self) -> &str {
        match self {
            LibraryEvent::EntitiesUpserted { source_id, .. }
            | LibraryEvent::RelationsReplaced { source_id, .. }
            | LibraryEvent::CursorsReset { source_id, .. } => source_id,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for [`CoreEvent`]s. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering at most `capacity` events per subscriber.
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
// Event Stream
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A subscription with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let invalidations = EventStream::new(event_bus.subscribe())
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

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Narrow the stream to events about one source.
    pub fn for_source(self, source_id: impl Into<String>) -> Self {
        let source_id = source_id.into();
        self.filter(move |event| event.source_id() == source_id)
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once all senders are dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            match &self.filter {
                Some(filter) if !filter(&event) => continue,
                _ => return Ok(event),
            }
        }
    }

    /// Attempts to receive a matching event without waiting.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => match &self.filter {
                    Some(filter) if !filter(&event) => continue,
                    _ => return Some(Ok(event)),
                },
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

    fn upserted(source_id: &str, count: u64) -> CoreEvent {
        CoreEvent::Library(LibraryEvent::EntitiesUpserted {
            source_id: source_id.to_string(),
            entity: "album".to_string(),
            count,
        })
    }

    #[tokio::test]
    async fn test_emission_without_subscribers_is_an_error() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(upserted("src", 1)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Sync(SyncEvent::Started {
            run_id: "run-1".to_string(),
            source_id: "src".to_string(),
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|event| matches!(event, CoreEvent::Sync(_)));

        bus.emit(upserted("src", 3)).ok();
        let sync_event = CoreEvent::Sync(SyncEvent::Cancelled {
            run_id: "run-1".to_string(),
            source_id: "src".to_string(),
        });
        bus.emit(sync_event.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), sync_event);
    }

    #[tokio::test]
    async fn test_event_stream_for_source() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe()).for_source("b");

        bus.emit(upserted("a", 1)).ok();
        bus.emit(upserted("b", 2)).ok();

        assert_eq!(stream.recv().await.unwrap(), upserted("b", 2));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(upserted("src", i)).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
        assert!(sub.recv().await.is_ok());
    }

    #[test]
    fn test_severity_and_description() {
        let failed = CoreEvent::Sync(SyncEvent::Failed {
            run_id: "run-1".to_string(),
            source_id: "src".to_string(),
            message: "album listing failed".to_string(),
            recoverable: true,
        });
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert_eq!(failed.description(), "Sync failed");
        assert_eq!(upserted("src", 1).severity(), EventSeverity::Debug);
        assert_eq!(upserted("src", 1).source_id(), "src");
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = CoreEvent::Library(LibraryEvent::RelationsReplaced {
            source_id: "src".to_string(),
            relation: "playlist_tracks".to_string(),
            parent_id: "pl-1".to_string(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Library");
        assert_eq!(json["payload"]["event"], "RelationsReplaced");

        let parsed: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }
}
