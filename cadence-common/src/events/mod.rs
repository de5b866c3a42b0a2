//! Event types for the Cadence event system
//!
//! Provides the shared event definitions and the EventBus used by the engine
//! to notify observers. Observers never drive the engine through events; the
//! bus is one-way.

mod playback_types;

pub use playback_types::{EngineStatus, EnrichmentStage};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Cadence event types
///
/// Events are broadcast via EventBus and can be serialized for logging or
/// forwarding to a UI process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// Metadata of an entry changed
    ///
    /// Emitted by the primary worker after a parse and by the secondary
    /// worker after a fetch.
    ItemChanged {
        /// Entry whose metadata changed
        entry_id: Uuid,
        /// Which enrichment stage produced the change
        stage: EnrichmentStage,
        /// When the change happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Entry was deleted after its removal flag was honored
    ItemDeleted {
        /// Deleted entry
        entry_id: Uuid,
        /// When the entry was deleted
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A new session started for an entry
    PlaylistCurrent {
        /// Entry now being played
        entry_id: Uuid,
        /// When the session was created
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Activity counter changed
    ///
    /// Enrichment workers throttle themselves on this value.
    ActivityChanged {
        /// New activity value
        activity: i64,
        /// When the value changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Engine status changed (Running ↔ Stopped)
    StatusChanged {
        /// Status before change
        old_status: EngineStatus,
        /// Status after change
        new_status: EngineStatus,
        /// When status changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Play-and-exit reached the end of the playlist
    TerminationRequested {
        /// When termination was requested
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl EngineEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            EngineEvent::ItemChanged { .. } => "ItemChanged",
            EngineEvent::ItemDeleted { .. } => "ItemDeleted",
            EngineEvent::PlaylistCurrent { .. } => "PlaylistCurrent",
            EngineEvent::ActivityChanged { .. } => "ActivityChanged",
            EngineEvent::StatusChanged { .. } => "StatusChanged",
            EngineEvent::TerminationRequested { .. } => "TerminationRequested",
        }
    }

    /// Entry this event refers to, if any
    pub fn entry_id(&self) -> Option<Uuid> {
        match self {
            EngineEvent::ItemChanged { entry_id, .. }
            | EngineEvent::ItemDeleted { entry_id, .. }
            | EngineEvent::PlaylistCurrent { entry_id, .. } => Some(*entry_id),
            _ => None,
        }
    }
}

/// Event distribution bus
///
/// Thin wrapper over `tokio::sync::broadcast`. Sending never blocks, so the
/// bus is safe to use from the engine's std threads. Slow subscribers lose
/// the oldest events once `capacity` is exceeded.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use cadence_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: EngineEvent,
    ) -> Result<usize, broadcast::error::SendError<EngineEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
