//! Playback sessions
//!
//! A session is one attempt to play one entry. Its state machine belongs to
//! the session backend; the engine only observes it:
//!
//! ```text
//! Initializing → Running → {Ended, Errored, Stopping} → Dying → Dead
//! ```
//!
//! The engine owns at most one [`SessionHandle`]. Destroying a handle
//! consumes it, and is refused unless the session reports `Dead`.

use crate::entry::{EntryId, EntryRef};
use crate::error::Result;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Session identifier
pub type SessionId = Uuid;

/// Observed session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Opening the input
    Initializing,
    /// Playing
    Running,
    /// Reached end of stream
    Ended,
    /// Failed while playing
    Errored,
    /// Stop requested, not yet acknowledged
    Stopping,
    /// Tearing itself down
    Dying,
    /// Terminal: safe to destroy
    Dead,
}

impl SessionState {
    /// Stop already requested or in progress
    pub fn is_dying(self) -> bool {
        matches!(self, SessionState::Stopping | SessionState::Dying)
    }

    /// Active and still accepting a stop request
    pub fn accepts_stop(self) -> bool {
        !self.is_dying() && self != SessionState::Dead
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Initializing => "initializing",
            SessionState::Running => "running",
            SessionState::Ended => "ended",
            SessionState::Errored => "errored",
            SessionState::Stopping => "stopping",
            SessionState::Dying => "dying",
            SessionState::Dead => "dead",
        };
        f.write_str(name)
    }
}

/// One playback attempt, provided by a session backend
pub trait Session: Send {
    fn id(&self) -> SessionId;

    fn state(&self) -> SessionState;

    /// Ask the session to stop. Must not block.
    fn request_stop(&self);

    /// Release everything the session holds. May block for a long time.
    fn destroy(self: Box<Self>);
}

/// Creates sessions for entries
pub trait SessionFactory: Send + Sync {
    fn create_session(&self, entry: EntryRef) -> Result<Box<dyn Session>>;
}

/// Exclusively owned session plus the entry it plays
pub struct SessionHandle {
    session: Box<dyn Session>,
    entry_id: EntryId,
}

impl SessionHandle {
    pub fn new(session: Box<dyn Session>, entry_id: EntryId) -> Self {
        Self { session, entry_id }
    }

    pub fn id(&self) -> SessionId {
        self.session.id()
    }

    /// Lookup key of the entry being played
    pub fn entry_id(&self) -> EntryId {
        self.entry_id
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn request_stop(&self) {
        self.session.request_stop();
    }

    /// Destroy a dead session
    ///
    /// Returns the handle untouched if the session is not `Dead`.
    pub fn destroy(self) -> std::result::Result<(), SessionHandle> {
        if self.state() != SessionState::Dead {
            return Err(self);
        }
        self.session.destroy();
        Ok(())
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id())
            .field("entry_id", &self.entry_id)
            .field("state", &self.state())
            .finish()
    }
}
