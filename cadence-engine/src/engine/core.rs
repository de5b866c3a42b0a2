//! Core engine - state, construction and requests
//!
//! **Responsibilities:**
//! - Engine struct definition and initialization
//! - Playback requests (play, stop, next, play_entry) recorded for the control loop
//! - Entry removal (immediate, or deferred while the entry is playing)
//! - Status accessors

use crate::activity::ActivityCounter;
use crate::entry::{EntryId, EntryRef};
use crate::gc::{GcDeadlines, ResourceCollector, ResourceTree};
use crate::playlist::PlaylistSource;
use crate::session::{SessionFactory, SessionHandle, SessionState};
use crate::terminator::Terminator;
use cadence_common::events::{EngineEvent, EngineStatus, EventBus};
use cadence_common::time;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Pending playback request, consumed by the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayRequest {
    /// Status the engine should end up in
    pub status: EngineStatus,
    /// Entry to start instead of the playlist's next one
    pub target: Option<EntryId>,
}

/// Engine policy knobs
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Raise the termination signal when there is nothing left to play
    pub play_and_exit: bool,
    /// Grace window for leftover output resources
    pub gc_grace: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            play_and_exit: false,
            gc_grace: crate::gc::DEFAULT_GRACE,
        }
    }
}

/// State guarded by the engine lock
#[derive(Default)]
pub(super) struct EngineState {
    pub(super) session: Option<SessionHandle>,
    pub(super) status: EngineStatus,
    pub(super) request: Option<PlayRequest>,
    /// Entry most recently started (kept after its session ends)
    pub(super) current_entry: Option<EntryRef>,
    pub(super) deadlines: GcDeadlines,
}

/// Playback orchestration engine
///
/// Owns at most one session at a time. All state changes go through the
/// engine lock; every call that may block (session destroy, resource
/// destroy) runs with the lock released.
pub struct Engine {
    pub(super) state: Mutex<EngineState>,
    pub(super) playlist: Arc<dyn PlaylistSource>,
    pub(super) sessions: Arc<dyn SessionFactory>,
    pub(super) collector: ResourceCollector,
    pub(super) activity: Arc<ActivityCounter>,
    pub(super) events: EventBus,
    pub(super) terminator: Terminator,
    pub(super) options: EngineOptions,
}

impl Engine {
    pub fn new(
        playlist: Arc<dyn PlaylistSource>,
        sessions: Arc<dyn SessionFactory>,
        resources: Arc<dyn ResourceTree>,
        events: EventBus,
        options: EngineOptions,
    ) -> Self {
        info!(
            "Creating playback engine (play_and_exit={}, gc_grace={:?})",
            options.play_and_exit, options.gc_grace
        );
        Self {
            state: Mutex::new(EngineState::default()),
            playlist,
            sessions,
            collector: ResourceCollector::new(resources, options.gc_grace),
            activity: Arc::new(ActivityCounter::new(events.clone())),
            events,
            terminator: Terminator::new(),
            options,
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Start playing
    ///
    /// With a session already present this only flips the status, so the
    /// current entry keeps playing.
    pub fn play(&self) {
        let mut state = self.state.lock().unwrap();
        if state.session.is_some() {
            self.set_status(&mut state, EngineStatus::Running);
        } else {
            state.request = Some(PlayRequest {
                status: EngineStatus::Running,
                target: None,
            });
        }
    }

    /// Stop the current session and stay stopped
    pub fn stop(&self) {
        debug!("stop requested");
        self.state.lock().unwrap().request = Some(PlayRequest {
            status: EngineStatus::Stopped,
            target: None,
        });
    }

    /// Stop the current session and continue with the playlist's next entry
    pub fn next(&self) {
        debug!("skip requested");
        self.state.lock().unwrap().request = Some(PlayRequest {
            status: EngineStatus::Running,
            target: None,
        });
    }

    /// Stop the current session and play `entry_id`
    pub fn play_entry(&self, entry_id: EntryId) {
        debug!(%entry_id, "play entry requested");
        self.state.lock().unwrap().request = Some(PlayRequest {
            status: EngineStatus::Running,
            target: Some(entry_id),
        });
    }

    /// Remove an entry from the playlist
    ///
    /// The entry currently being played is only flagged; the control loop
    /// deletes it once its session is gone.
    pub fn remove_entry(&self, entry: &EntryRef) {
        let state = self.state.lock().unwrap();
        let playing = state.session.is_some()
            && state
                .current_entry
                .as_ref()
                .is_some_and(|current| current.id() == entry.id());
        if playing {
            debug!(entry_id = %entry.id(), "entry is playing, deferring deletion");
            entry.mark_for_removal();
            return;
        }
        drop(state);
        self.delete_entry(entry);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn status(&self) -> EngineStatus {
        self.state.lock().unwrap().status
    }

    pub fn has_session(&self) -> bool {
        self.state.lock().unwrap().session.is_some()
    }

    pub fn session_state(&self) -> Option<SessionState> {
        self.state.lock().unwrap().session.as_ref().map(|s| s.state())
    }

    pub fn current_entry(&self) -> Option<EntryRef> {
        self.state.lock().unwrap().current_entry.clone()
    }

    pub fn pending_request(&self) -> Option<PlayRequest> {
        self.state.lock().unwrap().request
    }

    pub fn gc_deadlines(&self) -> GcDeadlines {
        self.state.lock().unwrap().deadlines
    }

    pub fn activity(&self) -> Arc<ActivityCounter> {
        Arc::clone(&self.activity)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn terminator(&self) -> Terminator {
        self.terminator.clone()
    }

    // ========================================================================
    // Helpers shared by the control loop
    // ========================================================================

    pub(super) fn set_status(&self, state: &mut EngineState, status: EngineStatus) {
        if state.status == status {
            return;
        }
        let old_status = state.status;
        state.status = status;
        debug!(%old_status, new_status = %status, "status changed");
        self.events.emit_lossy(EngineEvent::StatusChanged {
            old_status,
            new_status: status,
            timestamp: time::now(),
        });
    }

    pub(super) fn delete_entry(&self, entry: &EntryRef) {
        self.playlist.delete_entry(entry);
        self.events.emit_lossy(EngineEvent::ItemDeleted {
            entry_id: entry.id(),
            timestamp: time::now(),
        });
    }
}
