//! Control loop step
//!
//! [`Engine::step`] is called repeatedly by the control thread. Each call
//! looks at the current session once and takes exactly one action:
//!
//! | session         | action                                              |
//! |-----------------|-----------------------------------------------------|
//! | Dead            | clear it, destroy it unlocked, honor removal flag   |
//! | Stopping/Dying  | nothing                                             |
//! | Ended/Errored   | request stop                                        |
//! | Running         | sweep leftover resources (grace window applies)     |
//! | Initializing    | nothing                                             |
//! | none            | start the next entry, or collect leftovers now      |

use super::core::{Engine, EngineState};
use crate::activity::SESSION_ACTIVITY;
use crate::entry::{EntryId, EntryRef};
use crate::gc::{Deadline, GcDeadlines, ResourceKind};
use crate::session::{SessionHandle, SessionState};
use cadence_common::events::{EngineEvent, EngineStatus};
use cadence_common::time;
use std::sync::MutexGuard;
use std::time::Instant;
use tracing::{debug, info, warn};

impl Engine {
    /// Run one control loop iteration
    pub fn step(&self) {
        let mut state = self.state.lock().unwrap();

        // An incoming request first stops whatever is playing
        if state.request.is_some() {
            if let Some(session) = &state.session {
                if session.state().accepts_stop() {
                    debug!("incoming request - stopping current session");
                    session.request_stop();
                }
            }
        }

        let Some(session_state) = state.session.as_ref().map(|s| s.state()) else {
            self.step_without_session(state);
            return;
        };

        match session_state {
            SessionState::Dead => {
                debug!("dead session");
                let handle = state.session.take();
                // destroy() may take a while: never hold the engine lock across it
                drop(state);
                if let Some(handle) = handle {
                    self.teardown(handle);
                }
            }
            SessionState::Stopping | SessionState::Dying => {
                debug!("dying session");
            }
            SessionState::Ended | SessionState::Errored => {
                debug!(state = %session_state, "finished session");
                if let Some(session) = &state.session {
                    session.request_stop();
                }
            }
            SessionState::Running => {
                let deadlines = state.deadlines;
                drop(state);
                let deadlines = self.sweep_all(deadlines, |kind, deadline| {
                    self.collector.sweep(kind, deadline, Instant::now())
                });
                self.state.lock().unwrap().deadlines = deadlines;
            }
            SessionState::Initializing => {}
        }
    }

    /// Destroy a dead session and settle what it leaves behind
    pub(super) fn teardown(&self, handle: SessionHandle) {
        let session_id = handle.id();
        let entry_id = handle.entry_id();
        if let Err(handle) = handle.destroy() {
            // Only dead sessions are destroyed; put it back and retry next step
            warn!(%session_id, state = %handle.state(), "session not dead, teardown postponed");
            self.state.lock().unwrap().session = Some(handle);
            return;
        }
        debug!(%session_id, %entry_id, "session destroyed");

        let deleted = {
            let mut state = self.state.lock().unwrap();
            state.deadlines.reset();
            let deleted = Self::take_removed_entry(&mut state, Some(entry_id));
            if let (Some(_), Some(request)) = (&deleted, state.request.as_mut()) {
                // A request cannot target the entry being deleted
                if request.target == Some(entry_id) {
                    request.target = None;
                }
            }
            deleted
        };

        if let Some(entry) = deleted {
            debug!(entry_id = %entry.id(), uri = entry.uri(), "entry was marked for deletion, deleting");
            self.delete_entry(&entry);
        }
        self.activity.add(-SESSION_ACTIVITY);
    }

    fn step_without_session(&self, mut state: MutexGuard<'_, EngineState>) {
        let wants_play = match &state.request {
            None => state.status == EngineStatus::Running,
            Some(request) => request.status == EngineStatus::Running,
        };

        let request = state.request.take();
        if let Some(request) = request {
            self.set_status(&mut state, request.status);
        }

        if wants_play {
            debug!("starting new entry");
            let entry = request
                .and_then(|r| r.target)
                .and_then(|id| {
                    let selected = self.playlist.select(id);
                    if selected.is_none() {
                        debug!(entry_id = %id, "requested entry is gone, using next entry");
                    }
                    selected
                })
                .or_else(|| self.playlist.next_entry());

            match entry {
                Some(entry) => self.start_session(state, entry),
                None => self.nothing_to_play(&mut state),
            }
            return;
        }

        // Nothing to play: settle the last entry and collect leftovers now
        let deleted = Self::take_removed_entry(&mut state, None);
        drop(state);
        if let Some(entry) = deleted {
            debug!(entry_id = %entry.id(), "deleting entry marked for deletion");
            self.delete_entry(&entry);
        }

        let deadlines = self.sweep_all(GcDeadlines::default(), |kind, _| {
            self.collector.sweep(kind, Deadline::Due, Instant::now())
        });
        self.state.lock().unwrap().deadlines = deadlines;
    }

    fn start_session(&self, mut state: MutexGuard<'_, EngineState>, entry: EntryRef) {
        let entry_id = entry.id();
        match self.sessions.create_session(entry.clone()) {
            Ok(session) => {
                let handle = SessionHandle::new(session, entry_id);
                debug!(%entry_id, session_id = %handle.id(), uri = entry.uri(), "session created");
                state.session = Some(handle);
                state.current_entry = Some(entry);
                self.set_status(&mut state, EngineStatus::Running);
                drop(state);

                self.activity.add(SESSION_ACTIVITY);
                self.events.emit_lossy(EngineEvent::PlaylistCurrent {
                    entry_id,
                    timestamp: time::now(),
                });
            }
            Err(e) => {
                // Reported like an exhausted playlist
                warn!(%entry_id, uri = entry.uri(), "failed to create session: {}", e);
                self.nothing_to_play(&mut state);
            }
        }
    }

    fn nothing_to_play(&self, state: &mut EngineState) {
        debug!("nothing to play");
        if self.options.play_and_exit && !self.terminator.is_requested() {
            info!("end of playlist, exiting");
            self.terminator.request();
            self.events.emit_lossy(EngineEvent::TerminationRequested {
                timestamp: time::now(),
            });
        }
        self.set_status(state, EngineStatus::Stopped);
    }

    /// Take the current entry if it waits for deletion
    ///
    /// With `played`, only the entry the destroyed session was playing
    /// qualifies.
    fn take_removed_entry(state: &mut EngineState, played: Option<EntryId>) -> Option<EntryRef> {
        if state.current_entry.as_ref().is_some_and(|e| {
            e.is_marked_for_removal() && played.map_or(true, |id| id == e.id())
        }) {
            state.current_entry.take()
        } else {
            None
        }
    }

    /// Sweep both resource kinds, stream outputs first
    fn sweep_all<F>(&self, mut deadlines: GcDeadlines, mut sweep: F) -> GcDeadlines
    where
        F: FnMut(ResourceKind, Deadline) -> Deadline,
    {
        for kind in [ResourceKind::Stream, ResourceKind::Visual] {
            let next = sweep(kind, deadlines.get(kind));
            deadlines.set(kind, next);
        }
        deadlines
    }
}
