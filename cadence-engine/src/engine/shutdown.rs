//! Final teardown
//!
//! Runs on the control thread after the control loop has stopped: the
//! current session is pushed to `Dead` and destroyed, then every leftover
//! output resource is collected.

use super::core::Engine;
use crate::gc::{Deadline, GcDeadlines, ResourceKind};
use crate::session::SessionState;
use std::time::{Duration, Instant};
use tracing::{debug, info};

impl Engine {
    /// Drive the current session to `Dead` and destroy it
    ///
    /// Polls every `poll` while the session is dying. Blocks until the
    /// session backend lets go; there is no timeout.
    pub fn last_loop(&self, poll: Duration) {
        loop {
            let mut state = self.state.lock().unwrap();
            let Some(session_state) = state.session.as_ref().map(|s| s.state()) else {
                break;
            };

            match session_state {
                SessionState::Dead => {
                    let handle = state.session.take();
                    drop(state);
                    if let Some(handle) = handle {
                        self.teardown(handle);
                    }
                    continue;
                }
                SessionState::Stopping | SessionState::Dying => {}
                SessionState::Ended | SessionState::Errored => {
                    if let Some(session) = &state.session {
                        session.request_stop();
                    }
                    continue;
                }
                SessionState::Running | SessionState::Initializing => {
                    debug!("forcing current session to stop");
                    if let Some(session) = &state.session {
                        session.request_stop();
                    }
                }
            }

            drop(state);
            std::thread::sleep(poll);
        }
        debug!("no session left");
    }

    /// Collect every remaining output resource
    ///
    /// A due sweep per kind first, then an unconditional pass for whatever
    /// the sweep had to leave alone.
    pub fn final_collect(&self) {
        let now = Instant::now();
        let mut destroyed = 0;
        for kind in [ResourceKind::Stream, ResourceKind::Visual] {
            self.collector.sweep(kind, Deadline::Due, now);
            destroyed += self.collector.collect_all(kind);
        }
        self.state.lock().unwrap().deadlines = GcDeadlines::default();
        info!("Final resource collection done ({} destroyed regardless of owner)", destroyed);
    }
}
