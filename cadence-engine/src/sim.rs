//! Simulated session backend
//!
//! Sessions advance on wall-clock time instead of decoding anything:
//!
//! ```text
//! Initializing ──init──▶ Running ──track──▶ Ended
//!        stop requested ─▶ Stopping ──stop/2──▶ Dying ──stop/2──▶ Dead
//! ```
//!
//! A local file that does not exist errors right after initialization.
//! Video entries get a visual output, and every session gets a stream output
//! when configured. Outputs left over by a previous session are adopted
//! before new ones are created; `destroy` hands the session's outputs back
//! to the engine, where the collector finds them.

use crate::config::SimulationConfig;
use crate::entry::EntryRef;
use crate::error::Result;
use crate::gc::{OutputResource, Owner, ResourceKind, ResourceRegistry};
use crate::local::uri_to_path;
use crate::session::{Session, SessionFactory, SessionId, SessionState};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Extensions that get a visual output
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "webm", "mov"];

fn is_video(uri: &str) -> bool {
    Path::new(uri)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn is_missing_local_file(uri: &str) -> bool {
    uri_to_path(uri).is_some_and(|path| !path.exists())
}

/// Output created by a simulated session
#[derive(Debug)]
pub struct SimOutput {
    kind: ResourceKind,
}

impl OutputResource for SimOutput {
    fn destroy(self: Box<Self>) {
        debug!(kind = %self.kind, "output destroyed");
    }
}

/// Creates [`SimulatedSession`]s wired to a resource registry
pub struct SimulatedSessionFactory {
    registry: Arc<ResourceRegistry>,
    config: SimulationConfig,
}

impl SimulatedSessionFactory {
    pub fn new(registry: Arc<ResourceRegistry>, config: SimulationConfig) -> Self {
        Self { registry, config }
    }

    fn attach_output(&self, kind: ResourceKind, session: SessionId) {
        if self.registry.adopt(kind, session).is_none() {
            self.registry
                .register(kind, Owner::Session(session), Box::new(SimOutput { kind }));
        }
    }
}

impl SessionFactory for SimulatedSessionFactory {
    fn create_session(&self, entry: EntryRef) -> Result<Box<dyn Session>> {
        let id = Uuid::new_v4();
        if is_video(entry.uri()) {
            self.attach_output(ResourceKind::Visual, id);
        }
        if self.config.stream_output {
            self.attach_output(ResourceKind::Stream, id);
        }

        info!(session = %id, uri = entry.uri(), "session started");
        Ok(Box::new(SimulatedSession {
            id,
            started: Instant::now(),
            stop_requested: Mutex::new(None),
            fails: is_missing_local_file(entry.uri()),
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
        }))
    }
}

/// Session whose state is a function of elapsed time
pub struct SimulatedSession {
    id: SessionId,
    started: Instant,
    stop_requested: Mutex<Option<Instant>>,
    fails: bool,
    registry: Arc<ResourceRegistry>,
    config: SimulationConfig,
}

impl SimulatedSession {
    fn state_at(&self, now: Instant) -> SessionState {
        if let Some(requested) = *self.stop_requested.lock().unwrap() {
            let stop = Duration::from_millis(self.config.stop_ms);
            let elapsed = now.saturating_duration_since(requested);
            return if elapsed >= stop {
                SessionState::Dead
            } else if elapsed >= stop / 2 {
                SessionState::Dying
            } else {
                SessionState::Stopping
            };
        }

        let elapsed = now.saturating_duration_since(self.started);
        let init = Duration::from_millis(self.config.init_ms);
        if elapsed < init {
            SessionState::Initializing
        } else if self.fails {
            SessionState::Errored
        } else if elapsed < init + Duration::from_millis(self.config.track_ms) {
            SessionState::Running
        } else {
            SessionState::Ended
        }
    }
}

impl Session for SimulatedSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn state(&self) -> SessionState {
        self.state_at(Instant::now())
    }

    fn request_stop(&self) {
        let mut requested = self.stop_requested.lock().unwrap();
        if requested.is_none() {
            debug!(session = %self.id, "stop requested");
            *requested = Some(Instant::now());
        }
    }

    fn destroy(self: Box<Self>) {
        thread::sleep(Duration::from_millis(self.config.destroy_ms));
        let released = self.registry.release_session(self.id);
        info!(session = %self.id, released, "session destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;

    fn config() -> SimulationConfig {
        SimulationConfig {
            init_ms: 10,
            track_ms: 20,
            stop_ms: 20,
            destroy_ms: 0,
            stream_output: false,
        }
    }

    fn session(uri: &str, config: SimulationConfig) -> (Arc<ResourceRegistry>, Box<dyn Session>) {
        let registry = Arc::new(ResourceRegistry::new());
        let factory = SimulatedSessionFactory::new(Arc::clone(&registry), config);
        let session = factory.create_session(Entry::new(uri)).unwrap();
        (registry, session)
    }

    #[test]
    fn test_timeline_without_stop() {
        let registry = Arc::new(ResourceRegistry::new());
        let sim = SimulatedSession {
            id: Uuid::new_v4(),
            started: Instant::now(),
            stop_requested: Mutex::new(None),
            fails: false,
            registry,
            config: config(),
        };
        let t0 = sim.started;
        assert_eq!(sim.state_at(t0), SessionState::Initializing);
        assert_eq!(sim.state_at(t0 + Duration::from_millis(15)), SessionState::Running);
        assert_eq!(sim.state_at(t0 + Duration::from_millis(40)), SessionState::Ended);
    }

    #[test]
    fn test_stop_leads_to_dead() {
        let (_, session) = session("http://radio/live", config());
        session.request_stop();
        assert_eq!(session.state(), SessionState::Stopping);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(session.state(), SessionState::Dead);
    }

    #[test]
    fn test_missing_file_errors_after_init() {
        let (_, session) = session("/nope/missing.ogg", config());
        thread::sleep(Duration::from_millis(15));
        assert_eq!(session.state(), SessionState::Errored);
    }

    #[test]
    fn test_outputs_are_released_then_adopted() {
        let mut config = config();
        config.stream_output = true;
        let registry = Arc::new(ResourceRegistry::new());
        let factory = SimulatedSessionFactory::new(Arc::clone(&registry), config);

        let first = factory.create_session(Entry::new("http://x/clip.mp4")).unwrap();
        assert_eq!(registry.count(ResourceKind::Visual), 1);
        assert_eq!(registry.count(ResourceKind::Stream), 1);
        first.destroy();

        let second = factory.create_session(Entry::new("http://x/other.mkv")).unwrap();
        assert_eq!(registry.count(ResourceKind::Visual), 1);
        assert_eq!(registry.count(ResourceKind::Stream), 1);
        assert!(registry.adopt(ResourceKind::Visual, Uuid::new_v4()).is_none());
        drop(second);
    }

    #[test]
    fn test_audio_gets_no_visual_output() {
        let (registry, _session) = session("http://x/track.ogg", config());
        assert_eq!(registry.count(ResourceKind::Visual), 0);
        assert_eq!(registry.count(ResourceKind::Stream), 0);
    }
}
