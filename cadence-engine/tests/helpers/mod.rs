//! Test helpers for cadence-engine integration tests
//!
//! Provides recording doubles for every engine collaborator:
//! - ScriptedSession / ScriptedFactory: sessions whose state the test sets
//! - RecordingParser / RecordingFetcher: enrichment calls in order
//! - CountedResource: output resource that counts its destruction
//! - TestRig: engine wired to all of the above

#![allow(dead_code)]

use cadence_common::events::{EngineEvent, EventBus};
use cadence_engine::enrichment::{MetaFetcher, Preparser};
use cadence_engine::entry::{Entry, EntryId, EntryRef};
use cadence_engine::gc::{OutputResource, ResourceRegistry, ResourceTree};
use cadence_engine::playlist::{MemoryPlaylist, PlaylistSource};
use cadence_engine::session::{Session, SessionFactory, SessionId, SessionState};
use cadence_engine::{Engine, EngineOptions, Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

// ============================================================================
// Sessions
// ============================================================================

type DestroyHook = Box<dyn Fn() + Send + Sync>;

/// Shared view of one scripted session
pub struct SessionScript {
    pub id: SessionId,
    pub entry_id: EntryId,
    state: Mutex<SessionState>,
    stop_requests: AtomicUsize,
    destroyed: AtomicUsize,
    /// State entered on the first stop request (`None`: unchanged)
    pub state_on_stop: Option<SessionState>,
    on_destroy: Mutex<Option<DestroyHook>>,
}

impl SessionScript {
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    pub fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn stop_requests(&self) -> usize {
        self.stop_requests.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Run `hook` inside `destroy`, before it returns
    pub fn on_destroy<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_destroy.lock().unwrap() = Some(Box::new(hook));
    }
}

pub struct ScriptedSession {
    script: Arc<SessionScript>,
}

impl Session for ScriptedSession {
    fn id(&self) -> SessionId {
        self.script.id
    }

    fn state(&self) -> SessionState {
        self.script.state()
    }

    fn request_stop(&self) {
        self.script.stop_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.script.state_on_stop {
            let mut state = self.script.state.lock().unwrap();
            if state.accepts_stop() {
                *state = next;
            }
        }
    }

    fn destroy(self: Box<Self>) {
        if let Some(hook) = self.script.on_destroy.lock().unwrap().as_ref() {
            hook();
        }
        self.script.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory handing out scripted sessions and remembering them
pub struct ScriptedFactory {
    initial: Mutex<SessionState>,
    state_on_stop: Mutex<Option<SessionState>>,
    fail: AtomicBool,
    sessions: Mutex<Vec<Arc<SessionScript>>>,
}

impl Default for ScriptedFactory {
    fn default() -> Self {
        Self {
            initial: Mutex::new(SessionState::Running),
            state_on_stop: Mutex::new(Some(SessionState::Stopping)),
            fail: AtomicBool::new(false),
            sessions: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedFactory {
    pub fn set_initial_state(&self, state: SessionState) {
        *self.initial.lock().unwrap() = state;
    }

    pub fn set_state_on_stop(&self, state: Option<SessionState>) {
        *self.state_on_stop.lock().unwrap() = state;
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn sessions(&self) -> Vec<Arc<SessionScript>> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn last(&self) -> Arc<SessionScript> {
        self.sessions
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no session created")
    }

    /// Entries sessions were created for, in order
    pub fn played(&self) -> Vec<EntryId> {
        self.sessions().iter().map(|s| s.entry_id).collect()
    }
}

impl SessionFactory for ScriptedFactory {
    fn create_session(&self, entry: EntryRef) -> Result<Box<dyn Session>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Session(format!("cannot open {}", entry.uri())));
        }
        let script = Arc::new(SessionScript {
            id: Uuid::new_v4(),
            entry_id: entry.id(),
            state: Mutex::new(*self.initial.lock().unwrap()),
            stop_requests: AtomicUsize::new(0),
            destroyed: AtomicUsize::new(0),
            state_on_stop: *self.state_on_stop.lock().unwrap(),
            on_destroy: Mutex::new(None),
        });
        self.sessions.lock().unwrap().push(Arc::clone(&script));
        Ok(Box::new(ScriptedSession { script }))
    }
}

// ============================================================================
// Enrichment
// ============================================================================

/// Ordered log shared by the parser and fetcher doubles
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub struct RecordingParser {
    log: CallLog,
    delay: Duration,
}

impl RecordingParser {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(log: CallLog, delay: Duration) -> Self {
        Self { log, delay }
    }
}

impl Preparser for RecordingParser {
    fn parse(&self, entry: &Entry) -> Result<()> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.log.lock().unwrap().push(format!("parse {}", entry.uri()));
        if entry.uri().contains("broken") {
            return Err(Error::Enrichment("unreadable".to_string()));
        }
        Ok(())
    }
}

pub struct RecordingFetcher {
    log: CallLog,
}

impl RecordingFetcher {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl MetaFetcher for RecordingFetcher {
    fn fetch_meta(&self, entry: &Entry) -> Result<()> {
        self.log.lock().unwrap().push(format!("meta {}", entry.uri()));
        Ok(())
    }

    fn fetch_art(&self, entry: &Entry) -> Result<()> {
        self.log.lock().unwrap().push(format!("art {}", entry.uri()));
        Ok(())
    }
}

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

// ============================================================================
// Resources
// ============================================================================

pub struct CountedResource {
    destroyed: Arc<AtomicUsize>,
}

impl CountedResource {
    pub fn boxed(destroyed: &Arc<AtomicUsize>) -> Box<dyn OutputResource> {
        Box::new(Self {
            destroyed: Arc::clone(destroyed),
        })
    }
}

impl OutputResource for CountedResource {
    fn destroy(self: Box<Self>) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Engine rig
// ============================================================================

pub struct TestRig {
    pub engine: Arc<Engine>,
    pub playlist: Arc<MemoryPlaylist>,
    pub factory: Arc<ScriptedFactory>,
    pub registry: Arc<ResourceRegistry>,
    pub events: EventBus,
}

impl TestRig {
    /// Engine over a playlist of `uris`
    pub fn new(uris: &[&str], options: EngineOptions) -> Self {
        let playlist = Arc::new(MemoryPlaylist::new(false));
        for uri in uris {
            playlist.append(Entry::new(*uri));
        }
        let factory = Arc::new(ScriptedFactory::default());
        let registry = Arc::new(ResourceRegistry::new());
        let events = EventBus::new(256);
        let engine = Arc::new(Engine::new(
            Arc::clone(&playlist) as Arc<dyn PlaylistSource>,
            Arc::clone(&factory) as Arc<dyn SessionFactory>,
            Arc::clone(&registry) as Arc<dyn ResourceTree>,
            events.clone(),
            options,
        ));
        Self {
            engine,
            playlist,
            factory,
            registry,
            events,
        }
    }

    pub fn entry(&self, index: usize) -> EntryRef {
        self.playlist.entries()[index].clone()
    }

    pub fn steps(&self, count: usize) {
        for _ in 0..count {
            self.engine.step();
        }
    }
}

/// Everything received so far, without waiting
pub fn drain_events(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn event_types(events: &[EngineEvent]) -> Vec<String> {
    events.iter().map(|e| e.event_type().to_string()).collect()
}
