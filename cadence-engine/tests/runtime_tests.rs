//! Threaded runtime and shutdown sequence tests

mod helpers;

use cadence_common::events::EngineStatus;
use cadence_engine::enrichment::{Enrichment, EnrichmentOptions};
use cadence_engine::entry::{EnrichmentStatus, Entry, EntryRef};
use cadence_engine::gc::{Owner, ResourceKind};
use cadence_engine::session::SessionState;
use cadence_engine::{EngineOptions, EngineRuntime, RuntimeTimings};
use helpers::{calls, new_log, CountedResource, RecordingFetcher, RecordingParser, TestRig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn timings() -> RuntimeTimings {
    RuntimeTimings {
        control_interval: Duration::from_millis(5),
        idle_poll: Duration::from_millis(2),
    }
}

fn enrichment(rig: &TestRig, log: &helpers::CallLog, parse_delay: Duration) -> Arc<Enrichment> {
    Arc::new(Enrichment::new(
        Arc::new(RecordingParser::with_delay(Arc::clone(log), parse_delay)),
        Arc::new(RecordingFetcher::new(Arc::clone(log))),
        rig.engine.activity(),
        rig.events.clone(),
        EnrichmentOptions::default(),
    ))
}

fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn test_control_thread_plays_through_playlist() {
    let rig = TestRig::new(&["file:///a", "file:///b"], EngineOptions::default());
    rig.factory.set_state_on_stop(Some(SessionState::Dead));
    let log = new_log();
    let runtime = EngineRuntime::start(
        Arc::clone(&rig.engine),
        enrichment(&rig, &log, Duration::ZERO),
        timings(),
    )
    .unwrap();

    rig.engine.play();
    assert!(wait_until(|| rig.factory.created() == 1));
    rig.factory.last().set_state(SessionState::Ended);
    assert!(wait_until(|| rig.factory.created() == 2));
    rig.factory.last().set_state(SessionState::Ended);
    assert!(wait_until(|| rig.engine.status() == EngineStatus::Stopped));

    runtime.shutdown();
    assert!(rig.factory.sessions().iter().all(|s| s.destroyed() == 1));
}

#[test]
fn test_shutdown_drains_both_queues() {
    let rig = TestRig::new(&[], EngineOptions::default());
    let log = new_log();
    let enrichment = enrichment(&rig, &log, Duration::from_millis(1));
    let entries: Vec<EntryRef> = (0..20)
        .map(|i| Entry::new(format!("file:///track{:02}.ogg", i)))
        .collect();

    let runtime =
        EngineRuntime::start(Arc::clone(&rig.engine), Arc::clone(&enrichment), timings()).unwrap();
    for entry in &entries {
        enrichment.enqueue(entry.clone()).unwrap();
    }
    runtime.shutdown();

    assert_eq!(enrichment.primary_len(), 0);
    assert_eq!(enrichment.secondary_len(), 0);
    for entry in &entries {
        assert!(entry.status().contains(EnrichmentStatus::PARSED));
        assert!(entry.status().contains(EnrichmentStatus::META_FETCHED));
    }
    let log = calls(&log);
    assert_eq!(log.iter().filter(|c| c.starts_with("parse")).count(), 20);
    assert_eq!(log.iter().filter(|c| c.starts_with("meta")).count(), 20);
    assert!(enrichment.enqueue(Entry::new("file:///late")).is_err());
}

#[test]
fn test_shutdown_stops_and_destroys_playing_session() {
    let rig = TestRig::new(&["file:///long.mkv"], EngineOptions::default());
    rig.factory.set_state_on_stop(Some(SessionState::Dying));
    let log = new_log();
    let runtime = EngineRuntime::start(
        Arc::clone(&rig.engine),
        enrichment(&rig, &log, Duration::ZERO),
        timings(),
    )
    .unwrap();

    rig.engine.play();
    assert!(wait_until(|| rig.factory.created() == 1));
    let session = rig.factory.last();

    // Backend finishes dying a little later, on its own
    let dying = Arc::clone(&session);
    let finisher = thread::spawn(move || {
        while dying.state() != SessionState::Dying {
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(20));
        dying.set_state(SessionState::Dead);
    });

    let destroyed = Arc::new(AtomicUsize::new(0));
    rig.registry.register(
        ResourceKind::Visual,
        Owner::Session(session.id),
        CountedResource::boxed(&destroyed),
    );

    runtime.shutdown();
    finisher.join().unwrap();

    assert_eq!(session.stop_requests(), 1);
    assert_eq!(session.destroyed(), 1);
    assert!(!rig.engine.has_session());
    assert_eq!(rig.engine.activity().get(), 0);
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
}
