//! Engine runtime
//!
//! Runs the control loop and the two enrichment workers on their own
//! threads, and shuts them down in order:
//!
//! 1. close the primary queue to new entries
//! 2. drain and join the primary worker, then the secondary worker
//! 3. stop the control loop, drive the current session to `Dead`, destroy it
//! 4. collect every leftover output resource

use crate::config::EngineSettings;
use crate::engine::Engine;
use crate::enrichment::Enrichment;
use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

/// Loop timings
#[derive(Debug, Clone, Copy)]
pub struct RuntimeTimings {
    /// Sleep between two control steps
    pub control_interval: Duration,
    /// Sleep of an enrichment worker with an empty queue
    pub idle_poll: Duration,
}

impl From<&EngineSettings> for RuntimeTimings {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            control_interval: settings.control_interval(),
            idle_poll: settings.idle_poll(),
        }
    }
}

impl Default for RuntimeTimings {
    fn default() -> Self {
        Self::from(&EngineSettings::default())
    }
}

type LoopBody = Box<dyn FnOnce(Arc<AtomicBool>) + Send>;

struct LoopThread {
    name: &'static str,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl LoopThread {
    fn spawn<F>(name: &'static str, body: F) -> Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(stop_clone))?;
        Ok(Self { name, stop, handle })
    }

    fn stop_and_join(self) {
        self.stop.store(true, Ordering::Release);
        match self.handle.join() {
            Ok(()) => debug!("{} joined", self.name),
            Err(e) => error!("{} panicked: {:?}", self.name, e),
        }
    }
}

/// Running engine threads
pub struct EngineRuntime {
    engine: Arc<Engine>,
    enrichment: Arc<Enrichment>,
    timings: RuntimeTimings,
    control: LoopThread,
    primary: LoopThread,
    secondary: LoopThread,
}

impl EngineRuntime {
    /// Spawn the primary and secondary workers, then the control loop
    ///
    /// If a thread cannot be spawned, the ones already running are stopped
    /// and joined before the error is returned.
    pub fn start(
        engine: Arc<Engine>,
        enrichment: Arc<Enrichment>,
        timings: RuntimeTimings,
    ) -> Result<Self> {
        Self::start_with(engine, enrichment, timings, |name, body| {
            LoopThread::spawn(name, body)
        })
    }

    fn start_with<S>(
        engine: Arc<Engine>,
        enrichment: Arc<Enrichment>,
        timings: RuntimeTimings,
        mut spawn: S,
    ) -> Result<Self>
    where
        S: FnMut(&'static str, LoopBody) -> Result<LoopThread>,
    {
        let primary = {
            let enrichment = Arc::clone(&enrichment);
            spawn(
                "cadence-preparse",
                Box::new(move |stop| {
                    enrichment.preparse_worker().run(&stop, timings.idle_poll);
                }),
            )?
        };

        let secondary = {
            let enrichment = Arc::clone(&enrichment);
            spawn(
                "cadence-fetch",
                Box::new(move |stop| {
                    enrichment.fetch_worker().run(&stop, timings.idle_poll);
                }),
            )
        };
        let secondary = match secondary {
            Ok(thread) => thread,
            Err(e) => {
                error!("Failed to spawn fetch worker: {}", e);
                primary.stop_and_join();
                return Err(e);
            }
        };

        let control = {
            let engine = Arc::clone(&engine);
            spawn(
                "cadence-control",
                Box::new(move |stop| {
                    debug!("control loop started");
                    while !stop.load(Ordering::Acquire) {
                        engine.step();
                        thread::sleep(timings.control_interval);
                    }
                    debug!("control loop stopped");
                }),
            )
        };
        let control = match control {
            Ok(thread) => thread,
            Err(e) => {
                error!("Failed to spawn control loop: {}", e);
                primary.stop_and_join();
                secondary.stop_and_join();
                return Err(e);
            }
        };

        info!("Engine runtime started (control, preparse, fetch threads)");
        Ok(Self {
            engine,
            enrichment,
            timings,
            control,
            primary,
            secondary,
        })
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn enrichment(&self) -> &Arc<Enrichment> {
        &self.enrichment
    }

    /// Ordered shutdown. Blocks until every thread is joined.
    pub fn shutdown(self) {
        info!("Shutting down engine runtime");

        self.enrichment.close();
        // Secondary is fed by primary: drain primary first
        self.primary.stop_and_join();
        self.secondary.stop_and_join();

        self.control.stop_and_join();
        self.engine.last_loop(self.timings.control_interval);
        self.engine.final_collect();

        info!("Engine runtime shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::engine::EngineOptions;
    use crate::error::Error;
    use crate::gc::{ResourceRegistry, ResourceTree};
    use crate::local::{LocalMetaFetcher, LocalPreparser};
    use crate::playlist::{MemoryPlaylist, PlaylistSource};
    use crate::sim::SimulatedSessionFactory;
    use cadence_common::EventBus;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn parts() -> (Arc<Engine>, Arc<Enrichment>) {
        let events = EventBus::new(64);
        let registry = Arc::new(ResourceRegistry::new());
        let engine = Arc::new(Engine::new(
            Arc::new(MemoryPlaylist::new(false)) as Arc<dyn PlaylistSource>,
            Arc::new(SimulatedSessionFactory::new(
                Arc::clone(&registry),
                SimulationConfig::default(),
            )),
            registry as Arc<dyn ResourceTree>,
            events.clone(),
            EngineOptions::default(),
        ));
        let enrichment = Arc::new(Enrichment::new(
            Arc::new(LocalPreparser),
            Arc::new(LocalMetaFetcher),
            engine.activity(),
            events,
            Default::default(),
        ));
        (engine, enrichment)
    }

    fn timings() -> RuntimeTimings {
        RuntimeTimings {
            control_interval: Duration::from_millis(1),
            idle_poll: Duration::from_millis(1),
        }
    }

    /// Start with a spawner that refuses `failing`, counting exited threads
    fn start_failing_at(
        failing: &'static str,
    ) -> (Result<EngineRuntime>, Vec<&'static str>, usize) {
        let (engine, enrichment) = parts();
        let exited = Arc::new(AtomicUsize::new(0));
        let spawned = Mutex::new(Vec::new());

        let result = EngineRuntime::start_with(engine, enrichment, timings(), |name, body| {
            if name == failing {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "out of threads",
                )));
            }
            spawned.lock().unwrap().push(name);
            let exited = Arc::clone(&exited);
            LoopThread::spawn(name, move |stop| {
                body(stop);
                exited.fetch_add(1, Ordering::SeqCst);
            })
        });

        let spawned = spawned.into_inner().unwrap();
        let exited = exited.load(Ordering::SeqCst);
        (result, spawned, exited)
    }

    #[test]
    fn test_control_spawn_failure_joins_workers() {
        let (result, spawned, exited) = start_failing_at("cadence-control");
        assert!(result.is_err());
        assert_eq!(spawned, vec!["cadence-preparse", "cadence-fetch"]);
        assert_eq!(exited, 2);
    }

    #[test]
    fn test_worker_spawn_failure_never_starts_control_loop() {
        let (result, spawned, exited) = start_failing_at("cadence-fetch");
        assert!(result.is_err());
        assert_eq!(spawned, vec!["cadence-preparse"]);
        assert_eq!(exited, 1);
    }

    #[test]
    fn test_start_and_shutdown() {
        let (engine, enrichment) = parts();
        let runtime = EngineRuntime::start(Arc::clone(&engine), enrichment, timings()).unwrap();
        runtime.shutdown();
        assert!(!engine.has_session());
    }
}
