//! Two-stage metadata enrichment
//!
//! New entries go through the primary (parse) worker, which forwards every
//! entry to the secondary (fetch) worker. Each worker owns one FIFO and
//! consumes at most one entry per wake-up. Enrichment is best-effort:
//! failed steps are logged and the entry moves on. An entry is in the
//! pipeline at most once: a second enqueue is refused until the fetch stage
//! is done with it.
//!
//! ```text
//! enqueue ─▶ primary queue ─▶ parse ─▶ secondary queue ─▶ fetch meta/art ─▶ item_changed
//! ```

mod fetch;
mod preparse;
mod queue;

pub use fetch::FetchWorker;
pub use preparse::{PreparseWorker, NO_PARSE_SCHEMES};
pub use queue::WorkQueue;

use crate::activity::ActivityCounter;
use crate::config::EngineSettings;
use crate::entry::{Entry, EntryId, EntryRef};
use crate::error::{Error, Result};
use cadence_common::events::EventBus;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Reads container/basic metadata. Blocking.
pub trait Preparser: Send + Sync {
    fn parse(&self, entry: &Entry) -> Result<()>;
}

/// Fetches tags and artwork from slower sources. Blocking.
pub trait MetaFetcher: Send + Sync {
    fn fetch_meta(&self, entry: &Entry) -> Result<()>;

    fn fetch_art(&self, entry: &Entry) -> Result<()>;
}

/// Secondary queue item
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub entry: EntryRef,
    pub fetch_art: bool,
}

/// Result of one worker wake-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Queue was empty
    Idle,
    /// One entry was handled; wait `delay` before the next wake-up
    Processed { delay: Duration },
}

/// Enrichment tuning
#[derive(Debug, Clone)]
pub struct EnrichmentOptions {
    /// Primary worker throttle unit
    pub time_unit: Duration,
    /// Drop entries that already have title and artist instead of
    /// forwarding them to the fetch stage. Off by default.
    pub skip_fetch_when_tagged: bool,
    /// Ask the fetch stage for artwork too. Off by default.
    pub fetch_art: bool,
}

impl Default for EnrichmentOptions {
    fn default() -> Self {
        Self {
            time_unit: Duration::from_millis(1),
            skip_fetch_when_tagged: false,
            fetch_art: false,
        }
    }
}

impl From<&EngineSettings> for EnrichmentOptions {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            time_unit: settings.preparse_time_unit(),
            skip_fetch_when_tagged: settings.skip_fetch_when_tagged,
            fetch_art: settings.fetch_art,
        }
    }
}

/// Entries between enqueue and the end of the fetch stage
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    ids: Mutex<HashSet<EntryId>>,
}

impl InFlight {
    /// False if `id` is already in the pipeline
    fn claim(&self, id: EntryId) -> bool {
        self.ids.lock().unwrap().insert(id)
    }

    fn release(&self, id: EntryId) {
        self.ids.lock().unwrap().remove(&id);
    }

    fn len(&self) -> usize {
        self.ids.lock().unwrap().len()
    }
}

/// Both enrichment stages and their queues
pub struct Enrichment {
    primary: Arc<WorkQueue<EntryRef>>,
    secondary: Arc<WorkQueue<FetchRequest>>,
    in_flight: Arc<InFlight>,
    preparse: PreparseWorker,
    fetch: FetchWorker,
}

impl Enrichment {
    pub fn new(
        parser: Arc<dyn Preparser>,
        fetcher: Arc<dyn MetaFetcher>,
        activity: Arc<ActivityCounter>,
        events: EventBus,
        options: EnrichmentOptions,
    ) -> Self {
        let primary = Arc::new(WorkQueue::new("primary"));
        let secondary = Arc::new(WorkQueue::new("secondary"));
        let in_flight = Arc::new(InFlight::default());
        let preparse = PreparseWorker::new(
            Arc::clone(&primary),
            Arc::clone(&secondary),
            Arc::clone(&in_flight),
            parser,
            activity,
            events.clone(),
            options,
        );
        let fetch = FetchWorker::new(
            Arc::clone(&secondary),
            Arc::clone(&in_flight),
            fetcher,
            events,
        );
        Self {
            primary,
            secondary,
            in_flight,
            preparse,
            fetch,
        }
    }

    /// Queue a new entry for enrichment
    ///
    /// Refused while the same entry is still queued or being worked on, and
    /// once the pipeline is closed.
    pub fn enqueue(&self, entry: EntryRef) -> Result<()> {
        let entry_id = entry.id();
        if !self.in_flight.claim(entry_id) {
            return Err(Error::InvalidState(format!(
                "entry {} is already queued for enrichment",
                entry_id
            )));
        }
        debug!(%entry_id, uri = entry.uri(), "queueing for enrichment");
        if let Err(e) = self.primary.push(entry) {
            self.in_flight.release(entry_id);
            return Err(e);
        }
        Ok(())
    }

    /// Stop accepting new entries
    pub fn close(&self) {
        self.primary.close();
    }

    pub fn primary_len(&self) -> usize {
        self.primary.len()
    }

    pub fn secondary_len(&self) -> usize {
        self.secondary.len()
    }

    /// Entries queued or being worked on in either stage
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn preparse_worker(&self) -> &PreparseWorker {
        &self.preparse
    }

    pub fn fetch_worker(&self) -> &FetchWorker {
        &self.fetch
    }
}

/// Poll `run_once` until `stop` is set and the queue is drained
///
/// An idle wake-up yields and then sleeps `idle`. The processing delay is
/// skipped once `stop` is set so draining is not throttled.
pub(crate) fn poll_until_drained<F>(stop: &AtomicBool, idle: Duration, mut run_once: F)
where
    F: FnMut() -> PollOutcome,
{
    loop {
        match run_once() {
            PollOutcome::Processed { delay } => {
                if !stop.load(Ordering::Acquire) && !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
            PollOutcome::Idle => {
                if stop.load(Ordering::Acquire) {
                    break;
                }
                std::thread::yield_now();
                std::thread::sleep(idle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[test]
    fn test_poll_until_drained_processes_everything_after_stop() {
        let stop = AtomicBool::new(true);
        let mut pending: VecDeque<u32> = (0..5).collect();
        let mut seen = Vec::new();

        poll_until_drained(&stop, Duration::from_millis(1), || match pending.pop_front() {
            Some(n) => {
                seen.push(n);
                PollOutcome::Processed {
                    delay: Duration::from_secs(60),
                }
            }
            None => PollOutcome::Idle,
        });

        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }
}
