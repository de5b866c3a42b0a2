//! Secondary enrichment worker
//!
//! Fed only by the primary worker. Runs the metadata fetch, and the artwork
//! fetch when requested, then notifies observers.

use super::{FetchRequest, InFlight, MetaFetcher, PollOutcome, WorkQueue};
use crate::entry::EnrichmentStatus;
use cadence_common::events::{EngineEvent, EnrichmentStage, EventBus};
use cadence_common::time;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct FetchWorker {
    queue: Arc<WorkQueue<FetchRequest>>,
    in_flight: Arc<InFlight>,
    fetcher: Arc<dyn MetaFetcher>,
    events: EventBus,
}

impl FetchWorker {
    pub(super) fn new(
        queue: Arc<WorkQueue<FetchRequest>>,
        in_flight: Arc<InFlight>,
        fetcher: Arc<dyn MetaFetcher>,
        events: EventBus,
    ) -> Self {
        Self {
            queue,
            in_flight,
            fetcher,
            events,
        }
    }

    /// Handle at most one queued request
    pub fn run_once(&self) -> PollOutcome {
        let Some(FetchRequest { entry, fetch_art }) = self.queue.pop() else {
            return PollOutcome::Idle;
        };

        if let Err(e) = self.fetcher.fetch_meta(&entry) {
            warn!(entry_id = %entry.id(), "meta fetch failed: {}", e);
        }
        entry.mark(EnrichmentStatus::META_FETCHED);

        if fetch_art {
            if let Err(e) = self.fetcher.fetch_art(&entry) {
                warn!(entry_id = %entry.id(), "art fetch failed: {}", e);
            }
            entry.mark(EnrichmentStatus::ART_FETCHED);
        }

        // Leaves the pipeline before observers hear about it
        self.in_flight.release(entry.id());
        self.events.emit_lossy(EngineEvent::ItemChanged {
            entry_id: entry.id(),
            stage: EnrichmentStage::Fetch,
            timestamp: time::now(),
        });
        PollOutcome::Processed {
            delay: Duration::ZERO,
        }
    }

    /// Poll until `stop` is set and the queue is empty
    pub fn run(&self, stop: &AtomicBool, idle: Duration) {
        debug!("fetch worker started");
        super::poll_until_drained(stop, idle, || self.run_once());
        debug!("fetch worker stopped");
    }
}
