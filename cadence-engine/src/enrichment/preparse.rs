//! Primary enrichment worker
//!
//! Parses local media, skips live and device inputs, and forwards every
//! entry to the fetch stage. Throttled by the activity counter so parsing
//! backs off while something is playing.

use super::{EnrichmentOptions, FetchRequest, InFlight, PollOutcome, Preparser, WorkQueue};
use crate::activity::ActivityCounter;
use crate::entry::{EnrichmentStatus, EntryRef};
use cadence_common::events::{EngineEvent, EnrichmentStage, EventBus};
use cadence_common::time;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Schemes that are never parsed: network streams and capture devices
pub const NO_PARSE_SCHEMES: &[&str] = &["http", "rtsp", "udp", "mms", "cdda", "dvd", "v4l", "dshow"];

pub struct PreparseWorker {
    queue: Arc<WorkQueue<EntryRef>>,
    next: Arc<WorkQueue<FetchRequest>>,
    in_flight: Arc<InFlight>,
    parser: Arc<dyn Preparser>,
    activity: Arc<ActivityCounter>,
    events: EventBus,
    options: EnrichmentOptions,
}

impl PreparseWorker {
    pub(super) fn new(
        queue: Arc<WorkQueue<EntryRef>>,
        next: Arc<WorkQueue<FetchRequest>>,
        in_flight: Arc<InFlight>,
        parser: Arc<dyn Preparser>,
        activity: Arc<ActivityCounter>,
        events: EventBus,
        options: EnrichmentOptions,
    ) -> Self {
        Self {
            queue,
            next,
            in_flight,
            parser,
            activity,
            events,
            options,
        }
    }

    /// Whether `entry` goes through the blocking parse step
    pub fn should_parse(entry: &EntryRef) -> bool {
        match entry.scheme() {
            Some(scheme) => !NO_PARSE_SCHEMES.contains(&scheme.as_str()),
            None => true,
        }
    }

    /// Handle at most one queued entry
    pub fn run_once(&self) -> PollOutcome {
        let Some(entry) = self.queue.pop() else {
            return PollOutcome::Idle;
        };

        if Self::should_parse(&entry) {
            let started = Instant::now();
            if let Err(e) = self.parser.parse(&entry) {
                warn!(entry_id = %entry.id(), uri = entry.uri(), "parse failed: {}", e);
            }
            trace!(entry_id = %entry.id(), elapsed = ?started.elapsed(), "preparse run");
            entry.mark(EnrichmentStatus::PARSED);
            self.events.emit_lossy(EngineEvent::ItemChanged {
                entry_id: entry.id(),
                stage: EnrichmentStage::Parse,
                timestamp: time::now(),
            });
        } else {
            debug!(entry_id = %entry.id(), uri = entry.uri(), "live or device input, not parsed");
        }

        self.forward(entry);
        PollOutcome::Processed {
            delay: self.poll_delay(),
        }
    }

    /// Poll until `stop` is set and the queue is empty
    pub fn run(&self, stop: &AtomicBool, idle: Duration) {
        debug!("preparse worker started");
        super::poll_until_drained(stop, idle, || self.run_once());
        debug!("preparse worker stopped");
    }

    /// Delay before the next wake-up: `(activity + 1)` time units
    pub fn poll_delay(&self) -> Duration {
        self.options.time_unit * (self.activity.load_factor().saturating_add(1))
    }

    /// Hand the entry to the fetch stage, or let it leave the pipeline
    fn forward(&self, entry: EntryRef) {
        let entry_id = entry.id();
        if self.options.skip_fetch_when_tagged && entry.meta().has_title_and_artist() {
            debug!(%entry_id, "already tagged, not fetching");
            self.in_flight.release(entry_id);
            return;
        }
        let request = FetchRequest {
            entry,
            fetch_art: self.options.fetch_art,
        };
        if let Err(e) = self.next.push(request) {
            warn!(%entry_id, "could not forward to fetch stage: {}", e);
            self.in_flight.release(entry_id);
        }
    }
}
