//! Activity counter
//!
//! Approximates how busy playback is. The control loop adds
//! [`SESSION_ACTIVITY`] when a session starts and removes it when the
//! session is destroyed; the primary enrichment worker reads the value to
//! stretch its poll delay.

use cadence_common::events::{EngineEvent, EventBus};
use cadence_common::time;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::trace;

/// Activity contributed by one playback session
pub const SESSION_ACTIVITY: i64 = 1;

/// Shared activity counter
pub struct ActivityCounter {
    value: AtomicI64,
    events: EventBus,
}

impl ActivityCounter {
    pub fn new(events: EventBus) -> Self {
        Self {
            value: AtomicI64::new(0),
            events,
        }
    }

    /// Current value (may be transiently negative)
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Add `delta` and emit `ActivityChanged`
    pub fn add(&self, delta: i64) -> i64 {
        let activity = self.value.fetch_add(delta, Ordering::AcqRel) + delta;
        trace!(activity, "activity changed");
        self.events.emit_lossy(EngineEvent::ActivityChanged {
            activity,
            timestamp: time::now(),
        });
        activity
    }

    /// Value clamped at zero, as used for throttling
    pub fn load_factor(&self) -> u32 {
        self.get().clamp(0, u32::MAX as i64) as u32
    }
}
