//! Resource garbage collector
//!
//! Output resources outlive the session that created them so that a quick
//! restart can reuse them. The collector destroys the leftovers, but only
//! after a grace window, and only those the engine owns directly.
//!
//! Sweeps run on the control thread with the engine lock released; the
//! collector has its own lock so a long destroy never stalls state changes.

mod registry;

pub use registry::{
    OutputResource, Owner, ResourceHandle, ResourceId, ResourceKind, ResourceRegistry,
    ResourceTree,
};

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default grace window before leftovers are destroyed
pub const DEFAULT_GRACE: Duration = Duration::from_secs(1);

/// When the next collection of a resource kind may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deadline {
    /// No collection scheduled
    #[default]
    None,
    /// Grace window in effect until the given instant
    Pending(Instant),
    /// Collect now
    Due,
}

/// Per-kind deadlines kept by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcDeadlines {
    pub visual: Deadline,
    pub stream: Deadline,
}

impl GcDeadlines {
    pub fn get(&self, kind: ResourceKind) -> Deadline {
        match kind {
            ResourceKind::Visual => self.visual,
            ResourceKind::Stream => self.stream,
        }
    }

    pub fn set(&mut self, kind: ResourceKind, deadline: Deadline) {
        match kind {
            ResourceKind::Visual => self.visual = deadline,
            ResourceKind::Stream => self.stream = deadline,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Debounced destroyer of leftover output resources
pub struct ResourceCollector {
    tree: Arc<dyn ResourceTree>,
    lock: Mutex<()>,
    grace: Duration,
}

impl ResourceCollector {
    pub fn new(tree: Arc<dyn ResourceTree>, grace: Duration) -> Self {
        Self {
            tree,
            lock: Mutex::new(()),
            grace,
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Run one sweep of `kind` and return the deadline to store
    ///
    /// - future `Pending`: unchanged, nothing destroyed
    /// - `None`: starts the grace window, nothing destroyed
    /// - `Due` or expired `Pending`: destroys engine-owned leftovers, returns `None`
    pub fn sweep(&self, kind: ResourceKind, deadline: Deadline, now: Instant) -> Deadline {
        match deadline {
            Deadline::Pending(at) if at > now => deadline,
            Deadline::None => Deadline::Pending(now + self.grace),
            Deadline::Pending(_) | Deadline::Due => {
                self.collect_orphans(kind);
                Deadline::None
            }
        }
    }

    /// Destroy engine-owned resources of `kind`
    ///
    /// Stops at the first resource found that belongs to someone else: that
    /// one is in use, and whatever follows it is not ours to judge.
    fn collect_orphans(&self, kind: ResourceKind) -> usize {
        let _guard = self.lock.lock().unwrap();
        let mut destroyed = 0;
        while let Some(handle) = self.tree.find_child(kind) {
            if handle.owner != Owner::Engine {
                break;
            }
            let Some(resource) = self.tree.detach(&handle) else {
                continue;
            };
            debug!(id = handle.id, %kind, "garbage collector destroying 1 resource");
            resource.destroy();
            destroyed += 1;
        }
        destroyed
    }

    /// Destroy every remaining resource of `kind`, whatever its owner
    ///
    /// Only for the final teardown, once no session is left.
    pub fn collect_all(&self, kind: ResourceKind) -> usize {
        let _guard = self.lock.lock().unwrap();
        let mut destroyed = 0;
        while let Some(handle) = self.tree.find_child(kind) {
            if let Some(resource) = self.tree.detach(&handle) {
                resource.destroy();
                destroyed += 1;
            }
        }
        if destroyed > 0 {
            debug!(destroyed, %kind, "closed remaining output resources");
        }
        destroyed
    }
}
