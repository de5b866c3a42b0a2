//! Output resource registry
//!
//! Arena of the visual and stream outputs created by sessions. Every
//! resource has exactly one direct owner: a session while it is in use, the
//! engine once the session that created it is gone. Engine-owned resources
//! are either adopted by the next session or destroyed by the collector.

use crate::session::SessionId;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use tracing::debug;

/// Kind of output resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Video output
    Visual,
    /// Stream output
    Stream,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Visual => write!(f, "visual"),
            ResourceKind::Stream => write!(f, "stream"),
        }
    }
}

/// Resource identifier, allocated in creation order
pub type ResourceId = u64;

/// Direct owner of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Engine,
    Session(SessionId),
}

/// Snapshot of a resource's place in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceHandle {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub owner: Owner,
}

/// A render or output construct
pub trait OutputResource: Send {
    /// Tear the resource down. May block.
    fn destroy(self: Box<Self>);
}

/// Ownership tree the collector walks
pub trait ResourceTree: Send + Sync {
    /// First resource of `kind` below the engine, whoever owns it
    fn find_child(&self, kind: ResourceKind) -> Option<ResourceHandle>;

    /// Unlink a resource found by [`find_child`](Self::find_child)
    ///
    /// Returns `None` if it is gone or changed owner since.
    fn detach(&self, handle: &ResourceHandle) -> Option<Box<dyn OutputResource>>;
}

struct Node {
    kind: ResourceKind,
    owner: Owner,
    resource: Box<dyn OutputResource>,
}

#[derive(Default)]
struct Inner {
    next_id: ResourceId,
    nodes: BTreeMap<ResourceId, Node>,
}

/// Arena of output resources
#[derive(Default)]
pub struct ResourceRegistry {
    inner: Mutex<Inner>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        kind: ResourceKind,
        owner: Owner,
        resource: Box<dyn OutputResource>,
    ) -> ResourceId {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.nodes.insert(id, Node { kind, owner, resource });
        debug!(id, %kind, ?owner, "registered output resource");
        id
    }

    /// Hand the first engine-owned resource of `kind` to a session
    pub fn adopt(&self, kind: ResourceKind, session: SessionId) -> Option<ResourceId> {
        let mut inner = self.inner.lock().unwrap();
        let (id, node) = inner
            .nodes
            .iter_mut()
            .find(|(_, node)| node.kind == kind && node.owner == Owner::Engine)?;
        node.owner = Owner::Session(session);
        debug!(id = *id, %kind, %session, "session adopted leftover resource");
        Some(*id)
    }

    /// Give every resource of a session back to the engine
    pub fn release_session(&self, session: SessionId) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let mut released = 0;
        for node in inner.nodes.values_mut() {
            if node.owner == Owner::Session(session) {
                node.owner = Owner::Engine;
                released += 1;
            }
        }
        released
    }

    pub fn owner_of(&self, id: ResourceId) -> Option<Owner> {
        self.inner.lock().unwrap().nodes.get(&id).map(|n| n.owner)
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.inner
            .lock()
            .unwrap()
            .nodes
            .values()
            .filter(|n| n.kind == kind)
            .count()
    }
}

impl ResourceTree for ResourceRegistry {
    fn find_child(&self, kind: ResourceKind) -> Option<ResourceHandle> {
        let inner = self.inner.lock().unwrap();
        inner
            .nodes
            .iter()
            .find(|(_, node)| node.kind == kind)
            .map(|(id, node)| ResourceHandle {
                id: *id,
                kind,
                owner: node.owner,
            })
    }

    fn detach(&self, handle: &ResourceHandle) -> Option<Box<dyn OutputResource>> {
        let mut inner = self.inner.lock().unwrap();
        match inner.nodes.get(&handle.id) {
            Some(node) if node.owner == handle.owner && node.kind == handle.kind => {}
            _ => return None,
        }
        inner.nodes.remove(&handle.id).map(|node| node.resource)
    }
}
