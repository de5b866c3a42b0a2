//! Playlist entries under enrichment
//!
//! An [`Entry`] is shared (`Arc`) between the playlist and whichever
//! enrichment queue currently holds it. Metadata is written only by the
//! enrichment workers; the removal flag is written by whoever deletes the
//! entry from the playlist while it is playing, and read by the control loop.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Entry identifier
pub type EntryId = Uuid;

/// Shared reference to an entry
pub type EntryRef = Arc<Entry>;

/// Descriptive metadata collected by enrichment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub art_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl EntryMeta {
    /// Title and artist both present and non-empty
    pub fn has_title_and_artist(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        filled(&self.title) && filled(&self.artist)
    }
}

/// Enrichment progress flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentStatus(u8);

impl EnrichmentStatus {
    pub const PARSED: Self = Self(0b001);
    pub const META_FETCHED: Self = Self(0b010);
    pub const ART_FETCHED: Self = Self(0b100);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl fmt::Display for EnrichmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::PARSED) {
            names.push("parsed");
        }
        if self.contains(Self::META_FETCHED) {
            names.push("meta");
        }
        if self.contains(Self::ART_FETCHED) {
            names.push("art");
        }
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// A playlist item subject to enrichment
pub struct Entry {
    id: EntryId,
    uri: String,
    meta: RwLock<EntryMeta>,
    status: AtomicU8,
    removal: AtomicBool,
}

impl Entry {
    /// Create an entry with a fresh id
    pub fn new(uri: impl Into<String>) -> EntryRef {
        Self::with_meta(Uuid::new_v4(), uri, EntryMeta::default())
    }

    /// Recreate an entry with a known id and metadata (library load)
    pub fn with_meta(id: EntryId, uri: impl Into<String>, meta: EntryMeta) -> EntryRef {
        Arc::new(Self {
            id,
            uri: uri.into(),
            meta: RwLock::new(meta),
            status: AtomicU8::new(0),
            removal: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// URI scheme, lowercased (`None` for bare paths)
    pub fn scheme(&self) -> Option<String> {
        uri_scheme(&self.uri)
    }

    /// Snapshot of the current metadata
    pub fn meta(&self) -> EntryMeta {
        self.meta.read().unwrap().clone()
    }

    /// Mutate metadata in place
    pub fn update_meta<F>(&self, update: F)
    where
        F: FnOnce(&mut EntryMeta),
    {
        let mut meta = self.meta.write().unwrap();
        update(&mut meta);
    }

    pub fn status(&self) -> EnrichmentStatus {
        EnrichmentStatus(self.status.load(Ordering::Acquire))
    }

    /// Set enrichment flags (existing flags are kept)
    pub fn mark(&self, flags: EnrichmentStatus) {
        self.status.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Request deletion once the entry is no longer playing
    pub fn mark_for_removal(&self) {
        self.removal.store(true, Ordering::Release);
    }

    pub fn is_marked_for_removal(&self) -> bool {
        self.removal.load(Ordering::Acquire)
    }
}

/// Scheme of `uri`, lowercased. `None` when the prefix is not a valid scheme.
pub fn uri_scheme(uri: &str) -> Option<String> {
    let (scheme, _) = uri.split_once(':')?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then(|| scheme.to_ascii_lowercase())
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("uri", &self.uri)
            .field("status", &self.status())
            .field("removal", &self.is_marked_for_removal())
            .finish()
    }
}
