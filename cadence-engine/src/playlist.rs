//! Playlist collaborators
//!
//! The engine needs only three things from the playlist: the next entry to
//! play, a specific entry by id, and deletion. [`MemoryPlaylist`] is a plain
//! insertion-ordered implementation; sorting and trees live elsewhere.
//!
//! [`MediaLibrary`] is the load/dump boundary used once at startup and once
//! at shutdown.

use crate::entry::{Entry, EntryId, EntryMeta, EntryRef};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Source of entries for the control loop
pub trait PlaylistSource: Send + Sync {
    /// Advance to the next entry to play
    fn next_entry(&self) -> Option<EntryRef>;

    /// Position the playlist on `id` and return it, if still present
    fn select(&self, id: EntryId) -> Option<EntryRef>;

    /// Remove an entry for good
    fn delete_entry(&self, entry: &EntryRef);
}

struct PlaylistInner {
    entries: Vec<EntryRef>,
    /// Index of the entry returned last
    cursor: Option<usize>,
}

/// Insertion-ordered in-memory playlist
pub struct MemoryPlaylist {
    inner: Mutex<PlaylistInner>,
    repeat_all: bool,
}

impl MemoryPlaylist {
    pub fn new(repeat_all: bool) -> Self {
        Self {
            inner: Mutex::new(PlaylistInner {
                entries: Vec::new(),
                cursor: None,
            }),
            repeat_all,
        }
    }

    pub fn append(&self, entry: EntryRef) {
        self.inner.lock().unwrap().entries.push(entry);
    }

    pub fn entries(&self) -> Vec<EntryRef> {
        self.inner.lock().unwrap().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .any(|e| e.id() == id)
    }
}

impl PlaylistSource for MemoryPlaylist {
    fn next_entry(&self) -> Option<EntryRef> {
        let mut inner = self.inner.lock().unwrap();
        if inner.entries.is_empty() {
            return None;
        }
        let mut index = inner.cursor.map_or(0, |c| c + 1);
        if index >= inner.entries.len() {
            if !self.repeat_all {
                return None;
            }
            index = 0;
        }
        inner.cursor = Some(index);
        Some(inner.entries[index].clone())
    }

    fn select(&self, id: EntryId) -> Option<EntryRef> {
        let mut inner = self.inner.lock().unwrap();
        let index = inner.entries.iter().position(|e| e.id() == id)?;
        inner.cursor = Some(index);
        Some(inner.entries[index].clone())
    }

    fn delete_entry(&self, entry: &EntryRef) {
        let mut inner = self.inner.lock().unwrap();
        let Some(index) = inner.entries.iter().position(|e| e.id() == entry.id()) else {
            return;
        };
        inner.entries.remove(index);
        // Keep the cursor on the entry that preceded the deleted one
        inner.cursor = match inner.cursor {
            Some(c) if c > index => Some(c - 1),
            Some(c) if c == index => c.checked_sub(1),
            other => other,
        };
        debug!(entry_id = %entry.id(), "deleted playlist entry");
    }
}

/// Playlist persistence boundary
pub trait MediaLibrary: Send + Sync {
    fn load(&self) -> Result<Vec<EntryRef>>;

    fn dump(&self, entries: &[EntryRef]) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct LibraryFile {
    version: u32,
    entries: Vec<LibraryRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LibraryRecord {
    id: EntryId,
    uri: String,
    #[serde(default)]
    meta: EntryMeta,
}

const LIBRARY_VERSION: u32 = 1;

/// Media library stored as a JSON document
pub struct JsonLibrary {
    path: PathBuf,
}

impl JsonLibrary {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MediaLibrary for JsonLibrary {
    fn load(&self) -> Result<Vec<EntryRef>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Media library {} does not exist yet", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let file: LibraryFile = serde_json::from_str(&content)?;
        let entries: Vec<EntryRef> = file
            .entries
            .into_iter()
            .map(|r| Entry::with_meta(r.id, r.uri, r.meta))
            .collect();
        info!("Loaded {} entries from {}", entries.len(), self.path.display());
        Ok(entries)
    }

    fn dump(&self, entries: &[EntryRef]) -> Result<()> {
        let file = LibraryFile {
            version: LIBRARY_VERSION,
            entries: entries
                .iter()
                .filter(|e| !e.is_marked_for_removal())
                .map(|e| LibraryRecord {
                    id: e.id(),
                    uri: e.uri().to_string(),
                    meta: e.meta(),
                })
                .collect(),
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&file)?)?;
        std::fs::rename(&tmp, &self.path)?;
        info!("Dumped {} entries to {}", file.entries.len(), self.path.display());
        Ok(())
    }
}
