//! Filesystem-backed enrichment collaborators
//!
//! Used by the daemon. Both read only what the directory layout tells them:
//!
//! ```text
//! <artist>/<album>/<NN - title>.<ext>
//! <artist>/<album>/cover.jpg
//! ```

use crate::enrichment::{MetaFetcher, Preparser};
use crate::entry::{uri_scheme, Entry};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Artwork file names looked up next to a track, in order
pub const ART_FILE_NAMES: &[&str] = &["cover.jpg", "folder.jpg", "front.jpg", "cover.png"];

/// Local path of a `file://` URI or a bare path. `None` for other schemes.
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    if let Some(rest) = uri.strip_prefix("file://") {
        return Some(PathBuf::from(rest));
    }
    match uri_scheme(uri) {
        Some(_) => None,
        None => Some(PathBuf::from(uri)),
    }
}

fn local_file(entry: &Entry) -> Result<PathBuf> {
    let path = uri_to_path(entry.uri())
        .ok_or_else(|| Error::Enrichment(format!("not a local file: {}", entry.uri())))?;
    if !path.is_file() {
        return Err(Error::Enrichment(format!("no such file: {}", path.display())));
    }
    Ok(path)
}

fn title_from_stem(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    // "03 - Title" → "Title"
    let title = match stem.split_once(" - ") {
        Some((prefix, rest)) if prefix.trim().chars().all(|c| c.is_ascii_digit()) => rest,
        _ => stem,
    };
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

fn dir_name(path: Option<&Path>) -> Option<String> {
    path?.file_name()?.to_str().map(str::to_string)
}

/// Fills the title from the file name
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalPreparser;

impl Preparser for LocalPreparser {
    fn parse(&self, entry: &Entry) -> Result<()> {
        let path = local_file(entry)?;
        let title = title_from_stem(&path);
        entry.update_meta(|meta| {
            if meta.title.is_none() {
                meta.title = title;
            }
        });
        trace!(entry_id = %entry.id(), path = %path.display(), "parsed");
        Ok(())
    }
}

/// Fills artist and album from the parent directories, artwork from an
/// image next to the file
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalMetaFetcher;

impl MetaFetcher for LocalMetaFetcher {
    fn fetch_meta(&self, entry: &Entry) -> Result<()> {
        let path = local_file(entry)?;
        let album_dir = path.parent();
        let album = dir_name(album_dir);
        let artist = dir_name(album_dir.and_then(Path::parent));
        entry.update_meta(|meta| {
            if meta.album.is_none() {
                meta.album = album;
            }
            if meta.artist.is_none() {
                meta.artist = artist;
            }
        });
        Ok(())
    }

    fn fetch_art(&self, entry: &Entry) -> Result<()> {
        let path = local_file(entry)?;
        let dir = path
            .parent()
            .ok_or_else(|| Error::Enrichment(format!("no parent directory: {}", path.display())))?;
        let art = ART_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| Error::NotFound(format!("no artwork in {}", dir.display())))?;
        entry.update_meta(|meta| meta.art_url = Some(format!("file://{}", art.display())));
        Ok(())
    }
}
