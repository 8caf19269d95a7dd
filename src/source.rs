//! Source collaborator: where raw items come from.
//!
//! A [`SourceReader`] turns a locator into a lazy, finite sequence of
//! [`SourceEntry`] values. Opening can fail (`SourceUnavailable`) - that is
//! the locator itself being bad and is fatal to the run. Per-entry problems
//! (unreadable file, dead URL) are *not* surfaced here; entries carry a
//! payload descriptor and the Extract phase materializes bytes per item so
//! one bad entry stays an item-level failure.
//!
//! Two readers ship in-crate:
//! - [`DirectorySource`]: walks a directory tree for image files, in
//!   deterministic path order so resumes see the same ids.
//! - [`UrlListSource`]: a text file of URLs, one per line; bytes are pulled
//!   lazily through the retrying fetcher during Extract.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Extensions recognized as images when scanning directories.
const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff"];

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source unavailable: {locator}: {detail}")]
    Unavailable { locator: String, detail: String },
}

/// How Extract obtains the bytes for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Read from the local filesystem.
    LocalFile(PathBuf),
    /// Fetch over the network through the retrying fetcher.
    Remote(String),
}

/// One candidate item produced by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Opaque locator back to the origin, recorded on the item.
    pub source_ref: String,
    pub payload: Payload,
}

/// Contract for source readers.
pub trait SourceReader: Sync {
    /// Open the locator and produce its entries.
    ///
    /// The sequence is finite and restartable from the start: opening the
    /// same locator again yields the same entries in the same order, which
    /// resume depends on.
    fn open(&self, locator: &str) -> Result<Vec<SourceEntry>, SourceError>;
}

/// Reads every image file under a directory, sorted by path.
#[derive(Default)]
pub struct DirectorySource;

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl SourceReader for DirectorySource {
    fn open(&self, locator: &str) -> Result<Vec<SourceEntry>, SourceError> {
        let root = Path::new(locator);
        if !root.is_dir() {
            return Err(SourceError::Unavailable {
                locator: locator.to_string(),
                detail: "not a directory".to_string(),
            });
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_image_path(p))
            .collect();
        paths.sort();

        Ok(paths
            .into_iter()
            .map(|path| SourceEntry {
                source_ref: path.to_string_lossy().into_owned(),
                payload: Payload::LocalFile(path),
            })
            .collect())
    }
}

/// Reads a manifest file of URLs, one per line. Blank lines and `#`
/// comments are skipped.
#[derive(Default)]
pub struct UrlListSource;

impl SourceReader for UrlListSource {
    fn open(&self, locator: &str) -> Result<Vec<SourceEntry>, SourceError> {
        let content = fs::read_to_string(locator).map_err(|e| SourceError::Unavailable {
            locator: locator.to_string(),
            detail: e.to_string(),
        })?;

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|url| SourceEntry {
                source_ref: url.to_string(),
                payload: Payload::Remote(url.to_string()),
            })
            .collect())
    }
}

/// Pick a reader for a locator: URL manifests end in `.urls`, everything
/// else is treated as a directory.
pub fn reader_for(locator: &str) -> Box<dyn SourceReader> {
    if locator.ends_with(".urls") {
        Box::new(UrlListSource)
    } else {
        Box::new(DirectorySource)
    }
}
