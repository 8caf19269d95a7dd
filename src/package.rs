//! Package phase backend: moving converted outputs to their destination.
//!
//! Packaging is behind a trait so the destination can be a directory today
//! and an archive or object store later without touching orchestration.
//! `place` runs per item under the phase pool; `finish` runs once after the
//! phase and writes the package manifest.

use crate::types::Item;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("item {0} has no converted output")]
    NothingToPlace(u32),
}

/// Destination for packaged outputs.
pub trait Packager: Sync {
    /// Place one converted item at the destination. Returns bytes written.
    /// Placing the same item twice must be harmless (resume re-runs it).
    fn place(&self, item: &Item) -> Result<u64, PackageError>;

    /// Seal the package: called once, after every item is placed.
    fn finish(&self, items: &[Item]) -> Result<(), PackageError>;
}

#[derive(Serialize)]
struct ManifestEntry<'a> {
    name: &'a str,
    source_ref: &'a str,
    width: u32,
    height: u32,
    bytes: u64,
}

/// Packages into a flat output directory plus a `package-manifest.json`.
pub struct DirPackager {
    output_dir: PathBuf,
}

impl DirPackager {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join("package-manifest.json")
    }
}

impl Packager for DirPackager {
    fn place(&self, item: &Item) -> Result<u64, PackageError> {
        let converted = item
            .converted_path
            .as_deref()
            .ok_or(PackageError::NothingToPlace(item.id))?;
        let file_name = Path::new(converted)
            .file_name()
            .ok_or(PackageError::NothingToPlace(item.id))?;

        fs::create_dir_all(&self.output_dir)?;
        let dest = self.output_dir.join(file_name);
        // Overwrite-in-place: re-placing on resume converges to the same file.
        fs::copy(converted, &dest)?;
        Ok(fs::metadata(&dest)?.len())
    }

    fn finish(&self, items: &[Item]) -> Result<(), PackageError> {
        let entries: Vec<ManifestEntry<'_>> = items
            .iter()
            .filter_map(|item| {
                let name = item.assigned_name.as_deref()?;
                let attrs = item.attributes.as_ref()?;
                Some(ManifestEntry {
                    name,
                    source_ref: &item.source_ref,
                    width: attrs.width,
                    height: attrs.height,
                    bytes: attrs.size_bytes,
                })
            })
            .collect();

        fs::create_dir_all(&self.output_dir)?;
        let json = serde_json::to_string_pretty(&entries)?;
        let tmp = self.output_dir.join("package-manifest.json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.manifest_path())?;
        Ok(())
    }
}
