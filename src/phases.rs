//! The six phase transforms.
//!
//! Each transform maps one [`Item`] to an [`ItemOutcome`]; the
//! [`PhaseRunner`](crate::runner::PhaseRunner) supplies parallelism,
//! admission, and catalog bookkeeping. Transforms are deliberately dumb: no
//! locking, no retries of their own (network retry lives in the fetcher),
//! and any expected per-item problem comes back as `Rejected` or `Failed`,
//! never as a panic or an abort.
//!
//! Spool layout under the work dir:
//!
//! ```text
//! <work>/<run_id>/raw/<id>.<ext>          Extract output
//! <work>/<run_id>/converted/<name>.<ext>  Convert output
//! ```

use crate::catalog::CatalogStore;
use crate::codec::{Codec, CodecError, ConvertSpec};
use crate::config::PipelineConfig;
use crate::fetch::{FetchTransport, RetryingFetcher};
use crate::runner::{ItemOutcome, ItemUpdate};
use crate::source::Payload;
use crate::types::Item;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Filesystem layout for one run's spooled intermediates.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub run_root: PathBuf,
    pub raw_dir: PathBuf,
    pub converted_dir: PathBuf,
}

impl RunPaths {
    pub fn new(work_dir: &Path, run_id: &str) -> Self {
        let run_root = work_dir.join(run_id);
        Self {
            raw_dir: run_root.join("raw"),
            converted_dir: run_root.join("converted"),
            run_root,
        }
    }

    pub fn create(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.raw_dir)?;
        fs::create_dir_all(&self.converted_dir)
    }
}

/// Everything the transforms need, borrowed for the duration of a run.
pub struct PhaseContext<'a, T: FetchTransport> {
    pub config: &'a PipelineConfig,
    pub codec: &'a dyn Codec,
    pub fetcher: &'a RetryingFetcher<T>,
    pub catalog: &'a dyn CatalogStore,
    pub paths: &'a RunPaths,
    /// Payload descriptors keyed by `source_ref`, rebuilt from the source
    /// on every (re)start. Only Extract consults this.
    pub payloads: &'a BTreeMap<String, Payload>,
}

fn extension_of(source_ref: &str) -> &str {
    Path::new(source_ref)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin")
}

impl<T: FetchTransport> PhaseContext<'_, T> {
    /// Extract: materialize raw bytes into the spool.
    ///
    /// Local reads fail as item failures; remote fetches go through the
    /// retrying fetcher, and exhaustion is likewise an item failure.
    pub fn extract(&self, item: &Item) -> ItemOutcome {
        let Some(payload) = self.payloads.get(&item.source_ref) else {
            return ItemOutcome::Failed(format!(
                "source no longer lists {}",
                item.source_ref
            ));
        };

        let bytes = match payload {
            Payload::LocalFile(path) => match fs::read(path) {
                Ok(b) => b,
                Err(e) => return ItemOutcome::Failed(format!("read {}: {e}", path.display())),
            },
            Payload::Remote(url) => match self.fetcher.fetch(url) {
                Ok(b) => b,
                Err(e) => return ItemOutcome::Failed(e.to_string()),
            },
        };

        let raw_path = self.paths.raw_dir.join(format!(
            "{:06}.{}",
            item.id,
            extension_of(&item.source_ref)
        ));
        if let Err(e) = fs::write(&raw_path, &bytes) {
            return ItemOutcome::Failed(format!("spool {}: {e}", raw_path.display()));
        }

        let len = bytes.len() as u64;
        ItemOutcome::Success(ItemUpdate {
            raw_path: Some(raw_path.to_string_lossy().into_owned()),
            bytes_in: len,
            bytes_out: len,
            ..Default::default()
        })
    }

    /// Rename: assign the next fixed-width sequential output name.
    ///
    /// The sequence counter lives in the catalog and is drawn under its
    /// lock, so concurrent workers get unique, gapless numbers.
    pub fn rename(&self, _item: &Item) -> ItemOutcome {
        let seq = match self.catalog.next_sequence() {
            Ok(seq) => seq,
            Err(e) => return ItemOutcome::Failed(format!("sequence draw: {e}")),
        };
        let name = format!(
            "{}{:0width$}",
            self.config.rename_prefix,
            seq,
            width = self.config.rename_width
        );
        ItemOutcome::Success(ItemUpdate {
            assigned_name: Some(name),
            ..Default::default()
        })
    }

    /// Analyze: probe dimensions and format from the spooled bytes.
    ///
    /// Undecodable bytes are a rejection, not a failure - garbage inputs
    /// are expected in scraped collections and carry no retry value.
    pub fn analyze(&self, item: &Item) -> ItemOutcome {
        let bytes = match self.read_raw(item) {
            Ok(b) => b,
            Err(reason) => return ItemOutcome::Failed(reason),
        };
        match self.codec.probe(&bytes) {
            Ok(attributes) => ItemOutcome::Success(ItemUpdate {
                bytes_in: attributes.size_bytes,
                attributes: Some(attributes),
                ..Default::default()
            }),
            Err(CodecError::Decode(reason)) => {
                ItemOutcome::Rejected(format!("undecodable image: {reason}"))
            }
            Err(e) => ItemOutcome::Failed(e.to_string()),
        }
    }

    /// Filter: threshold on the shorter edge. Inclusive - an image exactly
    /// at `min_resolution` passes.
    pub fn filter(&self, item: &Item) -> ItemOutcome {
        let Some(attributes) = &item.attributes else {
            return ItemOutcome::Failed("no attributes recorded by analyze".into());
        };
        let min_dim = attributes.min_dimension();
        if min_dim >= self.config.min_resolution {
            ItemOutcome::Success(ItemUpdate::default())
        } else {
            ItemOutcome::Rejected(format!(
                "below minimum resolution: {min_dim}px < {}px",
                self.config.min_resolution
            ))
        }
    }

    /// Convert: transcode to the configured output format and spool the
    /// result under the assigned name.
    pub fn convert(&self, item: &Item) -> ItemOutcome {
        let Some(name) = &item.assigned_name else {
            return ItemOutcome::Failed("no assigned name from rename".into());
        };
        let bytes = match self.read_raw(item) {
            Ok(b) => b,
            Err(reason) => return ItemOutcome::Failed(reason),
        };

        let spec = ConvertSpec {
            format: self.config.output_format,
            quality: self.config.quality,
            resize_if_larger: self.config.resize_if_larger,
            max_dimensions: self.config.max_dimensions,
        };
        let out = match self.codec.transcode(&bytes, &spec) {
            Ok(out) => out,
            Err(e) => return ItemOutcome::Failed(e.to_string()),
        };

        let converted_path = self
            .paths
            .converted_dir
            .join(format!("{name}.{}", self.config.output_format.extension()));
        if let Err(e) = fs::write(&converted_path, &out) {
            return ItemOutcome::Failed(format!("spool {}: {e}", converted_path.display()));
        }

        ItemOutcome::Success(ItemUpdate {
            converted_path: Some(converted_path.to_string_lossy().into_owned()),
            bytes_in: bytes.len() as u64,
            bytes_out: out.len() as u64,
            ..Default::default()
        })
    }

    fn read_raw(&self, item: &Item) -> Result<Vec<u8>, String> {
        let Some(raw_path) = &item.raw_path else {
            return Err("no spooled payload from extract".into());
        };
        fs::read(raw_path).map_err(|e| format!("read {raw_path}: {e}"))
    }
}
