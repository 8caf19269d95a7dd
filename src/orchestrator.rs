//! Run orchestration: phase sequencing, identity, resume, and cleanup.
//!
//! A run is identified by `run-<hex>`, derived from the source locator and
//! the config fingerprint. Invoking the same command twice therefore lands
//! on the same run id, and the orchestrator resumes from the recorded
//! checkpoint instead of starting over. Resume granularity is the phase: the
//! last incomplete phase is re-executed, which is safe because catalog
//! updates are idempotent and spool writes converge.
//!
//! Failure policy at this level: a bad source locator, a config mismatch
//! against a prior checkpoint, or any persistence error is fatal. Everything
//! item-shaped was already absorbed further down.

use crate::catalog::{CatalogError, CatalogStore, JsonCatalog};
use crate::checkpoint::{
    Checkpoint, CheckpointError, CheckpointStore, JsonCheckpointStore, checkpoint_dir,
};
use crate::codec::Codec;
use crate::config::{ConfigError, PipelineConfig, effective_workers};
use crate::fetch::{FetchTransport, RetryingFetcher};
use crate::governor::MemoryGovernor;
use crate::package::{PackageError, Packager};
use crate::phases::{PhaseContext, RunPaths};
use crate::runner::{
    CancelToken, CheckpointHook, ItemOutcome, ItemUpdate, PhaseRunner, ProgressEvent, RunnerError,
};
use crate::source::{Payload, SourceError, SourceReader};
use crate::types::{Item, ItemFailure, ItemStatus, Phase, PhaseStats, RunResult};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Derive the run id for a (source, config) pair.
///
/// Deterministic: the same pair always maps to the same id, which is how
/// re-invocation finds its own checkpoint.
pub fn derive_run_id(source: &str, config: &PipelineConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([0u8]);
    hasher.update(config.fingerprint().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    format!("run-{hex}")
}

/// Per-invocation knobs, separate from the durable [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Source locator: a directory of images or a `.urls` manifest.
    pub source: String,
    /// Root for spool, catalog, and checkpoint state.
    pub work_dir: PathBuf,
    /// Destination handed to the packager and the report writer.
    pub output_dir: PathBuf,
    /// Discard any prior state for this run id and start from scratch.
    pub force_restart: bool,
}

/// Sequences the six phases over the shared infrastructure.
pub struct PipelineOrchestrator<'a, T: FetchTransport> {
    config: PipelineConfig,
    source: &'a dyn SourceReader,
    codec: &'a dyn Codec,
    fetcher: RetryingFetcher<T>,
    packager: &'a dyn Packager,
    progress: Option<Sender<ProgressEvent>>,
    cancel: CancelToken,
}

impl<'a, T: FetchTransport> PipelineOrchestrator<'a, T> {
    pub fn new(
        config: PipelineConfig,
        source: &'a dyn SourceReader,
        codec: &'a dyn Codec,
        transport: T,
        packager: &'a dyn Packager,
    ) -> Self {
        let retry = config.retry.clone();
        Self {
            config,
            source,
            codec,
            fetcher: RetryingFetcher::new(transport, retry),
            packager,
            progress: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Sender<ProgressEvent>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Handle for requesting graceful cancellation from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Execute (or resume) the run described by `options`.
    pub fn run(&self, options: &RunOptions) -> Result<RunResult, PipelineError> {
        let started = Instant::now();
        self.config.validate()?;
        let run_id = derive_run_id(&options.source, &self.config);
        let fingerprint = self.config.fingerprint();

        let checkpoints = JsonCheckpointStore::new(checkpoint_dir(&options.work_dir));
        let paths = RunPaths::new(&options.work_dir, &run_id);

        if options.force_restart {
            checkpoints.clear(&run_id)?;
            if paths.run_root.exists() {
                fs::remove_dir_all(&paths.run_root)?;
            }
        }
        paths.create()?;

        let catalog = JsonCatalog::open(options.work_dir.join("catalog"), &run_id)?;
        if options.force_restart {
            catalog.clear()?;
        }

        let start_phase = match checkpoints.load(&run_id)? {
            Some(cp) => {
                if cp.config_fingerprint != fingerprint {
                    return Err(ConfigError::Mismatch(format!(
                        "run {run_id} was checkpointed under a different configuration; \
                         re-run with the original config or use --force-restart"
                    ))
                    .into());
                }
                cp.resume_phase()
            }
            None => Some(Phase::Extract),
        };

        // Only Extract needs the source; later phases work off the spool.
        let payloads = if start_phase == Some(Phase::Extract) {
            let entries = self.source.open(&options.source)?;
            let mut map = BTreeMap::new();
            for (index, entry) in entries.iter().enumerate() {
                let id = index as u32 + 1;
                match catalog.register(Item::new(id, entry.source_ref.clone())) {
                    Ok(()) => {}
                    // Already registered by a previous attempt: resume.
                    Err(CatalogError::DuplicateItem(_)) => {}
                    Err(e) => return Err(e.into()),
                }
                map.insert(entry.source_ref.clone(), entry.payload.clone());
            }
            catalog.persist()?;
            map
        } else {
            BTreeMap::new()
        };

        let governor = MemoryGovernor::new(&self.config.memory);
        let workers = effective_workers(&self.config.workers);
        let runner = PhaseRunner::new(&catalog, governor, workers, self.progress.clone());
        let ctx = PhaseContext {
            config: &self.config,
            codec: self.codec,
            fetcher: &self.fetcher,
            catalog: &catalog,
            paths: &paths,
            payloads: &payloads,
        };

        let mut phase_stats: BTreeMap<Phase, PhaseStats> = BTreeMap::new();
        let mut cursor: Option<Phase> = None;
        let mut completed = true;

        for phase in Phase::ORDER {
            if Some(phase) < start_phase || start_phase.is_none() {
                cursor = Some(phase);
                continue;
            }

            let items: Vec<Item> = catalog
                .items()
                .into_iter()
                .filter(|i| i.needs_phase(phase))
                .collect();

            let save_partial = |pending: &[u32]| -> Result<(), CheckpointError> {
                let mut cp = Checkpoint::new(&run_id, &fingerprint);
                cp.phase_cursor = cursor;
                cp.pending = pending.to_vec();
                checkpoints.save(&cp)
            };
            let hook = CheckpointHook {
                interval_items: self.config.checkpoint.interval_items,
                save: &save_partial,
            };

            let stats = runner.execute(phase, &items, &self.cancel, Some(&hook), |item| {
                self.dispatch(phase, &ctx, item)
            })?;
            let cancelled_mid_phase = self.cancel.is_cancelled();
            phase_stats.insert(phase, stats);
            catalog.persist()?;

            if cancelled_mid_phase {
                let pending: Vec<u32> = catalog
                    .items()
                    .iter()
                    .filter(|i| i.needs_phase(phase))
                    .map(|i| i.id)
                    .collect();
                save_partial(&pending)?;
                completed = false;
                break;
            }

            if phase == Phase::Package {
                let packaged = catalog.list_by_status(ItemStatus::Packaged);
                self.packager.finish(&packaged)?;
            }

            cursor = Some(phase);
            let mut cp = Checkpoint::new(&run_id, &fingerprint);
            cp.phase_cursor = cursor;
            checkpoints.save(&cp)?;
        }

        let result = self.collect_result(&run_id, options, &catalog, phase_stats, completed, started);

        if completed {
            checkpoints.clear(&run_id)?;
            catalog.clear()?;
            if !self.config.keep_work_dir && paths.run_root.exists() {
                fs::remove_dir_all(&paths.run_root)?;
            }
        }

        Ok(result)
    }

    fn dispatch(
        &self,
        phase: Phase,
        ctx: &PhaseContext<'_, T>,
        item: &Item,
    ) -> ItemOutcome {
        match phase {
            Phase::Extract => ctx.extract(item),
            Phase::Rename => ctx.rename(item),
            Phase::Analyze => ctx.analyze(item),
            Phase::Filter => ctx.filter(item),
            Phase::Convert => ctx.convert(item),
            Phase::Package => match self.packager.place(item) {
                Ok(bytes) => ItemOutcome::Success(ItemUpdate {
                    bytes_out: bytes,
                    ..Default::default()
                }),
                Err(e) => ItemOutcome::Failed(e.to_string()),
            },
        }
    }

    fn collect_result(
        &self,
        run_id: &str,
        options: &RunOptions,
        catalog: &JsonCatalog,
        phase_stats: BTreeMap<Phase, PhaseStats>,
        completed: bool,
        started: Instant,
    ) -> RunResult {
        let items = catalog.items();
        let mut item_counts: BTreeMap<String, u32> = BTreeMap::new();
        let mut failures = Vec::new();
        for item in &items {
            *item_counts.entry(item.status.as_str().to_string()).or_default() += 1;
            if matches!(item.status, ItemStatus::Rejected | ItemStatus::Failed) {
                failures.push(ItemFailure {
                    id: item.id,
                    source_ref: item.source_ref.clone(),
                    status: item.status,
                    reason: item
                        .reject_reason
                        .clone()
                        .unwrap_or_else(|| "unspecified".to_string()),
                });
            }
        }

        let mut phase_list = phase_stats;
        RunResult {
            run_id: run_id.to_string(),
            source: options.source.clone(),
            phases: Phase::ORDER
                .iter()
                .map(|p| (*p, phase_list.remove(p).unwrap_or_default()))
                .collect(),
            item_counts,
            failures,
            elapsed_ms: started.elapsed().as_millis() as u64,
            completed,
        }
    }
}

/// Snapshot of a run's resumable state, for the `inspect` command.
#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub run_id: String,
    pub resumable: bool,
    /// Phase a resume would execute next, when resumable.
    pub resume_phase: Option<Phase>,
    pub pending_items: usize,
    /// Status name → count from the persisted catalog.
    pub item_counts: BTreeMap<String, u32>,
    pub updated_at: Option<u64>,
}

/// Inspect the durable state for a (source, config) pair without running.
pub fn inspect(
    work_dir: &Path,
    source: &str,
    config: &PipelineConfig,
) -> Result<InspectReport, PipelineError> {
    let run_id = derive_run_id(source, config);
    let checkpoints = JsonCheckpointStore::new(checkpoint_dir(work_dir));
    let checkpoint = checkpoints.load(&run_id)?;

    let catalog = JsonCatalog::open(work_dir.join("catalog"), &run_id)?;
    let mut item_counts: BTreeMap<String, u32> = BTreeMap::new();
    for item in catalog.items() {
        *item_counts.entry(item.status.as_str().to_string()).or_default() += 1;
    }

    Ok(InspectReport {
        run_id,
        resumable: checkpoint.is_some(),
        resume_phase: checkpoint.as_ref().and_then(|cp| cp.resume_phase()),
        pending_items: checkpoint.as_ref().map(|cp| cp.pending.len()).unwrap_or(0),
        item_counts,
        updated_at: checkpoint.map(|cp| cp.updated_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::MockCodec;
    use crate::fetch::tests::ScriptedTransport;
    use crate::package::tests::MockPackager;
    use crate::source::tests::FixedSource;
    use crate::source::SourceEntry;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn scripted(responses: Vec<(&str, Vec<u8>)>) -> ScriptedTransport {
        ScriptedTransport {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect::<HashMap<_, _>>(),
            ),
        }
    }

    /// Local source entries whose file sizes drive the MockCodec probe
    /// (dimensions == byte count), and thus the filter decision.
    fn local_entries(tmp: &TempDir, sizes: &[usize]) -> Vec<SourceEntry> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                let path = tmp.path().join(format!("src-{i}.png"));
                fs::write(&path, vec![0u8; *size]).unwrap();
                SourceEntry {
                    source_ref: path.to_string_lossy().into_owned(),
                    payload: Payload::LocalFile(path),
                }
            })
            .collect()
    }

    fn options(tmp: &TempDir) -> RunOptions {
        RunOptions {
            source: "fixture".into(),
            work_dir: tmp.path().join("work"),
            output_dir: tmp.path().join("out"),
            force_restart: false,
        }
    }

    fn small_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.workers.count = 2;
        config.retry.base_ms = 1;
        config.retry.cap_ms = 2;
        config
    }

    // =========================================================================
    // Run identity
    // =========================================================================

    #[test]
    fn run_id_deterministic_per_source_and_config() {
        let config = PipelineConfig::default();
        assert_eq!(
            derive_run_id("photos/", &config),
            derive_run_id("photos/", &config)
        );
        assert_ne!(
            derive_run_id("photos/", &config),
            derive_run_id("other/", &config)
        );

        let mut changed = config.clone();
        changed.quality = 80;
        assert_ne!(
            derive_run_id("photos/", &config),
            derive_run_id("photos/", &changed)
        );
    }

    // =========================================================================
    // End-to-end over mocks
    // =========================================================================

    #[test]
    fn full_run_filters_renames_and_packages() {
        let tmp = TempDir::new().unwrap();
        // Probe dims equal byte count: 900/1000 pass min_resolution 800,
        // 100 gets rejected.
        let entries = local_entries(&tmp, &[900, 100, 1000]);
        let source = FixedSource { entries };
        let codec = MockCodec::default();
        let packager = MockPackager::default();
        let config = small_config();

        let orchestrator = PipelineOrchestrator::new(
            config,
            &source,
            &codec,
            scripted(vec![]),
            &packager,
        );
        let result = orchestrator.run(&options(&tmp)).unwrap();

        assert!(result.completed);
        assert_eq!(result.count(ItemStatus::Packaged), 2);
        assert_eq!(result.count(ItemStatus::Rejected), 1);
        assert_eq!(result.failures.len(), 1);
        assert!(result.failures[0].reason.contains("below minimum resolution"));
        assert_eq!(packager.placed.lock().unwrap().len(), 2);
        assert_eq!(packager.finished.lock().unwrap().as_slice(), &[2]);
    }

    #[test]
    fn item_failures_do_not_abort_the_run() {
        let tmp = TempDir::new().unwrap();
        let mut entries = local_entries(&tmp, &[900]);
        // Second entry points at a file that does not exist: extract fails it.
        entries.push(SourceEntry {
            source_ref: "missing.png".into(),
            payload: Payload::LocalFile(PathBuf::from("/no/such/missing.png")),
        });
        let source = FixedSource { entries };
        let codec = MockCodec::default();
        let packager = MockPackager::default();

        let orchestrator = PipelineOrchestrator::new(
            small_config(),
            &source,
            &codec,
            scripted(vec![]),
            &packager,
        );
        let result = orchestrator.run(&options(&tmp)).unwrap();

        assert!(result.completed);
        assert_eq!(result.count(ItemStatus::Packaged), 1);
        assert_eq!(result.count(ItemStatus::Failed), 1);
    }

    #[test]
    fn bad_source_locator_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let source = crate::source::DirectorySource;
        let codec = MockCodec::default();
        let packager = MockPackager::default();

        let orchestrator = PipelineOrchestrator::new(
            small_config(),
            &source,
            &codec,
            scripted(vec![]),
            &packager,
        );
        let mut opts = options(&tmp);
        opts.source = "/no/such/source".into();
        assert!(matches!(
            orchestrator.run(&opts),
            Err(PipelineError::Source(_))
        ));
    }

    #[test]
    fn rename_is_gapless_across_accepted_and_rejected() {
        let tmp = TempDir::new().unwrap();
        let entries = local_entries(&tmp, &[900, 100, 1000, 850]);
        let source = FixedSource { entries };
        let codec = MockCodec::default();
        let packager = MockPackager::default();

        let orchestrator = PipelineOrchestrator::new(
            small_config(),
            &source,
            &codec,
            scripted(vec![]),
            &packager,
        );
        orchestrator.run(&options(&tmp)).unwrap();

        // All four reached Rename before Filter, so names 1..=4 were drawn.
        let placed = packager.placed.lock().unwrap().len();
        assert_eq!(placed, 3);
    }

    // =========================================================================
    // Resume and restart
    // =========================================================================

    #[test]
    fn resume_skips_completed_phases_and_source_open() {
        let tmp = TempDir::new().unwrap();
        let config = small_config();
        let run_id = derive_run_id("fixture", &config);
        let work = tmp.path().join("work");

        // Simulate a crash after Filter: catalog has accepted items with
        // spooled raw files, checkpoint says Filter is done.
        let paths = RunPaths::new(&work, &run_id);
        paths.create().unwrap();
        let catalog = JsonCatalog::open(work.join("catalog"), &run_id).unwrap();
        for id in 1..=2u32 {
            let raw = paths.raw_dir.join(format!("{id:06}.png"));
            fs::write(&raw, vec![0u8; 900]).unwrap();
            let mut item = Item::new(id, format!("src-{id}.png"));
            item.status = ItemStatus::Accepted;
            item.assigned_name = Some(format!("img{id:06}"));
            item.raw_path = Some(raw.to_string_lossy().into_owned());
            catalog.register(item).unwrap();
        }
        catalog.persist().unwrap();
        drop(catalog);

        let checkpoints = JsonCheckpointStore::new(checkpoint_dir(&work));
        let mut cp = Checkpoint::new(&run_id, config.fingerprint());
        cp.phase_cursor = Some(Phase::Filter);
        checkpoints.save(&cp).unwrap();

        // Empty source: if the orchestrator consulted it, nothing would be
        // registered and packaging would place zero items.
        let source = FixedSource { entries: vec![] };
        let codec = MockCodec::default();
        let packager = MockPackager::default();
        let orchestrator = PipelineOrchestrator::new(
            config,
            &source,
            &codec,
            scripted(vec![]),
            &packager,
        );
        let result = orchestrator.run(&options(&tmp)).unwrap();

        assert!(result.completed);
        assert_eq!(result.count(ItemStatus::Packaged), 2);
        // Extract through Filter were skipped entirely.
        let extract_stats = &result.phases[0].1;
        assert_eq!(extract_stats.processed, 0);
    }

    #[test]
    fn checkpoint_under_other_config_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let config = small_config();
        let run_id = derive_run_id("fixture", &config);
        let work = tmp.path().join("work");

        let checkpoints = JsonCheckpointStore::new(checkpoint_dir(&work));
        let cp = Checkpoint::new(&run_id, "someone-elses-fingerprint");
        checkpoints.save(&cp).unwrap();

        let source = FixedSource { entries: vec![] };
        let codec = MockCodec::default();
        let packager = MockPackager::default();
        let orchestrator = PipelineOrchestrator::new(
            config,
            &source,
            &codec,
            scripted(vec![]),
            &packager,
        );
        assert!(matches!(
            orchestrator.run(&options(&tmp)),
            Err(PipelineError::Config(ConfigError::Mismatch(_)))
        ));
    }

    #[test]
    fn force_restart_discards_prior_state() {
        let tmp = TempDir::new().unwrap();
        let config = small_config();
        let run_id = derive_run_id("fixture", &config);
        let work = tmp.path().join("work");

        // Mismatching checkpoint that would otherwise refuse the run.
        let checkpoints = JsonCheckpointStore::new(checkpoint_dir(&work));
        checkpoints
            .save(&Checkpoint::new(&run_id, "stale-fingerprint"))
            .unwrap();

        let entries = local_entries(&tmp, &[900]);
        let source = FixedSource { entries };
        let codec = MockCodec::default();
        let packager = MockPackager::default();
        let orchestrator = PipelineOrchestrator::new(
            config,
            &source,
            &codec,
            scripted(vec![]),
            &packager,
        );
        let mut opts = options(&tmp);
        opts.force_restart = true;
        let result = orchestrator.run(&opts).unwrap();

        assert!(result.completed);
        assert_eq!(result.count(ItemStatus::Packaged), 1);
    }

    #[test]
    fn completed_run_clears_resumable_state() {
        let tmp = TempDir::new().unwrap();
        let entries = local_entries(&tmp, &[900]);
        let source = FixedSource { entries };
        let codec = MockCodec::default();
        let packager = MockPackager::default();
        let config = small_config();
        let run_id = derive_run_id("fixture", &config);

        let orchestrator = PipelineOrchestrator::new(
            config,
            &source,
            &codec,
            scripted(vec![]),
            &packager,
        );
        let opts = options(&tmp);
        orchestrator.run(&opts).unwrap();

        let checkpoints = JsonCheckpointStore::new(checkpoint_dir(&opts.work_dir));
        assert!(checkpoints.load(&run_id).unwrap().is_none());
        // Spool removed by default.
        assert!(!opts.work_dir.join(&run_id).exists());
    }

    #[test]
    fn keep_work_dir_preserves_spool() {
        let tmp = TempDir::new().unwrap();
        let entries = local_entries(&tmp, &[900]);
        let source = FixedSource { entries };
        let codec = MockCodec::default();
        let packager = MockPackager::default();
        let mut config = small_config();
        config.keep_work_dir = true;
        let run_id = derive_run_id("fixture", &config);

        let orchestrator = PipelineOrchestrator::new(
            config,
            &source,
            &codec,
            scripted(vec![]),
            &packager,
        );
        let opts = options(&tmp);
        orchestrator.run(&opts).unwrap();

        assert!(opts.work_dir.join(&run_id).join("raw").exists());
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    #[test]
    fn cancelled_run_reports_incomplete_and_stays_resumable() {
        let tmp = TempDir::new().unwrap();
        let entries = local_entries(&tmp, &[900, 1000]);
        let source = FixedSource { entries };
        let codec = MockCodec::default();
        let packager = MockPackager::default();
        let config = small_config();
        let run_id = derive_run_id("fixture", &config);

        let orchestrator = PipelineOrchestrator::new(
            config,
            &source,
            &codec,
            scripted(vec![]),
            &packager,
        );
        orchestrator.cancel_token().cancel();
        let opts = options(&tmp);
        let result = orchestrator.run(&opts).unwrap();

        assert!(!result.completed);
        assert_eq!(result.count(ItemStatus::Packaged), 0);

        let checkpoints = JsonCheckpointStore::new(checkpoint_dir(&opts.work_dir));
        let cp = checkpoints.load(&run_id).unwrap().unwrap();
        assert_eq!(cp.resume_phase(), Some(Phase::Extract));
        assert_eq!(cp.pending.len(), 2);
    }

    // =========================================================================
    // Inspect
    // =========================================================================

    #[test]
    fn inspect_reflects_checkpoint_and_catalog() {
        let tmp = TempDir::new().unwrap();
        let config = small_config();
        let run_id = derive_run_id("fixture", &config);
        let work = tmp.path().join("work");

        let report = inspect(&work, "fixture", &config).unwrap();
        assert_eq!(report.run_id, run_id);
        assert!(!report.resumable);

        let checkpoints = JsonCheckpointStore::new(checkpoint_dir(&work));
        let mut cp = Checkpoint::new(&run_id, config.fingerprint());
        cp.phase_cursor = Some(Phase::Rename);
        cp.pending = vec![4, 5];
        checkpoints.save(&cp).unwrap();

        let catalog = JsonCatalog::open(work.join("catalog"), &run_id).unwrap();
        catalog.register(Item::new(1, "a.png")).unwrap();
        catalog.persist().unwrap();

        let report = inspect(&work, "fixture", &config).unwrap();
        assert!(report.resumable);
        assert_eq!(report.resume_phase, Some(Phase::Analyze));
        assert_eq!(report.pending_items, 2);
        assert_eq!(report.item_counts.get("pending"), Some(&1));
    }
}
