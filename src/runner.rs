//! Bounded parallel execution of one phase over a set of items.
//!
//! [`PhaseRunner`] owns the mechanics every phase shares: the rayon worker
//! pool, governor admission, catalog bookkeeping, progress events, and
//! intra-phase checkpoints. Phases themselves are just closures from an
//! [`Item`] to an [`ItemOutcome`] - they never touch the pool or the catalog
//! directly, which keeps the per-phase code small and the failure policy in
//! one place.
//!
//! Failure policy: an item-level outcome (`Rejected`, `Failed`) is recorded
//! in the catalog and the run continues. Only infrastructure errors - the
//! catalog refusing a write, a checkpoint that won't persist - abort the
//! phase, because continuing past them would silently lose state.

use crate::catalog::{CatalogError, CatalogStore, StatusDetail};
use crate::checkpoint::CheckpointError;
use crate::governor::MemoryGovernor;
use crate::types::{ImageAttributes, Item, ItemStatus, Phase, PhaseStats};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("worker pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Cooperative cancellation flag, checked before each item dispatch.
///
/// Cancellation is graceful: in-flight items finish, undispatched items are
/// left pending for the next resume.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// What one phase transform decided about one item.
#[derive(Debug)]
pub enum ItemOutcome {
    /// Advance to the phase's completed status, carrying new fields.
    Success(ItemUpdate),
    /// Terminal: the item does not meet pipeline criteria.
    Rejected(String),
    /// Terminal: the item could not be processed.
    Failed(String),
    /// Nothing to do (already satisfied); counted, not transitioned.
    Skipped,
}

/// Fields a successful transform attaches to the status transition.
#[derive(Debug, Default)]
pub struct ItemUpdate {
    pub attributes: Option<ImageAttributes>,
    pub assigned_name: Option<String>,
    pub raw_path: Option<String>,
    pub converted_path: Option<String>,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Progress events streamed to the output printer over mpsc.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    PhaseStarted { phase: Phase, items: usize },
    ItemFinished { phase: Phase, id: u32, status: ItemStatus },
    PhaseFinished { phase: Phase, stats: PhaseStats },
}

/// Intra-phase checkpoint hook: `save` receives the ids still pending and
/// is invoked every `interval_items` completions.
pub struct CheckpointHook<'a> {
    pub interval_items: u32,
    #[allow(clippy::type_complexity)]
    pub save: &'a (dyn Fn(&[u32]) -> Result<(), CheckpointError> + Sync),
}

/// Executes phases over a bounded pool with governor admission.
pub struct PhaseRunner<'a> {
    catalog: &'a dyn CatalogStore,
    governor: MemoryGovernor,
    workers: usize,
    progress: Option<Sender<ProgressEvent>>,
}

impl<'a> PhaseRunner<'a> {
    pub fn new(
        catalog: &'a dyn CatalogStore,
        governor: MemoryGovernor,
        workers: usize,
        progress: Option<Sender<ProgressEvent>>,
    ) -> Self {
        Self {
            catalog,
            governor,
            workers: workers.max(1),
            progress,
        }
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.progress {
            // The printer going away must never stall the pipeline.
            let _ = tx.send(event);
        }
    }

    /// Run `transform` over `items` in parallel and record every outcome.
    ///
    /// Items cancelled before dispatch are left untouched (still pending in
    /// the catalog) and counted as skipped. Item-level outcomes never abort
    /// the phase; infrastructure errors do.
    pub fn execute<F>(
        &self,
        phase: Phase,
        items: &[Item],
        cancel: &CancelToken,
        checkpoint: Option<&CheckpointHook<'_>>,
        transform: F,
    ) -> Result<PhaseStats, RunnerError>
    where
        F: Fn(&Item) -> ItemOutcome + Sync,
    {
        self.emit(ProgressEvent::PhaseStarted {
            phase,
            items: items.len(),
        });
        let started = Instant::now();

        let stats = Mutex::new(PhaseStats::default());
        let pending: Mutex<BTreeSet<u32>> = Mutex::new(items.iter().map(|i| i.id).collect());
        let completions = AtomicU32::new(0);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;

        pool.install(|| {
            items.par_iter().try_for_each(|item| -> Result<(), RunnerError> {
                if cancel.is_cancelled() {
                    stats.lock().unwrap().skipped += 1;
                    return Ok(());
                }

                let estimate = item
                    .attributes
                    .as_ref()
                    .map(|a| a.size_bytes)
                    .unwrap_or(0);
                let _reservation = self.governor.reserve(estimate);

                let outcome = transform(item);
                let status = self.record(phase, item.id, outcome, &stats)?;
                pending.lock().unwrap().remove(&item.id);

                self.emit(ProgressEvent::ItemFinished {
                    phase,
                    id: item.id,
                    status,
                });

                if let Some(hook) = checkpoint {
                    let done = completions.fetch_add(1, Ordering::SeqCst) + 1;
                    if done % hook.interval_items.max(1) == 0 {
                        let snapshot: Vec<u32> =
                            pending.lock().unwrap().iter().copied().collect();
                        self.catalog.persist()?;
                        (hook.save)(&snapshot)?;
                    }
                }
                Ok(())
            })
        })?;

        let mut stats = stats.into_inner().unwrap();
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        self.emit(ProgressEvent::PhaseFinished {
            phase,
            stats: stats.clone(),
        });
        Ok(stats)
    }

    /// Apply one outcome to the catalog and the running stats. Returns the
    /// status the item holds afterwards.
    fn record(
        &self,
        phase: Phase,
        id: u32,
        outcome: ItemOutcome,
        stats: &Mutex<PhaseStats>,
    ) -> Result<ItemStatus, RunnerError> {
        let mut stats = stats.lock().unwrap();
        stats.processed += 1;
        match outcome {
            ItemOutcome::Success(update) => {
                let status = phase.completed_status();
                self.catalog.update_status(
                    id,
                    status,
                    StatusDetail {
                        attributes: update.attributes,
                        assigned_name: update.assigned_name,
                        raw_path: update.raw_path,
                        converted_path: update.converted_path,
                        reason: None,
                    },
                )?;
                stats.succeeded += 1;
                stats.bytes_in += update.bytes_in;
                stats.bytes_out += update.bytes_out;
                Ok(status)
            }
            ItemOutcome::Rejected(reason) => {
                self.catalog.update_status(
                    id,
                    ItemStatus::Rejected,
                    StatusDetail {
                        reason: Some(reason),
                        ..Default::default()
                    },
                )?;
                stats.rejected += 1;
                Ok(ItemStatus::Rejected)
            }
            ItemOutcome::Failed(reason) => {
                self.catalog.update_status(
                    id,
                    ItemStatus::Failed,
                    StatusDetail {
                        reason: Some(reason),
                        ..Default::default()
                    },
                )?;
                stats.failed += 1;
                Ok(ItemStatus::Failed)
            }
            ItemOutcome::Skipped => {
                stats.skipped += 1;
                self.catalog.find(id).map(|i| i.status).map_err(Into::into)
            }
        }
    }
}
