//! Item catalog: the durable record of every item a run has seen.
//!
//! The catalog is the source of truth for "has this item already been
//! processed" - resume logic reads statuses from here, never from the
//! filesystem. Two properties make crash recovery safe:
//!
//! - **Idempotent updates**: re-applying a `(id, status)` transition that
//!   already happened is a no-op, so a re-executed phase after a crash
//!   cannot corrupt state.
//! - **Forward-only transitions**: status moves only forward along the
//!   phase order, except to `Failed`, which is terminal and reachable from
//!   anywhere. A backward transition is a bug in the caller and is reported
//!   as an error.
//!
//! The catalog also owns the rename sequence counter. Assignment goes
//! through the same lock as the item table, so concurrent Rename workers
//! can never draw the same number.
//!
//! Catalog persistence failure is fatal to the run (unlike the processing
//! cache in a build tool, losing this state silently would re-process or
//! double-count items), so `save` errors propagate.

use crate::types::{Item, ItemStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

const CATALOG_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate item {0}")]
    DuplicateItem(u32),
    #[error("unknown item {0}")]
    NotFound(u32),
    #[error("invalid transition for item {id}: {from} -> {to}")]
    InvalidTransition {
        id: u32,
        from: ItemStatus,
        to: ItemStatus,
    },
}

/// Extra fields carried along with a status update.
#[derive(Debug, Clone, Default)]
pub struct StatusDetail {
    pub attributes: Option<crate::types::ImageAttributes>,
    pub assigned_name: Option<String>,
    pub raw_path: Option<String>,
    pub converted_path: Option<String>,
    pub reason: Option<String>,
}

/// Storage contract for the item table.
pub trait CatalogStore: Sync {
    /// Record a new item. `DuplicateItem` when the id already exists -
    /// the guard against double-extraction on resume.
    fn register(&self, item: Item) -> Result<(), CatalogError>;

    /// Apply a status transition. Idempotent: the same `(id, status)`
    /// re-applied is a no-op. Backward transitions error.
    fn update_status(
        &self,
        id: u32,
        status: ItemStatus,
        detail: StatusDetail,
    ) -> Result<(), CatalogError>;

    fn find(&self, id: u32) -> Result<Item, CatalogError>;

    /// Items currently holding `status`, ordered by id.
    fn list_by_status(&self, status: ItemStatus) -> Vec<Item>;

    /// Every item, ordered by id.
    fn items(&self) -> Vec<Item>;

    /// Draw the next rename sequence number. Serialized: unique and
    /// gapless even under concurrent callers.
    fn next_sequence(&self) -> Result<u32, CatalogError>;

    /// Flush to durable storage.
    fn persist(&self) -> Result<(), CatalogError>;

    /// Drop all state, durably. Used by force-restart.
    fn clear(&self) -> Result<(), CatalogError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    version: u32,
    run_id: String,
    next_sequence: u32,
    items: BTreeMap<u32, Item>,
}

struct CatalogState {
    items: BTreeMap<u32, Item>,
    next_sequence: u32,
}

/// JSON-file-backed catalog with the whole table held in memory.
///
/// Mutations happen under one mutex; `persist` snapshots and writes via
/// temp-then-rename. In-memory state and the file only diverge between
/// persists, which the orchestrator bounds with its checkpoint interval.
pub struct JsonCatalog {
    path: PathBuf,
    run_id: String,
    state: Mutex<CatalogState>,
}

impl JsonCatalog {
    /// Open the catalog for `run_id`, loading any prior state from disk.
    pub fn open(dir: impl Into<PathBuf>, run_id: &str) -> Result<Self, CatalogError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{run_id}.catalog.json"));

        let state = match fs::read_to_string(&path) {
            Ok(content) => {
                let file: CatalogFile = serde_json::from_str(&content)?;
                if file.version != CATALOG_VERSION || file.run_id != run_id {
                    CatalogState {
                        items: BTreeMap::new(),
                        next_sequence: 1,
                    }
                } else {
                    CatalogState {
                        items: file.items,
                        next_sequence: file.next_sequence,
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CatalogState {
                items: BTreeMap::new(),
                next_sequence: 1,
            },
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            run_id: run_id.to_string(),
            state: Mutex::new(state),
        })
    }

    fn write_snapshot(&self, state: &CatalogState) -> Result<(), CatalogError> {
        let file = CatalogFile {
            version: CATALOG_VERSION,
            run_id: self.run_id.clone(),
            next_sequence: state.next_sequence,
            items: state.items.clone(),
        };
        let json = serde_json::to_string(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CatalogStore for JsonCatalog {
    fn register(&self, item: Item) -> Result<(), CatalogError> {
        let mut state = self.state.lock().unwrap();
        if state.items.contains_key(&item.id) {
            return Err(CatalogError::DuplicateItem(item.id));
        }
        state.items.insert(item.id, item);
        Ok(())
    }

    fn update_status(
        &self,
        id: u32,
        status: ItemStatus,
        detail: StatusDetail,
    ) -> Result<(), CatalogError> {
        let mut state = self.state.lock().unwrap();
        let item = state
            .items
            .get_mut(&id)
            .ok_or(CatalogError::NotFound(id))?;

        if item.status == status {
            return Ok(()); // idempotent replay
        }
        let forward = status.rank() > item.status.rank();
        let to_failed = status == ItemStatus::Failed && !item.status.is_terminal();
        let to_rejected = status == ItemStatus::Rejected && !item.status.is_terminal();
        if !(forward && !item.status.is_terminal()) && !to_failed && !to_rejected {
            return Err(CatalogError::InvalidTransition {
                id,
                from: item.status,
                to: status,
            });
        }

        item.status = status;
        if let Some(attrs) = detail.attributes {
            item.attributes = Some(attrs);
        }
        if let Some(name) = detail.assigned_name {
            item.assigned_name = Some(name);
        }
        if let Some(path) = detail.raw_path {
            item.raw_path = Some(path);
        }
        if let Some(path) = detail.converted_path {
            item.converted_path = Some(path);
        }
        match status {
            ItemStatus::Rejected | ItemStatus::Failed => item.reject_reason = detail.reason,
            _ => {}
        }
        Ok(())
    }

    fn find(&self, id: u32) -> Result<Item, CatalogError> {
        self.state
            .lock()
            .unwrap()
            .items
            .get(&id)
            .cloned()
            .ok_or(CatalogError::NotFound(id))
    }

    fn list_by_status(&self, status: ItemStatus) -> Vec<Item> {
        self.state
            .lock()
            .unwrap()
            .items
            .values()
            .filter(|i| i.status == status)
            .cloned()
            .collect()
    }

    fn items(&self) -> Vec<Item> {
        self.state.lock().unwrap().items.values().cloned().collect()
    }

    fn next_sequence(&self) -> Result<u32, CatalogError> {
        let mut state = self.state.lock().unwrap();
        let seq = state.next_sequence;
        state.next_sequence += 1;
        Ok(seq)
    }

    fn persist(&self) -> Result<(), CatalogError> {
        let state = self.state.lock().unwrap();
        self.write_snapshot(&state)
    }

    fn clear(&self) -> Result<(), CatalogError> {
        let mut state = self.state.lock().unwrap();
        state.items.clear();
        state.next_sequence = 1;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
