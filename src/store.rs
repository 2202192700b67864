//! The authoritative collection of complaints.
//!
//! All complaints live in one map behind a single `RwLock`. Writers never hold
//! the lock while deciding anything: they read a snapshot, work out the next
//! state, then [`ComplaintStore::commit`] swaps it in only if the stored
//! version is still the one they read. Readers therefore always see a
//! point-in-time view, and two racing transitions on one complaint cannot both
//! land.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::geo::{Grid, GridCell};
use crate::journal::Journal;
use crate::models::{Complaint, Status, WorkerId};

#[derive(Debug, Default)]
struct StoreInner {
    by_id: HashMap<Uuid, Complaint>,
    by_code: HashMap<String, Uuid>,
    cells: HashMap<GridCell, Vec<Uuid>>,
}

/// Keyed collection of complaint entities
pub struct ComplaintStore {
    inner: RwLock<StoreInner>,
    grid: Grid,
    journal: Option<Arc<dyn Journal>>,
}

impl std::fmt::Debug for ComplaintStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplaintStore")
            .field("grid", &self.grid)
            .field("journaled", &self.journal.is_some())
            .finish_non_exhaustive()
    }
}

impl ComplaintStore {
    /// Empty in-memory store.
    #[must_use]
    pub fn new(grid: Grid) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            grid,
            journal: None,
        }
    }

    /// Store backed by a journal; existing records are loaded immediately.
    pub fn open(grid: Grid, journal: Arc<dyn Journal>) -> Result<Self> {
        let mut inner = StoreInner::default();
        for complaint in journal.load_all()? {
            index(&mut inner, grid, complaint);
        }
        info!(complaints = inner.by_id.len(), "Complaint store loaded from journal");
        Ok(Self {
            inner: RwLock::new(inner),
            grid,
            journal: Some(journal),
        })
    }

    /// Grid used by the spatial index.
    #[must_use]
    pub const fn grid(&self) -> Grid {
        self.grid
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreInner>> {
        self.inner
            .read()
            .map_err(|_| CoreError::StorageUnavailable("complaint store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreInner>> {
        self.inner
            .write()
            .map_err(|_| CoreError::StorageUnavailable("complaint store lock poisoned".into()))
    }

    /// Look a complaint up by its code (`CC-...`) or its UUID.
    pub fn get(&self, key: &str) -> Result<Complaint> {
        let inner = self.read()?;
        let id = inner
            .by_code
            .get(key)
            .copied()
            .or_else(|| Uuid::parse_str(key).ok());
        id.and_then(|id| inner.by_id.get(&id).cloned())
            .ok_or_else(|| CoreError::NotFound(format!("complaint {key}")))
    }

    /// Look a complaint up by UUID.
    pub fn get_by_id(&self, id: Uuid) -> Result<Complaint> {
        self.read()?
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("complaint {id}")))
    }

    /// Add a newly created complaint. Codes are never reused.
    pub fn insert(&self, complaint: Complaint) -> Result<Complaint> {
        let mut inner = self.write()?;
        if inner.by_code.contains_key(&complaint.complaint_id) || inner.by_id.contains_key(&complaint.id) {
            return Err(CoreError::Conflict(complaint.complaint_id));
        }
        if let Some(journal) = &self.journal {
            journal.persist(&complaint)?;
        }
        debug!(complaint_id = %complaint.complaint_id, "Complaint inserted");
        index(&mut inner, self.grid, complaint.clone());
        Ok(complaint)
    }

    /// Replace a complaint if nobody else has written it since `expected_version`.
    ///
    /// The stored copy gets `expected_version + 1`. On a version mismatch the
    /// store is left untouched and `Conflict` is returned.
    pub fn commit(&self, mut next: Complaint, expected_version: u64) -> Result<Complaint> {
        let mut inner = self.write()?;
        let current = inner
            .by_id
            .get(&next.id)
            .ok_or_else(|| CoreError::NotFound(format!("complaint {}", next.complaint_id)))?;
        if current.version != expected_version {
            debug!(
                complaint_id = %next.complaint_id,
                expected = expected_version,
                found = current.version,
                "Version check failed"
            );
            return Err(CoreError::Conflict(next.complaint_id));
        }
        next.version = expected_version + 1;
        if let Some(journal) = &self.journal {
            journal.persist(&next)?;
        }
        inner.by_id.insert(next.id, next.clone());
        Ok(next)
    }

    /// Every complaint indexed in the given cells, in no particular order.
    pub fn in_cells(&self, cells: &[GridCell]) -> Result<Vec<Complaint>> {
        let inner = self.read()?;
        Ok(cells
            .iter()
            .filter_map(|cell| inner.cells.get(cell))
            .flatten()
            .filter_map(|id| inner.by_id.get(id).cloned())
            .collect())
    }

    /// Run `f` over a consistent view of every complaint.
    ///
    /// No write can land while `f` runs, so keep it short.
    pub fn scan<R>(&self, f: impl FnOnce(&mut dyn Iterator<Item = &Complaint>) -> R) -> Result<R> {
        let inner = self.read()?;
        let mut values = inner.by_id.values();
        Ok(f(&mut values))
    }

    /// Clones of every complaint passing `predicate`.
    pub fn select(&self, predicate: impl Fn(&Complaint) -> bool) -> Result<Vec<Complaint>> {
        self.scan(|all| all.filter(|c| predicate(c)).cloned().collect())
    }

    /// Number of ASSIGNED complaints held by each worker.
    pub fn assigned_counts(&self) -> Result<HashMap<WorkerId, usize>> {
        self.scan(|all| {
            let mut counts = HashMap::new();
            for complaint in all.filter(|c| c.status == Status::Assigned) {
                if let Some(worker) = complaint.assigned_worker {
                    *counts.entry(worker).or_insert(0) += 1;
                }
            }
            counts
        })
    }

    /// Every complaint code issued so far.
    pub fn codes(&self) -> Result<Vec<String>> {
        Ok(self.read()?.by_code.keys().cloned().collect())
    }

    /// Number of complaints.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.by_id.len())
    }

    /// True when no complaint exists.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn index(inner: &mut StoreInner, grid: Grid, complaint: Complaint) {
    let cell = grid.cell_of(complaint.coordinates);
    inner.cells.entry(cell).or_default().push(complaint.id);
    inner.by_code.insert(complaint.complaint_id.clone(), complaint.id);
    inner.by_id.insert(complaint.id, complaint);
}
