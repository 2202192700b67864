//! Proximity-based duplicate detection.
//!
//! A new report within [`DEFAULT_DUPLICATE_RADIUS_M`] of an active complaint is
//! folded into that complaint instead of opening a new ticket. The check and the
//! following create-or-merge must be one atomic step, otherwise two people
//! photographing the same pile at the same moment would both open tickets. The
//! detector provides that step as a critical section over the lock stripes of
//! the submission's grid neighbourhood.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::geo::{haversine_m, Grid, GridCell};
use crate::models::{Complaint, Coordinates};
use crate::store::ComplaintStore;

/// Reports closer than this to an active complaint are duplicates.
pub const DEFAULT_DUPLICATE_RADIUS_M: f64 = 50.0;

/// Outcome of a duplicate check
#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateCheck {
    /// No active complaint nearby; a new one may be created
    NoMatch,
    /// Fold the submission into this primary (snapshot taken during the check)
    MergeInto(Box<Complaint>),
}

/// Striped mutexes keyed by grid cell
#[derive(Debug)]
pub struct SpatialLocks {
    stripes: Vec<Mutex<()>>,
}

/// Held stripes of one neighbourhood; released on drop
#[derive(Debug)]
pub struct NeighbourhoodGuard<'a> {
    _guards: Vec<MutexGuard<'a, ()>>,
}

impl SpatialLocks {
    /// Create `stripes` independent locks (at least one).
    #[must_use]
    pub fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    fn stripe_of(&self, cell: GridCell) -> usize {
        let mut hasher = DefaultHasher::new();
        cell.hash(&mut hasher);
        #[allow(clippy::cast_possible_truncation)]
        let hash = hasher.finish() as usize;
        hash % self.stripes.len()
    }

    /// Lock every stripe covering `cells`, always in ascending stripe order.
    pub fn lock(&self, cells: &[GridCell]) -> NeighbourhoodGuard<'_> {
        let mut indices: Vec<usize> = cells.iter().map(|cell| self.stripe_of(*cell)).collect();
        indices.sort_unstable();
        indices.dedup();
        let guards = indices
            .into_iter()
            .map(|i| self.stripes[i].lock().unwrap_or_else(PoisonError::into_inner))
            .collect();
        NeighbourhoodGuard { _guards: guards }
    }
}

/// Decides whether a submission merges into an existing active complaint
#[derive(Debug)]
pub struct DuplicateDetector {
    radius_m: f64,
    max_age: Option<Duration>,
    grid: Grid,
    locks: SpatialLocks,
}

impl DuplicateDetector {
    /// Detector with the given radius over `grid`, using `stripes` neighbourhood locks.
    #[must_use]
    pub fn new(radius_m: f64, grid: Grid, stripes: usize) -> Self {
        Self {
            radius_m,
            max_age: None,
            grid,
            locks: SpatialLocks::new(stripes),
        }
    }

    /// Only merge into complaints created within `max_age` of the submission.
    #[must_use]
    pub const fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    /// Merge radius in meters.
    #[must_use]
    pub const fn radius_m(&self) -> f64 {
        self.radius_m
    }

    /// Enter the critical section for submissions around `coords`.
    ///
    /// Hold the guard across [`DuplicateDetector::check`] and the write that
    /// follows it.
    pub fn lock_neighbourhood(&self, coords: Coordinates) -> NeighbourhoodGuard<'_> {
        self.locks.lock(&self.grid.neighbourhood(coords))
    }

    /// Every complaint, active or not, indexed around `coords`.
    pub fn neighbours(&self, store: &ComplaintStore, coords: Coordinates) -> Result<Vec<Complaint>> {
        store.in_cells(&self.grid.neighbourhood(coords))
    }

    /// Find the primary for a submission at `coords`.
    ///
    /// Considers active complaints within the radius (inclusive); the nearest
    /// wins, ties go to the earliest created, then to the lowest code.
    pub fn check(&self, store: &ComplaintStore, coords: Coordinates, now: DateTime<Utc>) -> Result<DuplicateCheck> {
        let nearest = self
            .neighbours(store, coords)?
            .into_iter()
            .filter(Complaint::is_active)
            .filter(|c| self.max_age.map_or(true, |age| now - c.created_at <= age))
            .map(|c| (haversine_m(coords, c.coordinates), c))
            .filter(|(distance, _)| *distance <= self.radius_m)
            .min_by(|(da, a), (db, b)| {
                da.partial_cmp(db)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.created_at.cmp(&b.created_at))
                    .then_with(|| a.complaint_id.cmp(&b.complaint_id))
            });

        Ok(match nearest {
            Some((distance, primary)) => {
                tracing::debug!(
                    primary = %primary.complaint_id,
                    distance_m = distance,
                    "Submission matches an active complaint"
                );
                DuplicateCheck::MergeInto(Box::new(primary))
            }
            None => DuplicateCheck::NoMatch,
        })
    }
}
