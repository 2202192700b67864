//! Worker ranking for dispatch.
//!
//! Ranking is advisory and pure: it reads a complaint and a candidate list and
//! returns an order. Nothing is assigned until a dispatcher calls `assign`.

use std::cmp::Ordering;

use serde::Serialize;

use crate::directory::WorkerInfo;
use crate::geo::haversine_m;
use crate::models::{Complaint, WorkerId};

/// A worker considered for a complaint
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Directory entry
    pub worker: WorkerInfo,
    /// ASSIGNED complaints the worker currently holds
    pub assigned_count: usize,
}

/// A ranked candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedWorker {
    pub worker: WorkerId,
    pub name: Option<String>,
    pub distance_m: f64,
    pub assigned_count: usize,
}

/// Orders candidates for a complaint
#[derive(Debug, Default, Clone, Copy)]
pub struct AssignmentScheduler;

impl AssignmentScheduler {
    /// Active candidates by ascending distance, then ascending load, then id.
    #[must_use]
    pub fn rank(complaint: &Complaint, candidates: &[Candidate]) -> Vec<RankedWorker> {
        let mut ranked: Vec<RankedWorker> = candidates
            .iter()
            .filter(|c| c.worker.active)
            .map(|c| RankedWorker {
                worker: c.worker.id,
                name: c.worker.name.clone(),
                distance_m: haversine_m(complaint.coordinates, c.worker.coordinates),
                assigned_count: c.assigned_count,
            })
            .collect();

        ranked.sort_by(|a, b| {
            a.distance_m
                .partial_cmp(&b.distance_m)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.assigned_count.cmp(&b.assigned_count))
                .then_with(|| a.worker.cmp(&b.worker))
        });
        ranked
    }
}
