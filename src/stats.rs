//! Status counts for dashboards.
//!
//! Counts come from one read-locked scan, so they always add up even while
//! transitions are being committed.

use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::models::{Complaint, Status};
use crate::store::ComplaintStore;

/// Complaint counts per status, taken from one consistent view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Complaints awaiting dispatch
    pub pending: usize,
    /// Complaints bound to a worker
    pub assigned: usize,
    /// Cleaned up
    pub resolved: usize,
    /// Closed without cleanup
    pub rejected: usize,
    /// Overdue or forced up the chain
    pub escalated: usize,
    /// PENDING + ASSIGNED + ESCALATED
    pub active: usize,
    /// Every complaint in the store
    pub total: usize,
}

impl Stats {
    /// Tally a set of complaints.
    pub fn tally<'a>(complaints: impl Iterator<Item = &'a Complaint>) -> Self {
        let mut stats = Self::default();
        for complaint in complaints {
            match complaint.status {
                Status::Pending => stats.pending += 1,
                Status::Assigned => stats.assigned += 1,
                Status::Resolved => stats.resolved += 1,
                Status::Rejected => stats.rejected += 1,
                Status::Escalated => stats.escalated += 1,
            }
            stats.total += 1;
        }
        stats.active = stats.pending + stats.assigned + stats.escalated;
        stats
    }
}

/// Computes [`Stats`] over the store
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    store: Arc<ComplaintStore>,
}

impl StatsAggregator {
    /// Aggregator over `store`.
    pub const fn new(store: Arc<ComplaintStore>) -> Self {
        Self { store }
    }

    /// Counts from a single point-in-time view of the store.
    pub fn snapshot(&self) -> Result<Stats> {
        self.store.scan(|all| Stats::tally(all))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Grid;
    use crate::models::{BlobRef, Coordinates, UserId};
    use chrono::Utc;
    use uuid::Uuid;

    fn complaint(n: usize, status: Status) -> Complaint {
        let now = Utc::now();
        Complaint {
            id: Uuid::new_v4(),
            complaint_id: format!("CC-20260301-{n:06}"),
            complainant_name: None,
            complainant: UserId(1),
            coordinates: Coordinates::new(10.0 + n as f64 * 0.1, 70.0),
            location_address: None,
            photo_before: BlobRef("mem:before".into()),
            photo_after: None,
            status,
            urgency_level: 1,
            assigned_worker: (status == Status::Assigned).then_some(UserId(7)),
            assigned_by: None,
            resolved_by: None,
            rejection_reason: None,
            created_at: now,
            last_status_change_at: now,
            duplicate_links: Vec::new(),
            version: 1,
        }
    }

    #[test]
    fn test_snapshot_counts() {
        let store = Arc::new(ComplaintStore::new(Grid::new(0.01)));
        let mix = [(Status::Pending, 10), (Status::Assigned, 3), (Status::Resolved, 2), (Status::Escalated, 1)];
        let mut n = 0;
        for (status, count) in mix {
            for _ in 0..count {
                n += 1;
                store.insert(complaint(n, status)).unwrap();
            }
        }

        let stats = StatsAggregator::new(store).snapshot().unwrap();
        assert_eq!(stats.pending, 10);
        assert_eq!(stats.active, 14);
        assert_eq!(stats.resolved, 2);
        assert_eq!(stats.rejected, 0);
        assert_eq!(stats.total, 16);
    }

    #[test]
    fn test_empty_store() {
        let store = Arc::new(ComplaintStore::new(Grid::new(0.01)));
        assert_eq!(StatsAggregator::new(store).snapshot().unwrap(), Stats::default());
    }
}
