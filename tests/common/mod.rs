//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use citycare::audit::MemoryAuditLog;
use citycare::clock::ManualClock;
use citycare::config::EngineConfig;
use citycare::directory::{StaticWorkerDirectory, WorkerInfo};
use citycare::models::UserId;
use citycare::{Actor, Collaborators, ComplaintService, Coordinates, Submission};

/// Near the complaints used throughout the tests
pub const WORKER_NEAR: u64 = 7;
/// A few kilometres away
pub const WORKER_FAR: u64 = 8;
/// On the roster but not taking work
pub const WORKER_INACTIVE: u64 = 9;

pub struct Harness {
    pub service: ComplaintService,
    pub clock: Arc<ManualClock>,
    pub audit: Arc<MemoryAuditLog>,
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

pub fn roster() -> StaticWorkerDirectory {
    StaticWorkerDirectory::new([
        WorkerInfo {
            id: UserId(WORKER_NEAR),
            name: Some("near".into()),
            active: true,
            coordinates: Coordinates::new(12.9720, 77.5950),
        },
        WorkerInfo {
            id: UserId(WORKER_FAR),
            name: Some("far".into()),
            active: true,
            coordinates: Coordinates::new(13.0200, 77.6400),
        },
        WorkerInfo {
            id: UserId(WORKER_INACTIVE),
            name: Some("off duty".into()),
            active: false,
            coordinates: Coordinates::new(12.9716, 77.5946),
        },
    ])
}

pub fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

pub fn harness_with(settings: EngineConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(start()));
    let audit = Arc::new(MemoryAuditLog::new());
    let collaborators = Collaborators::in_memory(Arc::new(roster()))
        .with_clock(clock.clone())
        .with_audit(audit.clone());
    let service = ComplaintService::in_memory(settings, collaborators).unwrap();
    Harness { service, clock, audit }
}

pub fn submission(lat: f64, lon: f64) -> Submission {
    Submission {
        complainant_name: Some("Asha".into()),
        coordinates: Coordinates::new(lat, lon),
        address: None,
        photo_before: b"jpeg bytes".to_vec(),
    }
}

pub fn citizen(user: u64) -> Actor {
    Actor::citizen(user)
}

pub fn officer() -> Actor {
    Actor::officer(2)
}

pub fn inspector() -> Actor {
    Actor::inspector(3)
}

/// True when every status change in `walk` is an edge of the state machine.
pub fn is_valid_walk(walk: &[citycare::Status]) -> bool {
    use citycare::Status::{Assigned, Escalated, Pending, Rejected, Resolved};
    walk.first() == Some(&Pending)
        && walk.windows(2).all(|pair| {
            matches!(
                (pair[0], pair[1]),
                (Pending, Pending)
                    | (Assigned, Assigned)
                    | (Escalated, Escalated)
                    | (Pending | Escalated, Assigned)
                    | (Assigned, Resolved | Rejected)
                    | (Pending | Assigned, Escalated)
            )
        })
}
