//! Worker directory collaborator.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::models::{Coordinates, WorkerId};

/// What the engine needs to know about a field worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerInfo {
    /// Worker identifier
    pub id: WorkerId,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Whether the worker can take new assignments
    pub active: bool,
    /// Last known position
    pub coordinates: Coordinates,
}

/// Lookup of workers by id
pub trait WorkerDirectory: Send + Sync {
    /// Fetch a worker; unknown ids yield `NotFound`.
    fn lookup(&self, worker: WorkerId) -> Result<WorkerInfo>;

    /// Every known worker, for ranking.
    fn all(&self) -> Result<Vec<WorkerInfo>>;
}

#[derive(Debug, Deserialize)]
struct Roster {
    workers: Vec<WorkerInfo>,
}

/// Fixed in-memory directory, optionally loaded from a YAML roster
#[derive(Debug, Clone, Default)]
pub struct StaticWorkerDirectory {
    workers: HashMap<WorkerId, WorkerInfo>,
}

impl StaticWorkerDirectory {
    /// Build a directory from a list of workers.
    #[must_use]
    pub fn new<I: IntoIterator<Item = WorkerInfo>>(workers: I) -> Self {
        Self {
            workers: workers.into_iter().map(|w| (w.id, w)).collect(),
        }
    }

    /// Parse a roster of the form `workers: [{id, name, active, coordinates: {lat, lon}}]`.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let roster: Roster = serde_yaml::from_str(text)
            .map_err(|e| CoreError::Config(format!("invalid worker roster: {e}")))?;
        Ok(Self::new(roster.workers))
    }

    /// Load a roster file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            CoreError::StorageUnavailable(format!("reading roster {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text)
    }
}

impl WorkerDirectory for StaticWorkerDirectory {
    fn lookup(&self, worker: WorkerId) -> Result<WorkerInfo> {
        self.workers
            .get(&worker)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("worker {worker}")))
    }

    fn all(&self) -> Result<Vec<WorkerInfo>> {
        let mut workers: Vec<WorkerInfo> = self.workers.values().cloned().collect();
        workers.sort_by_key(|w| w.id);
        Ok(workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;

    const ROSTER: &str = r"
workers:
  - id: 7
    name: John Doe
    active: true
    coordinates: { lat: 12.9716, lon: 77.5946 }
  - id: 8
    active: false
    coordinates: { lat: 12.98, lon: 77.60 }
";

    #[test]
    fn test_roster_from_yaml() {
        let directory = StaticWorkerDirectory::from_yaml(ROSTER).unwrap();
        let john = directory.lookup(UserId(7)).unwrap();
        assert_eq!(john.name.as_deref(), Some("John Doe"));
        assert!(john.active);
        assert!(!directory.lookup(UserId(8)).unwrap().active);
    }

    #[test]
    fn test_unknown_worker_is_not_found() {
        let directory = StaticWorkerDirectory::default();
        assert!(matches!(directory.lookup(UserId(1)), Err(CoreError::NotFound(_))));
    }
}
