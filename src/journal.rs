//! Durable write-through journal of complaint records.
//!
//! The in-memory store is authoritative while the process runs; the journal
//! lets a restarted process rebuild it. Each complaint is one sled entry keyed
//! by its UUID and holding the latest bincode-encoded record.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::models::Complaint;

/// Bumped whenever the encoded record layout changes.
pub const RECORD_SCHEMA: u32 = 1;

/// Persistence hook used by the store on every committed write
pub trait Journal: Send + Sync {
    /// Durably record the latest state of a complaint.
    fn persist(&self, complaint: &Complaint) -> Result<()>;

    /// Every recorded complaint.
    fn load_all(&self) -> Result<Vec<Complaint>>;
}

#[derive(Serialize, Deserialize)]
struct JournalRecord {
    schema: u32,
    written_at: DateTime<Utc>,
    complaint: Complaint,
}

/// sled-backed journal
#[derive(Debug, Clone)]
pub struct SledJournal {
    db: sled::Db,
}

impl SledJournal {
    /// Open (or create) a journal in `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let db = sled::open(dir)?;
        Ok(Self { db })
    }

    /// Temporary journal that disappears when dropped.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Number of recorded complaints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.db.len()
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

impl Journal for SledJournal {
    fn persist(&self, complaint: &Complaint) -> Result<()> {
        let record = JournalRecord {
            schema: RECORD_SCHEMA,
            written_at: Utc::now(),
            complaint: complaint.clone(),
        };
        let data = bincode::serialize(&record)?;
        self.db.insert(complaint.id.as_bytes(), data)?;
        self.db.flush()?;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Complaint>> {
        let mut complaints = Vec::with_capacity(self.db.len());
        for entry in self.db.iter() {
            let (_, data) = entry?;
            let record: JournalRecord = bincode::deserialize(&data)?;
            if record.schema != RECORD_SCHEMA {
                return Err(CoreError::StorageUnavailable(format!(
                    "journal record schema {} is not supported (expected {RECORD_SCHEMA})",
                    record.schema
                )));
            }
            complaints.push(record.complaint);
        }
        Ok(complaints)
    }
}
