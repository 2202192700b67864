//! Data models for complaint tracking
//!
//! This module contains the complaint entity and the small value types that flow
//! through every engine operation: statuses, actors, coordinates and filters.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Identifier of a user (citizen, inspector, collector or officer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

/// Field workers are users with the collector role.
pub type WorkerId = UserId;

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| CoreError::Validation(format!("invalid user id: {s}")))
    }
}

/// Role of the acting user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Member of the public submitting reports
    Citizen,
    /// Sanitary inspector who dispatches work
    Inspector,
    /// Garbage collector who resolves or rejects work
    Collector,
    /// Municipal officer with full access
    Officer,
    /// The engine itself (scheduled sweeps)
    System,
}

impl Role {
    /// Upper-case token for this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Citizen => "CITIZEN",
            Self::Inspector => "INSPECTOR",
            Self::Collector => "COLLECTOR",
            Self::Officer => "OFFICER",
            Self::System => "SYSTEM",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CITIZEN" => Ok(Self::Citizen),
            "INSPECTOR" => Ok(Self::Inspector),
            "COLLECTOR" => Ok(Self::Collector),
            "OFFICER" => Ok(Self::Officer),
            "SYSTEM" => Ok(Self::System),
            other => Err(CoreError::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// The identity performing an operation. Always passed explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Acting user
    pub user: UserId,
    /// Role the user acts under
    pub role: Role,
}

impl Actor {
    /// Build an actor from a user id and role.
    #[must_use]
    pub const fn new(user: u64, role: Role) -> Self {
        Self { user: UserId(user), role }
    }

    /// A citizen actor.
    #[must_use]
    pub const fn citizen(user: u64) -> Self {
        Self::new(user, Role::Citizen)
    }

    /// An inspector actor.
    #[must_use]
    pub const fn inspector(user: u64) -> Self {
        Self::new(user, Role::Inspector)
    }

    /// A collector actor.
    #[must_use]
    pub const fn collector(user: u64) -> Self {
        Self::new(user, Role::Collector)
    }

    /// An officer actor.
    #[must_use]
    pub const fn officer(user: u64) -> Self {
        Self::new(user, Role::Officer)
    }

    /// The engine's own identity, used by scheduled sweeps.
    #[must_use]
    pub const fn system() -> Self {
        Self::new(0, Role::System)
    }
}

/// A point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude, -90..=90
    pub lat: f64,
    /// Longitude, -180..=180
    pub lon: f64,
}

impl Coordinates {
    /// Create a coordinate pair without range checks.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lon)
    }
}

impl FromStr for Coordinates {
    type Err = CoreError;

    /// Parse the `"lat,lng"` form used by clients.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::Validation(format!("invalid coordinates: {s}"));
        let (lat, lon) = s.split_once(',').ok_or_else(invalid)?;
        let lat = lat.trim().parse::<f64>().map_err(|_| invalid())?;
        let lon = lon.trim().parse::<f64>().map_err(|_| invalid())?;
        Ok(Self { lat, lon })
    }
}

/// Opaque reference to a photo held by the blob store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(pub String);

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Complaint status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Submitted, not yet dispatched
    Pending,
    /// Bound to exactly one worker
    Assigned,
    /// Cleaned up (terminal)
    Resolved,
    /// Refused by the worker (terminal)
    Rejected,
    /// Overdue or forced; awaiting re-dispatch
    Escalated,
}

impl Status {
    /// Every status, in table order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Assigned,
        Self::Resolved,
        Self::Rejected,
        Self::Escalated,
    ];

    /// Upper-case token for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Assigned => "ASSIGNED",
            Self::Resolved => "RESOLVED",
            Self::Rejected => "REJECTED",
            Self::Escalated => "ESCALATED",
        }
    }

    /// PENDING, ASSIGNED or ESCALATED.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Assigned | Self::Escalated)
    }

    /// RESOLVED or REJECTED.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = CoreError;

    /// Status tokens are exact upper-case enum names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| CoreError::Validation(format!("unknown status: {s}")))
    }
}

/// A state-changing operation on a complaint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// New complaint created
    Create,
    /// Duplicate submission folded into a primary
    Merge,
    /// Bound to a worker
    Assign,
    /// Cleaned up by the assigned worker
    Resolve,
    /// Refused by the assigned worker
    Reject,
    /// Forced or overdue escalation
    Escalate,
}

impl Operation {
    /// Lower-case label for this operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Merge => "merge",
            Self::Assign => "assign",
            Self::Resolve => "resolve",
            Self::Reject => "reject",
            Self::Escalate => "escalate",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of a submission that was merged into a primary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateLink {
    /// Name the suppressed submitter gave
    pub submitter_name: Option<String>,
    /// User who submitted the suppressed report
    pub submitter: UserId,
    /// Where the suppressed report was taken
    pub coordinates: Coordinates,
    /// Photo attached to the suppressed report
    pub photo: BlobRef,
    /// When the suppressed report arrived
    pub submitted_at: DateTime<Utc>,
}

/// A tracked waste complaint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    /// Opaque unique identifier
    pub id: Uuid,
    /// Human-readable code, e.g. `CC-20260101-000001`
    pub complaint_id: String,
    /// Name the complainant gave, informational only
    pub complainant_name: Option<String>,
    /// User who submitted the report
    pub complainant: UserId,
    /// Location of the reported waste
    pub coordinates: Coordinates,
    /// Cached display address
    pub location_address: Option<String>,
    /// Photo taken at submission
    pub photo_before: BlobRef,
    /// Photo taken at resolution
    pub photo_after: Option<BlobRef>,
    /// Current lifecycle status
    pub status: Status,
    /// Priority, raised by duplicate merges and escalation
    pub urgency_level: u32,
    /// Worker currently bound to the complaint; set iff status is ASSIGNED
    pub assigned_worker: Option<WorkerId>,
    /// Who dispatched the current or last assignment
    pub assigned_by: Option<UserId>,
    /// Worker who resolved the complaint
    pub resolved_by: Option<WorkerId>,
    /// Set only when status is REJECTED
    pub rejection_reason: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Time of the last status transition
    pub last_status_change_at: DateTime<Utc>,
    /// Suppressed duplicate submissions, append-only
    pub duplicate_links: Vec<DuplicateLink>,
    /// Optimistic concurrency counter, bumped on every committed write
    pub version: u64,
}

impl Complaint {
    /// Whether the complaint still needs work.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Whether the complaint has sat in its current status longer than `window`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.last_status_change_at > window
    }

    /// Number of reports folded into this complaint, itself included.
    #[must_use]
    pub fn report_count(&self) -> usize {
        self.duplicate_links.len() + 1
    }
}

/// A new report as received from a citizen
#[derive(Debug, Clone)]
pub struct Submission {
    /// Optional name the citizen gives
    pub complainant_name: Option<String>,
    /// Where the waste is
    pub coordinates: Coordinates,
    /// Display address, if the client resolved one
    pub address: Option<String>,
    /// Raw photo bytes, required
    pub photo_before: Vec<u8>,
}

/// Result of a submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    /// The created complaint, or the primary it was merged into
    pub complaint: Complaint,
    /// True when the submission was merged into an existing primary
    pub is_duplicate: bool,
}

/// Filter for listing complaints
#[derive(Debug, Clone, Default)]
pub struct ComplaintFilter {
    /// Keep only these statuses
    pub statuses: Option<BTreeSet<Status>>,
    /// Keep only complaints bound to this worker
    pub assigned_worker: Option<WorkerId>,
}

impl ComplaintFilter {
    /// Restrict to a set of statuses.
    #[must_use]
    pub fn with_statuses<I: IntoIterator<Item = Status>>(mut self, statuses: I) -> Self {
        self.statuses = Some(statuses.into_iter().collect());
        self
    }

    /// Restrict to a worker.
    #[must_use]
    pub const fn with_worker(mut self, worker: WorkerId) -> Self {
        self.assigned_worker = Some(worker);
        self
    }

    /// Parse a comma-separated list of status tokens, e.g. `"PENDING,ESCALATED"`.
    pub fn parse_statuses(list: &str) -> Result<BTreeSet<Status>, CoreError> {
        list.split(',')
            .filter(|token| !token.trim().is_empty())
            .map(str::parse)
            .collect()
    }

    /// Whether a complaint passes this filter.
    #[must_use]
    pub fn matches(&self, complaint: &Complaint) -> bool {
        let status_ok = self
            .statuses
            .as_ref()
            .map_or(true, |set| set.contains(&complaint.status));
        let worker_ok = self
            .assigned_worker
            .map_or(true, |worker| complaint.assigned_worker == Some(worker));
        status_ok && worker_ok
    }
}
