//! Audit trail of committed transitions.
//!
//! The engine does not own an audit store. It hands every committed change to an
//! [`AuditSink`]; hosts that need a durable log plug one in.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::{Actor, Operation, Status};

/// One committed change to a complaint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    /// Complaint code
    pub complaint_id: String,
    /// Status before the change (`None` on creation)
    pub from: Option<Status>,
    /// Status after the change
    pub to: Status,
    /// What happened
    pub operation: Operation,
    /// Who did it
    pub actor: Actor,
    /// Urgency after the change
    pub urgency_level: u32,
    /// Stored version after the change
    pub version: u64,
    /// When it happened
    pub at: DateTime<Utc>,
}

/// Receiver of committed transitions
pub trait AuditSink: Send + Sync {
    /// Called once per committed change, after the commit.
    fn record(&self, event: &TransitionEvent);
}

/// Emits each event as a structured log line
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &TransitionEvent) {
        info!(
            target: "citycare::audit",
            complaint_id = %event.complaint_id,
            from = event.from.map(Status::as_str),
            to = %event.to,
            operation = %event.operation,
            actor = %event.actor.user,
            role = %event.actor.role,
            urgency = event.urgency_level,
            version = event.version,
            "Complaint transition"
        );
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    events: Mutex<Vec<TransitionEvent>>,
}

impl MemoryAuditLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every recorded event, in arrival order.
    #[must_use]
    pub fn events(&self) -> Vec<TransitionEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Status sequence of one complaint, ordered by stored version.
    ///
    /// Events can arrive out of order when commits race, the version restores
    /// commit order.
    #[must_use]
    pub fn walk_of(&self, complaint_id: &str) -> Vec<Status> {
        let mut events: Vec<TransitionEvent> = self
            .events()
            .into_iter()
            .filter(|e| e.complaint_id == complaint_id)
            .collect();
        events.sort_by_key(|e| e.version);
        events.into_iter().map(|e| e.to).collect()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, event: &TransitionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
