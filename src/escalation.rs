//! SLA enforcement.
//!
//! A complaint that sits in PENDING or ASSIGNED for longer than the SLA window
//! without a status change is escalated. Each candidate is re-checked on the
//! snapshot that gets committed, so a complaint resolved between the scan and
//! the write is skipped rather than escalated.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::lifecycle::{EscalateOutcome, LifecycleController};
use crate::logging::OperationTimer;
use crate::metrics::EngineMetrics;
use crate::models::{Actor, Complaint, Status};
use crate::store::ComplaintStore;

/// Hours a complaint may wait before it is escalated.
pub const DEFAULT_SLA_WINDOW_HOURS: u32 = 16;

/// A complaint that could not be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEscalation {
    /// Key the complaint was requested or found under
    pub complaint_id: String,
    /// Rendered error
    pub error: String,
}

/// Per-complaint outcome of an escalation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EscalationReport {
    /// Moved into ESCALATED by this pass
    pub escalated: Vec<String>,
    /// Already ESCALATED; left alone
    pub already_escalated: Vec<String>,
    /// Terminal, or no longer eligible when re-checked
    pub skipped: Vec<String>,
    /// Unknown identifiers (forced mode only)
    pub not_found: Vec<String>,
    /// Lost a race with a concurrent transition
    pub conflicted: Vec<String>,
    /// Collaborator failures
    pub failed: Vec<FailedEscalation>,
}

impl EscalationReport {
    /// Number of complaints this pass escalated.
    #[must_use]
    pub fn escalated_count(&self) -> usize {
        self.escalated.len()
    }

    fn record(&mut self, key: &str, result: Result<EscalateOutcome>) {
        match result {
            Ok(EscalateOutcome::Escalated(c)) => self.escalated.push(c.complaint_id),
            Ok(EscalateOutcome::AlreadyEscalated(c)) => self.already_escalated.push(c.complaint_id),
            Ok(EscalateOutcome::NotEligible(c)) => self.skipped.push(c.complaint_id),
            Err(CoreError::IllegalTransition { .. }) => self.skipped.push(key.to_string()),
            Err(CoreError::NotFound(_)) => self.not_found.push(key.to_string()),
            Err(CoreError::Conflict(_)) => self.conflicted.push(key.to_string()),
            Err(e) => {
                warn!(complaint_id = key, error = %e, "Escalation failed");
                self.failed.push(FailedEscalation {
                    complaint_id: key.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
}

/// Finds and escalates overdue complaints
pub struct EscalationMonitor {
    lifecycle: Arc<LifecycleController>,
    store: Arc<ComplaintStore>,
    clock: Arc<dyn Clock>,
    sla_window: Duration,
    metrics: EngineMetrics,
}

impl EscalationMonitor {
    /// Monitor using the SLA window from the controller's settings.
    pub fn new(lifecycle: Arc<LifecycleController>, store: Arc<ComplaintStore>, clock: Arc<dyn Clock>) -> Self {
        let sla_window = lifecycle.settings().sla_window();
        Self {
            lifecycle,
            store,
            clock,
            sla_window,
            metrics: EngineMetrics::default(),
        }
    }

    fn overdue(&self, complaint: &Complaint, now: chrono::DateTime<chrono::Utc>) -> bool {
        matches!(complaint.status, Status::Pending | Status::Assigned) && complaint.is_stale(now, self.sla_window)
    }

    /// Escalate every PENDING or ASSIGNED complaint idle longer than the SLA window.
    pub fn sweep(&self) -> Result<EscalationReport> {
        let timer = OperationTimer::new("escalation_sweep");
        let started = Instant::now();
        let now = self.clock.now();

        let mut candidates = self.store.select(|c| self.overdue(c, now))?;
        candidates.sort_by(|a, b| a.complaint_id.cmp(&b.complaint_id));

        let system = Actor::system();
        let mut report = EscalationReport::default();
        for candidate in candidates {
            let key = candidate.complaint_id;
            let result = self.lifecycle.escalate_if(&system, &key, &|c: &Complaint| self.overdue(c, now));
            report.record(&key, result);
        }

        self.metrics.record_escalations("sweep", report.escalated_count(), started.elapsed());
        info!(
            escalated = report.escalated.len(),
            skipped = report.skipped.len(),
            conflicted = report.conflicted.len(),
            "Escalation sweep finished"
        );
        timer.finish();
        Ok(report)
    }

    /// Escalate the given complaints regardless of age.
    ///
    /// Terminal complaints are skipped and unknown ids reported; one bad id never
    /// fails the batch.
    pub fn force(&self, actor: &Actor, ids: &[String]) -> Result<EscalationReport> {
        let started = Instant::now();
        let mut report = EscalationReport::default();
        let mut seen = BTreeSet::new();
        for key in ids {
            if !seen.insert(key.as_str()) {
                continue;
            }
            match self.lifecycle.escalate(actor, key) {
                Err(e @ CoreError::Forbidden(_)) => return Err(e),
                result => report.record(key, result),
            }
        }
        self.metrics.record_escalations("forced", report.escalated_count(), started.elapsed());
        info!(
            requested = ids.len(),
            escalated = report.escalated.len(),
            skipped = report.skipped.len(),
            not_found = report.not_found.len(),
            "Forced escalation finished"
        );
        Ok(report)
    }

    /// Sweep every `every` until `shutdown` completes.
    pub async fn run_every(&self, every: std::time::Duration, shutdown: impl Future<Output = ()>) {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Escalation monitor stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.sweep() {
                        error!(error = %e, "Escalation sweep failed");
                    }
                }
            }
        }
    }
}
