//! The complaint state machine.
//!
//! | From              | Operation | To        |
//! |-------------------|-----------|-----------|
//! | PENDING/ESCALATED | assign    | ASSIGNED  |
//! | ASSIGNED          | resolve   | RESOLVED  |
//! | ASSIGNED          | reject    | REJECTED  |
//! | PENDING/ASSIGNED  | escalate  | ESCALATED |
//! | ESCALATED         | escalate  | no-op     |
//!
//! Anything else is an [`CoreError::IllegalTransition`]. [`apply`] is the pure
//! table; [`LifecycleController`] wraps it with role checks, optimistic commits,
//! audit events and metrics. New complaints and duplicate merges also go through
//! the controller so every write to the store has one owner.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{AuditSink, TracingAuditSink, TransitionEvent};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::dedupe::{DuplicateCheck, DuplicateDetector};
use crate::directory::WorkerDirectory;
use crate::error::{CoreError, Result};
use crate::geo::haversine_m;
use crate::ids::IdGenerator;
use crate::metrics::EngineMetrics;
use crate::models::{
    Actor, BlobRef, Complaint, Coordinates, DuplicateLink, Operation, Role, Status, SubmitOutcome, UserId, WorkerId,
};
use crate::store::ComplaintStore;

/// A requested status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Bind to a worker
    Assign {
        /// Worker to bind
        worker: WorkerId,
        /// Dispatcher
        by: UserId,
    },
    /// Close with an after photo
    Resolve {
        /// Photo of the cleaned site
        photo: BlobRef,
    },
    /// Close with a reason
    Reject {
        /// Why the work cannot be done
        reason: String,
    },
    /// Force into ESCALATED
    Escalate,
}

impl Transition {
    /// Operation label of this transition.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Assign { .. } => Operation::Assign,
            Self::Resolve { .. } => Operation::Resolve,
            Self::Reject { .. } => Operation::Reject,
            Self::Escalate => Operation::Escalate,
        }
    }
}

/// Result of applying the table to a snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// The complaint changes to this state
    Changed(Complaint),
    /// Legal, but nothing to write (re-escalation)
    Unchanged,
}

/// Raise urgency by one, saturating at `max` when one is configured.
#[must_use]
pub fn bump_urgency(level: u32, max: Option<u32>) -> u32 {
    let raised = level.saturating_add(1);
    match max {
        Some(cap) => raised.min(cap.max(level)),
        None => raised,
    }
}

/// Apply the transition table to `current` without touching any store.
pub fn apply(current: &Complaint, transition: &Transition, now: DateTime<Utc>, max_urgency: Option<u32>) -> Result<Applied> {
    let illegal = || CoreError::IllegalTransition {
        from: current.status,
        operation: transition.operation(),
    };
    let mut next = current.clone();

    match (current.status, transition) {
        (Status::Pending | Status::Escalated, Transition::Assign { worker, by }) => {
            next.status = Status::Assigned;
            next.assigned_worker = Some(*worker);
            next.assigned_by = Some(*by);
        }
        (Status::Assigned, Transition::Resolve { photo }) => {
            next.status = Status::Resolved;
            next.photo_after = Some(photo.clone());
            next.resolved_by = current.assigned_worker;
            next.assigned_worker = None;
        }
        (Status::Assigned, Transition::Reject { reason }) => {
            if reason.trim().is_empty() {
                return Err(CoreError::Validation("rejection reason cannot be empty".into()));
            }
            next.status = Status::Rejected;
            next.rejection_reason = Some(reason.trim().to_string());
            next.assigned_worker = None;
        }
        (Status::Pending | Status::Assigned, Transition::Escalate) => {
            next.status = Status::Escalated;
            next.urgency_level = bump_urgency(current.urgency_level, max_urgency);
            next.assigned_worker = None;
        }
        (Status::Escalated, Transition::Escalate) => return Ok(Applied::Unchanged),
        _ => return Err(illegal()),
    }

    next.last_status_change_at = now;
    Ok(Applied::Changed(next))
}

/// Outcome of an escalation attempt on one complaint
#[derive(Debug, Clone, PartialEq)]
pub enum EscalateOutcome {
    /// Moved into ESCALATED
    Escalated(Complaint),
    /// Was already ESCALATED; nothing changed
    AlreadyEscalated(Complaint),
    /// The eligibility check failed on the committed snapshot
    NotEligible(Complaint),
}

/// A new report, with its photo already stored
#[derive(Debug, Clone)]
pub struct Report {
    /// Name the complainant gave
    pub complainant_name: Option<String>,
    /// Location of the waste
    pub coordinates: Coordinates,
    /// Display address
    pub address: Option<String>,
    /// Stored before photo
    pub photo: BlobRef,
}

enum Step {
    Changed(Complaint),
    Unchanged(Complaint),
    NotEligible(Complaint),
}

/// Owner of every write to the complaint store
pub struct LifecycleController {
    store: Arc<ComplaintStore>,
    detector: DuplicateDetector,
    directory: Arc<dyn WorkerDirectory>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    audit: Arc<dyn AuditSink>,
    metrics: EngineMetrics,
    settings: EngineConfig,
}

impl LifecycleController {
    /// Build a controller over `store` with the given collaborators.
    pub fn new(
        store: Arc<ComplaintStore>,
        directory: Arc<dyn WorkerDirectory>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        settings: EngineConfig,
    ) -> Self {
        let detector = DuplicateDetector::new(settings.duplicate_radius_m, store.grid(), settings.lock_stripes)
            .with_max_age(settings.duplicate_max_age());
        Self {
            store,
            detector,
            directory,
            clock,
            ids,
            audit: Arc::new(TracingAuditSink),
            metrics: EngineMetrics::default(),
            settings,
        }
    }

    /// Send audit events to `audit` instead of the log.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Engine settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &EngineConfig {
        &self.settings
    }

    /// The duplicate detector used by `submit`.
    #[must_use]
    pub const fn detector(&self) -> &DuplicateDetector {
        &self.detector
    }

    /// Create a complaint, or fold the report into the nearest active one.
    ///
    /// The proximity check and the write happen under the neighbourhood lock,
    /// so concurrent reports of the same spot end up with a single primary.
    pub fn submit(&self, actor: &Actor, report: Report) -> Result<SubmitOutcome> {
        let started = Instant::now();
        let result = self.try_submit(actor, report);
        match &result {
            Ok(outcome) => {
                let operation = if outcome.is_duplicate { Operation::Merge } else { Operation::Create };
                self.metrics.record_submission(outcome.is_duplicate);
                self.metrics.record_transition(operation, started.elapsed());
            }
            Err(e) => {
                self.metrics.record_error(e.kind(), Operation::Create);
                warn!(user = %actor.user, error = %e, "Submission refused");
            }
        }
        result
    }

    fn try_submit(&self, actor: &Actor, report: Report) -> Result<SubmitOutcome> {
        let _guard = self.detector.lock_neighbourhood(report.coordinates);
        let now = self.clock.now();
        self.check_spam(actor, report.coordinates, now)?;

        for attempt in 0..self.settings.merge_attempts {
            match self.detector.check(&self.store, report.coordinates, now)? {
                DuplicateCheck::NoMatch => {
                    let complaint = self.create(actor, &report, now)?;
                    return Ok(SubmitOutcome {
                        complaint,
                        is_duplicate: false,
                    });
                }
                DuplicateCheck::MergeInto(primary) => match self.merge(actor, *primary, &report, now) {
                    Ok(complaint) => {
                        return Ok(SubmitOutcome {
                            complaint,
                            is_duplicate: true,
                        })
                    }
                    Err(CoreError::Conflict(code)) => {
                        debug!(primary = %code, attempt, "Primary changed during merge, re-checking");
                    }
                    Err(e) => return Err(e),
                },
            }
        }
        Err(CoreError::Conflict(format!("submission at {}", report.coordinates)))
    }

    fn check_spam(&self, actor: &Actor, coords: Coordinates, now: DateTime<Utc>) -> Result<()> {
        let limit = self.settings.spam_limit;
        if limit == 0 {
            return Ok(());
        }
        let since = now - self.settings.spam_window();
        let radius = self.detector.radius_m();
        let mut recent = 0usize;
        for complaint in self.detector.neighbours(&self.store, coords)? {
            if complaint.complainant == actor.user
                && complaint.created_at > since
                && haversine_m(coords, complaint.coordinates) <= radius
            {
                recent += 1;
            }
            recent += complaint
                .duplicate_links
                .iter()
                .filter(|link| {
                    link.submitter == actor.user
                        && link.submitted_at > since
                        && haversine_m(coords, link.coordinates) <= radius
                })
                .count();
        }
        if recent >= limit as usize {
            return Err(CoreError::RateLimited(format!(
                "user {} already reported this spot {recent} times recently",
                actor.user
            )));
        }
        Ok(())
    }

    fn create(&self, actor: &Actor, report: &Report, now: DateTime<Utc>) -> Result<Complaint> {
        let complaint = Complaint {
            id: Uuid::new_v4(),
            complaint_id: self.ids.next(now),
            complainant_name: report.complainant_name.clone(),
            complainant: actor.user,
            coordinates: report.coordinates,
            location_address: report.address.clone(),
            photo_before: report.photo.clone(),
            photo_after: None,
            status: Status::Pending,
            urgency_level: 1,
            assigned_worker: None,
            assigned_by: None,
            resolved_by: None,
            rejection_reason: None,
            created_at: now,
            last_status_change_at: now,
            duplicate_links: Vec::new(),
            version: 1,
        };
        let complaint = self.store.insert(complaint)?;
        info!(
            complaint_id = %complaint.complaint_id,
            coordinates = %complaint.coordinates,
            "Complaint created"
        );
        self.emit(&complaint, None, Operation::Create, actor, now);
        Ok(complaint)
    }

    fn merge(&self, actor: &Actor, primary: Complaint, report: &Report, now: DateTime<Utc>) -> Result<Complaint> {
        if !primary.is_active() {
            return Err(CoreError::Conflict(primary.complaint_id));
        }
        let mut next = primary.clone();
        next.urgency_level = bump_urgency(primary.urgency_level, self.settings.max_urgency);
        next.duplicate_links.push(DuplicateLink {
            submitter_name: report.complainant_name.clone(),
            submitter: actor.user,
            coordinates: report.coordinates,
            photo: report.photo.clone(),
            submitted_at: now,
        });
        let committed = self.store.commit(next, primary.version)?;
        info!(
            complaint_id = %committed.complaint_id,
            urgency = committed.urgency_level,
            reports = committed.report_count(),
            "Duplicate merged into primary"
        );
        self.emit(&committed, Some(primary.status), Operation::Merge, actor, now);
        Ok(committed)
    }

    /// Bind a PENDING or ESCALATED complaint to an active worker.
    pub fn assign(&self, actor: &Actor, key: &str, worker: WorkerId) -> Result<Complaint> {
        let operation = Operation::Assign;
        self.observe(operation, || {
            require_role(actor, &[Role::Inspector, Role::Officer], operation)?;
            let info = self.directory.lookup(worker)?;
            if !info.active {
                return Err(CoreError::Validation(format!("worker {worker} is not active")));
            }
            let transition = Transition::Assign { worker, by: actor.user };
            self.step(actor, key, &transition, None).map(Step::into_complaint)
        })
    }

    /// Close an ASSIGNED complaint with an after photo.
    pub fn resolve(&self, actor: &Actor, key: &str, photo: BlobRef) -> Result<Complaint> {
        let operation = Operation::Resolve;
        self.observe(operation, || {
            require_role(actor, &[Role::Collector, Role::Officer], operation)?;
            self.step(actor, key, &Transition::Resolve { photo }, None)
                .map(Step::into_complaint)
        })
    }

    /// Close an ASSIGNED complaint with a reason.
    pub fn reject(&self, actor: &Actor, key: &str, reason: &str) -> Result<Complaint> {
        let operation = Operation::Reject;
        self.observe(operation, || {
            require_role(actor, &[Role::Collector, Role::Officer], operation)?;
            if reason.trim().is_empty() {
                return Err(CoreError::Validation("rejection reason cannot be empty".into()));
            }
            let transition = Transition::Reject {
                reason: reason.to_string(),
            };
            self.step(actor, key, &transition, None).map(Step::into_complaint)
        })
    }

    /// Escalate a complaint; re-escalating is a no-op.
    pub fn escalate(&self, actor: &Actor, key: &str) -> Result<EscalateOutcome> {
        self.escalate_if(actor, key, &|_: &Complaint| true)
    }

    /// Escalate only if `eligible` holds on the snapshot that gets committed.
    pub fn escalate_if(&self, actor: &Actor, key: &str, eligible: &dyn Fn(&Complaint) -> bool) -> Result<EscalateOutcome> {
        let operation = Operation::Escalate;
        self.observe(operation, || {
            require_role(actor, &[Role::Inspector, Role::Officer, Role::System], operation)?;
            Ok(match self.step(actor, key, &Transition::Escalate, Some(eligible))? {
                Step::Changed(c) => EscalateOutcome::Escalated(c),
                Step::Unchanged(c) => EscalateOutcome::AlreadyEscalated(c),
                Step::NotEligible(c) => EscalateOutcome::NotEligible(c),
            })
        })
    }

    fn observe<T>(&self, operation: Operation, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let started = Instant::now();
        let result = f();
        match &result {
            Ok(_) => self.metrics.record_transition(operation, started.elapsed()),
            Err(e) => {
                self.metrics.record_error(e.kind(), operation);
                debug!(operation = %operation, error = %e, "Transition refused");
            }
        }
        result
    }

    fn step(
        &self,
        actor: &Actor,
        key: &str,
        transition: &Transition,
        eligible: Option<&dyn Fn(&Complaint) -> bool>,
    ) -> Result<Step> {
        let current = self.store.get(key)?;
        if let Some(eligible) = eligible {
            if !eligible(&current) {
                return Ok(Step::NotEligible(current));
            }
        }
        let now = self.clock.now();
        let applied = apply(&current, transition, now, self.settings.max_urgency)?;
        require_binding(actor, transition, &current)?;

        match applied {
            Applied::Unchanged => Ok(Step::Unchanged(current)),
            Applied::Changed(next) => {
                let committed = self.store.commit(next, current.version)?;
                info!(
                    complaint_id = %committed.complaint_id,
                    from = %current.status,
                    to = %committed.status,
                    worker = ?committed.assigned_worker,
                    urgency = committed.urgency_level,
                    "Complaint transition committed"
                );
                self.emit(&committed, Some(current.status), transition.operation(), actor, now);
                Ok(Step::Changed(committed))
            }
        }
    }

    fn emit(&self, complaint: &Complaint, from: Option<Status>, operation: Operation, actor: &Actor, at: DateTime<Utc>) {
        self.audit.record(&TransitionEvent {
            complaint_id: complaint.complaint_id.clone(),
            from,
            to: complaint.status,
            operation,
            actor: *actor,
            urgency_level: complaint.urgency_level,
            version: complaint.version,
            at,
        });
    }
}

impl Step {
    fn into_complaint(self) -> Complaint {
        match self {
            Self::Changed(c) | Self::Unchanged(c) | Self::NotEligible(c) => c,
        }
    }
}

fn require_role(actor: &Actor, allowed: &[Role], operation: Operation) -> Result<()> {
    if allowed.contains(&actor.role) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!("{} may not {operation}", actor.role)))
    }
}

/// Collectors may only close work bound to them; officers may close anything.
fn require_binding(actor: &Actor, transition: &Transition, current: &Complaint) -> Result<()> {
    let closes = matches!(transition, Transition::Resolve { .. } | Transition::Reject { .. });
    if closes && actor.role == Role::Collector && current.assigned_worker != Some(actor.user) {
        return Err(CoreError::Forbidden(format!(
            "complaint {} is not assigned to worker {}",
            current.complaint_id, actor.user
        )));
    }
    Ok(())
}
