//! Entry point for callers: one method per operation.
//!
//! The service validates inputs, stores photos, and hands the state change to
//! the [`LifecycleController`]. It never mutates complaints itself.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::audit::{AuditSink, TracingAuditSink};
use crate::blob::{BlobStore, MemoryBlobStore};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::directory::WorkerDirectory;
use crate::error::{CoreError, Result};
use crate::escalation::{EscalationMonitor, EscalationReport};
use crate::ids::{IdGenerator, SequentialIdGenerator};
use crate::lifecycle::{EscalateOutcome, LifecycleController, Report};
use crate::logging::OperationTimer;
use crate::metrics::EngineMetrics;
use crate::models::{Actor, BlobRef, Complaint, ComplaintFilter, Submission, SubmitOutcome, WorkerId};
use crate::scheduler::{AssignmentScheduler, Candidate, RankedWorker};
use crate::stats::{Stats, StatsAggregator};
use crate::store::ComplaintStore;
use crate::validation::InputValidator;

/// External collaborators of the engine
#[derive(Clone)]
pub struct Collaborators {
    /// Photo storage
    pub blobs: Arc<dyn BlobStore>,
    /// Worker roster
    pub directory: Arc<dyn WorkerDirectory>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Complaint code source
    pub ids: Arc<dyn IdGenerator>,
    /// Transition event sink
    pub audit: Arc<dyn AuditSink>,
}

impl Collaborators {
    /// In-memory photos, wall clock, fresh code sequence, audit to the log.
    pub fn in_memory(directory: Arc<dyn WorkerDirectory>) -> Self {
        Self {
            blobs: Arc::new(MemoryBlobStore::new()),
            directory,
            clock: Arc::new(SystemClock),
            ids: Arc::new(SequentialIdGenerator::new()),
            audit: Arc::new(TracingAuditSink),
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the photo store.
    #[must_use]
    pub fn with_blobs(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = blobs;
        self
    }

    /// Replace the code generator.
    #[must_use]
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Replace the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }
}

/// The complaint engine behind one facade
pub struct ComplaintService {
    store: Arc<ComplaintStore>,
    lifecycle: Arc<LifecycleController>,
    monitor: EscalationMonitor,
    stats: StatsAggregator,
    blobs: Arc<dyn BlobStore>,
    directory: Arc<dyn WorkerDirectory>,
    metrics: EngineMetrics,
}

impl ComplaintService {
    /// Wire the engine over `store`. Fails with [`CoreError::Config`] on invalid settings.
    pub fn new(settings: EngineConfig, store: Arc<ComplaintStore>, collaborators: Collaborators) -> Result<Self> {
        settings.validate().map_err(|e| CoreError::Config(e.to_string()))?;
        if store.grid() != settings.grid() {
            return Err(CoreError::Config(format!(
                "store grid ({}°) differs from configured grid ({}°)",
                store.grid().cell_degrees(),
                settings.grid_cell_degrees
            )));
        }

        let Collaborators {
            blobs,
            directory,
            clock,
            ids,
            audit,
        } = collaborators;
        let lifecycle = Arc::new(
            LifecycleController::new(Arc::clone(&store), Arc::clone(&directory), Arc::clone(&clock), ids, settings)
                .with_audit(audit),
        );
        let monitor = EscalationMonitor::new(Arc::clone(&lifecycle), Arc::clone(&store), clock);
        let stats = StatsAggregator::new(Arc::clone(&store));

        Ok(Self {
            store,
            lifecycle,
            monitor,
            stats,
            blobs,
            directory,
            metrics: EngineMetrics::default(),
        })
    }

    /// Service over an empty in-memory store.
    pub fn in_memory(settings: EngineConfig, collaborators: Collaborators) -> Result<Self> {
        let store = Arc::new(ComplaintStore::new(settings.grid()));
        Self::new(settings, store, collaborators)
    }

    /// Underlying complaint store.
    pub fn store(&self) -> &Arc<ComplaintStore> {
        &self.store
    }

    /// Lifecycle controller.
    pub fn lifecycle(&self) -> &Arc<LifecycleController> {
        &self.lifecycle
    }

    /// SLA monitor, for periodic sweeps.
    pub fn monitor(&self) -> &EscalationMonitor {
        &self.monitor
    }

    /// Report waste at a location; merges into a nearby active complaint when one exists.
    pub fn submit(&self, actor: &Actor, submission: Submission) -> Result<SubmitOutcome> {
        let timer = OperationTimer::new("submit_complaint");
        InputValidator::validate_coordinates(submission.coordinates)?;
        InputValidator::validate_photo(&submission.photo_before)?;
        let complainant_name = InputValidator::sanitize_optional(submission.complainant_name.as_deref());
        if let Some(name) = &complainant_name {
            InputValidator::validate_complainant_name(name)?;
        }
        let address = InputValidator::sanitize_optional(submission.address.as_deref());
        if let Some(address) = &address {
            InputValidator::validate_address(address)?;
        }

        let photo = self.blobs.put(&submission.photo_before)?;
        let outcome = self
            .lifecycle
            .submit(
                actor,
                Report {
                    complainant_name,
                    coordinates: submission.coordinates,
                    address,
                    photo: photo.clone(),
                },
            )
            .inspect_err(|_| self.discard_photo(&photo))?;
        self.refresh_active();
        timer.finish();
        Ok(outcome)
    }

    /// Bind a complaint to a worker.
    pub fn assign(&self, actor: &Actor, key: &str, worker: WorkerId) -> Result<Complaint> {
        InputValidator::validate_complaint_key(key)?;
        self.lifecycle.assign(actor, key.trim(), worker)
    }

    /// Close an assigned complaint with an after photo.
    pub fn resolve(&self, actor: &Actor, key: &str, photo_after: &[u8]) -> Result<Complaint> {
        InputValidator::validate_complaint_key(key)?;
        InputValidator::validate_photo(photo_after)?;
        let photo = self.blobs.put(photo_after)?;
        let resolved = self
            .lifecycle
            .resolve(actor, key.trim(), photo.clone())
            .inspect_err(|_| self.discard_photo(&photo))?;
        self.refresh_active();
        Ok(resolved)
    }

    /// Close an assigned complaint without cleanup.
    pub fn reject(&self, actor: &Actor, key: &str, reason: &str) -> Result<Complaint> {
        InputValidator::validate_complaint_key(key)?;
        InputValidator::validate_reason(reason)?;
        let rejected = self.lifecycle.reject(actor, key.trim(), &InputValidator::sanitize_text(reason))?;
        self.refresh_active();
        Ok(rejected)
    }

    /// Escalate a single complaint; returns it whether or not it changed.
    pub fn escalate(&self, actor: &Actor, key: &str) -> Result<Complaint> {
        InputValidator::validate_complaint_key(key)?;
        Ok(match self.lifecycle.escalate(actor, key.trim())? {
            EscalateOutcome::Escalated(c) | EscalateOutcome::AlreadyEscalated(c) | EscalateOutcome::NotEligible(c) => c,
        })
    }

    /// Escalate the listed complaints regardless of age.
    pub fn force_escalate(&self, actor: &Actor, ids: &[String]) -> Result<EscalationReport> {
        let ids: Vec<String> = ids.iter().map(|id| id.trim().to_string()).collect();
        self.monitor.force(actor, &ids)
    }

    /// Run one SLA sweep.
    pub fn sweep(&self) -> Result<EscalationReport> {
        self.monitor.sweep()
    }

    /// Complaints passing `filter`, most urgent first, newest first within a level.
    pub fn list_complaints(&self, filter: &ComplaintFilter) -> Result<Vec<Complaint>> {
        let mut complaints = self.store.select(|c| filter.matches(c))?;
        complaints.sort_by(|a, b| {
            b.urgency_level
                .cmp(&a.urgency_level)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.complaint_id.cmp(&b.complaint_id))
        });
        debug!(count = complaints.len(), "Complaints listed");
        Ok(complaints)
    }

    /// Look a complaint up by code or UUID.
    pub fn get(&self, key: &str) -> Result<Complaint> {
        InputValidator::validate_complaint_key(key)?;
        self.store.get(key.trim())
    }

    /// Status counts.
    pub fn get_stats(&self) -> Result<Stats> {
        self.stats.snapshot()
    }

    /// Rank workers for a complaint. With no explicit list, the whole directory is ranked.
    pub fn rank_workers(&self, key: &str, workers: Option<&[WorkerId]>) -> Result<Vec<RankedWorker>> {
        let complaint = self.get(key)?;
        let infos = match workers {
            Some(ids) => ids
                .iter()
                .map(|id| self.directory.lookup(*id))
                .collect::<Result<Vec<_>>>()?,
            None => self.directory.all()?,
        };
        let counts = self.store.assigned_counts()?;
        let candidates: Vec<Candidate> = infos
            .into_iter()
            .map(|worker| Candidate {
                assigned_count: counts.get(&worker.id).copied().unwrap_or(0),
                worker,
            })
            .collect();
        let ranked = AssignmentScheduler::rank(&complaint, &candidates);
        if let Some(best) = ranked.first() {
            info!(
                complaint_id = %complaint.complaint_id,
                best = %best.worker,
                distance_m = best.distance_m,
                "Workers ranked"
            );
        }
        Ok(ranked)
    }

    /// Fetch stored photo bytes.
    /// Bytes of a stored photo.
    pub fn photo(&self, blob: &BlobRef) -> Result<Vec<u8>> {
        self.blobs.get(blob)
    }

    /// Drop a photo stored for an operation that was then refused.
    fn discard_photo(&self, photo: &BlobRef) {
        if let Err(e) = self.blobs.delete(photo) {
            warn!(photo = %photo, error = %e, "Failed to discard unreferenced photo");
        }
    }

    fn refresh_active(&self) {
        if let Ok(stats) = self.stats.snapshot() {
            self.metrics.set_active(stats.active);
        }
    }
}
