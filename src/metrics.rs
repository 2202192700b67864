use std::time::Duration;

use anyhow::Result;
use metrics::{counter, gauge, histogram};

use crate::error::ErrorKind;
use crate::models::Operation;

/// Metric names emitted by the engine
#[derive(Debug, Clone, Copy)]
pub struct EngineMetrics {
    // Submission metrics
    pub submissions_total: &'static str,
    pub duplicates_merged_total: &'static str,
    pub rate_limited_total: &'static str,

    // Lifecycle metrics
    pub transitions_total: &'static str,
    pub transition_duration: &'static str,
    pub conflicts_total: &'static str,

    // Escalation metrics
    pub escalations_total: &'static str,
    pub sweep_duration: &'static str,
    pub active_complaints: &'static str,

    // Error metrics
    pub errors_total: &'static str,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self {
            submissions_total: "citycare_submissions_total",
            duplicates_merged_total: "citycare_duplicates_merged_total",
            rate_limited_total: "citycare_rate_limited_total",

            transitions_total: "citycare_transitions_total",
            transition_duration: "citycare_transition_duration_seconds",
            conflicts_total: "citycare_conflicts_total",

            escalations_total: "citycare_escalations_total",
            sweep_duration: "citycare_sweep_duration_seconds",
            active_complaints: "citycare_active_complaints",

            errors_total: "citycare_errors_total",
        }
    }
}

impl EngineMetrics {
    /// Install a no-op global recorder when the host has not installed one.
    pub fn init() -> Result<()> {
        metrics::set_global_recorder(metrics::NoopRecorder)
            .map_err(|_| anyhow::anyhow!("Failed to initialize metrics recorder: already set"))?;

        Ok(())
    }

    /// Record a submission and whether it was merged.
    pub fn record_submission(&self, is_duplicate: bool) {
        let outcome = if is_duplicate { "merged" } else { "created" };
        counter!(self.submissions_total, "outcome" => outcome).increment(1);
        if is_duplicate {
            counter!(self.duplicates_merged_total).increment(1);
        }
    }

    /// Record a committed lifecycle transition.
    pub fn record_transition(&self, operation: Operation, duration: Duration) {
        counter!(self.transitions_total, "operation" => operation.as_str()).increment(1);
        histogram!(self.transition_duration, "operation" => operation.as_str())
            .record(duration.as_secs_f64());
    }

    /// Record a failed operation.
    pub fn record_error(&self, kind: ErrorKind, operation: Operation) {
        counter!(
            self.errors_total,
            "kind" => kind.as_str(),
            "operation" => operation.as_str()
        )
        .increment(1);
        match kind {
            ErrorKind::Conflict => {
                counter!(self.conflicts_total, "operation" => operation.as_str()).increment(1);
            }
            ErrorKind::RateLimited => counter!(self.rate_limited_total).increment(1),
            _ => {}
        }
    }

    /// Record the outcome of an escalation pass.
    pub fn record_escalations(&self, mode: &'static str, escalated: usize, duration: Duration) {
        counter!(self.escalations_total, "mode" => mode).increment(escalated as u64);
        histogram!(self.sweep_duration, "mode" => mode).record(duration.as_secs_f64());
    }

    /// Update the active complaint gauge.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_active(&self, active: usize) {
        gauge!(self.active_complaints).set(active as f64);
    }
}
