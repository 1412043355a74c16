//! Reporter trait for dependency injection
//!
//! Lets the pipeline report progress without deciding how it is shown.

use r2r_schema::{TargetId, TargetState};

use crate::pipeline::RunSummary;

pub trait Reporter: Send + Sync {
    /// A target moved to `state`.
    fn target_state(&self, id: &TargetId, label: &str, state: TargetState);

    /// A target failed with `reason`.
    fn target_failed(&self, id: &TargetId, label: &str, reason: &str);

    /// A non-fatal problem worth telling the user about.
    fn warning(&self, msg: &str);

    /// Final outcome of the run.
    fn summary(&self, summary: &RunSummary);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn target_state(&self, id: &TargetId, label: &str, state: TargetState) {
        (**self).target_state(id, label, state);
    }
    fn target_failed(&self, id: &TargetId, label: &str, reason: &str) {
        (**self).target_failed(id, label, reason);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn summary(&self, summary: &RunSummary) {
        (**self).summary(summary);
    }
}

/// Reports through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn target_state(&self, id: &TargetId, label: &str, state: TargetState) {
        tracing::debug!(target_id = %id, label, state = %state, "Target state");
    }

    fn target_failed(&self, id: &TargetId, label: &str, reason: &str) {
        tracing::error!(target_id = %id, label, "Target failed: {reason}");
    }

    fn warning(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    fn summary(&self, summary: &RunSummary) {
        tracing::info!(
            built = summary.built.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            suites = summary.suites.len(),
            latest_updated = summary.latest_updated,
            "Run complete"
        );
        for (id, reason) in &summary.failed {
            tracing::error!(target_id = %id, "{reason}");
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn target_state(&self, _: &TargetId, _: &str, _: TargetState) {}
    fn target_failed(&self, _: &TargetId, _: &str, _: &str) {}
    fn warning(&self, _: &str) {}
    fn summary(&self, _: &RunSummary) {}
}
