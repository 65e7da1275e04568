//! Recomputes suite and run counters from their children.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::db::ExecutionStore;
use crate::error::AppResult;
use crate::models::{RollupCounters, Run, Suite, SuiteStatus};

/// Folds spec outcomes into suite counters and suite counters into run counters.
///
/// Every recompute reads the full child set and overwrites the parent's
/// counters in one write, so calls are idempotent and can be retried whole.
#[derive(Clone)]
pub struct RollupAggregator {
    store: Arc<dyn ExecutionStore>,
}

impl RollupAggregator {
    pub fn new(store: Arc<dyn ExecutionStore>) -> Self {
        Self { store }
    }

    /// Count the suite's specs by status and store the counters and derived status.
    pub async fn recompute_suite_stats(&self, suite_id: Uuid) -> AppResult<Suite> {
        let specs = self.store.get_specs_by_suite_id(suite_id).await?;
        let counters = RollupCounters::from_statuses(specs.iter().map(|s| s.status));
        let status = SuiteStatus::from_counters(&counters);

        debug!(
            "Suite {} rollup: total={} passed={} failed={} skipped={}",
            suite_id, counters.total, counters.passed, counters.failed, counters.skipped
        );

        self.store
            .update_suite_counters(suite_id, counters, status)
            .await
    }

    /// Sum the run's suite counters and store them on the run.
    pub async fn recompute_run_stats(&self, run_id: Uuid) -> AppResult<Run> {
        let suites = self.store.get_suites_by_run_id(run_id).await?;

        let mut counters = RollupCounters::default();
        for suite in &suites {
            counters.absorb(&suite.counters);
        }

        debug!(
            "Run {} rollup over {} suites: total={} passed={} failed={} skipped={}",
            run_id,
            suites.len(),
            counters.total,
            counters.passed,
            counters.failed,
            counters.skipped
        );

        self.store.update_run_counters(run_id, counters).await
    }
}
