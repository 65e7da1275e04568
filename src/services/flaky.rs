//! Flaky spec tracking: per-identity execution history, flake rate and severity.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::db::{FlakyQuery, FlakyStore};
use crate::error::{AppError, AppResult};
use crate::models::{
    FlakyKey, FlakySeverity, FlakyStatus, FlakyTest, FlakyTestListResponse, ListFlakyTestsQuery,
    Pagination, PaginationParams,
};

/// Executions needed before a record can rank above `low`.
pub const MIN_EXECUTIONS_FOR_SEVERITY: i32 = 5;

/// Severity tier for a flake rate and sample size. First match wins.
pub fn severity_for(flake_rate: f64, total_executions: i32) -> FlakySeverity {
    if total_executions < MIN_EXECUTIONS_FOR_SEVERITY {
        FlakySeverity::Low
    } else if flake_rate >= 0.5 {
        FlakySeverity::Critical
    } else if flake_rate >= 0.3 {
        FlakySeverity::High
    } else if flake_rate >= 0.1 {
        FlakySeverity::Medium
    } else {
        FlakySeverity::Low
    }
}

/// `flaky / total`, or 0 when nothing has run.
pub fn flake_rate(flaky_executions: i32, total_executions: i32) -> f64 {
    if total_executions <= 0 {
        0.0
    } else {
        f64::from(flaky_executions) / f64::from(total_executions)
    }
}

/// The record as it looks after one more execution.
fn apply_execution(
    record: &FlakyTest,
    is_flaky: bool,
    error_message: Option<&str>,
    now: DateTime<Utc>,
) -> FlakyTest {
    let mut next = record.clone();
    next.total_executions += 1;
    if is_flaky {
        next.flaky_executions += 1;
        if let Some(message) = error_message {
            next.last_error_message = Some(message.to_string());
        }
    }
    next.last_seen_at = now.max(record.last_seen_at);
    next.flake_rate = flake_rate(next.flaky_executions, next.total_executions);
    next.severity = severity_for(next.flake_rate, next.total_executions);
    next
}

/// Maintains [`FlakyTest`] records.
#[derive(Clone)]
pub struct FlakyClassifier {
    store: Arc<dyn FlakyStore>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
}

impl FlakyClassifier {
    pub fn new(store: Arc<dyn FlakyStore>, clock: Arc<dyn Clock>, max_attempts: u32) -> Self {
        Self {
            store,
            clock,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Fetch the record for `key`, creating an empty one on first sight.
    ///
    /// Losing a creation race to another request is not an error: the winner's
    /// record is re-read and returned.
    pub async fn get_or_create(&self, key: &FlakyKey) -> AppResult<FlakyTest> {
        if let Some(existing) = self.store.find_flaky_test(key).await? {
            return Ok(existing);
        }

        let record = FlakyTest::new(key, self.clock.now());
        match self.store.insert_flaky_test(&record).await {
            Ok(created) => {
                info!(
                    "Tracking new spec '{}' in suite '{}' for project {}",
                    key.spec_name, key.suite_name, key.project_id
                );
                Ok(created)
            }
            Err(AppError::Conflict(_)) => {
                debug!("Flaky record for '{}' created concurrently", key.spec_name);
                self.store.find_flaky_test(key).await?.ok_or_else(|| {
                    AppError::Database(format!(
                        "Flaky record for '{}' vanished after conflict",
                        key.spec_name
                    ))
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Count one execution of `key`, retrying when a concurrent update wins.
    pub async fn record_execution(
        &self,
        key: &FlakyKey,
        is_flaky: bool,
        error_message: Option<&str>,
    ) -> AppResult<FlakyTest> {
        let mut current = self.get_or_create(key).await?;

        for attempt in 1..=self.max_attempts {
            let next = apply_execution(&current, is_flaky, error_message, self.clock.now());
            if self
                .store
                .save_flaky_test(&next, current.total_executions)
                .await?
            {
                return Ok(next);
            }

            debug!(
                "Flaky update for '{}' lost a race (attempt {}/{})",
                key.spec_name, attempt, self.max_attempts
            );
            current = self.store.get_flaky_test(current.id).await?.ok_or_else(|| {
                AppError::NotFound(format!("Flaky test {}", current.id))
            })?;
        }

        Err(AppError::Conflict(format!(
            "Flaky record for '{}' kept changing after {} attempts",
            key.spec_name, self.max_attempts
        )))
    }

    /// Close a record. Its counters are kept.
    pub async fn mark_resolved(&self, id: Uuid) -> AppResult<FlakyTest> {
        let record = self
            .store
            .set_flaky_status(id, FlakyStatus::Resolved)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Flaky test {}", id)))?;

        info!(
            "Flaky test {} ('{}') marked resolved",
            record.id, record.spec_name
        );
        Ok(record)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<FlakyTest> {
        self.store
            .get_flaky_test(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Flaky test {}", id)))
    }

    /// A project's records, highest flake rate first.
    pub async fn list(&self, query: &ListFlakyTestsQuery) -> AppResult<FlakyTestListResponse> {
        if query.project_id.trim().is_empty() {
            return Err(AppError::Validation("project_id is required".to_string()));
        }

        let params = PaginationParams {
            page: query.page,
            limit: query.limit,
        };
        let (flaky_tests, total) = self
            .store
            .query_flaky_tests(&FlakyQuery {
                project_id: query.project_id.trim().to_string(),
                severity: query.severity,
                status: query.status,
                limit: u64::from(params.clamped_limit()),
                offset: params.offset(),
            })
            .await?;

        Ok(FlakyTestListResponse {
            flaky_tests,
            pagination: Pagination::new(params.page(), params.clamped_limit(), total),
        })
    }
}
