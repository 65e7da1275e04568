//! Repository interfaces consumed by the ingestion services.
//!
//! [`DbPool`](super::DbPool) implements both traits against PostgreSQL and
//! [`MemoryStore`](super::MemoryStore) implements them in process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    FlakyKey, FlakySeverity, FlakyStatus, FlakyTest, RollupCounters, Run, RunMetadata, RunStatus,
    Spec, SpecStatus, Suite, SuiteStatus,
};

/// Represents a run to be inserted. New runs always start `running` and `active`.
#[derive(Debug, Clone)]
pub struct NewRun {
    pub project_id: String,
    pub run_id: String,
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    pub environment: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub metadata: RunMetadata,
}

/// Represents a suite to be inserted.
#[derive(Debug, Clone)]
pub struct NewSuite {
    pub run_id: Uuid,
    pub name: String,
    pub sequence: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

/// Represents a spec to be inserted.
#[derive(Debug, Clone)]
pub struct NewSpec {
    pub suite_id: Uuid,
    pub run_id: Uuid,
    pub name: String,
    pub status: SpecStatus,
    pub sequence: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub error_message: Option<String>,
    pub stack_trace: Option<String>,
    pub retry_count: i32,
    pub is_flaky: bool,
}

/// Filters for listing active runs.
#[derive(Debug, Clone, Default)]
pub struct RunQuery {
    pub project_id: Option<String>,
    pub branch: Option<String>,
    pub status: Option<RunStatus>,
    pub limit: u64,
    pub offset: u64,
}

/// Filters for listing flaky tests of a project.
#[derive(Debug, Clone, Default)]
pub struct FlakyQuery {
    pub project_id: String,
    pub severity: Option<FlakySeverity>,
    pub status: Option<FlakyStatus>,
    pub limit: u64,
    pub offset: u64,
}

/// Run / Suite / Spec persistence.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Verify the backing store is reachable.
    async fn ping(&self) -> AppResult<()>;

    /// Look up a run by its external identifier, in any state.
    async fn find_run_by_run_id(&self, run_id: &str) -> AppResult<Option<Run>>;

    /// Get an active run by internal ID.
    async fn get_run(&self, id: Uuid) -> AppResult<Option<Run>>;

    /// Insert a run. Fails with `AppError::DuplicateRun` when the run identifier is taken.
    async fn insert_run(&self, run: NewRun) -> AppResult<Run>;

    /// Move an active run from `from` to `status`, overwriting end time and duration.
    ///
    /// Fails with `AppError::Conflict` when the stored status is no longer `from`.
    async fn update_run_lifecycle(
        &self,
        id: Uuid,
        from: RunStatus,
        status: RunStatus,
        end_time: Option<DateTime<Utc>>,
        duration_ms: Option<i64>,
    ) -> AppResult<Run>;

    /// Overwrite the four rollup counters in a single write.
    async fn update_run_counters(&self, id: Uuid, counters: RollupCounters) -> AppResult<Run>;

    /// Mark a run deleted. Returns false when no active run matched.
    async fn soft_delete_run(&self, id: Uuid) -> AppResult<bool>;

    /// List active runs, newest first, with the total match count.
    async fn query_runs(&self, query: &RunQuery) -> AppResult<(Vec<Run>, u64)>;

    async fn insert_suite(&self, suite: NewSuite) -> AppResult<Suite>;

    async fn get_suite(&self, id: Uuid) -> AppResult<Option<Suite>>;

    /// Suites of a run in payload order.
    async fn get_suites_by_run_id(&self, run_id: Uuid) -> AppResult<Vec<Suite>>;

    /// Overwrite the four rollup counters and derived status in a single write.
    async fn update_suite_counters(
        &self,
        id: Uuid,
        counters: RollupCounters,
        status: SuiteStatus,
    ) -> AppResult<Suite>;

    async fn insert_spec(&self, spec: NewSpec) -> AppResult<Spec>;

    /// Specs of a suite in payload order.
    async fn get_specs_by_suite_id(&self, suite_id: Uuid) -> AppResult<Vec<Spec>>;
}

/// FlakyTest persistence.
#[async_trait]
pub trait FlakyStore: Send + Sync {
    async fn find_flaky_test(&self, key: &FlakyKey) -> AppResult<Option<FlakyTest>>;

    async fn get_flaky_test(&self, id: Uuid) -> AppResult<Option<FlakyTest>>;

    /// Insert a new record. Fails with `AppError::Conflict` when the
    /// (project, spec, suite) triple already exists.
    async fn insert_flaky_test(&self, record: &FlakyTest) -> AppResult<FlakyTest>;

    /// Compare-and-swap write: persists `record` only if the stored
    /// `total_executions` still equals `expected_total`. Returns whether it landed.
    async fn save_flaky_test(&self, record: &FlakyTest, expected_total: i32) -> AppResult<bool>;

    async fn set_flaky_status(&self, id: Uuid, status: FlakyStatus)
    -> AppResult<Option<FlakyTest>>;

    /// List a project's records, highest flake rate first.
    async fn query_flaky_tests(&self, query: &FlakyQuery) -> AppResult<(Vec<FlakyTest>, u64)>;
}
