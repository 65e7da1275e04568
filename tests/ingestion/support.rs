//! Shared helpers for ingestion tests: payload builders, a wired-up harness
//! and store wrappers that inject failures into a [`MemoryStore`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use flakewatch_lib::clock::FixedClock;
use flakewatch_lib::db::{
    ExecutionStore, FlakyQuery, FlakyStore, MemoryStore, NewRun, NewSpec, NewSuite, RunQuery,
};
use flakewatch_lib::error::{AppError, AppResult};
use flakewatch_lib::models::{
    FlakyKey, FlakyStatus, FlakyTest, IngestRunRequest, RollupCounters, Run, RunStatus, Spec,
    SpecPayload, Suite, SuitePayload, SuiteStatus,
};
use flakewatch_lib::services::{FlakyClassifier, IngestionOrchestrator};

pub const PROJECT: &str = "mobile-app";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// A spec that ran for 100 ms starting at `t0`.
pub fn spec(description: &str, status: &str) -> SpecPayload {
    SpecPayload {
        description: Some(description.to_string()),
        status: status.to_string(),
        start_time: Some(rfc3339(t0())),
        end_time: Some(rfc3339(t0() + Duration::milliseconds(100))),
        ..Default::default()
    }
}

/// A failed spec that was retried before failing.
pub fn flaky_spec(description: &str, error: &str) -> SpecPayload {
    SpecPayload {
        error_message: Some(error.to_string()),
        retry_count: 2,
        ..spec(description, "failed")
    }
}

pub fn suite(name: &str, specs: Vec<SpecPayload>) -> SuitePayload {
    SuitePayload {
        name: name.to_string(),
        specs,
        ..Default::default()
    }
}

pub fn run_payload(run_id: &str, suites: Vec<SuitePayload>) -> IngestRunRequest {
    IngestRunRequest {
        project_id: PROJECT.to_string(),
        run_id: run_id.to_string(),
        branch: Some("main".to_string()),
        commit_sha: Some("abc123".to_string()),
        start_time: Some(rfc3339(t0())),
        suites,
        ..Default::default()
    }
}

/// Services wired against explicit stores and a pinned clock.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub classifier: Arc<FlakyClassifier>,
    pub ingestion: IngestionOrchestrator,
}

impl Harness {
    pub fn new() -> Self {
        Self::new_on(Arc::new(MemoryStore::new()))
    }

    /// Harness sharing an existing store.
    pub fn new_on(store: Arc<MemoryStore>) -> Self {
        Self::with_stores(store.clone(), store.clone(), store)
    }

    /// `store` is the backing memory store inspected by assertions; the
    /// services talk to `executions` and `flaky`, which may wrap it.
    pub fn with_stores(
        executions: Arc<dyn ExecutionStore>,
        flaky: Arc<dyn FlakyStore>,
        store: Arc<MemoryStore>,
    ) -> Self {
        let clock = Arc::new(FixedClock::new(t0() + Duration::hours(1)));
        let classifier = Arc::new(FlakyClassifier::new(flaky, clock.clone(), 5));
        let ingestion = IngestionOrchestrator::new(executions, classifier.clone(), clock.clone());

        Self {
            store,
            clock,
            classifier,
            ingestion,
        }
    }
}

/// Which execution-store call should fail.
#[derive(Default)]
pub struct Faults {
    /// Fail `insert_suite` for suites with this name.
    pub suite_insert: Option<String>,
    /// Fail `insert_spec` for specs with this name.
    pub spec_insert: Option<String>,
    pub suite_rollup: bool,
    pub run_rollup: bool,
    /// Hide existing runs from the idempotency lookup, as a concurrent
    /// ingestion of the same run identifier would.
    pub hide_existing_runs: bool,
    /// Let a competing status update land just before ours.
    pub stale_status_reads: bool,
}

/// Execution store that delegates to a [`MemoryStore`] except where told to fail.
pub struct FaultyExecutionStore {
    pub inner: Arc<MemoryStore>,
    pub faults: Faults,
}

fn injected(what: &str) -> AppError {
    AppError::Database(format!("injected failure: {}", what))
}

#[async_trait]
impl ExecutionStore for FaultyExecutionStore {
    async fn ping(&self) -> AppResult<()> {
        self.inner.ping().await
    }

    async fn find_run_by_run_id(&self, run_id: &str) -> AppResult<Option<Run>> {
        if self.faults.hide_existing_runs {
            return Ok(None);
        }
        self.inner.find_run_by_run_id(run_id).await
    }

    async fn get_run(&self, id: Uuid) -> AppResult<Option<Run>> {
        self.inner.get_run(id).await
    }

    async fn insert_run(&self, run: NewRun) -> AppResult<Run> {
        self.inner.insert_run(run).await
    }

    async fn update_run_lifecycle(
        &self,
        id: Uuid,
        from: RunStatus,
        status: RunStatus,
        end_time: Option<DateTime<Utc>>,
        duration_ms: Option<i64>,
    ) -> AppResult<Run> {
        if self.faults.stale_status_reads {
            // Another request finishes the run between our read and our write
            self.inner
                .update_run_lifecycle(id, from, RunStatus::Completed, end_time, duration_ms)
                .await?;
        }
        self.inner
            .update_run_lifecycle(id, from, status, end_time, duration_ms)
            .await
    }

    async fn update_run_counters(&self, id: Uuid, counters: RollupCounters) -> AppResult<Run> {
        if self.faults.run_rollup {
            return Err(injected("update_run_counters"));
        }
        self.inner.update_run_counters(id, counters).await
    }

    async fn soft_delete_run(&self, id: Uuid) -> AppResult<bool> {
        self.inner.soft_delete_run(id).await
    }

    async fn query_runs(&self, query: &RunQuery) -> AppResult<(Vec<Run>, u64)> {
        self.inner.query_runs(query).await
    }

    async fn insert_suite(&self, suite: NewSuite) -> AppResult<Suite> {
        if self.faults.suite_insert.as_deref() == Some(suite.name.as_str()) {
            return Err(injected("insert_suite"));
        }
        self.inner.insert_suite(suite).await
    }

    async fn get_suite(&self, id: Uuid) -> AppResult<Option<Suite>> {
        self.inner.get_suite(id).await
    }

    async fn get_suites_by_run_id(&self, run_id: Uuid) -> AppResult<Vec<Suite>> {
        self.inner.get_suites_by_run_id(run_id).await
    }

    async fn update_suite_counters(
        &self,
        id: Uuid,
        counters: RollupCounters,
        status: SuiteStatus,
    ) -> AppResult<Suite> {
        if self.faults.suite_rollup {
            return Err(injected("update_suite_counters"));
        }
        self.inner.update_suite_counters(id, counters, status).await
    }

    async fn insert_spec(&self, spec: NewSpec) -> AppResult<Spec> {
        if self.faults.spec_insert.as_deref() == Some(spec.name.as_str()) {
            return Err(injected("insert_spec"));
        }
        self.inner.insert_spec(spec).await
    }

    async fn get_specs_by_suite_id(&self, suite_id: Uuid) -> AppResult<Vec<Spec>> {
        self.inner.get_specs_by_suite_id(suite_id).await
    }
}

/// Harness whose execution store fails as described by `faults`.
pub fn faulty_harness(faults: Faults) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let executions = Arc::new(FaultyExecutionStore {
        inner: store.clone(),
        faults,
    });
    Harness::with_stores(executions, store.clone(), store)
}

/// Flaky store that is always down.
pub struct UnavailableFlakyStore;

#[async_trait]
impl FlakyStore for UnavailableFlakyStore {
    async fn find_flaky_test(&self, _key: &FlakyKey) -> AppResult<Option<FlakyTest>> {
        Err(injected("find_flaky_test"))
    }

    async fn get_flaky_test(&self, _id: Uuid) -> AppResult<Option<FlakyTest>> {
        Err(injected("get_flaky_test"))
    }

    async fn insert_flaky_test(&self, _record: &FlakyTest) -> AppResult<FlakyTest> {
        Err(injected("insert_flaky_test"))
    }

    async fn save_flaky_test(&self, _record: &FlakyTest, _expected_total: i32) -> AppResult<bool> {
        Err(injected("save_flaky_test"))
    }

    async fn set_flaky_status(
        &self,
        _id: Uuid,
        _status: FlakyStatus,
    ) -> AppResult<Option<FlakyTest>> {
        Err(injected("set_flaky_status"))
    }

    async fn query_flaky_tests(&self, _query: &FlakyQuery) -> AppResult<(Vec<FlakyTest>, u64)> {
        Err(injected("query_flaky_tests"))
    }
}

/// Flaky store that simulates other writers racing this one.
///
/// - The first `find_flaky_test` misses even when the record exists, as if a
///   concurrent request created it between the lookup and the insert.
/// - The first `save_flaky_test` is preceded by a competing execution written
///   straight to the inner store, so the guarded write loses.
pub struct RacingFlakyStore {
    pub inner: Arc<MemoryStore>,
    pub hide_first_find: AtomicBool,
    pub race_first_save: AtomicBool,
    pub saves: AtomicUsize,
}

impl RacingFlakyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            hide_first_find: AtomicBool::new(true),
            race_first_save: AtomicBool::new(true),
            saves: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FlakyStore for RacingFlakyStore {
    async fn find_flaky_test(&self, key: &FlakyKey) -> AppResult<Option<FlakyTest>> {
        if self.hide_first_find.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_flaky_test(key).await
    }

    async fn get_flaky_test(&self, id: Uuid) -> AppResult<Option<FlakyTest>> {
        self.inner.get_flaky_test(id).await
    }

    async fn insert_flaky_test(&self, record: &FlakyTest) -> AppResult<FlakyTest> {
        self.inner.insert_flaky_test(record).await
    }

    async fn save_flaky_test(&self, record: &FlakyTest, expected_total: i32) -> AppResult<bool> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.race_first_save.swap(false, Ordering::SeqCst) {
            if let Some(mut other) = self.inner.get_flaky_test(record.id).await? {
                let seen = other.total_executions;
                other.total_executions += 1;
                other.flake_rate = f64::from(other.flaky_executions) / f64::from(other.total_executions);
                self.inner.save_flaky_test(&other, seen).await?;
            }
        }
        self.inner.save_flaky_test(record, expected_total).await
    }

    async fn set_flaky_status(
        &self,
        id: Uuid,
        status: FlakyStatus,
    ) -> AppResult<Option<FlakyTest>> {
        self.inner.set_flaky_status(id, status).await
    }

    async fn query_flaky_tests(&self, query: &FlakyQuery) -> AppResult<(Vec<FlakyTest>, u64)> {
        self.inner.query_flaky_tests(query).await
    }
}
