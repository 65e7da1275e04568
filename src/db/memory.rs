//! In-process store backing tests and local development.
//!
//! All state sits behind one mutex. The lock is never held across an `.await`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    EntityState, FlakyKey, FlakyStatus, FlakyTest, RollupCounters, Run, RunStatus, Spec, Suite,
    SuiteStatus,
};

use super::store::{ExecutionStore, FlakyQuery, FlakyStore, NewRun, NewSpec, NewSuite, RunQuery};

#[derive(Default)]
struct MemoryState {
    runs: BTreeMap<Uuid, Run>,
    /// Run ids in insertion order.
    run_order: Vec<Uuid>,
    suites: BTreeMap<Uuid, Suite>,
    specs: BTreeMap<Uuid, Spec>,
    flaky_tests: BTreeMap<Uuid, FlakyTest>,
}

/// Memory-backed implementation of both repository traits.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> AppResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| AppError::Database("Memory store lock poisoned".to_string()))
    }

    /// Number of spec rows stored for a run.
    pub fn spec_count(&self, run_id: Uuid) -> AppResult<usize> {
        let state = self.state()?;
        Ok(state.specs.values().filter(|s| s.run_id == run_id).count())
    }
}

fn page<T>(items: Vec<T>, offset: u64, limit: u64) -> Vec<T> {
    items
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(limit as usize)
        .collect()
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        self.state().map(|_| ())
    }

    async fn find_run_by_run_id(&self, run_id: &str) -> AppResult<Option<Run>> {
        let state = self.state()?;
        Ok(state.runs.values().find(|r| r.run_id == run_id).cloned())
    }

    async fn get_run(&self, id: Uuid) -> AppResult<Option<Run>> {
        let state = self.state()?;
        Ok(state
            .runs
            .get(&id)
            .filter(|r| r.state == EntityState::Active)
            .cloned())
    }

    async fn insert_run(&self, new_run: NewRun) -> AppResult<Run> {
        let mut state = self.state()?;
        if state.runs.values().any(|r| r.run_id == new_run.run_id) {
            return Err(AppError::DuplicateRun(new_run.run_id));
        }

        let now = Utc::now();
        let run = Run {
            id: Uuid::now_v7(),
            project_id: new_run.project_id,
            run_id: new_run.run_id,
            branch: new_run.branch,
            commit_sha: new_run.commit_sha,
            environment: new_run.environment,
            status: RunStatus::Running,
            start_time: new_run.start_time,
            end_time: new_run.end_time,
            duration_ms: new_run.duration_ms,
            metadata: new_run.metadata,
            counters: RollupCounters::default(),
            state: EntityState::Active,
            created_at: now,
            updated_at: now,
        };

        state.run_order.push(run.id);
        state.runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn update_run_lifecycle(
        &self,
        id: Uuid,
        from: RunStatus,
        status: RunStatus,
        end_time: Option<DateTime<Utc>>,
        duration_ms: Option<i64>,
    ) -> AppResult<Run> {
        let mut state = self.state()?;
        let run = state
            .runs
            .get_mut(&id)
            .filter(|run| run.state == EntityState::Active)
            .ok_or_else(|| AppError::NotFound(format!("Run {}", id)))?;
        if run.status != from {
            return Err(AppError::Conflict(format!(
                "Run {} is no longer {}",
                id, from
            )));
        }

        run.status = status;
        run.end_time = end_time;
        run.duration_ms = duration_ms;
        run.updated_at = Utc::now();
        Ok(run.clone())
    }

    async fn update_run_counters(&self, id: Uuid, counters: RollupCounters) -> AppResult<Run> {
        let mut state = self.state()?;
        let run = state
            .runs
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Run {}", id)))?;

        run.counters = counters;
        run.updated_at = Utc::now();
        Ok(run.clone())
    }

    async fn soft_delete_run(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state()?;
        match state.runs.get_mut(&id) {
            Some(run) if run.state == EntityState::Active => {
                run.state = EntityState::Deleted;
                run.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn query_runs(&self, query: &RunQuery) -> AppResult<(Vec<Run>, u64)> {
        let state = self.state()?;
        let matching: Vec<Run> = state
            .run_order
            .iter()
            .rev()
            .filter_map(|id| state.runs.get(id))
            .filter(|r| r.state == EntityState::Active)
            .filter(|r| {
                query
                    .project_id
                    .as_deref()
                    .is_none_or(|p| r.project_id == p)
            })
            .filter(|r| {
                query
                    .branch
                    .as_deref()
                    .is_none_or(|b| r.branch.as_deref() == Some(b))
            })
            .filter(|r| query.status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();

        let total = matching.len() as u64;
        Ok((page(matching, query.offset, query.limit), total))
    }

    async fn insert_suite(&self, new_suite: NewSuite) -> AppResult<Suite> {
        let mut state = self.state()?;
        if !state.runs.contains_key(&new_suite.run_id) {
            return Err(AppError::NotFound(format!("Run {}", new_suite.run_id)));
        }

        let now = Utc::now();
        let suite = Suite {
            id: Uuid::now_v7(),
            run_id: new_suite.run_id,
            name: new_suite.name,
            status: SuiteStatus::Running,
            sequence: new_suite.sequence,
            start_time: new_suite.start_time,
            end_time: new_suite.end_time,
            duration_ms: new_suite.duration_ms,
            counters: RollupCounters::default(),
            created_at: now,
            updated_at: now,
        };

        state.suites.insert(suite.id, suite.clone());
        Ok(suite)
    }

    async fn get_suite(&self, id: Uuid) -> AppResult<Option<Suite>> {
        let state = self.state()?;
        Ok(state.suites.get(&id).cloned())
    }

    async fn get_suites_by_run_id(&self, run_id: Uuid) -> AppResult<Vec<Suite>> {
        let state = self.state()?;
        let mut suites: Vec<Suite> = state
            .suites
            .values()
            .filter(|s| s.run_id == run_id)
            .cloned()
            .collect();
        suites.sort_by_key(|s| (s.sequence, s.id));
        Ok(suites)
    }

    async fn update_suite_counters(
        &self,
        id: Uuid,
        counters: RollupCounters,
        status: SuiteStatus,
    ) -> AppResult<Suite> {
        let mut state = self.state()?;
        let suite = state
            .suites
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Suite {}", id)))?;

        suite.counters = counters;
        suite.status = status;
        suite.updated_at = Utc::now();
        Ok(suite.clone())
    }

    async fn insert_spec(&self, new_spec: NewSpec) -> AppResult<Spec> {
        let mut state = self.state()?;
        if !state.suites.contains_key(&new_spec.suite_id) {
            return Err(AppError::NotFound(format!("Suite {}", new_spec.suite_id)));
        }

        let spec = Spec {
            id: Uuid::now_v7(),
            suite_id: new_spec.suite_id,
            run_id: new_spec.run_id,
            name: new_spec.name,
            status: new_spec.status,
            sequence: new_spec.sequence,
            start_time: new_spec.start_time,
            end_time: new_spec.end_time,
            duration_ms: new_spec.duration_ms,
            error_message: new_spec.error_message,
            stack_trace: new_spec.stack_trace,
            retry_count: new_spec.retry_count,
            is_flaky: new_spec.is_flaky,
            created_at: Utc::now(),
        };

        state.specs.insert(spec.id, spec.clone());
        Ok(spec)
    }

    async fn get_specs_by_suite_id(&self, suite_id: Uuid) -> AppResult<Vec<Spec>> {
        let state = self.state()?;
        let mut specs: Vec<Spec> = state
            .specs
            .values()
            .filter(|s| s.suite_id == suite_id)
            .cloned()
            .collect();
        specs.sort_by_key(|s| (s.sequence, s.id));
        Ok(specs)
    }
}

#[async_trait]
impl FlakyStore for MemoryStore {
    async fn find_flaky_test(&self, key: &FlakyKey) -> AppResult<Option<FlakyTest>> {
        let state = self.state()?;
        Ok(state
            .flaky_tests
            .values()
            .find(|f| f.key() == *key)
            .cloned())
    }

    async fn get_flaky_test(&self, id: Uuid) -> AppResult<Option<FlakyTest>> {
        let state = self.state()?;
        Ok(state.flaky_tests.get(&id).cloned())
    }

    async fn insert_flaky_test(&self, record: &FlakyTest) -> AppResult<FlakyTest> {
        let mut state = self.state()?;
        let key = record.key();
        if state.flaky_tests.values().any(|f| f.key() == key) {
            return Err(AppError::Conflict(format!(
                "Flaky record for '{}' in '{}' already exists",
                record.spec_name, record.suite_name
            )));
        }

        state.flaky_tests.insert(record.id, record.clone());
        Ok(record.clone())
    }

    async fn save_flaky_test(&self, record: &FlakyTest, expected_total: i32) -> AppResult<bool> {
        let mut state = self.state()?;
        match state.flaky_tests.get_mut(&record.id) {
            Some(stored) if stored.total_executions == expected_total => {
                stored.total_executions = record.total_executions;
                stored.flaky_executions = record.flaky_executions;
                stored.flake_rate = record.flake_rate;
                stored.last_seen_at = record.last_seen_at;
                stored.severity = record.severity;
                stored.last_error_message = record.last_error_message.clone();
                stored.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_flaky_status(
        &self,
        id: Uuid,
        status: FlakyStatus,
    ) -> AppResult<Option<FlakyTest>> {
        let mut state = self.state()?;
        Ok(state.flaky_tests.get_mut(&id).map(|record| {
            record.status = status;
            record.updated_at = Utc::now();
            record.clone()
        }))
    }

    async fn query_flaky_tests(&self, query: &FlakyQuery) -> AppResult<(Vec<FlakyTest>, u64)> {
        let state = self.state()?;
        let mut matching: Vec<FlakyTest> = state
            .flaky_tests
            .values()
            .filter(|f| f.project_id == query.project_id)
            .filter(|f| query.severity.is_none_or(|s| f.severity == s))
            .filter(|f| query.status.is_none_or(|s| f.status == s))
            .cloned()
            .collect();

        matching.sort_by(|a, b| match b.flake_rate.total_cmp(&a.flake_rate) {
            Ordering::Equal => b.last_seen_at.cmp(&a.last_seen_at),
            other => other,
        });

        let total = matching.len() as u64;
        Ok((page(matching, query.offset, query.limit), total))
    }
}
