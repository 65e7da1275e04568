//! Database module providing connection management, migrations, and queries.

pub mod memory;
pub mod runs;
pub mod specs;
pub mod store;
pub mod suites;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    SqlErr, Statement,
};
use sea_orm_migration::MigratorTrait;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::migration::Migrator;
use crate::models::{
    FlakyKey, FlakyStatus, FlakyTest, RollupCounters, Run, RunStatus, Spec, Suite, SuiteStatus,
};

pub use memory::MemoryStore;
pub use store::{
    ExecutionStore, FlakyQuery, FlakyStore, NewRun, NewSpec, NewSuite, RunQuery,
};

/// Database connection pool wrapper around a SeaORM connection.
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration.
    pub async fn new(config: &Config) -> AppResult<Self> {
        let mut options = ConnectOptions::new(config.database.url.clone());
        options
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .connect_timeout(Duration::from_secs(config.database.connect_timeout_secs))
            .sqlx_logging(false);

        let conn = Database::connect(options)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to database: {}", e)))?;

        Ok(DbPool { conn })
    }

    /// Get the underlying connection for executing queries.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Apply all pending migrations.
    pub async fn run_migrations(&self) -> AppResult<()> {
        Migrator::up(&self.conn, None)
            .await
            .map_err(|e| AppError::Database(format!("Migration failed: {}", e)))?;
        info!("Database migrations complete");
        Ok(())
    }

    /// Run a trivial query to verify connectivity.
    pub async fn ping(&self) -> AppResult<()> {
        let stmt = Statement::from_string(DatabaseBackend::Postgres, "SELECT 1".to_owned());
        self.conn
            .query_one_raw(stmt)
            .await
            .map_err(|e| AppError::Database(format!("Database ping failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for DbPool {
    async fn ping(&self) -> AppResult<()> {
        DbPool::ping(self).await
    }

    async fn find_run_by_run_id(&self, run_id: &str) -> AppResult<Option<Run>> {
        DbPool::find_run_by_run_id(self, run_id).await
    }

    async fn get_run(&self, id: Uuid) -> AppResult<Option<Run>> {
        DbPool::get_run(self, id).await
    }

    async fn insert_run(&self, run: NewRun) -> AppResult<Run> {
        DbPool::insert_run(self, run).await
    }

    async fn update_run_lifecycle(
        &self,
        id: Uuid,
        from: RunStatus,
        status: RunStatus,
        end_time: Option<DateTime<Utc>>,
        duration_ms: Option<i64>,
    ) -> AppResult<Run> {
        DbPool::update_run_lifecycle(self, id, from, status, end_time, duration_ms).await
    }

    async fn update_run_counters(&self, id: Uuid, counters: RollupCounters) -> AppResult<Run> {
        DbPool::update_run_counters(self, id, counters).await
    }

    async fn soft_delete_run(&self, id: Uuid) -> AppResult<bool> {
        DbPool::soft_delete_run(self, id).await
    }

    async fn query_runs(&self, query: &RunQuery) -> AppResult<(Vec<Run>, u64)> {
        DbPool::query_runs(self, query).await
    }

    async fn insert_suite(&self, suite: NewSuite) -> AppResult<Suite> {
        DbPool::insert_suite(self, suite).await
    }

    async fn get_suite(&self, id: Uuid) -> AppResult<Option<Suite>> {
        DbPool::get_suite(self, id).await
    }

    async fn get_suites_by_run_id(&self, run_id: Uuid) -> AppResult<Vec<Suite>> {
        DbPool::get_suites_by_run_id(self, run_id).await
    }

    async fn update_suite_counters(
        &self,
        id: Uuid,
        counters: RollupCounters,
        status: SuiteStatus,
    ) -> AppResult<Suite> {
        DbPool::update_suite_counters(self, id, counters, status).await
    }

    async fn insert_spec(&self, spec: NewSpec) -> AppResult<Spec> {
        DbPool::insert_spec(self, spec).await
    }

    async fn get_specs_by_suite_id(&self, suite_id: Uuid) -> AppResult<Vec<Spec>> {
        DbPool::get_specs_by_suite_id(self, suite_id).await
    }
}

#[async_trait]
impl FlakyStore for DbPool {
    async fn find_flaky_test(&self, key: &FlakyKey) -> AppResult<Option<FlakyTest>> {
        DbPool::find_flaky_test(self, key).await
    }

    async fn get_flaky_test(&self, id: Uuid) -> AppResult<Option<FlakyTest>> {
        DbPool::get_flaky_test(self, id).await
    }

    async fn insert_flaky_test(&self, record: &FlakyTest) -> AppResult<FlakyTest> {
        DbPool::insert_flaky_test(self, record).await
    }

    async fn save_flaky_test(&self, record: &FlakyTest, expected_total: i32) -> AppResult<bool> {
        DbPool::save_flaky_test(self, record, expected_total).await
    }

    async fn set_flaky_status(
        &self,
        id: Uuid,
        status: FlakyStatus,
    ) -> AppResult<Option<FlakyTest>> {
        DbPool::set_flaky_status(self, id, status).await
    }

    async fn query_flaky_tests(&self, query: &FlakyQuery) -> AppResult<(Vec<FlakyTest>, u64)> {
        DbPool::query_flaky_tests(self, query).await
    }
}

/// Whether a database error is a unique constraint violation.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Error for a row whose stored enum column no longer parses.
pub(crate) fn corrupt_column(table: &str, column: &str, value: &str) -> AppError {
    AppError::Database(format!(
        "Invalid {} '{}' stored in {}",
        column, value, table
    ))
}
