//! Database queries for runs.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::entity::run::{self, ActiveModel, Entity as RunEntity};
use crate::error::{AppError, AppResult};
use crate::models::{EntityState, RollupCounters, Run, RunMetadata, RunStatus};

use super::store::{NewRun, RunQuery};
use super::{DbPool, corrupt_column, is_unique_violation};

impl TryFrom<run::Model> for Run {
    type Error = AppError;

    fn try_from(m: run::Model) -> AppResult<Self> {
        let status =
            RunStatus::parse(&m.status).ok_or_else(|| corrupt_column("runs", "status", &m.status))?;
        let state =
            EntityState::parse(&m.state).ok_or_else(|| corrupt_column("runs", "state", &m.state))?;

        Ok(Run {
            id: m.id,
            project_id: m.project_id,
            run_id: m.run_id,
            branch: m.branch,
            commit_sha: m.commit_sha,
            environment: m.environment,
            status,
            start_time: m.start_time,
            end_time: m.end_time,
            duration_ms: m.duration_ms,
            metadata: RunMetadata::from_json(Some(&m.metadata)),
            counters: RollupCounters {
                total: m.total_count,
                passed: m.passed_count,
                failed: m.failed_count,
                skipped: m.skipped_count,
            },
            state,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

impl DbPool {
    /// Insert a new run inside its own transaction.
    pub async fn insert_run(&self, new_run: NewRun) -> AppResult<Run> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let run_id = new_run.run_id.clone();

        let model = ActiveModel {
            id: Set(id),
            project_id: Set(new_run.project_id),
            run_id: Set(new_run.run_id),
            branch: Set(new_run.branch),
            commit_sha: Set(new_run.commit_sha),
            environment: Set(new_run.environment),
            status: Set(RunStatus::Running.as_str().to_string()),
            start_time: Set(new_run.start_time),
            end_time: Set(new_run.end_time),
            duration_ms: Set(new_run.duration_ms),
            metadata: Set(new_run.metadata.to_json()),
            total_count: Set(0),
            passed_count: Set(0),
            failed_count: Set(0),
            skipped_count: Set(0),
            state: Set(EntityState::Active.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let txn = self
            .connection()
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let inserted = match model.insert(&txn).await {
            Ok(m) => m,
            Err(e) if is_unique_violation(&e) => return Err(AppError::DuplicateRun(run_id)),
            Err(e) => return Err(AppError::Database(format!("Failed to insert run: {}", e))),
        };

        txn.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit run: {}", e)))?;

        inserted.try_into()
    }

    /// Find a run by external identifier, including deleted runs.
    pub async fn find_run_by_run_id(&self, run_id: &str) -> AppResult<Option<Run>> {
        let result = RunEntity::find()
            .filter(run::Column::RunId.eq(run_id))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to find run: {}", e)))?;

        result.map(Run::try_from).transpose()
    }

    /// Get an active run by ID.
    pub async fn get_run(&self, id: Uuid) -> AppResult<Option<Run>> {
        let result = RunEntity::find_by_id(id)
            .filter(run::Column::State.eq(EntityState::Active.as_str()))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get run: {}", e)))?;

        result.map(Run::try_from).transpose()
    }

    async fn get_run_model(&self, id: Uuid) -> AppResult<run::Model> {
        RunEntity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get run: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("Run {}", id)))
    }

    /// Move an active run from `from` to `status`, setting end time and duration.
    ///
    /// The write only lands while the stored status is still `from`; otherwise
    /// another transition won and this one fails with `Conflict`.
    pub async fn update_run_lifecycle(
        &self,
        id: Uuid,
        from: RunStatus,
        status: RunStatus,
        end_time: Option<DateTime<Utc>>,
        duration_ms: Option<i64>,
    ) -> AppResult<Run> {
        let result = RunEntity::update_many()
            .col_expr(run::Column::Status, Expr::value(status.as_str()))
            .col_expr(run::Column::EndTime, Expr::value(end_time))
            .col_expr(run::Column::DurationMs, Expr::value(duration_ms))
            .col_expr(run::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(run::Column::Id.eq(id))
            .filter(run::Column::State.eq(EntityState::Active.as_str()))
            .filter(run::Column::Status.eq(from.as_str()))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update run status: {}", e)))?;

        if result.rows_affected == 0 {
            return Err(AppError::Conflict(format!(
                "Run {} is no longer {}",
                id, from
            )));
        }

        self.get_run_model(id).await?.try_into()
    }

    /// Overwrite the run's rollup counters.
    pub async fn update_run_counters(&self, id: Uuid, counters: RollupCounters) -> AppResult<Run> {
        let run = self.get_run_model(id).await?;

        let mut active: ActiveModel = run.into();
        active.total_count = Set(counters.total);
        active.passed_count = Set(counters.passed);
        active.failed_count = Set(counters.failed);
        active.skipped_count = Set(counters.skipped);
        active.updated_at = Set(Utc::now());

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update run counters: {}", e)))?;

        result.try_into()
    }

    /// Soft delete a run.
    pub async fn soft_delete_run(&self, id: Uuid) -> AppResult<bool> {
        let Some(run) = RunEntity::find_by_id(id)
            .filter(run::Column::State.eq(EntityState::Active.as_str()))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get run: {}", e)))?
        else {
            return Ok(false);
        };

        let mut active: ActiveModel = run.into();
        active.state = Set(EntityState::Deleted.as_str().to_string());
        active.updated_at = Set(Utc::now());

        active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete run: {}", e)))?;

        Ok(true)
    }

    /// Query active runs with pagination.
    pub async fn query_runs(&self, query: &RunQuery) -> AppResult<(Vec<Run>, u64)> {
        let mut select =
            RunEntity::find().filter(run::Column::State.eq(EntityState::Active.as_str()));

        if let Some(ref project_id) = query.project_id {
            select = select.filter(run::Column::ProjectId.eq(project_id.as_str()));
        }

        if let Some(ref branch) = query.branch {
            select = select.filter(run::Column::Branch.eq(branch.as_str()));
        }

        if let Some(status) = query.status {
            select = select.filter(run::Column::Status.eq(status.as_str()));
        }

        // Count total before pagination
        let total = select
            .clone()
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count runs: {}", e)))?;

        let runs = select
            .order_by_desc(run::Column::CreatedAt)
            .order_by_desc(run::Column::Id)
            .offset(query.offset)
            .limit(query.limit)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to query runs: {}", e)))?;

        let runs = runs
            .into_iter()
            .map(Run::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((runs, total))
    }
}
