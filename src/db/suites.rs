//! Database queries for suites.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::entity::suite::{self, ActiveModel, Entity as SuiteEntity};
use crate::error::{AppError, AppResult};
use crate::models::{RollupCounters, Suite, SuiteStatus};

use super::store::NewSuite;
use super::{DbPool, corrupt_column};

impl TryFrom<suite::Model> for Suite {
    type Error = AppError;

    fn try_from(m: suite::Model) -> AppResult<Self> {
        let status = SuiteStatus::parse(&m.status)
            .ok_or_else(|| corrupt_column("suites", "status", &m.status))?;

        Ok(Suite {
            id: m.id,
            run_id: m.run_id,
            name: m.name,
            status,
            sequence: m.sequence,
            start_time: m.start_time,
            end_time: m.end_time,
            duration_ms: m.duration_ms,
            counters: RollupCounters {
                total: m.total_count,
                passed: m.passed_count,
                failed: m.failed_count,
                skipped: m.skipped_count,
            },
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

impl DbPool {
    /// Insert a new suite with zero counters.
    pub async fn insert_suite(&self, new_suite: NewSuite) -> AppResult<Suite> {
        let id = Uuid::now_v7();
        let now = Utc::now();

        let model = ActiveModel {
            id: Set(id),
            run_id: Set(new_suite.run_id),
            name: Set(new_suite.name),
            status: Set(SuiteStatus::Running.as_str().to_string()),
            sequence: Set(new_suite.sequence),
            start_time: Set(new_suite.start_time),
            end_time: Set(new_suite.end_time),
            duration_ms: Set(new_suite.duration_ms),
            total_count: Set(0),
            passed_count: Set(0),
            failed_count: Set(0),
            skipped_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert suite: {}", e)))?;

        result.try_into()
    }

    /// Get a single suite by ID.
    pub async fn get_suite(&self, id: Uuid) -> AppResult<Option<Suite>> {
        let result = SuiteEntity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get suite: {}", e)))?;

        result.map(Suite::try_from).transpose()
    }

    /// Get suites by run ID in payload order.
    pub async fn get_suites_by_run_id(&self, run_id: Uuid) -> AppResult<Vec<Suite>> {
        let result = SuiteEntity::find()
            .filter(suite::Column::RunId.eq(run_id))
            .order_by_asc(suite::Column::Sequence)
            .order_by_asc(suite::Column::Id)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get suites for run: {}", e)))?;

        result.into_iter().map(Suite::try_from).collect()
    }

    /// Overwrite a suite's counters and derived status.
    pub async fn update_suite_counters(
        &self,
        id: Uuid,
        counters: RollupCounters,
        status: SuiteStatus,
    ) -> AppResult<Suite> {
        let suite = SuiteEntity::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get suite: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("Suite {}", id)))?;

        let mut active: ActiveModel = suite.into();
        active.total_count = Set(counters.total);
        active.passed_count = Set(counters.passed);
        active.failed_count = Set(counters.failed);
        active.skipped_count = Set(counters.skipped);
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now());

        let result = active
            .update(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update suite counters: {}", e)))?;

        result.try_into()
    }
}
