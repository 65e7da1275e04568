//! Database queries for specs.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::entity::spec::{self, ActiveModel, Entity as SpecEntity};
use crate::error::{AppError, AppResult};
use crate::models::{Spec, SpecStatus};

use super::store::NewSpec;
use super::{DbPool, corrupt_column};

impl TryFrom<spec::Model> for Spec {
    type Error = AppError;

    fn try_from(m: spec::Model) -> AppResult<Self> {
        let status = SpecStatus::parse(&m.status)
            .ok_or_else(|| corrupt_column("specs", "status", &m.status))?;

        Ok(Spec {
            id: m.id,
            suite_id: m.suite_id,
            run_id: m.run_id,
            name: m.name,
            status,
            sequence: m.sequence,
            start_time: m.start_time,
            end_time: m.end_time,
            duration_ms: m.duration_ms,
            error_message: m.error_message,
            stack_trace: m.stack_trace,
            retry_count: m.retry_count,
            is_flaky: m.is_flaky,
            created_at: m.created_at,
        })
    }
}

impl DbPool {
    /// Insert a new spec.
    pub async fn insert_spec(&self, new_spec: NewSpec) -> AppResult<Spec> {
        let model = ActiveModel {
            id: Set(Uuid::now_v7()),
            suite_id: Set(new_spec.suite_id),
            run_id: Set(new_spec.run_id),
            name: Set(new_spec.name),
            status: Set(new_spec.status.as_str().to_string()),
            sequence: Set(new_spec.sequence),
            start_time: Set(new_spec.start_time),
            end_time: Set(new_spec.end_time),
            duration_ms: Set(new_spec.duration_ms),
            error_message: Set(new_spec.error_message),
            stack_trace: Set(new_spec.stack_trace),
            retry_count: Set(new_spec.retry_count),
            is_flaky: Set(new_spec.is_flaky),
            created_at: Set(Utc::now()),
        };

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert spec: {}", e)))?;

        result.try_into()
    }

    /// Get specs by suite ID in payload order.
    pub async fn get_specs_by_suite_id(&self, suite_id: Uuid) -> AppResult<Vec<Spec>> {
        let result = SpecEntity::find()
            .filter(spec::Column::SuiteId.eq(suite_id))
            .order_by_asc(spec::Column::Sequence)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get specs: {}", e)))?;

        result.into_iter().map(Spec::try_from).collect()
    }
}
