//! Migration: Create specs table.
//!
//! One row per reported test case execution.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE specs (
                    id UUID PRIMARY KEY, -- UUIDv7 for time-ordered sorting
                    suite_id UUID NOT NULL REFERENCES suites(id) ON DELETE CASCADE,
                    run_id UUID NOT NULL REFERENCES runs(id) ON DELETE CASCADE,

                    name VARCHAR(1000) NOT NULL CHECK (length(name) > 0),
                    status VARCHAR(20) NOT NULL
                        CHECK (status IN ('passed', 'failed', 'skipped', 'pending')),

                    -- Ordering within suite
                    sequence INTEGER NOT NULL DEFAULT 0,

                    -- Timing: duration is always end_time - start_time
                    start_time TIMESTAMPTZ NOT NULL,
                    end_time TIMESTAMPTZ NOT NULL,
                    duration_ms BIGINT NOT NULL CHECK (duration_ms >= 0),
                    CHECK (end_time >= start_time),

                    -- Error info (nullable)
                    error_message TEXT,
                    stack_trace TEXT,

                    retry_count INTEGER NOT NULL DEFAULT 0 CHECK (retry_count >= 0),
                    is_flaky BOOLEAN NOT NULL DEFAULT FALSE,

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                -- Index for suite lookup in payload order
                CREATE INDEX idx_specs_suite_id_sequence ON specs(suite_id, sequence);

                -- Index for run-wide status filtering
                CREATE INDEX idx_specs_run_status ON specs(run_id, status);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS specs CASCADE;")
            .await?;

        Ok(())
    }
}
