//! Migration: Create suites table.
//!
//! Suites group specs within a run and carry rolled-up counters.

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
                CREATE TABLE suites (
                    id UUID PRIMARY KEY, -- UUIDv7 for time-ordered sorting
                    run_id UUID NOT NULL REFERENCES runs(id) ON DELETE CASCADE,

                    name VARCHAR(500) NOT NULL CHECK (length(name) > 0),
                    status VARCHAR(20) NOT NULL DEFAULT 'running'
                        CHECK (status IN ('running', 'passed', 'failed')),

                    -- Ordering within the ingested payload
                    sequence INTEGER NOT NULL DEFAULT 0,

                    -- Timing (start defaults to the run's start at ingestion)
                    start_time TIMESTAMPTZ NOT NULL,
                    end_time TIMESTAMPTZ,
                    duration_ms BIGINT CHECK (duration_ms IS NULL OR duration_ms >= 0),

                    -- Rollup counters (count of specs by status)
                    total_count INTEGER NOT NULL DEFAULT 0,
                    passed_count INTEGER NOT NULL DEFAULT 0,
                    failed_count INTEGER NOT NULL DEFAULT 0,
                    skipped_count INTEGER NOT NULL DEFAULT 0,

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                -- Index for run lookup in payload order
                CREATE INDEX idx_suites_run_id_sequence ON suites(run_id, sequence);

                -- Trigger to update updated_at
                CREATE TRIGGER update_suites_updated_at
                    BEFORE UPDATE ON suites
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DROP TRIGGER IF EXISTS update_suites_updated_at ON suites;
                DROP TABLE IF EXISTS suites CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
