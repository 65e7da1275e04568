//! Migration: Create runs table and shared trigger function.
//!
//! A run is one top-level execution of a test campaign.
//! Also creates the shared updated_at trigger function.

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
                -- Shared trigger function for updated_at
                CREATE OR REPLACE FUNCTION update_updated_at_column()
                RETURNS TRIGGER AS $$
                BEGIN
                    NEW.updated_at = NOW();
                    RETURN NEW;
                END;
                $$ LANGUAGE plpgsql;

                CREATE TABLE runs (
                    id UUID PRIMARY KEY, -- UUIDv7 for time-ordered sorting
                    project_id VARCHAR(255) NOT NULL,

                    -- External identifier; unique for the lifetime of the table, deleted rows included
                    run_id VARCHAR(255) NOT NULL UNIQUE,

                    branch VARCHAR(255),
                    commit_sha VARCHAR(64),
                    environment VARCHAR(100),

                    status VARCHAR(20) NOT NULL DEFAULT 'running'
                        CHECK (status IN ('running', 'completed', 'passed', 'failed')),

                    -- Timing
                    start_time TIMESTAMPTZ NOT NULL,
                    end_time TIMESTAMPTZ,
                    duration_ms BIGINT CHECK (duration_ms IS NULL OR duration_ms >= 0),

                    -- String-to-string metadata map
                    metadata JSONB NOT NULL DEFAULT '{}'::jsonb
                        CHECK (jsonb_typeof(metadata) = 'object'),

                    -- Rollup counters (sum of suite counters)
                    total_count INTEGER NOT NULL DEFAULT 0,
                    passed_count INTEGER NOT NULL DEFAULT 0,
                    failed_count INTEGER NOT NULL DEFAULT 0,
                    skipped_count INTEGER NOT NULL DEFAULT 0,

                    state VARCHAR(10) NOT NULL DEFAULT 'active'
                        CHECK (state IN ('active', 'deleted')),

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                -- Index for listing a project's runs (active only)
                CREATE INDEX idx_runs_project_created_at ON runs(project_id, created_at DESC)
                    WHERE state = 'active';

                -- Index for branch filtering (active only)
                CREATE INDEX idx_runs_branch ON runs(project_id, branch)
                    WHERE state = 'active';

                -- Index for status filtering (active only)
                CREATE INDEX idx_runs_status ON runs(status)
                    WHERE state = 'active';

                -- Trigger to update updated_at
                CREATE TRIGGER update_runs_updated_at
                    BEFORE UPDATE ON runs
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
                DROP TRIGGER IF EXISTS update_runs_updated_at ON runs;
                DROP TABLE IF EXISTS runs CASCADE;
                DROP FUNCTION IF EXISTS update_updated_at_column();
                "#,
            )
            .await?;

        Ok(())
    }
}
