//! Migration: Create test_executions table.
//!
//! One row per (test case, session) pair; unscoped rows have a NULL session.

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
                CREATE TABLE test_executions (
                    id UUID PRIMARY KEY,
                    test_case_id UUID NOT NULL REFERENCES test_cases(id) ON DELETE CASCADE,
                    session_id UUID REFERENCES test_run_sessions(id) ON DELETE CASCADE,

                    status VARCHAR(20) NOT NULL DEFAULT 'not_run'
                        CHECK (status IN ('not_run', 'in_progress', 'passed', 'failed', 'blocked', 'skipped')),

                    -- Step progress
                    completed_steps JSONB NOT NULL DEFAULT '[]'::jsonb,
                    failed_steps JSONB NOT NULL DEFAULT '[]'::jsonb,

                    notes TEXT NOT NULL DEFAULT '',
                    failure_reason TEXT NOT NULL DEFAULT '',

                    -- Timing
                    started_at TIMESTAMPTZ,
                    completed_at TIMESTAMPTZ,
                    duration_minutes INTEGER CHECK (duration_minutes IS NULL OR duration_minutes >= 0),

                    -- Environment captured with the verdict
                    test_environment VARCHAR(255),
                    browser VARCHAR(255),
                    os_version VARCHAR(255),

                    executed_by VARCHAR(255),

                    -- Optimistic concurrency counter
                    version INTEGER NOT NULL DEFAULT 1,

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                -- At most one row per test case and session (NULL session counts as one scope)
                CREATE UNIQUE INDEX idx_test_executions_identity ON test_executions(
                    test_case_id,
                    COALESCE(session_id, '00000000-0000-0000-0000-000000000000'::uuid)
                );

                CREATE INDEX idx_test_executions_session_id ON test_executions(session_id)
                    WHERE session_id IS NOT NULL;
                CREATE INDEX idx_test_executions_status ON test_executions(status);

                CREATE TRIGGER update_test_executions_updated_at
                    BEFORE UPDATE ON test_executions
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
                DROP TRIGGER IF EXISTS update_test_executions_updated_at ON test_executions;
                DROP TABLE IF EXISTS test_executions CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
