//! Migration: Create test_run_sessions table.
//!
//! A session groups the executions of one pass over a set of test cases.

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
                CREATE TABLE test_run_sessions (
                    id UUID PRIMARY KEY,
                    name VARCHAR(255) NOT NULL,
                    status VARCHAR(20) NOT NULL DEFAULT 'active'
                        CHECK (status IN ('active', 'completed', 'aborted')),
                    environment VARCHAR(255),
                    started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    completed_at TIMESTAMPTZ,
                    created_by VARCHAR(255),
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_test_run_sessions_status ON test_run_sessions(status);
                CREATE INDEX idx_test_run_sessions_created_at ON test_run_sessions(created_at DESC);

                CREATE TRIGGER update_test_run_sessions_updated_at
                    BEFORE UPDATE ON test_run_sessions
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
                DROP TRIGGER IF EXISTS update_test_run_sessions_updated_at ON test_run_sessions;
                DROP TABLE IF EXISTS test_run_sessions CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
