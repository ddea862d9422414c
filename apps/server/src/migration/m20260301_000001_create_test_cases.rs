//! Migration: Create test_cases table and shared trigger function.
//!
//! Test cases are manual test definitions with ordered steps.

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

                CREATE TABLE test_cases (
                    id UUID PRIMARY KEY, -- UUIDv7 for time-ordered sorting
                    project_id UUID,

                    title VARCHAR(500) NOT NULL CHECK (length(trim(title)) > 0),
                    description TEXT,
                    test_type VARCHAR(50) NOT NULL DEFAULT 'functional',
                    priority VARCHAR(20) NOT NULL DEFAULT 'medium'
                        CHECK (priority IN ('low', 'medium', 'high', 'critical')),

                    -- [{step_number, action, expected}], numbered 1..n
                    steps JSONB NOT NULL DEFAULT '[]'::jsonb,
                    preconditions TEXT,
                    expected_result TEXT,

                    status VARCHAR(20) NOT NULL DEFAULT 'draft'
                        CHECK (status IN ('draft', 'active', 'archived')),

                    created_by VARCHAR(255),
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_test_cases_project_id ON test_cases(project_id)
                    WHERE status != 'archived';
                CREATE INDEX idx_test_cases_status ON test_cases(status);
                CREATE INDEX idx_test_cases_priority ON test_cases(priority);

                CREATE EXTENSION IF NOT EXISTS pg_trgm;
                CREATE INDEX idx_test_cases_title_trgm ON test_cases USING GIN (title gin_trgm_ops);

                CREATE TRIGGER update_test_cases_updated_at
                    BEFORE UPDATE ON test_cases
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
                DROP TRIGGER IF EXISTS update_test_cases_updated_at ON test_cases;
                DROP TABLE IF EXISTS test_cases CASCADE;
                DROP FUNCTION IF EXISTS update_updated_at_column();
                "#,
            )
            .await?;

        Ok(())
    }
}
