//! SeaORM database migrations.

pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_test_cases;
mod m20260301_000002_create_test_run_sessions;
mod m20260301_000003_create_test_executions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_test_cases::Migration),
            Box::new(m20260301_000002_create_test_run_sessions::Migration),
            Box::new(m20260301_000003_create_test_executions::Migration),
        ]
    }
}
