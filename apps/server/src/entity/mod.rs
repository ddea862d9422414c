//! SeaORM entity definitions for PostgreSQL database.

pub mod test_case;
pub mod test_execution;
pub mod test_run_session;
