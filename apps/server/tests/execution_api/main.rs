//! Execution HTTP API tests.
//!
//! Drives the execution routes through `actix_web::test` with the tracker
//! backed by the in-memory store, so no database is needed.
//!
//! Run with: cargo test --test execution_api

mod test_helpers;

mod test_mark_result;
mod test_steps;
