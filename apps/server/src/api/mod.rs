//! API endpoint modules.

pub mod executions;
pub mod health;
pub mod openapi;
pub mod sessions;
pub mod test_cases;
pub mod websocket;

pub use executions::configure_routes as configure_execution_routes;
pub use health::configure_health_routes;
pub use openapi::ApiDoc;
pub use sessions::configure_routes as configure_session_routes;
pub use test_cases::configure_routes as configure_test_case_routes;
pub use websocket::configure_routes as configure_websocket_routes;
