//! Application services shared across handlers.

pub mod event_broadcaster;

pub use event_broadcaster::EventBroadcaster;
