//! Execution tracking: state machine, store seam and the tracker itself.

mod clock;
mod execution_tracker;
mod memory;
mod store;
mod transition;

pub use clock::{Clock, ManualClock, SystemClock, duration_minutes};
pub use execution_tracker::{ExecutionTracker, MarkOutcome};
pub use memory::InMemoryExecutionStore;
pub use store::ExecutionStore;
pub use transition::{CompletionStamp, ExecutionEvent, TransitionRejected, transition};
