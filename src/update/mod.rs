//! Update State Manager (C3) and Update Scheduler (C4): the content
//! lifecycle's coordination layer.

mod errors;
mod scheduler;
mod state;

pub use errors::UpdateError;
pub use scheduler::UpdateScheduler;
pub use state::{ReadinessTimeout, UpdateProgress, UpdateState, UpdateStateManager, UpdateStatus};
