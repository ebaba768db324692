//! Session hosting module
//!
//! Drives an overlay controller from a serialized queue of scenario steps.

pub mod action_channel;
pub mod scenario;
pub mod session_manager;

pub use action_channel::{ActionChannel, SessionEvent};
pub use scenario::{FailureTarget, Scenario, ScenarioStep};
pub use session_manager::{SessionManager, SessionState, SessionStats, SessionSummary, StepLog};
