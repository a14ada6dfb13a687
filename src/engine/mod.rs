//! Execution engine
//!
//! The engine orchestrates one reconciliation pass:
//! 1. Gating - the retry gate picks the tasks that are due
//! 2. Executing - each due task is applied through the host adapters
//! 3. Recording - outcomes go back to the registry and statistics

pub mod executor;
pub mod gate;

pub use executor::Executor;
pub use gate::RetryGate;
