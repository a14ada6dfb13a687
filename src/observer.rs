//! Observer hooks for execution passes
//!
//! Lets callers watch tasks without the installer depending on any UI or
//! reporting framework.

use crate::task::{FailureReason, Task, TaskOutcome};

/// Receives per-task notifications during `execute_scheduled_operations`
pub trait TaskObserver: Send {
    /// Called right before a due task is attempted
    fn on_task_start(&mut self, task: &Task);

    /// Called once the attempt's outcome is recorded
    fn on_task_complete(&mut self, uri: &str, outcome: &TaskOutcome);

    /// Called when a task is dropped for good
    fn on_terminal_failure(&mut self, uri: &str, reason: &FailureReason) {
        let _ = (uri, reason);
    }
}

/// No-op observer
pub struct NoObserver;

impl TaskObserver for NoObserver {
    fn on_task_start(&mut self, _task: &Task) {}
    fn on_task_complete(&mut self, _uri: &str, _outcome: &TaskOutcome) {}
}
