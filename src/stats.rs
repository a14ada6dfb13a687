//! Execution statistics
//!
//! [`Statistics`] accumulates over the installer's lifetime and can be read
//! from any thread; [`ExecuteSummary`] describes a single pass.

use crate::task::FailureReason;
use declarative::PolicyDecision;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifetime counters, updated by the executor
#[derive(Debug, Default)]
pub struct Statistics {
    executed: AtomicU64,
    succeeded: AtomicU64,
    ignored: AtomicU64,
    retryable: AtomicU64,
    terminal: AtomicU64,
}

/// Point-in-time copy of [`Statistics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    /// Attempts that actually reached the host adapters
    pub executed: u64,
    pub succeeded: u64,
    /// Successes that left the host untouched
    pub ignored: u64,
    pub retryable: u64,
    pub terminal: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_executed(&self) {
        self.executed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_success(&self, ignored: bool) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
        if ignored {
            self.ignored.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn record_retryable(&self) {
        self.retryable.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_terminal(&self) {
        self.terminal.fetch_add(1, Ordering::SeqCst);
    }

    /// Monotonic count of attempted tasks
    pub fn executed_tasks_count(&self) -> u64 {
        self.executed.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            executed: self.executed.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            ignored: self.ignored.load(Ordering::SeqCst),
            retryable: self.retryable.load(Ordering::SeqCst),
            terminal: self.terminal.load(Ordering::SeqCst),
        }
    }
}

/// A task dropped after a terminal failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFailure {
    pub uri: String,
    pub reason: FailureReason,
}

/// Summary of one `execute_scheduled_operations` pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecuteSummary {
    /// Tasks attempted
    pub executed: usize,
    /// Tasks not due yet
    pub skipped: usize,
    pub installed: usize,
    pub upgraded: usize,
    pub ignored: usize,
    pub removed: usize,
    /// Tasks left pending for a retry
    pub retried: usize,
    pub failures: Vec<TaskFailure>,
    /// Whether the pass ended with a framework refresh
    pub refreshed: bool,
}

impl ExecuteSummary {
    /// Total number of host changes made
    pub fn total_changes(&self) -> usize {
        self.installed + self.upgraded + self.removed
    }

    /// Check if the pass dropped nothing
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn add_decision(&mut self, decision: PolicyDecision) {
        match decision {
            PolicyDecision::Install => self.installed += 1,
            PolicyDecision::Upgrade => self.upgraded += 1,
            PolicyDecision::Ignore => self.ignored += 1,
        }
    }
}
