//! Scheduled units of work
//!
//! A [`Task`] binds one resource URI to the latest intent for it, plus the
//! attempt history the retry gate needs.

pub mod registry;

use chrono::{DateTime, Utc};
use declarative::{InstallableResource, ResourceKind};
use serde::Serialize;
use thiserror::Error;

pub use registry::TaskRegistry;

/// What the caller wants for a URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TaskIntent {
    /// Make the host hold this resource, never downgrading
    InstallOrUpdate(InstallableResource),
    /// Make the host forget the URI
    Uninstall { uri: String, kind: ResourceKind },
}

impl TaskIntent {
    pub fn uri(&self) -> &str {
        match self {
            Self::InstallOrUpdate(resource) => resource.uri(),
            Self::Uninstall { uri, .. } => uri,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::InstallOrUpdate(resource) => resource.kind(),
            Self::Uninstall { kind, .. } => *kind,
        }
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::InstallOrUpdate(_) => "install",
            Self::Uninstall { .. } => "uninstall",
        }
    }
}

/// Where an install task resumes on its next attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStage {
    /// Consult the version policy and write to the host
    Apply,
    /// The bundle is installed; only starting it is left
    Start,
}

/// Why an attempt did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum FailureReason {
    #[error("dependency unmet: {0}")]
    DependencyUnmet(String),
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("rejected: {0}")]
    Rejected(String),
}

impl FailureReason {
    /// Whether a later attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DependencyUnmet(_) | Self::Transient(_))
    }
}

impl From<&hostkit::Error> for FailureReason {
    fn from(err: &hostkit::Error) -> Self {
        use hostkit::ErrorCategory;

        let message = err.to_string();
        match err.category() {
            ErrorCategory::DependencyUnmet => Self::DependencyUnmet(message),
            ErrorCategory::Transient | ErrorCategory::NotFound | ErrorCategory::Other => {
                Self::Transient(message)
            }
            ErrorCategory::InvalidPayload => Self::InvalidPayload(message),
            ErrorCategory::Rejected => Self::Rejected(message),
        }
    }
}

/// Result of the most recent attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TaskOutcome {
    /// Not attempted since the intent was (re)scheduled
    Pending,
    Success,
    RetryableFailure(FailureReason),
    TerminalFailure(FailureReason),
}

impl TaskOutcome {
    /// Whether the task leaves the registry with this outcome
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Success | Self::TerminalFailure(_))
    }
}

/// A scheduled, retryable reconciliation of one URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub uri: String,
    pub intent: TaskIntent,
    /// Bumped every time a new intent replaces the old one
    pub revision: u64,
    /// Creation order; superseding an intent keeps it
    pub sequence: u64,
    pub attempt_count: u32,
    /// Signal generation observed at the last attempt, `None` before the first
    pub last_attempt_generation: Option<u64>,
    pub last_outcome: TaskOutcome,
    pub stage: TaskStage,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl Task {
    pub(crate) fn new(intent: TaskIntent, sequence: u64, revision: u64) -> Self {
        Self {
            uri: intent.uri().to_string(),
            intent,
            revision,
            sequence,
            attempt_count: 0,
            last_attempt_generation: None,
            last_outcome: TaskOutcome::Pending,
            stage: TaskStage::Apply,
            created_at: Utc::now(),
            last_attempt_at: None,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.intent.kind()
    }

    /// Whether the task has ever reached the host
    pub fn is_attempted(&self) -> bool {
        self.attempt_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_from_host_error() {
        let unmet = hostkit::Error::ConfigStoreUnavailable;
        assert!(matches!(
            FailureReason::from(&unmet),
            FailureReason::DependencyUnmet(_)
        ));

        let invalid = hostkit::Error::InvalidPayload {
            message: "no name".to_string(),
        };
        let reason = FailureReason::from(&invalid);
        assert!(matches!(reason, FailureReason::InvalidPayload(_)));
        assert!(!reason.is_retryable());

        let other = hostkit::Error::Other("boom".to_string());
        assert!(FailureReason::from(&other).is_retryable());
    }

    #[test]
    fn test_new_task_is_pending() {
        let intent = TaskIntent::Uninstall {
            uri: "a.jar".to_string(),
            kind: ResourceKind::Bundle,
        };
        let task = Task::new(intent, 7, 3);
        assert_eq!(task.uri, "a.jar");
        assert_eq!(task.sequence, 7);
        assert_eq!(task.revision, 3);
        assert_eq!(task.last_outcome, TaskOutcome::Pending);
        assert_eq!(task.stage, TaskStage::Apply);
        assert!(!task.is_attempted());
        assert_eq!(task.kind(), ResourceKind::Bundle);
    }

    #[test]
    fn test_outcome_is_final() {
        assert!(TaskOutcome::Success.is_final());
        assert!(TaskOutcome::TerminalFailure(FailureReason::Rejected("x".into())).is_final());
        assert!(!TaskOutcome::RetryableFailure(FailureReason::Transient("x".into())).is_final());
        assert!(!TaskOutcome::Pending.is_final());
    }
}
