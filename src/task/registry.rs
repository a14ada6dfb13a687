//! Task registry - the authoritative URI to task mapping
//!
//! Holds at most one live task per URI. Scheduling a new intent for a URI
//! with a pending task replaces the intent but keeps the attempt history,
//! so a burst of re-schedules cannot bypass the retry gate.

use super::{Task, TaskIntent, TaskOutcome, TaskStage};
use chrono::Utc;
use declarative::ResourceKind;
use std::collections::HashMap;

/// How `schedule` treated an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduled {
    /// A new task was created
    Created,
    /// A pending task now carries the new intent
    Superseded,
}

/// Outcome of one attempt, as reported by the executor
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub uri: String,
    /// Revision of the intent that was attempted
    pub revision: u64,
    pub outcome: TaskOutcome,
    /// Signal generation observed when the attempt began
    pub generation: u64,
    /// Stage to resume from on retry
    pub next_stage: TaskStage,
}

/// What the registry did with an attempt record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// The task left the registry
    Resolved,
    /// The task stays pending for a retry
    Pending,
    /// A newer intent arrived while the attempt ran; it stays pending
    Superseded,
    /// No task for this URI
    Missing,
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Task>,
    /// Kinds of resources this registry saw installed, for uninstalls
    known_kinds: HashMap<String, ResourceKind>,
    next_sequence: u64,
    next_revision: u64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an intent, creating a task or superseding the pending one
    pub fn schedule(&mut self, intent: TaskIntent) -> Scheduled {
        self.next_revision += 1;
        let revision = self.next_revision;

        if let Some(task) = self.tasks.get_mut(intent.uri()) {
            log::debug!(
                "Superseding {} intent for {} with {} (attempts so far: {})",
                task.intent.label(),
                task.uri,
                intent.label(),
                task.attempt_count
            );
            task.intent = intent;
            task.revision = revision;
            task.stage = TaskStage::Apply;
            task.last_outcome = TaskOutcome::Pending;
            return Scheduled::Superseded;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let task = Task::new(intent, sequence, revision);
        log::debug!("Scheduled {} of {}", task.intent.label(), task.uri);
        self.tasks.insert(task.uri.clone(), task);
        Scheduled::Created
    }

    /// Kind of whatever the registry knows to be at `uri`
    pub fn known_kind(&self, uri: &str) -> Option<ResourceKind> {
        self.tasks
            .get(uri)
            .map(Task::kind)
            .or_else(|| self.known_kinds.get(uri).copied())
    }

    /// All live tasks in creation order
    pub fn snapshot(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.values().cloned().collect();
        tasks.sort_by_key(|t| t.sequence);
        tasks
    }

    pub fn get(&self, uri: &str) -> Option<&Task> {
        self.tasks.get(uri)
    }

    pub fn remove(&mut self, uri: &str) -> Option<Task> {
        self.tasks.remove(uri)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Apply the outcome of an attempt to the task it was made for
    pub fn record_attempt(&mut self, record: AttemptRecord) -> Recorded {
        let Some(task) = self.tasks.get_mut(&record.uri) else {
            return Recorded::Missing;
        };
        task.last_attempt_at = Some(Utc::now());

        if task.revision != record.revision {
            // The newer intent inherits the backoff only if the old one failed
            if matches!(record.outcome, TaskOutcome::RetryableFailure(_)) {
                task.attempt_count += 1;
                task.last_attempt_generation = Some(record.generation);
            }
            return Recorded::Superseded;
        }

        if record.outcome.is_final() {
            if record.outcome == TaskOutcome::Success {
                match &task.intent {
                    TaskIntent::InstallOrUpdate(resource) => {
                        self.known_kinds
                            .insert(record.uri.clone(), resource.kind());
                    }
                    TaskIntent::Uninstall { .. } => {
                        self.known_kinds.remove(&record.uri);
                    }
                }
            }
            if let Some(task) = self.remove(&record.uri) {
                log::debug!(
                    "Resolved {} of {} after {} retries (scheduled {})",
                    task.intent.label(),
                    task.uri,
                    task.attempt_count,
                    task.created_at.to_rfc3339()
                );
            }
            return Recorded::Resolved;
        }

        if let TaskOutcome::RetryableFailure(_) = record.outcome {
            task.attempt_count += 1;
            task.last_attempt_generation = Some(record.generation);
            task.stage = record.next_stage;
            task.last_outcome = record.outcome;
        }
        Recorded::Pending
    }
}
