//! Retry gate - decides which tasks may run on this pass
//!
//! Retries are event driven: a task that already failed runs again only
//! after a signal that could have changed its outcome.

use crate::events::SignalGenerations;
use crate::task::Task;
use std::sync::Arc;

pub struct RetryGate {
    generations: Arc<SignalGenerations>,
}

impl RetryGate {
    pub fn new(generations: Arc<SignalGenerations>) -> Self {
        Self { generations }
    }

    /// Generation a task of this kind is stamped with when attempted now
    pub fn current_generation(&self, task: &Task) -> u64 {
        self.generations.current_for(task.kind())
    }

    /// Whether `task` should be attempted now
    ///
    /// Never-attempted tasks are always due. Otherwise the combined
    /// generation of the task's gating classes must have moved past the
    /// value stamped at its last attempt.
    pub fn is_due(&self, task: &Task) -> bool {
        if !task.is_attempted() {
            return true;
        }
        match task.last_attempt_generation {
            Some(stamp) => self.current_generation(task) > stamp,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SignalClass;
    use crate::task::TaskIntent;
    use declarative::ResourceKind;

    fn task(kind: ResourceKind, attempts: u32, stamp: Option<u64>) -> Task {
        let mut task = Task::new(
            TaskIntent::Uninstall {
                uri: "x".to_string(),
                kind,
            },
            0,
            1,
        );
        task.attempt_count = attempts;
        task.last_attempt_generation = stamp;
        task
    }

    #[test]
    fn test_new_task_always_due() {
        let generations = Arc::new(SignalGenerations::new());
        generations.bump(SignalClass::BundleLifecycle);
        let gate = RetryGate::new(generations);
        assert!(gate.is_due(&task(ResourceKind::Bundle, 0, None)));
        // Even a stale stamp does not hold back a first attempt
        assert!(gate.is_due(&task(ResourceKind::Bundle, 0, Some(100))));
    }

    #[test]
    fn test_retry_waits_for_signal() {
        let generations = Arc::new(SignalGenerations::new());
        let gate = RetryGate::new(Arc::clone(&generations));
        let pending = task(ResourceKind::Bundle, 1, Some(0));
        assert!(!gate.is_due(&pending));

        generations.bump(SignalClass::BundleLifecycle);
        assert!(gate.is_due(&pending));
    }

    #[test]
    fn test_framework_refresh_gates_bundles() {
        let generations = Arc::new(SignalGenerations::new());
        let gate = RetryGate::new(Arc::clone(&generations));
        let pending = task(ResourceKind::Bundle, 2, Some(0));
        generations.bump(SignalClass::FrameworkRefresh);
        assert!(gate.is_due(&pending));
    }

    #[test]
    fn test_unrelated_signal_does_not_release() {
        let generations = Arc::new(SignalGenerations::new());
        let gate = RetryGate::new(Arc::clone(&generations));
        let config_task = task(ResourceKind::Configuration, 1, Some(0));
        let bundle_task = task(ResourceKind::Bundle, 1, Some(0));

        generations.bump(SignalClass::BundleLifecycle);
        assert!(!gate.is_due(&config_task));

        generations.bump(SignalClass::ConfigAdminAvailability);
        assert!(gate.is_due(&config_task));
        assert!(gate.is_due(&bundle_task));
    }
}
