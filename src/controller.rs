//! Installer facade
//!
//! [`Installer`] ties the task registry, the event bridge and the executor
//! together behind the public scheduling API. It is `Send + Sync`; share it
//! in an `Arc` to schedule from several threads while another drives
//! [`Installer::execute_scheduled_operations`].

use hostkit::{ConfigStore, ModuleHost};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::config::InstallerConfig;
use crate::engine::{Executor, RetryGate};
use crate::events::{EventBridge, SignalClass};
use crate::observer::{NoObserver, TaskObserver};
use crate::stats::{ExecuteSummary, Statistics, StatisticsSnapshot};
use crate::task::registry::Scheduled;
use crate::task::{Task, TaskIntent, TaskRegistry};
use declarative::InstallableResource;

pub struct Installer {
    config: InstallerConfig,
    registry: Mutex<TaskRegistry>,
    bridge: EventBridge,
    gate: RetryGate,
    executor: Executor,
    stats: Statistics,
    /// Held for a whole pass so two passes never overlap
    execution: Mutex<()>,
    observer: Mutex<Box<dyn TaskObserver>>,
}

impl Installer {
    /// Create an installer over the given adapters
    ///
    /// Hosts should publish their notifications on the sink returned
    /// alongside `bridge` by [`EventBridge::channel`].
    pub fn new(
        host: Arc<dyn ModuleHost>,
        store: Arc<dyn ConfigStore>,
        bridge: EventBridge,
        config: InstallerConfig,
    ) -> Self {
        let gate = RetryGate::new(Arc::clone(bridge.generations()));
        Self {
            executor: Executor::new(host, store, config.clone()),
            config,
            registry: Mutex::new(TaskRegistry::new()),
            bridge,
            gate,
            stats: Statistics::new(),
            execution: Mutex::new(()),
            observer: Mutex::new(Box::new(NoObserver)),
        }
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    /// Replace the observer notified during passes
    pub fn set_observer(&self, observer: Box<dyn TaskObserver>) {
        *crate::lock(&self.observer) = observer;
    }

    /// Ask for `resource` to be installed, or updated if it is newer
    pub fn schedule_install_or_update(&self, resource: InstallableResource) -> Scheduled {
        crate::lock(&self.registry).schedule(TaskIntent::InstallOrUpdate(resource))
    }

    /// Ask for whatever is at `uri` to be removed
    ///
    /// The kind comes from a pending task for the URI, then from the last
    /// install this installer made there, then from the URI itself.
    pub fn schedule_uninstall(&self, uri: impl Into<String>) -> Scheduled {
        let uri = uri.into();
        let mut registry = crate::lock(&self.registry);
        let kind = registry
            .known_kind(&uri)
            .unwrap_or_else(|| self.config.classify_uri(&uri));
        registry.schedule(TaskIntent::Uninstall { uri, kind })
    }

    /// Attempt every task that is due right now and return
    ///
    /// Queued host notifications are applied first, so signals raised
    /// since the previous call count toward this one.
    pub fn execute_scheduled_operations(&self) -> ExecuteSummary {
        let _pass = crate::lock(&self.execution);

        let events = self.bridge.pump();
        if events > 0 {
            log::debug!("Applied {events} host notifications");
        }

        let mut observer = crate::lock(&self.observer);
        let summary = self
            .executor
            .run(&self.registry, &self.gate, &self.stats, &mut **observer);

        if summary.executed > 0 {
            log::info!(
                "Executed {} tasks, {} host changes: {} installed, {} upgraded, {} ignored, {} removed, {} retrying, {} failed",
                summary.executed,
                summary.total_changes(),
                summary.installed,
                summary.upgraded,
                summary.ignored,
                summary.removed,
                summary.retried,
                summary.failures.len()
            );
        }
        summary
    }

    /// Monotonic count of attempts actually performed
    pub fn executed_tasks_count(&self) -> u64 {
        self.stats.executed_tasks_count()
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot()
    }

    /// Copy of the live task for `uri`, if any
    pub fn task(&self, uri: &str) -> Option<Task> {
        crate::lock(&self.registry).get(uri).cloned()
    }

    /// Copies of all live tasks in creation order
    pub fn pending_tasks(&self) -> Vec<Task> {
        crate::lock(&self.registry).snapshot()
    }

    pub fn signal_generation(&self, class: SignalClass) -> u64 {
        self.bridge.current_generation(class)
    }

    /// Apply host notifications on a background thread as they arrive
    ///
    /// Returns `None` if a listener is already running.
    pub fn spawn_event_listener(&self) -> Option<JoinHandle<()>> {
        self.bridge.spawn_listener()
    }
}
