//! Execution engine - attempts due tasks against the host adapters
//!
//! One pass walks the registry in creation order on the calling thread.
//! The registry lock is only held to read a task and to record its
//! outcome, never across a host call, so scheduling stays responsive while
//! a pass runs.

use hostkit::{ConfigStore, ErrorCategory, ModuleHost, Properties};
use std::sync::{Arc, Mutex};

use crate::config::InstallerConfig;
use crate::observer::TaskObserver;
use crate::stats::{ExecuteSummary, Statistics, TaskFailure};
use crate::task::registry::{AttemptRecord, Recorded};
use crate::task::{FailureReason, Task, TaskIntent, TaskOutcome, TaskRegistry, TaskStage};
use declarative::{
    InstallableResource, InstalledResource, PolicyDecision, ResourceKind, ResourcePayload, decide,
};

use super::gate::RetryGate;

/// What a successful attempt did to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    Decided(PolicyDecision),
    Started,
    Removed,
    /// Removal target was already gone
    Absent,
}

#[derive(Debug)]
struct Attempt {
    outcome: TaskOutcome,
    next_stage: TaskStage,
    effect: Option<Effect>,
}

impl Attempt {
    fn success(effect: Effect) -> Self {
        Self {
            outcome: TaskOutcome::Success,
            next_stage: TaskStage::Apply,
            effect: Some(effect),
        }
    }

    fn failed(reason: FailureReason, next_stage: TaskStage) -> Self {
        let outcome = if reason.is_retryable() {
            TaskOutcome::RetryableFailure(reason)
        } else {
            TaskOutcome::TerminalFailure(reason)
        };
        Self {
            outcome,
            next_stage,
            effect: None,
        }
    }

    fn from_error(err: &hostkit::Error, next_stage: TaskStage) -> Self {
        Self::failed(FailureReason::from(err), next_stage)
    }
}

/// Applies task intents through the host adapters
pub struct Executor {
    host: Arc<dyn ModuleHost>,
    store: Arc<dyn ConfigStore>,
    config: InstallerConfig,
}

impl Executor {
    pub fn new(
        host: Arc<dyn ModuleHost>,
        store: Arc<dyn ConfigStore>,
        config: InstallerConfig,
    ) -> Self {
        Self {
            host,
            store,
            config,
        }
    }

    /// Attempt every due task once, in creation order
    pub fn run(
        &self,
        registry: &Mutex<TaskRegistry>,
        gate: &RetryGate,
        stats: &Statistics,
        observer: &mut dyn TaskObserver,
    ) -> ExecuteSummary {
        let mut summary = ExecuteSummary::default();
        let mut bundles_changed = false;

        let uris: Vec<String> = crate::lock(registry)
            .snapshot()
            .into_iter()
            .map(|task| task.uri)
            .collect();

        for uri in uris {
            // Re-read so an intent superseded since the snapshot is the one applied
            let Some(task) = crate::lock(registry).get(&uri).cloned() else {
                continue;
            };

            if !gate.is_due(&task) {
                log::debug!(
                    "Skipping {} ({} attempts, last at {}, waiting for a {} signal)",
                    task.uri,
                    task.attempt_count,
                    task.last_attempt_at
                        .map_or_else(|| "never".to_string(), |at| at.to_rfc3339()),
                    task.kind()
                );
                summary.skipped += 1;
                continue;
            }

            // Stamp before the attempt so a signal raised meanwhile still counts
            let generation = gate.current_generation(&task);
            observer.on_task_start(&task);
            stats.record_executed();
            summary.executed += 1;

            let attempt = self.attempt(&task);

            match &attempt.outcome {
                TaskOutcome::Success => {
                    let effect = attempt.effect.unwrap_or(Effect::Absent);
                    stats.record_success(matches!(
                        effect,
                        Effect::Decided(PolicyDecision::Ignore) | Effect::Absent
                    ));
                    match effect {
                        Effect::Decided(decision) => {
                            summary.add_decision(decision);
                            if decision == PolicyDecision::Upgrade
                                && task.kind() == ResourceKind::Bundle
                            {
                                bundles_changed = true;
                            }
                        }
                        Effect::Removed => {
                            summary.removed += 1;
                            if task.kind() == ResourceKind::Bundle {
                                bundles_changed = true;
                            }
                        }
                        Effect::Started => summary.installed += 1,
                        Effect::Absent => summary.ignored += 1,
                    }
                }
                TaskOutcome::RetryableFailure(reason) => {
                    log::debug!("{} of {} will be retried: {reason}", task.intent.label(), uri);
                    stats.record_retryable();
                    summary.retried += 1;
                }
                TaskOutcome::TerminalFailure(reason) => {
                    log::warn!("Dropping {} of {}: {reason}", task.intent.label(), uri);
                    stats.record_terminal();
                    observer.on_terminal_failure(&uri, reason);
                    summary.failures.push(TaskFailure {
                        uri: uri.clone(),
                        reason: reason.clone(),
                    });
                }
                TaskOutcome::Pending => {}
            }

            let recorded = crate::lock(registry).record_attempt(AttemptRecord {
                uri: uri.clone(),
                revision: task.revision,
                outcome: attempt.outcome.clone(),
                generation,
                next_stage: attempt.next_stage,
            });
            if recorded == Recorded::Superseded {
                log::debug!("{uri} was rescheduled while it ran, keeping the newer intent");
            }

            observer.on_task_complete(&uri, &attempt.outcome);
        }

        if bundles_changed && self.config.refresh_after_bundle_changes {
            match self.host.refresh() {
                Ok(()) => {
                    log::info!("Requested framework refresh");
                    summary.refreshed = true;
                }
                Err(err) => log::warn!("Framework refresh failed: {err}"),
            }
        }

        summary
    }

    /// Dispatch on intent and payload kind
    fn attempt(&self, task: &Task) -> Attempt {
        match &task.intent {
            TaskIntent::InstallOrUpdate(resource) => match resource.payload() {
                ResourcePayload::Bundle(bytes) => self.install_bundle(task, resource, bytes),
                ResourcePayload::Configuration(properties) => {
                    self.apply_configuration(resource, properties)
                }
            },
            TaskIntent::Uninstall { uri, kind } => match kind {
                ResourceKind::Bundle => self.remove_bundle(uri),
                ResourceKind::Configuration => self.remove_configuration(uri),
            },
        }
    }

    fn install_bundle(&self, task: &Task, resource: &InstallableResource, bytes: &[u8]) -> Attempt {
        let uri = resource.uri();
        if task.stage == TaskStage::Start {
            match self.host.current_version(uri) {
                Ok(Some(_)) => return self.start_bundle(uri, Effect::Started),
                Ok(None) => {
                    log::debug!("{uri} left the host before it started, installing again");
                }
                Err(err) => return Attempt::from_error(&err, TaskStage::Start),
            }
        }

        if let Err(err) = resource.manifest() {
            return Attempt::from_error(&err, TaskStage::Apply);
        }

        let current = match self.host.current_version(uri) {
            Ok(version) => version.map(|v| InstalledResource::bundle(uri, v)),
            Err(err) => return Attempt::from_error(&err, TaskStage::Apply),
        };

        let decision = decide(current.as_ref(), resource);
        if decision == PolicyDecision::Ignore {
            log::debug!(
                "Keeping installed {uri}, offered version {} is not newer",
                resource
                    .version()
                    .map_or_else(|| "?".to_string(), ToString::to_string)
            );
            return Attempt::success(Effect::Decided(decision));
        }

        let info = match self.host.install_or_update(uri, bytes) {
            Ok(info) => info,
            Err(err) => return Attempt::from_error(&err, TaskStage::Apply),
        };
        log::info!(
            "{} {} {} (module {})",
            if decision == PolicyDecision::Install {
                "Installed"
            } else {
                "Upgraded"
            },
            info.symbolic_name,
            info.version,
            info.id
        );

        if decision == PolicyDecision::Install && self.config.start_bundles {
            return self.start_bundle(uri, Effect::Decided(decision));
        }
        Attempt::success(Effect::Decided(decision))
    }

    fn start_bundle(&self, uri: &str, effect: Effect) -> Attempt {
        match self.host.start(uri) {
            Ok(()) => {
                log::info!("Started {uri}");
                Attempt::success(effect)
            }
            Err(err) => {
                log::debug!("Could not start {uri}: {err}");
                // A vanished bundle has to be installed again before it can start
                let next_stage = if err.category() == ErrorCategory::NotFound {
                    TaskStage::Apply
                } else {
                    TaskStage::Start
                };
                Attempt::from_error(&err, next_stage)
            }
        }
    }

    fn apply_configuration(
        &self,
        resource: &InstallableResource,
        properties: &Properties,
    ) -> Attempt {
        let name = resource.uri();
        if !self.store.is_available() {
            return Attempt::from_error(&hostkit::Error::ConfigStoreUnavailable, TaskStage::Apply);
        }

        let current = match self.store.get(name) {
            Ok(props) => props.map(|p| InstalledResource::configuration(name, &p)),
            Err(err) => return Attempt::from_error(&err, TaskStage::Apply),
        };

        let decision = decide(current.as_ref(), resource);
        if decision.is_change() {
            if let Err(err) = self.store.apply(name, properties) {
                return Attempt::from_error(&err, TaskStage::Apply);
            }
            log::info!("Applied configuration {name} ({})", resource.digest().short());
        } else {
            log::debug!("Configuration {name} is unchanged");
        }
        Attempt::success(Effect::Decided(decision))
    }

    fn remove_bundle(&self, uri: &str) -> Attempt {
        match self.host.remove(uri) {
            Ok(()) => {
                log::info!("Uninstalled {uri}");
                Attempt::success(Effect::Removed)
            }
            Err(err) if err.is_ignorable() => {
                log::debug!("Nothing to uninstall at {uri}");
                Attempt::success(Effect::Absent)
            }
            Err(err) => Attempt::from_error(&err, TaskStage::Apply),
        }
    }

    fn remove_configuration(&self, name: &str) -> Attempt {
        if !self.store.is_available() {
            return Attempt::from_error(&hostkit::Error::ConfigStoreUnavailable, TaskStage::Apply);
        }
        match self.store.remove(name) {
            Ok(()) => {
                log::info!("Removed configuration {name}");
                Attempt::success(Effect::Removed)
            }
            Err(err) if err.is_ignorable() => {
                log::debug!("Configuration {name} was already absent");
                Attempt::success(Effect::Absent)
            }
            Err(err) => Attempt::from_error(&err, TaskStage::Apply),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{SignalClass, SignalGenerations};
    use crate::observer::NoObserver;
    use hostkit::{BundleManifest, MemoryConfigStore, MemoryHost, ModuleState, Version};
    use serde_json::json;

    struct Fixture {
        host: Arc<MemoryHost>,
        store: Arc<MemoryConfigStore>,
        executor: Executor,
        registry: Mutex<TaskRegistry>,
        generations: Arc<SignalGenerations>,
        stats: Statistics,
    }

    impl Fixture {
        fn new(config: InstallerConfig) -> Self {
            let host = Arc::new(MemoryHost::new());
            let store = Arc::new(MemoryConfigStore::new());
            let executor = Executor::new(host.clone(), store.clone(), config);
            Self {
                host,
                store,
                executor,
                registry: Mutex::new(TaskRegistry::new()),
                generations: Arc::new(SignalGenerations::new()),
                stats: Statistics::new(),
            }
        }

        fn schedule(&self, intent: TaskIntent) {
            crate::lock(&self.registry).schedule(intent);
        }

        fn run(&self) -> ExecuteSummary {
            let gate = RetryGate::new(Arc::clone(&self.generations));
            self.executor
                .run(&self.registry, &gate, &self.stats, &mut NoObserver)
        }
    }

    fn bundle(name: &str, version: &str, requires: &[&str]) -> InstallableResource {
        let manifest = BundleManifest {
            symbolic_name: name.to_string(),
            version: version.parse().unwrap(),
            required_bundles: requires.iter().map(ToString::to_string).collect(),
        };
        InstallableResource::bundle(format!("{name}.jar"), manifest.to_payload())
    }

    #[test]
    fn test_install_starts_bundle() {
        let fx = Fixture::new(InstallerConfig::default());
        fx.schedule(TaskIntent::InstallOrUpdate(bundle("a", "1.0", &[])));

        let summary = fx.run();
        assert_eq!(summary.executed, 1);
        assert_eq!(summary.installed, 1);
        assert!(!summary.refreshed);
        assert!(crate::lock(&fx.registry).is_empty());

        let info = fx.host.find_by_symbolic_name("a").unwrap();
        assert_eq!(info.state, ModuleState::Active);
    }

    #[test]
    fn test_install_without_start() {
        let config = InstallerConfig {
            start_bundles: false,
            ..InstallerConfig::default()
        };
        let fx = Fixture::new(config);
        fx.schedule(TaskIntent::InstallOrUpdate(bundle("a", "1.0", &[])));
        fx.run();
        let info = fx.host.find_by_symbolic_name("a").unwrap();
        assert_eq!(info.state, ModuleState::Installed);
    }

    #[test]
    fn test_unmet_dependency_resumes_at_start() {
        let fx = Fixture::new(InstallerConfig::default());
        fx.schedule(TaskIntent::InstallOrUpdate(bundle("needs", "1.0", &["dep"])));

        let summary = fx.run();
        assert_eq!(summary.retried, 1);
        let task = crate::lock(&fx.registry).get("needs.jar").cloned().unwrap();
        assert_eq!(task.stage, TaskStage::Start);
        assert_eq!(task.attempt_count, 1);
        assert!(matches!(
            task.last_outcome,
            TaskOutcome::RetryableFailure(FailureReason::DependencyUnmet(_))
        ));
        assert_eq!(
            fx.host.find_by_symbolic_name("needs").unwrap().state,
            ModuleState::Installed
        );

        // Not due again until a bundle signal arrives
        assert_eq!(fx.run().executed, 0);
    }

    #[test]
    fn test_start_stage_reinstalls_removed_bundle() {
        let fx = Fixture::new(InstallerConfig::default());
        fx.schedule(TaskIntent::InstallOrUpdate(bundle("needs", "1.0", &["dep"])));
        fx.run();
        let first = fx.host.find_by_symbolic_name("needs").unwrap();

        fx.host.remove("needs.jar").unwrap();
        let dep = bundle("dep", "1.0", &[]);
        let ResourcePayload::Bundle(bytes) = dep.payload() else {
            panic!("bundle payload expected");
        };
        fx.host.install_or_update("dep.jar", bytes).unwrap();
        fx.generations.bump(SignalClass::BundleLifecycle);

        let summary = fx.run();
        assert_eq!(summary.installed, 1);
        assert!(crate::lock(&fx.registry).is_empty());
        let again = fx.host.find_by_symbolic_name("needs").unwrap();
        assert_ne!(again.id, first.id);
        assert_eq!(again.state, ModuleState::Active);
    }

    #[test]
    fn test_malformed_manifest_is_terminal() {
        let fx = Fixture::new(InstallerConfig::default());
        fx.schedule(TaskIntent::InstallOrUpdate(InstallableResource::bundle(
            "broken.jar",
            b"Bundle-Version: 1.0\n".to_vec(),
        )));
        fx.schedule(TaskIntent::InstallOrUpdate(bundle("ok", "1.0", &[])));

        let summary = fx.run();
        assert_eq!(summary.executed, 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].uri, "broken.jar");
        assert_eq!(summary.installed, 1);
        assert!(crate::lock(&fx.registry).is_empty());
        assert_eq!(fx.stats.snapshot().terminal, 1);
    }

    #[test]
    fn test_upgrade_requests_refresh() {
        let fx = Fixture::new(InstallerConfig::default());
        fx.schedule(TaskIntent::InstallOrUpdate(bundle("a", "1.0", &[])));
        fx.run();
        fx.schedule(TaskIntent::InstallOrUpdate(bundle("a", "1.1", &[])));

        let summary = fx.run();
        assert_eq!(summary.upgraded, 1);
        assert!(summary.refreshed);
        assert_eq!(
            fx.host.current_version("a.jar").unwrap(),
            Some(Version::new(1, 1, 0))
        );
    }

    #[test]
    fn test_configuration_store_down_is_retryable() {
        let fx = Fixture::new(InstallerConfig::default());
        fx.store.set_available(false);
        let mut props = Properties::new();
        props.insert("foo".to_string(), json!("bar"));
        fx.schedule(TaskIntent::InstallOrUpdate(InstallableResource::configuration(
            "x", props,
        )));

        let summary = fx.run();
        assert_eq!(summary.retried, 1);
        assert_eq!(fx.store.operations(), 0);
        assert_eq!(crate::lock(&fx.registry).len(), 1);
    }

    #[test]
    fn test_uninstall_missing_is_success() {
        let fx = Fixture::new(InstallerConfig::default());
        fx.schedule(TaskIntent::Uninstall {
            uri: "gone.jar".to_string(),
            kind: ResourceKind::Bundle,
        });
        fx.schedule(TaskIntent::Uninstall {
            uri: "gone".to_string(),
            kind: ResourceKind::Configuration,
        });

        let summary = fx.run();
        assert_eq!(summary.executed, 2);
        assert_eq!(summary.ignored, 2);
        assert!(!summary.refreshed);
        assert!(crate::lock(&fx.registry).is_empty());
        assert_eq!(fx.stats.snapshot().ignored, 2);
    }
}
