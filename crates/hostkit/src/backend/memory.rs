//! In-memory module host and configuration store.
//!
//! Both keep everything behind a mutex and publish [`HostEvent`]s on an
//! optional [`EventSink`], the way a real framework delivers lifecycle
//! notifications to its listeners.

use super::{ConfigStore, ModuleHost};
use crate::error::{Error, Result};
use crate::types::{
    BundleEventKind, BundleManifest, EventSink, HostEvent, ModuleInfo, ModuleState, Properties,
    Version,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Failure to inject into the next install of a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Fails with [`Error::Host`]
    Transient(String),
    /// Fails with [`Error::Rejected`]
    Rejected(String),
}

impl InjectedFailure {
    fn to_error(&self) -> Error {
        match self {
            Self::Transient(message) => Error::Host {
                message: message.clone(),
            },
            Self::Rejected(message) => Error::Rejected {
                message: message.clone(),
            },
        }
    }
}

#[derive(Debug)]
struct HostedModule {
    info: ModuleInfo,
    required_bundles: Vec<String>,
}

#[derive(Debug, Default)]
struct HostInner {
    modules: BTreeMap<String, HostedModule>,
    next_id: u64,
    operations: usize,
    failures: BTreeMap<String, InjectedFailure>,
    events: Option<EventSink>,
}

impl HostInner {
    fn emit(&self, event: HostEvent) {
        if let Some(sink) = &self.events
            && sink.send(event).is_err()
        {
            log::debug!("Event receiver gone, dropping host notification");
        }
    }

    fn first_missing(&self, required: &[String]) -> Option<String> {
        required
            .iter()
            .find(|name| {
                !self
                    .modules
                    .values()
                    .any(|m| &m.info.symbolic_name == *name)
            })
            .cloned()
    }
}

/// A module host living entirely in memory.
///
/// Identities are handed out from a counter and never reused, so a module
/// removed and installed again gets a new id.
#[derive(Debug)]
pub struct MemoryHost {
    inner: Mutex<HostInner>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Create an empty host. Identity `0` is reserved for the framework.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HostInner {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Publish lifecycle notifications on `sink`.
    pub fn with_events(self, sink: EventSink) -> Self {
        self.lock().events = Some(sink);
        self
    }

    fn lock(&self) -> MutexGuard<'_, HostInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of mutating calls made so far, failed ones included.
    pub fn operations(&self) -> usize {
        self.lock().operations
    }

    /// Find a module by symbolic name.
    pub fn find_by_symbolic_name(&self, symbolic_name: &str) -> Option<ModuleInfo> {
        self.lock()
            .modules
            .values()
            .find(|m| m.info.symbolic_name == symbolic_name)
            .map(|m| m.info.clone())
    }

    /// All installed modules, ordered by location.
    pub fn modules(&self) -> Vec<ModuleInfo> {
        self.lock().modules.values().map(|m| m.info.clone()).collect()
    }

    /// Stop a module, as an operator would from outside the installer.
    pub fn stop(&self, location: &str) -> Result<()> {
        let mut inner = self.lock();
        let module = inner
            .modules
            .get_mut(location)
            .ok_or_else(|| Error::NotFound {
                location: location.to_string(),
            })?;
        if module.info.state == ModuleState::Active {
            module.info.state = ModuleState::Installed;
            inner.emit(HostEvent::Bundle {
                location: location.to_string(),
                kind: BundleEventKind::Stopped,
            });
        }
        Ok(())
    }

    /// Make installs of `location` fail until cleared with `None`.
    pub fn set_install_failure(&self, location: &str, failure: Option<InjectedFailure>) {
        let mut inner = self.lock();
        match failure {
            Some(f) => {
                inner.failures.insert(location.to_string(), f);
            }
            None => {
                inner.failures.remove(location);
            }
        }
    }
}

impl ModuleHost for MemoryHost {
    fn current_version(&self, location: &str) -> Result<Option<Version>> {
        Ok(self
            .lock()
            .modules
            .get(location)
            .map(|m| m.info.version.clone()))
    }

    fn install_or_update(&self, location: &str, payload: &[u8]) -> Result<ModuleInfo> {
        let mut inner = self.lock();
        inner.operations += 1;

        if let Some(failure) = inner.failures.get(location) {
            return Err(failure.to_error());
        }

        let manifest = BundleManifest::parse(payload)?;

        if let Some(module) = inner.modules.get_mut(location) {
            module.info.symbolic_name = manifest.symbolic_name;
            module.info.version = manifest.version;
            module.required_bundles = manifest.required_bundles;
            let info = module.info.clone();
            inner.emit(HostEvent::Bundle {
                location: location.to_string(),
                kind: BundleEventKind::Updated,
            });
            return Ok(info);
        }

        let id = inner.next_id;
        inner.next_id += 1;
        let info = ModuleInfo {
            id,
            location: location.to_string(),
            symbolic_name: manifest.symbolic_name,
            version: manifest.version,
            state: ModuleState::Installed,
        };
        inner.modules.insert(
            location.to_string(),
            HostedModule {
                info: info.clone(),
                required_bundles: manifest.required_bundles,
            },
        );
        inner.emit(HostEvent::Bundle {
            location: location.to_string(),
            kind: BundleEventKind::Installed,
        });
        Ok(info)
    }

    fn start(&self, location: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.operations += 1;

        let required = match inner.modules.get(location) {
            Some(m) if m.info.state == ModuleState::Active => return Ok(()),
            Some(m) => m.required_bundles.clone(),
            None => {
                return Err(Error::NotFound {
                    location: location.to_string(),
                });
            }
        };

        if let Some(missing) = inner.first_missing(&required) {
            return Err(Error::DependencyUnmet {
                location: location.to_string(),
                message: format!("missing required bundle {missing}"),
            });
        }

        if let Some(module) = inner.modules.get_mut(location) {
            module.info.state = ModuleState::Active;
        }
        inner.emit(HostEvent::Bundle {
            location: location.to_string(),
            kind: BundleEventKind::Started,
        });
        Ok(())
    }

    fn remove(&self, location: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.operations += 1;

        if inner.modules.remove(location).is_none() {
            return Err(Error::NotFound {
                location: location.to_string(),
            });
        }
        inner.emit(HostEvent::Bundle {
            location: location.to_string(),
            kind: BundleEventKind::Uninstalled,
        });
        Ok(())
    }

    fn refresh(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.operations += 1;
        inner.emit(HostEvent::FrameworkRefreshed);
        Ok(())
    }
}

#[derive(Debug)]
struct StoreInner {
    records: BTreeMap<String, Properties>,
    available: bool,
    operations: usize,
    events: Option<EventSink>,
}

/// A configuration store living entirely in memory.
#[derive(Debug)]
pub struct MemoryConfigStore {
    inner: Mutex<StoreInner>,
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConfigStore {
    /// Create an empty, available store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                records: BTreeMap::new(),
                available: true,
                operations: 0,
                events: None,
            }),
        }
    }

    /// Publish availability notifications on `sink`.
    pub fn with_events(self, sink: EventSink) -> Self {
        self.lock().events = Some(sink);
        self
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bring the store up or take it down.
    pub fn set_available(&self, available: bool) {
        let mut inner = self.lock();
        if inner.available == available {
            return;
        }
        inner.available = available;
        if let Some(sink) = &inner.events
            && sink.send(HostEvent::ConfigStore { available }).is_err()
        {
            log::debug!("Event receiver gone, dropping store notification");
        }
    }

    /// Number of mutating calls made so far, failed ones included.
    pub fn operations(&self) -> usize {
        self.lock().operations
    }

    /// Read a record regardless of availability.
    pub fn peek(&self, name: &str) -> Option<Properties> {
        self.lock().records.get(name).cloned()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn is_available(&self) -> bool {
        self.lock().available
    }

    fn get(&self, name: &str) -> Result<Option<Properties>> {
        let inner = self.lock();
        if !inner.available {
            return Err(Error::ConfigStoreUnavailable);
        }
        Ok(inner.records.get(name).cloned())
    }

    fn apply(&self, name: &str, properties: &Properties) -> Result<()> {
        let mut inner = self.lock();
        inner.operations += 1;
        if !inner.available {
            return Err(Error::ConfigStoreUnavailable);
        }
        inner.records.insert(name.to_string(), properties.clone());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.operations += 1;
        if !inner.available {
            return Err(Error::ConfigStoreUnavailable);
        }
        inner
            .records
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound {
                location: name.to_string(),
            })
    }
}
