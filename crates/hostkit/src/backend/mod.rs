//! Adapter contracts for the systems the installer reconciles against.
//!
//! [`ModuleHost`] and [`ConfigStore`] abstract the live target, allowing for:
//! - Real framework integrations
//! - In-memory implementations for testing ([`memory`])

pub mod memory;

use crate::error::Result;
use crate::types::{ModuleInfo, Properties, Version};

/// A host that installs, updates, starts and removes versioned modules.
///
/// Modules are addressed by location, the caller-assigned resource URI.
/// Implementations provide their own internal synchronization.
pub trait ModuleHost: Send + Sync {
    /// Version of the module installed at `location`, if any.
    fn current_version(&self, location: &str) -> Result<Option<Version>>;

    /// Install a module, or update it in place when `location` is taken.
    ///
    /// An update keeps the host-level identity and the running state.
    fn install_or_update(&self, location: &str, payload: &[u8]) -> Result<ModuleInfo>;

    /// Start the module at `location`.
    ///
    /// Fails with [`crate::Error::DependencyUnmet`] while its requirements
    /// cannot be resolved.
    fn start(&self, location: &str) -> Result<()>;

    /// Remove the module at `location`.
    ///
    /// Fails with [`crate::Error::NotFound`] when nothing is installed there.
    fn remove(&self, location: &str) -> Result<()>;

    /// Ask the host to re-wire modules after updates or removals.
    fn refresh(&self) -> Result<()>;
}

/// A store of named configuration records.
pub trait ConfigStore: Send + Sync {
    /// Whether the store can currently serve requests.
    fn is_available(&self) -> bool;

    /// Properties of the record `name`, if present.
    fn get(&self, name: &str) -> Result<Option<Properties>>;

    /// Create or replace the record `name`.
    fn apply(&self, name: &str, properties: &Properties) -> Result<()>;

    /// Delete the record `name`.
    ///
    /// Fails with [`crate::Error::NotFound`] when there is no such record.
    fn remove(&self, name: &str) -> Result<()>;
}
