//! # Installer
//!
//! Event-driven reconciler that installs, updates and removes bundles and
//! configurations on a module host.
//!
//! Callers schedule intents per resource URI and call
//! [`Installer::execute_scheduled_operations`] whenever they like. Each call
//! attempts the tasks that are due and returns without waiting. A task that
//! failed for a reason that may go away (a missing dependency, a configuration
//! store that is down) is only retried after the host reports a relevant
//! lifecycle event.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use declarative::InstallableResource;
//! use hostkit::{MemoryConfigStore, MemoryHost};
//! use installer::{EventBridge, Installer, InstallerConfig};
//!
//! let (sink, bridge) = EventBridge::channel();
//! let host = Arc::new(MemoryHost::new().with_events(sink.clone()));
//! let store = Arc::new(MemoryConfigStore::new().with_events(sink));
//! let installer = Installer::new(host.clone(), store, bridge, InstallerConfig::default());
//!
//! installer.schedule_install_or_update(InstallableResource::bundle(
//!     "example.jar",
//!     b"Bundle-SymbolicName: example\nBundle-Version: 1.0\n".to_vec(),
//! ));
//! let summary = installer.execute_scheduled_operations();
//! assert_eq!(summary.installed, 1);
//! assert!(host.find_by_symbolic_name("example").is_some());
//! ```

pub mod config;
pub mod controller;
pub mod engine;
pub mod events;
pub mod observer;
pub mod stats;
pub mod task;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use config::InstallerConfig;
pub use controller::Installer;
pub use events::{EventBridge, SignalClass, SignalGenerations};
pub use observer::{NoObserver, TaskObserver};
pub use stats::{ExecuteSummary, StatisticsSnapshot, TaskFailure};
pub use task::registry::Scheduled;
pub use task::{FailureReason, Task, TaskIntent, TaskOutcome, TaskStage};

/// Lock a mutex, recovering the data if a panicking thread poisoned it
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
