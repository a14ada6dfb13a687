//! # hostkit
//!
//! Contracts for the live systems an installer reconciles against.
//!
//! This crate provides:
//! - [`ModuleHost`]: install, update, start and remove versioned modules
//! - [`ConfigStore`]: apply and remove named configuration records
//! - [`HostEvent`]: lifecycle notifications hosts publish on an [`EventSink`]
//! - Categorized [`Error`]s telling retryable conditions from permanent ones
//! - In-memory backends for tests and embedding ([`MemoryHost`], [`MemoryConfigStore`])
//!
//! ## Example
//!
//! ```
//! use hostkit::{MemoryHost, ModuleHost, Version};
//!
//! let host = MemoryHost::new();
//! let payload = b"Bundle-SymbolicName: example\nBundle-Version: 1.2\n";
//! let info = host.install_or_update("example.jar", payload).unwrap();
//! assert_eq!(info.version, Version::new(1, 2, 0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod types;

pub use backend::memory::{InjectedFailure, MemoryConfigStore, MemoryHost};
pub use backend::{ConfigStore, ModuleHost};
pub use error::{Error, ErrorCategory, Result};
pub use types::{
    BundleEventKind, BundleManifest, EventSink, HostEvent, ModuleInfo, ModuleState, Properties,
    Version,
};
