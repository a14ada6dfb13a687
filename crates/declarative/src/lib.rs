//! # Declarative
//!
//! Desired-state description for an installer.
//!
//! This crate provides the value types for declaring "resource R should be
//! installed" and the pure policy deciding what that means against what a
//! host already holds.
//!
//! ## Core Concepts
//!
//! - **InstallableResource**: A bundle payload or configuration dictionary bound to a URI
//! - **InstalledResource**: What the host currently holds for a URI
//! - **ResourceKind**: Bundle (versioned) or Configuration (digest compared)
//! - **PolicyDecision**: Install, Upgrade or Ignore
//!
//! ## Example
//!
//! ```
//! use declarative::{decide, InstallableResource, InstalledResource, PolicyDecision};
//! use hostkit::Version;
//!
//! let installed = InstalledResource::bundle("a.jar", Version::new(1, 2, 0));
//! let older = InstallableResource::bundle(
//!     "a.jar",
//!     b"Bundle-SymbolicName: a\nBundle-Version: 1.0\n".to_vec(),
//! );
//!
//! // Downgrades never touch the host
//! assert_eq!(decide(Some(&installed), &older), PolicyDecision::Ignore);
//! ```

pub mod policy;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use policy::decide;
pub use resource::{InstallableResource, ResourcePayload, compare_versions};
pub use types::{Digest, InstalledResource, PolicyDecision, ResourceKind};
