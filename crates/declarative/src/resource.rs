//! Installable resources
//!
//! An [`InstallableResource`] is the desired state for one URI: a bundle
//! payload or a configuration dictionary, fingerprinted on creation.

use crate::types::{Digest, ResourceKind};
use hostkit::{BundleManifest, Error, Properties, Result, Version};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Content of an installable resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourcePayload {
    /// Bundle bytes; the manifest headers travel inside
    Bundle(Vec<u8>),
    /// Configuration properties
    Configuration(Properties),
}

/// A resource the caller wants installed at a URI
///
/// # Example
///
/// ```
/// use declarative::{InstallableResource, ResourceKind};
///
/// let resource = InstallableResource::bundle(
///     "example.jar",
///     b"Bundle-SymbolicName: example\nBundle-Version: 1.1\n".to_vec(),
/// );
/// assert_eq!(resource.kind(), ResourceKind::Bundle);
/// assert_eq!(resource.version().unwrap().to_string(), "1.1.0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallableResource {
    uri: String,
    payload: ResourcePayload,
    version: Option<Version>,
    digest: Digest,
}

impl InstallableResource {
    /// Create a bundle resource
    ///
    /// The version is read from the manifest when it parses; a malformed
    /// manifest is reported later by [`Self::manifest`].
    pub fn bundle(uri: impl Into<String>, bytes: Vec<u8>) -> Self {
        let version = BundleManifest::parse(&bytes).ok().map(|m| m.version);
        let digest = Digest::of_bytes(&bytes);
        Self {
            uri: uri.into(),
            payload: ResourcePayload::Bundle(bytes),
            version,
            digest,
        }
    }

    /// Create a configuration resource
    pub fn configuration(uri: impl Into<String>, properties: Properties) -> Self {
        let digest = Digest::of_properties(&properties);
        Self {
            uri: uri.into(),
            payload: ResourcePayload::Configuration(properties),
            version: None,
            digest,
        }
    }

    /// Resource URI
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Resource kind, derived from the payload
    pub fn kind(&self) -> ResourceKind {
        match self.payload {
            ResourcePayload::Bundle(_) => ResourceKind::Bundle,
            ResourcePayload::Configuration(_) => ResourceKind::Configuration,
        }
    }

    /// Version, bundles only
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// Content fingerprint
    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Raw payload
    pub fn payload(&self) -> &ResourcePayload {
        &self.payload
    }

    /// Parse and validate the bundle manifest
    pub fn manifest(&self) -> Result<BundleManifest> {
        match &self.payload {
            ResourcePayload::Bundle(bytes) => BundleManifest::parse(bytes),
            ResourcePayload::Configuration(_) => Err(Error::InvalidPayload {
                message: format!("{} is a configuration, not a bundle", self.uri),
            }),
        }
    }
}

/// Order two versions of a resource of the given kind
///
/// Configurations are unversioned and always compare equal; their no-op
/// detection goes through the payload digest instead.
pub fn compare_versions(kind: ResourceKind, a: Option<&Version>, b: Option<&Version>) -> Ordering {
    match kind {
        ResourceKind::Bundle => a.cmp(&b),
        ResourceKind::Configuration => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle(version: &str) -> InstallableResource {
        InstallableResource::bundle(
            "a.jar",
            format!("Bundle-SymbolicName: a\nBundle-Version: {version}\n").into_bytes(),
        )
    }

    #[test]
    fn test_bundle_version_from_manifest() {
        let resource = bundle("1.2.3");
        assert_eq!(resource.kind(), ResourceKind::Bundle);
        assert_eq!(resource.version(), Some(&Version::new(1, 2, 3)));
        assert!(resource.manifest().is_ok());
    }

    #[test]
    fn test_malformed_bundle_has_no_version() {
        let resource = InstallableResource::bundle("broken.jar", b"garbage".to_vec());
        assert!(resource.version().is_none());
        assert!(resource.manifest().is_err());
    }

    #[test]
    fn test_configuration_has_no_version() {
        let mut props = Properties::new();
        props.insert("foo".to_string(), json!("bar"));
        let resource = InstallableResource::configuration("x", props);
        assert_eq!(resource.kind(), ResourceKind::Configuration);
        assert!(resource.version().is_none());
        assert!(resource.manifest().is_err());
    }

    #[test]
    fn test_compare_bundle_versions() {
        let v1 = Version::new(1, 0, 0);
        let v2 = Version::new(1, 2, 0);
        assert_eq!(
            compare_versions(ResourceKind::Bundle, Some(&v1), Some(&v2)),
            Ordering::Less
        );
        assert_eq!(
            compare_versions(ResourceKind::Bundle, Some(&v2), Some(&v1)),
            Ordering::Greater
        );
        assert_eq!(
            compare_versions(ResourceKind::Bundle, Some(&v1), Some(&v1)),
            Ordering::Equal
        );
    }

    #[test]
    fn test_compare_configurations_always_equal() {
        let v1 = Version::new(1, 0, 0);
        assert_eq!(
            compare_versions(ResourceKind::Configuration, Some(&v1), None),
            Ordering::Equal
        );
    }

    #[test]
    fn test_same_payload_same_digest() {
        assert_eq!(bundle("1.0").digest(), bundle("1.0").digest());
        assert_ne!(bundle("1.0").digest(), bundle("1.1").digest());
    }
}
