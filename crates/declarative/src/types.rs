//! Core types for declarative resource management

use hostkit::{Properties, Version};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which host adapter a resource belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Versioned executable module, installed on the module host
    Bundle,
    /// Unversioned configuration record, applied to the configuration store
    Configuration,
}

impl ResourceKind {
    /// Short name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bundle => "bundle",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content fingerprint of a resource payload (blake3, hex encoded)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(String);

impl Digest {
    /// Fingerprint raw bytes
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    /// Fingerprint configuration properties
    ///
    /// Properties are a sorted map, so equal dictionaries always serialize
    /// to the same bytes.
    pub fn of_properties(properties: &Properties) -> Self {
        let bytes = serde_json::to_vec(properties).unwrap_or_default();
        Self::of_bytes(&bytes)
    }

    /// Hex representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First twelve hex characters, for logs
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the host currently holds for a URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledResource {
    pub uri: String,
    pub kind: ResourceKind,
    /// Present for bundles only
    pub version: Option<Version>,
    /// Present for configurations only; hosts do not keep bundle payloads
    pub digest: Option<Digest>,
}

impl InstalledResource {
    /// A bundle installed at `version`
    pub fn bundle(uri: impl Into<String>, version: Version) -> Self {
        Self {
            uri: uri.into(),
            kind: ResourceKind::Bundle,
            version: Some(version),
            digest: None,
        }
    }

    /// A configuration record with the given properties
    pub fn configuration(uri: impl Into<String>, properties: &Properties) -> Self {
        Self {
            uri: uri.into(),
            kind: ResourceKind::Configuration,
            version: None,
            digest: Some(Digest::of_properties(properties)),
        }
    }
}

/// Outcome of the version policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyDecision {
    /// Nothing installed yet
    Install,
    /// Replace what is installed
    Upgrade,
    /// Leave the host alone; the task still succeeds
    Ignore,
}

impl PolicyDecision {
    /// Whether the host must be mutated
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Ignore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_digest_of_equal_properties() {
        let mut a = Properties::new();
        a.insert("foo".to_string(), json!("bar"));
        a.insert("count".to_string(), json!(2));

        let mut b = Properties::new();
        b.insert("count".to_string(), json!(2));
        b.insert("foo".to_string(), json!("bar"));

        assert_eq!(Digest::of_properties(&a), Digest::of_properties(&b));
    }

    #[test]
    fn test_digest_differs_on_content() {
        assert_ne!(Digest::of_bytes(b"one"), Digest::of_bytes(b"two"));
    }

    #[test]
    fn test_digest_short() {
        let digest = Digest::of_bytes(b"payload");
        assert_eq!(digest.short().len(), 12);
        assert!(digest.as_str().starts_with(digest.short()));
    }

    #[test]
    fn test_policy_decision_is_change() {
        assert!(PolicyDecision::Install.is_change());
        assert!(PolicyDecision::Upgrade.is_change());
        assert!(!PolicyDecision::Ignore.is_change());
    }
}
