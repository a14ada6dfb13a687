//! Core types shared by hosts, configuration stores and the installer.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Configuration record contents, keyed by property name.
///
/// A `BTreeMap` keeps the serialized form stable, which digests rely on.
pub type Properties = BTreeMap<String, serde_json::Value>;

/// Manifest header carrying the bundle's symbolic name.
pub const SYMBOLIC_NAME_HEADER: &str = "Bundle-SymbolicName";
/// Manifest header carrying the bundle version.
pub const VERSION_HEADER: &str = "Bundle-Version";
/// Manifest header listing required bundles.
pub const REQUIRE_BUNDLE_HEADER: &str = "Require-Bundle";

/// A module version: `major[.minor[.micro[.qualifier]]]`.
///
/// Numeric parts compare numerically, then the qualifier compares as a
/// string, so `1.0.0` sorts before `1.0.0.beta`.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Version {
    /// Major component
    pub major: u32,
    /// Minor component
    pub minor: u32,
    /// Micro component
    pub micro: u32,
    /// Free-form qualifier, empty when absent
    pub qualifier: String,
}

impl Version {
    /// Create a version without qualifier.
    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    /// Set the qualifier.
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = qualifier.into();
        self
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |message: &str| Error::InvalidVersion {
            version: s.to_string(),
            message: message.to_string(),
        };

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty version"));
        }

        let mut parts = trimmed.splitn(4, '.');
        let mut numbers = [0u32; 3];
        for (i, slot) in numbers.iter_mut().enumerate() {
            match parts.next() {
                Some(part) => {
                    *slot = part
                        .parse()
                        .map_err(|_| invalid(&format!("component {} is not a number", i + 1)))?;
                }
                None => break,
            }
        }

        let qualifier = parts.next().unwrap_or_default();
        if !qualifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("qualifier has illegal characters"));
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            micro: numbers[2],
            qualifier: qualifier.to_string(),
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

/// Headers read from a bundle payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    /// Identity of the bundle on the host
    pub symbolic_name: String,
    /// Bundle version, `0.0.0` when absent
    pub version: Version,
    /// Symbolic names this bundle needs before it can start
    pub required_bundles: Vec<String>,
}

impl BundleManifest {
    /// Parse manifest text (`Header: value` lines, continuation lines
    /// start with a single space).
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload).map_err(|e| Error::InvalidPayload {
            message: format!("manifest is not UTF-8: {e}"),
        })?;

        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        let mut last_key: Option<String> = None;

        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix(' ') {
                let key = last_key.as_ref().ok_or_else(|| Error::InvalidPayload {
                    message: format!("line {}: continuation without header", index + 1),
                })?;
                if let Some(value) = headers.get_mut(key) {
                    value.push_str(rest);
                }
                continue;
            }
            let (key, value) = line.split_once(':').ok_or_else(|| Error::InvalidPayload {
                message: format!("line {}: expected 'Header: value'", index + 1),
            })?;
            let key = key.trim().to_string();
            headers.insert(key.clone(), value.trim().to_string());
            last_key = Some(key);
        }

        let symbolic_name = headers
            .get(SYMBOLIC_NAME_HEADER)
            .map(|v| strip_directives(v).to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::InvalidPayload {
                message: format!("missing {SYMBOLIC_NAME_HEADER} header"),
            })?;

        let version = match headers.get(VERSION_HEADER) {
            Some(v) => v.parse()?,
            None => Version::default(),
        };

        let required_bundles = headers
            .get(REQUIRE_BUNDLE_HEADER)
            .map(|v| {
                split_clauses(v)
                    .into_iter()
                    .map(|clause| strip_directives(&clause).to_string())
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            symbolic_name,
            version,
            required_bundles,
        })
    }

    /// Render the manifest back to payload bytes.
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = format!(
            "{SYMBOLIC_NAME_HEADER}: {}\n{VERSION_HEADER}: {}\n",
            self.symbolic_name, self.version
        );
        if !self.required_bundles.is_empty() {
            out.push_str(&format!(
                "{REQUIRE_BUNDLE_HEADER}: {}\n",
                self.required_bundles.join(",")
            ));
        }
        out.into_bytes()
    }
}

/// Drop `;attribute=value` directives from a header clause.
fn strip_directives(clause: &str) -> &str {
    clause.split(';').next().unwrap_or_default().trim()
}

/// Split a header on commas that are not inside quotes (version ranges).
fn split_clauses(value: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in value.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ',' if !quoted => clauses.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    clauses.push(current);
    clauses
}

/// Lifecycle state of a module on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    /// Installed but not running
    Installed,
    /// Running
    Active,
}

/// What the host reports about an installed module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Host-level identity; never reused after removal
    pub id: u64,
    /// Location (resource URI) the module was installed from
    pub location: String,
    /// Symbolic name from the manifest
    pub symbolic_name: String,
    /// Installed version
    pub version: Version,
    /// Whether the module is running
    pub state: ModuleState,
}

/// Kind of a bundle lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum BundleEventKind {
    Installed,
    Updated,
    Started,
    Stopped,
    Uninstalled,
}

/// Notification emitted by a host or configuration store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostEvent {
    /// A bundle changed lifecycle state
    Bundle {
        /// Location of the bundle
        location: String,
        /// What happened to it
        kind: BundleEventKind,
    },
    /// The framework finished refreshing package wiring
    FrameworkRefreshed,
    /// The configuration store came up or went away
    ConfigStore {
        /// New availability
        available: bool,
    },
}

/// Channel end hosts publish notifications on.
pub type EventSink = std::sync::mpsc::Sender<HostEvent>;
