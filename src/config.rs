use anyhow::{Context, Result};
use declarative::ResourceKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config directory")?;
    Ok(base.join("installer"))
}

// ============================================================================
// Installer Config
// ============================================================================

/// Installer settings, loaded from `installer.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// URI suffixes that mark a resource as a bundle when nothing else
    /// tells an uninstall what it is removing
    pub bundle_extensions: Vec<String>,

    /// Start bundles after a fresh install
    pub start_bundles: bool,

    /// Ask the host for one framework refresh after a pass that updated or
    /// removed bundles
    pub refresh_after_bundle_changes: bool,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            bundle_extensions: vec![".jar".to_string()],
            start_bundles: true,
            refresh_after_bundle_changes: true,
        }
    }
}

impl InstallerConfig {
    /// Default location of the config file
    pub fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("installer.toml"))
    }

    /// Parse config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid installer config")
    }

    /// Load config from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        log::debug!("Loaded installer config from {}", path.display());
        Ok(config)
    }

    /// Load config from a file, falling back to defaults when it is missing
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Guess the kind of a resource from its URI alone
    pub fn classify_uri(&self, uri: &str) -> ResourceKind {
        let lower = uri.to_lowercase();
        if self
            .bundle_extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_lowercase()))
        {
            ResourceKind::Bundle
        } else {
            ResourceKind::Configuration
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = InstallerConfig::default();
        assert_eq!(config.bundle_extensions, vec![".jar".to_string()]);
        assert!(config.start_bundles);
        assert!(config.refresh_after_bundle_changes);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = InstallerConfig::from_toml_str("start_bundles = false\n").unwrap();
        assert!(!config.start_bundles);
        assert!(config.refresh_after_bundle_changes);
        assert_eq!(config.bundle_extensions, vec![".jar".to_string()]);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(InstallerConfig::from_toml_str("start_bundles = \"maybe\"").is_err());
    }

    #[test]
    fn test_classify_uri() {
        let config = InstallerConfig::default();
        assert_eq!(config.classify_uri("testB.jar"), ResourceKind::Bundle);
        assert_eq!(config.classify_uri("libs/TESTB.JAR"), ResourceKind::Bundle);
        assert_eq!(
            config.classify_uri("org.example.service"),
            ResourceKind::Configuration
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("installer.toml");
        let config = InstallerConfig {
            bundle_extensions: vec![".jar".to_string(), ".bundle".to_string()],
            start_bundles: false,
            refresh_after_bundle_changes: false,
        };
        config.save(&path).unwrap();
        assert_eq!(InstallerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = InstallerConfig::load_or_default(&dir.path().join("none.toml")).unwrap();
        assert_eq!(config, InstallerConfig::default());
    }

    #[test]
    fn test_load_unreadable_reports_path() {
        let dir = TempDir::new().unwrap();
        let err = InstallerConfig::load(&dir.path().join("none.toml")).unwrap_err();
        assert!(err.to_string().contains("none.toml"));
    }
}
