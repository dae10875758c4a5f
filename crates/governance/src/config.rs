//! Governance configuration

use crate::error::{GovernanceError, GovernanceResult};
use crate::pattern::DEFAULT_MAX_PATTERN_LEN;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = ".sintra";

/// Governance configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Delegation registry file (`[[delegation]]` tables)
    pub registry_path: PathBuf,

    /// Directory of finalized confidence-check records
    pub evidence_dir: PathBuf,

    /// Approval store file
    pub store_path: PathBuf,

    /// Operator journal file
    pub journal_path: PathBuf,

    /// Whether new suspensions are journaled
    pub journal_enabled: bool,

    /// Longest accepted command pattern, in bytes
    pub max_pattern_len: usize,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self::with_data_dir(DEFAULT_DATA_DIR)
    }
}

impl GovernanceConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            registry_path: data_dir.join("delegations.toml"),
            evidence_dir: data_dir.join("confidence"),
            store_path: data_dir.join("approvals.json"),
            journal_path: data_dir.join("OPERATOR_LOG.jsonl"),
            journal_enabled: true,
            max_pattern_len: DEFAULT_MAX_PATTERN_LEN,
        }
    }

    /// Load configuration from file
    ///
    /// Without an explicit path the platform config directory is tried
    /// (`<config_dir>/sintra/governance.toml`). A missing file yields
    /// defaults.
    pub fn load(path: Option<&Path>) -> GovernanceResult<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_config_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)
            .map_err(|e| GovernanceError::Config(format!("{}: {}", config_path.display(), e)))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> GovernanceResult<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| GovernanceError::Config(e.to_string()))?;
        if config.max_pattern_len == 0 {
            return Err(GovernanceError::Config(
                "max_pattern_len must be greater than zero".into(),
            ));
        }
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sintra").join("governance.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GovernanceConfig::default();
        assert_eq!(config.store_path, PathBuf::from(".sintra/approvals.json"));
        assert_eq!(config.evidence_dir, PathBuf::from(".sintra/confidence"));
        assert!(config.journal_enabled);
        assert_eq!(config.max_pattern_len, DEFAULT_MAX_PATTERN_LEN);
    }

    #[test]
    fn test_load_missing_config() {
        let config = GovernanceConfig::load(Some(Path::new("/nonexistent/path/governance.toml"))).unwrap();
        assert_eq!(config, GovernanceConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = GovernanceConfig::from_toml(
            r#"
            store_path = "/var/lib/sintra/approvals.json"
            journal_enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.store_path, PathBuf::from("/var/lib/sintra/approvals.json"));
        assert!(!config.journal_enabled);
        assert_eq!(config.registry_path, PathBuf::from(".sintra/delegations.toml"));
    }

    #[test]
    fn test_invalid_config() {
        assert!(GovernanceConfig::from_toml("store_path = 3").is_err());
        assert!(GovernanceConfig::from_toml("max_pattern_len = 0").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("governance.toml");
        std::fs::write(&path, "evidence_dir = \"runs\"\n").unwrap();
        let config = GovernanceConfig::load(Some(&path)).unwrap();
        assert_eq!(config.evidence_dir, PathBuf::from("runs"));
    }
}
