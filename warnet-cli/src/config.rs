//! CLI configuration file, `~/.config/warnet/cli.toml`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use warnet_core::logging::LogRotation;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Namespace override; the kubeconfig context decides when unset
    pub namespace: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub charts_dir: PathBuf,
    pub log_level: String,
    pub log_path: Option<PathBuf>,
    /// hourly, daily or never; `WARNET_LOG_ROTATION` wins when set
    pub log_rotation: Option<LogRotation>,
    pub default_output: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: None,
            kubeconfig: None,
            charts_dir: PathBuf::from("resources/charts"),
            log_level: "info".to_string(),
            log_path: None,
            log_rotation: None,
            default_output: "table".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid config in {}", path.display()))
    }

    fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home).join(".config/warnet/cli.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("cli.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.charts_dir, PathBuf::from("resources/charts"));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cli.toml");
        std::fs::write(&path, "namespace = \"red\"\ndefault_output = \"json\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.namespace.as_deref(), Some("red"));
        assert_eq!(config.default_output, "json");
        assert_eq!(config.log_level, "info");
        assert!(config.kubeconfig.is_none());
    }

    #[test]
    fn test_written_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cli.toml");
        let config = Config {
            kubeconfig: Some(PathBuf::from("/tmp/kind.yaml")),
            log_path: Some(PathBuf::from("/var/log/warnet")),
            ..Default::default()
        };
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_log_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cli.toml");
        std::fs::write(&path, "log_rotation = \"hourly\"\n").unwrap();
        assert_eq!(Config::load_from(&path).unwrap().log_rotation, Some(LogRotation::Hourly));

        std::fs::write(&path, "log_rotation = \"weekly\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cli.toml");
        std::fs::write(&path, "namespace = [").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
