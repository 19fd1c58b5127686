/// Deploy configuration
///
/// Loaded from `redeploy.toml` (project-local) or the user config dir,
/// falling back to built-in defaults that mirror the historical hardcoded paths.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::{
    resolve_path, APP_CONFIG_DIR, DEFAULT_BACKUP_ROOT, DEFAULT_BRANCH, DEFAULT_CONFIG_FILE,
    DEFAULT_DATABASE_FILE, DEFAULT_DATA_DIR, DEFAULT_LOGS_DIR, DEFAULT_LOG_TAIL_LINES,
    DEFAULT_REMOTE, DEFAULT_SETTLE_DELAY, LOCAL_CONFIG_FILE,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeployConfig {
    /// Directory containing docker-compose.yml and the git checkout
    pub project_root: PathBuf,
    pub backup_root: PathBuf,
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub config_file: PathBuf,
    pub database_file: PathBuf,
    pub remote: String,
    pub branch: String,
    /// Humantime duration, e.g. "10s" or "1m 30s"
    pub settle_delay: String,
    pub log_tail_lines: usize,
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionConfig {
    /// Number of newest backups to keep after a successful deploy. Unset keeps everything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep: Option<usize>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            backup_root: PathBuf::from(DEFAULT_BACKUP_ROOT),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            logs_dir: PathBuf::from(DEFAULT_LOGS_DIR),
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            database_file: PathBuf::from(DEFAULT_DATABASE_FILE),
            remote: DEFAULT_REMOTE.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            settle_delay: DEFAULT_SETTLE_DELAY.to_string(),
            log_tail_lines: DEFAULT_LOG_TAIL_LINES,
            retention: RetentionConfig::default(),
        }
    }
}

/// Values given on the command line, applied on top of the loaded file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub project_root: Option<PathBuf>,
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub settle_delay: Option<String>,
}

impl DeployConfig {
    /// User-level config file path (`~/.config/redeploy/config.toml` on Linux)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_CONFIG_DIR).join("config.toml"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Otherwise `./redeploy.toml` is tried,
    /// then the user config file, then defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(anyhow!("Config file not found at {}", path.display()));
            }
            return Self::load_from(path);
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Self::load_from(&local);
        }

        if let Some(user) = Self::user_config_path() {
            if user.exists() {
                return Self::load_from(&user);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load and validate configuration from a TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Apply command-line overrides and re-validate
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Result<Self> {
        if let Some(root) = overrides.project_root {
            self.project_root = root;
        }
        if let Some(remote) = overrides.remote {
            self.remote = remote;
        }
        if let Some(branch) = overrides.branch {
            self.branch = branch;
        }
        if let Some(delay) = overrides.settle_delay {
            self.settle_delay = delay;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        humantime::parse_duration(&self.settle_delay)
            .with_context(|| format!("Invalid settle_delay '{}'", self.settle_delay))?;

        if self.remote.trim().is_empty() {
            return Err(anyhow!("remote must not be empty"));
        }
        if self.branch.trim().is_empty() {
            return Err(anyhow!("branch must not be empty"));
        }
        if self.log_tail_lines == 0 {
            return Err(anyhow!("log_tail_lines must be at least 1"));
        }
        if self.retention.keep == Some(0) {
            return Err(anyhow!("retention.keep must be at least 1 when set"));
        }
        Ok(())
    }

    /// Settle delay as a duration. Falls back to zero only for configs that skipped validation.
    pub fn settle_duration(&self) -> Duration {
        humantime::parse_duration(&self.settle_delay).unwrap_or_default()
    }

    pub fn backup_root_path(&self) -> PathBuf {
        resolve_path(&self.project_root, &self.backup_root)
    }

    pub fn data_dir_path(&self) -> PathBuf {
        resolve_path(&self.project_root, &self.data_dir)
    }

    pub fn logs_dir_path(&self) -> PathBuf {
        resolve_path(&self.project_root, &self.logs_dir)
    }

    pub fn config_file_path(&self) -> PathBuf {
        resolve_path(&self.project_root, &self.config_file)
    }

    pub fn database_file_path(&self) -> PathBuf {
        resolve_path(&self.project_root, &self.database_file)
    }

    /// Serialize to pretty TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Write a default config file, refusing to overwrite an existing one
    pub fn write_default(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(anyhow!("{} already exists", path.display()));
        }
        let contents = Self::default().to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_historical_layout() {
        let config = DeployConfig::default();
        assert_eq!(config.data_dir_path(), PathBuf::from("./data"));
        assert_eq!(config.database_file_path(), PathBuf::from("./data/xianyu_data.db"));
        assert_eq!(config.config_file_path(), PathBuf::from("./global_config.yml"));
        assert_eq!(config.backup_root_path(), PathBuf::from("./backups"));
        assert_eq!(config.remote, "origin");
        assert_eq!(config.branch, "main");
        assert_eq!(config.settle_duration(), Duration::from_secs(10));
        assert_eq!(config.log_tail_lines, 20);
        assert_eq!(config.retention.keep, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("redeploy.toml");
        fs::write(
            &path,
            "branch = \"release\"\nsettle_delay = \"1m 30s\"\n\n[retention]\nkeep = 5\n",
        )
        .unwrap();

        let config = DeployConfig::load(Some(&path)).unwrap();
        assert_eq!(config.branch, "release");
        assert_eq!(config.remote, "origin");
        assert_eq!(config.settle_duration(), Duration::from_secs(90));
        assert_eq!(config.retention.keep, Some(5));
    }

    #[test]
    fn test_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("bad_delay.toml");
        fs::write(&path, "settle_delay = \"soon\"\n").unwrap();
        assert!(DeployConfig::load_from(&path).is_err());

        let path = dir.path().join("unknown.toml");
        fs::write(&path, "brnach = \"main\"\n").unwrap();
        assert!(DeployConfig::load_from(&path).is_err());

        let path = dir.path().join("keep_zero.toml");
        fs::write(&path, "[retention]\nkeep = 0\n").unwrap();
        assert!(DeployConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(DeployConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_overrides_apply_and_validate() {
        let config = DeployConfig::default()
            .with_overrides(ConfigOverrides {
                project_root: Some(PathBuf::from("/srv/shop")),
                branch: Some("hotfix".to_string()),
                settle_delay: Some("0s".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(config.data_dir_path(), PathBuf::from("/srv/shop/data"));
        assert_eq!(config.branch, "hotfix");
        assert_eq!(config.settle_duration(), Duration::ZERO);

        let bad = DeployConfig::default().with_overrides(ConfigOverrides {
            settle_delay: Some("ten".to_string()),
            ..Default::default()
        });
        assert!(bad.is_err());
    }

    #[test]
    fn test_write_default_round_trips_and_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("redeploy.toml");
        DeployConfig::write_default(&path).unwrap();
        assert_eq!(DeployConfig::load_from(&path).unwrap(), DeployConfig::default());
        assert!(DeployConfig::write_default(&path).is_err());
    }
}
