//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use hostkeep_exec::ExecOptions;
use hostkeep_lifecycle::DEFAULT_NAMESPACE;
use serde::{Deserialize, Serialize};

/// Top-level configuration read from `hostkeep.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Run state-changing commands through sudo
    pub sudo: bool,
    /// Per-command timeout in seconds
    pub command_timeout_secs: u64,
    /// Wait between graceful and forceful stop in seconds
    pub stop_grace_secs: u64,
    /// containerd namespace for `ctr`
    pub containerd_namespace: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            sudo: true,
            command_timeout_secs: 120,
            stop_grace_secs: 10,
            containerd_namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("failed to read {}: {e}", path.display()))?;
        Self::parse(&content)
            .map_err(|e| eyre::eyre!("failed to parse {}: {e}", path.display()))
    }

    /// Parse configuration text
    ///
    /// # Errors
    /// Returns error if the text is not valid configuration
    pub fn parse(content: &str) -> eyre::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from default paths or use defaults
    ///
    /// Returns the path the configuration came from, if any.
    ///
    /// # Errors
    /// Returns error if a found file cannot be read or parsed
    pub fn load_default() -> eyre::Result<(Self, Option<PathBuf>)> {
        if let Ok(path) = std::env::var("HOSTKEEP_CONFIG") {
            let path = PathBuf::from(path);
            return Ok((Self::load(&path)?, Some(path)));
        }

        let mut paths = vec![
            PathBuf::from("hostkeep.toml"),
            PathBuf::from("/etc/hostkeep/hostkeep.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("hostkeep/hostkeep.toml"));
        }

        for path in paths {
            if path.exists() {
                return Ok((Self::load(&path)?, Some(path)));
            }
        }

        Ok((Config::default(), None))
    }

    /// Execution options for lifecycle commands
    #[must_use]
    pub fn exec_options(&self) -> ExecOptions {
        ExecOptions::new()
            .with_sudo(self.sudo)
            .with_timeout(Duration::from_secs(self.command_timeout_secs))
    }

    /// Grace period between graceful and forceful stop
    #[must_use]
    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }
}
