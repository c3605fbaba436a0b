//! Result and option types for connector calls

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result of a command that ran to completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit status code (0 for success)
    pub status: i32,
    /// stdout output
    pub stdout: String,
    /// stderr output
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Combine stdout and stderr
    #[must_use]
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Per-call execution options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Run with privilege escalation
    pub sudo: bool,
    /// Upper bound on the call; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl ExecOptions {
    /// Unprivileged, no timeout
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable privilege escalation
    #[must_use]
    pub fn with_sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    /// Set the call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Operating system identity as reported by the connector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    /// Distribution id (`ubuntu`, `centos`, `darwin`, ...)
    pub id: String,
    /// Version id (`22.04`, `9`, `14.4`)
    pub version_id: String,
    /// Human readable name
    pub pretty_name: String,
    /// Kernel release
    pub kernel: String,
    /// Machine architecture (`x86_64`, `aarch64`, `arm64`)
    pub arch: String,
}

impl OsInfo {
    /// Create OS info with only an id set
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Parse the `KEY=value` lines of an os-release file into `id`,
    /// `version_id` and `pretty_name`.
    #[must_use]
    pub fn from_os_release(contents: &str) -> Self {
        let mut info = Self::default();
        for line in contents.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            match key.trim() {
                "ID" => info.id = value.to_lowercase(),
                "VERSION_ID" => info.version_id = value.to_string(),
                "PRETTY_NAME" => info.pretty_name = value.to_string(),
                _ => {}
            }
        }
        info
    }
}

/// Outcome of a `stat` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    /// Path exists
    pub exists: bool,
    /// Path is a directory
    pub is_dir: bool,
}

impl FileStat {
    /// A path that does not exist
    #[must_use]
    pub fn missing() -> Self {
        Self::default()
    }

    /// An existing directory
    #[must_use]
    pub fn dir() -> Self {
        Self {
            exists: true,
            is_dir: true,
        }
    }

    /// An existing regular file
    #[must_use]
    pub fn file() -> Self {
        Self {
            exists: true,
            is_dir: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_os_release() {
        let contents = r#"PRETTY_NAME="Ubuntu 22.04.4 LTS"
NAME="Ubuntu"
VERSION_ID="22.04"
ID=ubuntu
ID_LIKE=debian"#;

        let info = OsInfo::from_os_release(contents);

        assert_eq!(info.id, "ubuntu");
        assert_eq!(info.version_id, "22.04");
        assert_eq!(info.pretty_name, "Ubuntu 22.04.4 LTS");
    }

    #[test]
    fn test_exec_options_builder() {
        let opts = ExecOptions::new()
            .with_sudo(true)
            .with_timeout(Duration::from_secs(5));

        assert!(opts.sudo);
        assert_eq!(opts.timeout, Some(Duration::from_secs(5)));
    }
}
