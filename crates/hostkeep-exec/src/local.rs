//! Local command execution using `tokio::process`

use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, instrument};

use crate::error::ExecError;
use crate::result::{CommandResult, ExecOptions, FileStat, OsInfo};
use crate::traits::Connector;

/// Local connector
///
/// Runs commands on the local machine through `sh -c`. Escalated commands
/// go through non-interactive `sudo`.
#[derive(Debug, Clone)]
pub struct LocalConnector;

impl LocalConnector {
    /// Create a new local connector
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Internal method to execute command
    #[instrument(skip(self), level = "debug")]
    async fn execute(&self, cmd: &str, sudo: bool) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        debug!(command = %cmd, sudo, "executing local command");

        // Use shell to support pipes, redirections, etc.
        let mut command = if sudo {
            let mut c = Command::new("sudo");
            c.arg("-n").arg("sh").arg("-c").arg(cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(cmd);
            c
        };

        let child = command
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::SpawnError(e.to_string()))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let duration = start.elapsed();

        let status = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!(
            command = %cmd,
            status = status,
            duration = ?duration,
            "command completed"
        );

        Ok(CommandResult {
            status,
            stdout,
            stderr,
            duration,
        })
    }

    /// Run a read-only helper command and return trimmed stdout
    async fn probe(&self, cmd: &str) -> Result<String, ExecError> {
        let result = self.execute(cmd, false).await?;
        if result.success() {
            Ok(result.stdout.trim().to_string())
        } else {
            Err(ExecError::OsDetection(format!(
                "`{cmd}` exited with {}: {}",
                result.status,
                result.stderr.trim()
            )))
        }
    }
}

impl Default for LocalConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for LocalConnector {
    #[instrument(skip(self), level = "debug")]
    async fn exec(&self, cmd: &str, opts: &ExecOptions) -> Result<CommandResult, ExecError> {
        let Some(timeout_duration) = opts.timeout else {
            return self.execute(cmd, opts.sudo).await;
        };

        let start = Instant::now();

        match timeout(timeout_duration, self.execute(cmd, opts.sudo)).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    command = %cmd,
                    timeout = ?timeout_duration,
                    elapsed = ?start.elapsed(),
                    "command timed out"
                );
                Err(ExecError::Timeout {
                    timeout: timeout_duration,
                })
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn os_info(&self) -> Result<OsInfo, ExecError> {
        let mut info = match tokio::fs::read_to_string("/etc/os-release").await {
            Ok(contents) => OsInfo::from_os_release(&contents),
            Err(_) if std::env::consts::OS == "macos" => OsInfo {
                id: "darwin".to_string(),
                version_id: self.probe("sw_vers -productVersion").await?,
                pretty_name: self
                    .probe("sw_vers -productName")
                    .await
                    .unwrap_or_else(|_| "macOS".to_string()),
                ..OsInfo::default()
            },
            Err(e) => return Err(ExecError::OsDetection(e.to_string())),
        };

        info.kernel = self.probe("uname -r").await?;
        info.arch = self.probe("uname -m").await?;

        if info.id.is_empty() {
            return Err(ExecError::OsDetection("os-release has no ID".to_string()));
        }

        Ok(info)
    }

    async fn look_path(&self, binary: &str) -> Result<String, ExecError> {
        let result = self.execute(&format!("command -v {binary}"), false).await?;
        let path = result.stdout.trim();
        if result.success() && !path.is_empty() {
            Ok(path.to_string())
        } else {
            Err(ExecError::BinaryNotFound(binary.to_string()))
        }
    }

    async fn stat(&self, path: &str) -> Result<FileStat, ExecError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(FileStat {
                exists: true,
                is_dir: meta.is_dir(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileStat::missing()),
            Err(e) => Err(ExecError::FileAccess {
                path: path.to_string(),
                message: e.to_string(),
            }),
        }
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ExecError> {
        tokio::fs::read(path).await.map_err(|e| ExecError::FileAccess {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<(), ExecError> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| ExecError::FileAccess {
                path: path.to_string(),
                message: e.to_string(),
            })
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn connector_type(&self) -> &'static str {
        "local"
    }
}
