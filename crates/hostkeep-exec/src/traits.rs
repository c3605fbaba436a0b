//! Connector trait

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::{CommandResult, ExecOptions, FileStat, OsInfo};

/// Capability contract for a handle to a (possibly remote) machine.
///
/// A command that ran to completion is always `Ok`, whatever its exit
/// status; `Err` is reserved for transport failures.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Run a shell command
    async fn exec(&self, cmd: &str, opts: &ExecOptions) -> Result<CommandResult, ExecError>;

    /// Identify the operating system
    async fn os_info(&self) -> Result<OsInfo, ExecError>;

    /// Resolve a binary on `PATH`. An error means "not found".
    async fn look_path(&self, binary: &str) -> Result<String, ExecError>;

    /// Stat a path
    async fn stat(&self, path: &str) -> Result<FileStat, ExecError>;

    /// Read a whole file
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ExecError>;

    /// Replace a whole file
    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<(), ExecError>;

    /// Whether the handle is usable
    fn is_connected(&self) -> bool;

    /// Short name used in logs
    fn connector_type(&self) -> &'static str;
}
