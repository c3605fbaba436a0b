//! In-memory scripted connector
//!
//! Answers commands from a table of canned replies and records every command
//! it was asked to run. Used by the test suites of the other crates and by
//! dry runs that must not touch a machine.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ExecError;
use crate::result::{CommandResult, ExecOptions, FileStat, OsInfo};
use crate::traits::Connector;

/// Canned answer to one command invocation
#[derive(Debug, Clone)]
pub struct Reply {
    outcome: Result<CommandResult, ExecError>,
    delay: Option<Duration>,
}

impl Reply {
    /// Exit 0 with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::output(0, stdout, "")
    }

    /// Non-zero exit with the given stderr
    pub fn fail(status: i32, stderr: impl Into<String>) -> Self {
        Self::output(status, "", stderr)
    }

    /// Arbitrary completed command
    pub fn output(status: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            outcome: Ok(CommandResult {
                status,
                stdout: stdout.into(),
                stderr: stderr.into(),
                duration: Duration::ZERO,
            }),
            delay: None,
        }
    }

    /// Transport failure
    #[must_use]
    pub fn error(error: ExecError) -> Self {
        Self {
            outcome: Err(error),
            delay: None,
        }
    }

    /// Hold the reply back for `delay`
    #[must_use]
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Connector that replays scripted replies
///
/// Replies registered for the same command are served in order; the last one
/// keeps being served once the queue is down to a single entry. Commands
/// without a script exit 127.
#[derive(Debug)]
pub struct ScriptedConnector {
    os: Result<OsInfo, ExecError>,
    connected: bool,
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    binaries: HashMap<String, String>,
    paths: HashMap<String, FileStat>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    log: Mutex<Vec<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedConnector {
    /// Connected host reporting the given OS id
    pub fn new(os_id: impl Into<String>) -> Self {
        Self {
            os: Ok(OsInfo::new(os_id)),
            connected: true,
            replies: Mutex::new(HashMap::new()),
            binaries: HashMap::new(),
            paths: HashMap::new(),
            files: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Replace the reported OS identity
    #[must_use]
    pub fn with_os(mut self, os: OsInfo) -> Self {
        self.os = Ok(os);
        self
    }

    /// Make OS identification fail
    #[must_use]
    pub fn with_os_error(mut self, error: ExecError) -> Self {
        self.os = Err(error);
        self
    }

    /// Report the connector as disconnected
    #[must_use]
    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    /// Queue a reply for `cmd`
    #[must_use]
    pub fn on(self, cmd: impl Into<String>, reply: Reply) -> Self {
        lock(&self.replies)
            .entry(cmd.into())
            .or_default()
            .push_back(reply);
        self
    }

    /// Put a binary on the search path under `/usr/bin`
    #[must_use]
    pub fn with_binary(mut self, name: &str) -> Self {
        self.binaries
            .insert(name.to_string(), format!("/usr/bin/{name}"));
        self
    }

    /// Declare a path and its kind
    #[must_use]
    pub fn with_path(mut self, path: &str, stat: FileStat) -> Self {
        self.paths.insert(path.to_string(), stat);
        self
    }

    /// Seed file contents (also makes the path exist)
    #[must_use]
    pub fn with_file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.paths.insert(path.to_string(), FileStat::file());
        lock(&self.files).insert(path.to_string(), contents.into());
        self
    }

    /// Commands executed so far, in order
    pub fn commands(&self) -> Vec<String> {
        lock(&self.log).clone()
    }

    /// Number of times `cmd` was executed
    pub fn count(&self, cmd: &str) -> usize {
        lock(&self.log).iter().filter(|c| *c == cmd).count()
    }

    /// Current contents of a file
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.files).get(path).cloned()
    }

    fn next_reply(&self, cmd: &str) -> Reply {
        let mut replies = lock(&self.replies);
        match replies.get_mut(cmd) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| unscripted(cmd)),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| unscripted(cmd)),
            None => unscripted(cmd),
        }
    }
}

fn unscripted(cmd: &str) -> Reply {
    Reply::fail(127, format!("unscripted command: {cmd}"))
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn exec(&self, cmd: &str, opts: &ExecOptions) -> Result<CommandResult, ExecError> {
        if !self.connected {
            return Err(ExecError::NotConnected);
        }

        lock(&self.log).push(cmd.to_string());
        let reply = self.next_reply(cmd);
        debug!(command = %cmd, sudo = opts.sudo, "scripted command");

        if let Some(delay) = reply.delay {
            match opts.timeout {
                Some(limit) if limit < delay => {
                    tokio::time::sleep(limit).await;
                    return Err(ExecError::Timeout { timeout: limit });
                }
                _ => tokio::time::sleep(delay).await,
            }
        }

        reply.outcome
    }

    async fn os_info(&self) -> Result<OsInfo, ExecError> {
        if !self.connected {
            return Err(ExecError::NotConnected);
        }
        self.os.clone()
    }

    async fn look_path(&self, binary: &str) -> Result<String, ExecError> {
        self.binaries
            .get(binary)
            .cloned()
            .ok_or_else(|| ExecError::BinaryNotFound(binary.to_string()))
    }

    async fn stat(&self, path: &str) -> Result<FileStat, ExecError> {
        Ok(self.paths.get(path).copied().unwrap_or_default())
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ExecError> {
        lock(&self.files)
            .get(path)
            .cloned()
            .ok_or_else(|| ExecError::FileAccess {
                path: path.to_string(),
                message: "no such file".to_string(),
            })
    }

    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<(), ExecError> {
        lock(&self.files).insert(path.to_string(), contents.to_vec());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connector_type(&self) -> &'static str {
        "scripted"
    }
}
