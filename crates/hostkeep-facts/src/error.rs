//! Error types for hostkeep-facts

use hostkeep_exec::ExecError;
use thiserror::Error;

use crate::types::Facts;

/// Errors returned by a fact gather
#[derive(Error, Debug, Clone)]
pub enum GatherError {
    /// The connector reported itself disconnected; nothing was probed
    #[error("connector is not connected")]
    NotConnected,

    /// OS identification failed; nothing else can be selected without it
    #[error("failed to identify operating system: {0}")]
    OsIdentity(#[source] ExecError),

    /// One or more required probes failed
    ///
    /// `partial` holds everything the other probes populated.
    #[error("fact probes failed: {}", summarize(errors))]
    Probes {
        /// Best-effort facts
        partial: Box<Facts>,
        /// Probe failures, first observed first
        errors: Vec<ProbeError>,
    },
}

impl GatherError {
    /// Partially-populated facts, if any probing happened
    #[must_use]
    pub fn partial(&self) -> Option<&Facts> {
        match self {
            GatherError::Probes { partial, .. } => Some(partial),
            _ => None,
        }
    }

    /// Whether the gather was cut short by cancellation
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            GatherError::Probes { errors, .. } if errors.first().is_some_and(|e| matches!(e, ProbeError::Cancelled))
        )
    }
}

fn summarize(errors: &[ProbeError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure of a single fact probe
#[derive(Error, Debug, Clone)]
pub enum ProbeError {
    /// Command could not run or exited non-zero
    #[error("`{command}` failed: {message}")]
    Command {
        /// Command that was run
        command: String,
        /// Transport error or exit status with stderr
        message: String,
    },

    /// Command output was not what the probe expected
    #[error("could not parse output of `{command}` as {expected}: {output:?}")]
    Parse {
        /// Command that was run
        command: String,
        /// What the probe was looking for
        expected: &'static str,
        /// Trimmed stdout
        output: String,
    },

    /// Both hostname forms failed
    #[error("hostname unavailable ({fqdn}; {short})")]
    Hostname {
        /// Failure of the fully-qualified lookup
        fqdn: Box<ProbeError>,
        /// Failure of the short lookup
        short: Box<ProbeError>,
    },

    /// The gather was cancelled while the probe ran
    #[error("probe cancelled")]
    Cancelled,

    /// The probe task panicked or was aborted
    #[error("probe task aborted: {0}")]
    Aborted(String),
}

/// Capability detection failures; downgraded to warnings by the gatherer
#[derive(Error, Debug, Clone)]
pub enum DetectError {
    /// None of the candidate package managers is installed
    #[error("no package manager found (tried {tried})")]
    NoPackageManager {
        /// Binaries that were looked up
        tried: String,
    },

    /// Neither systemd nor SysV init scripts were found
    #[error("no recognized init system found")]
    NoInitSystem,

    /// A probe failed at the transport level
    #[error("detection probe failed: {0}")]
    Probe(#[from] ExecError),
}
