//! Error types for hostkeep-lifecycle

use std::fmt;

use thiserror::Error;

use crate::classify::CommandFailure;

/// Step of a lifecycle operation, named in error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Start
    Start,
    /// Graceful stop of a target without a forceful stage
    GracefulStop,
    /// Forceful stop after the graceful stage went through
    ForcefulStop,
    /// Restart
    Restart,
    /// Enable on boot
    Enable,
    /// Disable on boot
    Disable,
    /// Reload unit definitions
    DaemonReload,
    /// State query
    Status,
    /// First removal attempt
    Remove,
    /// Removal retried after stopping a busy target
    RemoveRetry,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::GracefulStop => "graceful stop",
            Stage::ForcefulStop => "forceful stop",
            Stage::Restart => "restart",
            Stage::Enable => "enable",
            Stage::Disable => "disable",
            Stage::DaemonReload => "daemon reload",
            Stage::Status => "status query",
            Stage::Remove => "remove",
            Stage::RemoveRetry => "remove retry",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during lifecycle operations
#[derive(Error, Debug, Clone)]
pub enum LifecycleError {
    /// Connector reported itself disconnected
    #[error("connector is not connected")]
    NotConnected,

    /// Missing or malformed identifier
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Facts carry no init system
    #[error("no init system detected on host")]
    NoInitSystem,

    /// The resource kind has no command for this operation
    #[error("{kind} {id} does not support {operation}")]
    Unsupported {
        /// Resource kind
        kind: &'static str,
        /// Resource identifier
        id: String,
        /// Requested operation
        operation: &'static str,
    },

    /// A single-step command failed
    #[error("{stage} of {kind} {id} failed: {failure}")]
    Command {
        /// Resource kind
        kind: &'static str,
        /// Resource identifier
        id: String,
        /// Failed step
        stage: Stage,
        /// Underlying failure
        #[source]
        failure: CommandFailure,
    },

    /// Both stages of a stop escalation failed
    #[error("forceful stop of {kind} {id} failed: {forceful} (graceful stop also failed: {graceful})")]
    Stop {
        /// Resource kind
        kind: &'static str,
        /// Resource identifier
        id: String,
        /// Failure of the forceful stage
        #[source]
        forceful: CommandFailure,
        /// Failure of the graceful stage
        graceful: CommandFailure,
    },
}

impl LifecycleError {
    /// Stage that failed, if the error came from a command
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            LifecycleError::Command { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The primary command failure, if any
    #[must_use]
    pub fn failure(&self) -> Option<&CommandFailure> {
        match self {
            LifecycleError::Command { failure, .. } => Some(failure),
            LifecycleError::Stop { forceful, .. } => Some(forceful),
            _ => None,
        }
    }

    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.failure().is_some_and(|f| match &f.cause {
            crate::classify::FailureCause::Transport(e) => e.is_retryable(),
            crate::classify::FailureCause::Exit(_) => false,
        })
    }
}
