//! Result classification
//!
//! The only place that reads stderr to decide whether a failed command
//! actually means "already in the desired state". Everything above works
//! on [`Verdict`]s.

use std::fmt;

use hostkeep_exec::{CommandResult, ExecError};

/// Phrases remote tools print when the target is already gone
pub const ABSENT_PHRASES: &[&str] = &[
    "not found",
    "No such container",
    "no such process",
    "could not find sandbox",
    "isn't running",
    "already stopped",
];

/// Phrases meaning "still in use, stop it first"
pub const BUSY_PHRASES: &[&str] = &["has active task"];

const SERVICE_ABSENT_PHRASES: &[&str] = &[
    "not found",
    "No such container",
    "no such process",
    "could not find sandbox",
    "isn't running",
    "already stopped",
    "not loaded",
    "No main process to kill",
    "no process found",
];

const CRI_ABSENT_PHRASES: &[&str] = &[
    "not found",
    "No such container",
    "no such process",
    "could not find sandbox",
    "isn't running",
    "already stopped",
    "NotFound",
];

/// Stderr vocabulary of one remote tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vocabulary {
    /// Substrings that turn a failure into a no-op
    pub absent: &'static [&'static str],
    /// Substrings that mark the target as busy
    pub busy: &'static [&'static str],
}

impl Vocabulary {
    /// Shared vocabulary (containerd `ctr` and anything without its own)
    pub const DEFAULT: Vocabulary = Vocabulary {
        absent: ABSENT_PHRASES,
        busy: BUSY_PHRASES,
    };

    /// `systemctl`, `service`, `killall`
    pub const SERVICE: Vocabulary = Vocabulary {
        absent: SERVICE_ABSENT_PHRASES,
        busy: BUSY_PHRASES,
    };

    /// `crictl`, which relays gRPC status codes
    pub const CRI: Vocabulary = Vocabulary {
        absent: CRI_ABSENT_PHRASES,
        busy: BUSY_PHRASES,
    };

    /// Case-sensitive match against the absence phrases
    #[must_use]
    pub fn is_absent(&self, stderr: &str) -> bool {
        self.absent.iter().any(|phrase| stderr.contains(phrase))
    }

    /// Case-sensitive match against the busy phrases
    #[must_use]
    pub fn is_busy(&self, stderr: &str) -> bool {
        self.busy.iter().any(|phrase| stderr.contains(phrase))
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Why a command counts as failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// Ran and exited non-zero
    Exit(i32),
    /// Never ran to completion
    Transport(ExecError),
}

/// A command failure, with enough context to diagnose it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    /// Command that was run
    pub command: String,
    /// Exit status or transport error
    pub cause: FailureCause,
    /// Trimmed stderr
    pub stderr: String,
    /// Stderr matched a busy phrase
    pub busy: bool,
}

impl CommandFailure {
    /// Failure for a command that never completed
    pub fn transport(command: impl Into<String>, error: ExecError) -> Self {
        Self {
            command: command.into(),
            cause: FailureCause::Transport(error),
            stderr: String::new(),
            busy: false,
        }
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            FailureCause::Exit(status) => {
                write!(f, "`{}` exited with status {status}", self.command)?;
                if !self.stderr.is_empty() {
                    write!(f, ": {}", self.stderr)?;
                }
                Ok(())
            }
            FailureCause::Transport(e) => write!(f, "`{}` could not run: {e}", self.command),
        }
    }
}

impl std::error::Error for CommandFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.cause {
            FailureCause::Transport(e) => Some(e),
            FailureCause::Exit(_) => None,
        }
    }
}

/// Classified outcome of a state-changing command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Exit status 0
    Success,
    /// Failed, but the target is already in the desired state
    Noop,
    /// Real failure
    Fatal(CommandFailure),
}

impl Verdict {
    /// Success or no-op
    #[must_use]
    pub fn is_ok(&self) -> bool {
        !matches!(self, Verdict::Fatal(_))
    }
}

/// Classify the result of running `command`
///
/// Exit status 0 is success. Otherwise an absence phrase in stderr makes it
/// a no-op whatever the exit status; anything else is fatal. Transport
/// errors are always fatal.
#[must_use]
pub fn classify(
    command: &str,
    result: Result<CommandResult, ExecError>,
    vocabulary: &Vocabulary,
) -> Verdict {
    let output = match result {
        Ok(output) => output,
        Err(e) => return Verdict::Fatal(CommandFailure::transport(command, e)),
    };

    if output.success() {
        return Verdict::Success;
    }

    if vocabulary.is_absent(&output.stderr) {
        return Verdict::Noop;
    }

    Verdict::Fatal(CommandFailure {
        command: command.to_string(),
        cause: FailureCause::Exit(output.status),
        busy: vocabulary.is_busy(&output.stderr),
        stderr: output.stderr.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn exited(status: i32, stderr: &str) -> Result<CommandResult, ExecError> {
        Ok(CommandResult {
            status,
            stdout: String::new(),
            stderr: stderr.to_string(),
            duration: Duration::ZERO,
        })
    }

    #[test]
    fn test_exit_zero_is_success() {
        let verdict = classify("crictl stopp p1", exited(0, "ignored"), &Vocabulary::DEFAULT);
        assert_eq!(verdict, Verdict::Success);
    }

    #[test]
    fn test_absence_phrases_are_noops_for_any_status() {
        for phrase in ABSENT_PHRASES {
            for status in [1, 2, 125, 255] {
                let stderr = format!("error: target {phrase} (code {status})");
                let verdict = classify("cmd", exited(status, &stderr), &Vocabulary::DEFAULT);
                assert_eq!(verdict, Verdict::Noop, "phrase {phrase:?} status {status}");
            }
        }
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let verdict = classify("cmd", exited(1, "NO SUCH PROCESS"), &Vocabulary::DEFAULT);
        assert!(matches!(verdict, Verdict::Fatal(_)));
    }

    #[test]
    fn test_busy_is_fatal_with_flag() {
        let verdict = classify(
            "ctr -n k8s.io container rm c1",
            exited(1, "ctr: cannot delete a container with an existing task: has active task\n"),
            &Vocabulary::DEFAULT,
        );

        let Verdict::Fatal(failure) = verdict else {
            panic!("expected fatal");
        };
        assert!(failure.busy);
        assert_eq!(failure.cause, FailureCause::Exit(1));
        assert!(failure.to_string().contains("has active task"));
    }

    #[test]
    fn test_transport_error_is_fatal() {
        let verdict = classify(
            "systemctl stop kubelet",
            Err(ExecError::Timeout {
                timeout: Duration::from_secs(1),
            }),
            &Vocabulary::SERVICE,
        );

        let Verdict::Fatal(failure) = verdict else {
            panic!("expected fatal");
        };
        assert!(!failure.busy);
        assert!(failure.to_string().contains("could not run"));
    }

    #[test]
    fn test_tool_vocabularies_extend_default() {
        let stderr = "Failed to kill unit etcd.service: Unit etcd.service not loaded.";
        assert_eq!(classify("c", exited(5, stderr), &Vocabulary::SERVICE), Verdict::Noop);

        let stderr = "rpc error: code = NotFound desc = an error occurred";
        assert_eq!(classify("c", exited(1, stderr), &Vocabulary::CRI), Verdict::Noop);
        assert!(matches!(
            classify("c", exited(1, stderr), &Vocabulary::DEFAULT),
            Verdict::Fatal(_)
        ));
    }
}
