//! Idempotent lifecycle engine
//!
//! Drives any [`Target`] through start, stop (graceful then forceful) and
//! remove (stop and retry once when busy). Holds no state between calls.

use std::sync::Arc;
use std::time::Duration;

use hostkeep_exec::{CommandResult, Connector, ExecError, ExecOptions};
use tracing::{debug, info, instrument, warn};

use crate::classify::{Vocabulary, Verdict, classify};
use crate::error::{LifecycleError, Stage};

/// Default timeout for a single lifecycle command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// A remote entity driven through named transition commands
///
/// Identity lives on the remote side; implementors only render commands.
/// Operations a kind does not support return `None`.
pub trait Target: Send + Sync {
    /// Resource kind, e.g. `container`
    fn kind(&self) -> &'static str;

    /// Resource identifier
    fn id(&self) -> &str;

    /// Start command
    fn start_command(&self) -> Option<String> {
        None
    }

    /// Polite termination (SIGTERM or the tool's native stop)
    fn graceful_stop_command(&self) -> Option<String> {
        None
    }

    /// Forced termination (SIGKILL or equivalent)
    fn forceful_stop_command(&self) -> Option<String> {
        None
    }

    /// Removal command
    fn remove_command(&self) -> Option<String> {
        None
    }

    /// Stderr vocabulary of the tool behind the commands
    fn vocabulary(&self) -> &'static Vocabulary {
        &Vocabulary::DEFAULT
    }
}

/// Lifecycle engine bound to one connector
#[derive(Clone)]
pub struct Engine {
    connector: Arc<dyn Connector>,
    options: ExecOptions,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("connector", &self.connector.connector_type())
            .field("options", &self.options)
            .finish()
    }
}

impl Engine {
    /// Create an engine running commands with sudo and the default timeout
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            options: ExecOptions::new()
                .with_sudo(true)
                .with_timeout(DEFAULT_COMMAND_TIMEOUT),
        }
    }

    /// Override execution options
    #[must_use]
    pub fn with_options(mut self, options: ExecOptions) -> Self {
        self.options = options;
        self
    }

    /// Underlying connector
    #[must_use]
    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    /// Input checks done before any remote call
    pub(crate) fn check<T: Target + ?Sized>(&self, target: &T) -> Result<(), LifecycleError> {
        if !self.connector.is_connected() {
            return Err(LifecycleError::NotConnected);
        }
        if target.id().trim().is_empty() {
            return Err(LifecycleError::InvalidInput(format!(
                "{} identifier must not be empty",
                target.kind()
            )));
        }
        Ok(())
    }

    /// Run a command and return its raw result
    ///
    /// # Errors
    /// Returns the connector's transport error.
    pub async fn query(&self, command: &str) -> Result<CommandResult, ExecError> {
        self.connector.exec(command, &self.options).await
    }

    /// Run a command and classify it
    pub async fn run(&self, command: &str, vocabulary: &Vocabulary) -> Verdict {
        let verdict = classify(command, self.query(command).await, vocabulary);
        debug!(command, ?verdict, "classified command");
        verdict
    }

    /// Run one command for `target` and map a fatal verdict to an error
    ///
    /// # Errors
    /// Returns `LifecycleError::Command` tagged with `stage` on a fatal
    /// verdict, or an input error.
    #[instrument(skip(self, target), fields(kind = target.kind(), id = target.id()))]
    pub async fn transition<T: Target + ?Sized>(
        &self,
        target: &T,
        stage: Stage,
        command: &str,
    ) -> Result<(), LifecycleError> {
        self.check(target)?;
        match self.run(command, target.vocabulary()).await {
            Verdict::Success => Ok(()),
            Verdict::Noop => {
                debug!(%stage, "already in desired state");
                Ok(())
            }
            Verdict::Fatal(failure) => Err(command_error(target, stage, failure)),
        }
    }

    /// Start `target`
    ///
    /// # Errors
    /// Returns `LifecycleError::Command` with stage `start` on a fatal
    /// verdict, `Unsupported` if the kind cannot be started.
    pub async fn start<T: Target + ?Sized>(&self, target: &T) -> Result<(), LifecycleError> {
        let command = target
            .start_command()
            .ok_or_else(|| unsupported(target, "start"))?;
        info!(kind = target.kind(), id = target.id(), "starting");
        self.transition(target, Stage::Start, &command).await
    }

    /// Stop `target`, escalating from graceful to forceful
    ///
    /// After a successful graceful stage the engine waits `grace` (a fixed
    /// sleep, no polling), then always sends the forceful command. A no-op
    /// from the graceful stage does not prove teardown, so a fatal forceful
    /// stage is reported either way.
    ///
    /// # Errors
    /// Returns `LifecycleError::Stop` when both stages are fatal,
    /// `LifecycleError::Command` with stage `forceful stop` when only the
    /// forceful stage is, or with stage `graceful stop` for kinds without a
    /// forceful command.
    #[instrument(skip(self, target), fields(kind = target.kind(), id = target.id()))]
    pub async fn stop<T: Target + ?Sized>(
        &self,
        target: &T,
        grace: Duration,
    ) -> Result<(), LifecycleError> {
        self.check(target)?;
        self.escalate(target, grace).await
    }

    async fn escalate<T: Target + ?Sized>(
        &self,
        target: &T,
        grace: Duration,
    ) -> Result<(), LifecycleError> {
        let graceful_command = target
            .graceful_stop_command()
            .ok_or_else(|| unsupported(target, "stop"))?;
        let vocabulary = target.vocabulary();

        info!("stopping");
        let graceful = self.run(&graceful_command, vocabulary).await;

        if matches!(graceful, Verdict::Success) && !grace.is_zero() {
            debug!(?grace, "waiting before forceful stop");
            tokio::time::sleep(grace).await;
        }

        let Some(forceful_command) = target.forceful_stop_command() else {
            return match graceful {
                Verdict::Fatal(failure) => Err(command_error(target, Stage::GracefulStop, failure)),
                Verdict::Success | Verdict::Noop => Ok(()),
            };
        };

        match (graceful, self.run(&forceful_command, vocabulary).await) {
            (_, Verdict::Success | Verdict::Noop) => Ok(()),
            (Verdict::Success | Verdict::Noop, Verdict::Fatal(failure)) => {
                Err(command_error(target, Stage::ForcefulStop, failure))
            }
            (Verdict::Fatal(graceful), Verdict::Fatal(forceful)) => Err(LifecycleError::Stop {
                kind: target.kind(),
                id: target.id().to_string(),
                forceful,
                graceful,
            }),
        }
    }

    /// Remove `target`
    ///
    /// A busy target is stopped without grace and removal is retried exactly
    /// once; the retry's failure is the one reported.
    ///
    /// # Errors
    /// Returns `LifecycleError::Command` with stage `remove` or
    /// `remove retry`.
    #[instrument(skip(self, target), fields(kind = target.kind(), id = target.id()))]
    pub async fn remove<T: Target + ?Sized>(&self, target: &T) -> Result<(), LifecycleError> {
        self.check(target)?;
        let command = target
            .remove_command()
            .ok_or_else(|| unsupported(target, "remove"))?;
        let vocabulary = target.vocabulary();

        info!("removing");
        match self.run(&command, vocabulary).await {
            Verdict::Success | Verdict::Noop => Ok(()),
            Verdict::Fatal(failure) if failure.busy => {
                info!(error = %failure, "target busy, stopping before retrying removal");
                if target.graceful_stop_command().is_some() {
                    if let Err(e) = self.escalate(target, Duration::ZERO).await {
                        warn!(error = %e, "stop before removal retry failed");
                    }
                }

                match self.run(&command, vocabulary).await {
                    Verdict::Success | Verdict::Noop => Ok(()),
                    Verdict::Fatal(failure) => {
                        Err(command_error(target, Stage::RemoveRetry, failure))
                    }
                }
            }
            Verdict::Fatal(failure) => Err(command_error(target, Stage::Remove, failure)),
        }
    }
}

fn command_error<T: Target + ?Sized>(
    target: &T,
    stage: Stage,
    failure: crate::classify::CommandFailure,
) -> LifecycleError {
    LifecycleError::Command {
        kind: target.kind(),
        id: target.id().to_string(),
        stage,
        failure,
    }
}

fn unsupported<T: Target + ?Sized>(target: &T, operation: &'static str) -> LifecycleError {
    LifecycleError::Unsupported {
        kind: target.kind(),
        id: target.id().to_string(),
        operation,
    }
}
