//! System service management through the detected init system

use std::sync::Arc;
use std::time::Duration;

use hostkeep_exec::{CommandResult, Connector};
use hostkeep_facts::{Facts, InitSystemType, RcTool, ServiceInfo};
use tracing::{debug, info, instrument};

use crate::classify::{CommandFailure, Vocabulary};
use crate::engine::{Engine, Target};
use crate::error::{LifecycleError, Stage};

/// Status output meaning the service runs
const RUNNING_KEYWORDS: &[&str] = &["running", "active"];

/// Status output that contains a running keyword but means the opposite
const STOPPED_KEYWORDS: &[&str] = &["not running", "inactive", "stopped", "dead"];

/// `chkconfig --list` columns for the multi-user runlevels
const CHKCONFIG_ENABLED: &[&str] = &["3:on", "5:on"];

/// One named service rendered through the init system's templates
struct ServiceUnit<'a> {
    info: &'a ServiceInfo,
    name: &'a str,
}

impl Target for ServiceUnit<'_> {
    fn kind(&self) -> &'static str {
        "service"
    }

    fn id(&self) -> &str {
        self.name
    }

    fn start_command(&self) -> Option<String> {
        Some(self.info.start.render(self.name))
    }

    fn graceful_stop_command(&self) -> Option<String> {
        Some(self.info.stop.render(self.name))
    }

    fn forceful_stop_command(&self) -> Option<String> {
        Some(self.info.kill.render(self.name))
    }

    fn vocabulary(&self) -> &'static Vocabulary {
        &Vocabulary::SERVICE
    }
}

/// The init system itself, target of unit reloads
struct InitDaemon(InitSystemType);

impl Target for InitDaemon {
    fn kind(&self) -> &'static str {
        "init system"
    }

    fn id(&self) -> &str {
        match self.0 {
            InitSystemType::Systemd => "systemd",
            InitSystemType::Sysvinit => "sysvinit",
        }
    }

    fn vocabulary(&self) -> &'static Vocabulary {
        &Vocabulary::SERVICE
    }
}

/// Service manager
///
/// Controls services with whichever init system fact gathering found.
#[derive(Debug, Clone)]
pub struct ServiceManager {
    engine: Engine,
    info: ServiceInfo,
}

impl ServiceManager {
    /// Create a manager for an explicit init system
    pub fn new(engine: Engine, info: ServiceInfo) -> Self {
        Self { engine, info }
    }

    /// Create a manager from gathered facts
    ///
    /// # Errors
    /// Returns `LifecycleError::NoInitSystem` if the facts carry none
    pub fn from_facts(connector: Arc<dyn Connector>, facts: &Facts) -> Result<Self, LifecycleError> {
        let info = facts
            .init_system
            .clone()
            .ok_or(LifecycleError::NoInitSystem)?;
        Ok(Self::new(Engine::new(connector), info))
    }

    /// Init system in use
    #[must_use]
    pub fn init_system(&self) -> InitSystemType {
        self.info.kind
    }

    fn unit<'a>(&'a self, name: &'a str) -> ServiceUnit<'a> {
        ServiceUnit {
            info: &self.info,
            name,
        }
    }

    /// Start a service
    ///
    /// # Errors
    /// Returns `LifecycleError` on input errors or a fatal start
    pub async fn start(&self, name: &str) -> Result<(), LifecycleError> {
        self.engine.start(&self.unit(name)).await
    }

    /// Stop a service, killing it after `grace`
    ///
    /// # Errors
    /// Returns `LifecycleError::Stop` if both stop and kill fail
    pub async fn stop(&self, name: &str, grace: Duration) -> Result<(), LifecycleError> {
        self.engine.stop(&self.unit(name), grace).await
    }

    /// Restart a service
    ///
    /// # Errors
    /// Returns `LifecycleError::Command` with stage `restart`
    pub async fn restart(&self, name: &str) -> Result<(), LifecycleError> {
        let unit = self.unit(name);
        info!(service = name, "restarting service");
        self.engine
            .transition(&unit, Stage::Restart, &self.info.restart.render(name))
            .await
    }

    /// Start a service on boot
    ///
    /// # Errors
    /// Returns `LifecycleError::Command` with stage `enable`
    pub async fn enable(&self, name: &str) -> Result<(), LifecycleError> {
        let unit = self.unit(name);
        self.engine
            .transition(&unit, Stage::Enable, &self.info.enable.render(name))
            .await
    }

    /// Stop starting a service on boot
    ///
    /// # Errors
    /// Returns `LifecycleError::Command` with stage `disable`
    pub async fn disable(&self, name: &str) -> Result<(), LifecycleError> {
        let unit = self.unit(name);
        self.engine
            .transition(&unit, Stage::Disable, &self.info.disable.render(name))
            .await
    }

    /// Reload unit definitions; nothing to do without systemd
    ///
    /// # Errors
    /// Returns `LifecycleError::Command` with stage `daemon reload`
    pub async fn daemon_reload(&self) -> Result<(), LifecycleError> {
        let Some(template) = &self.info.daemon_reload else {
            debug!(init = %self.info.kind, "no daemon reload for this init system");
            return Ok(());
        };
        self.engine
            .transition(
                &InitDaemon(self.info.kind),
                Stage::DaemonReload,
                template.as_str(),
            )
            .await
    }

    /// Whether a service is running
    ///
    /// # Errors
    /// Returns `LifecycleError` on input or transport errors
    #[instrument(skip(self))]
    pub async fn is_active(&self, name: &str) -> Result<bool, LifecycleError> {
        let output = self.status(name, &self.info.is_active.render(name)).await?;
        let active = match self.info.kind {
            InitSystemType::Systemd => output.success(),
            InitSystemType::Sysvinit => {
                output.success() && reports_running(&output.combined_output())
            }
        };
        debug!(service = name, active, "queried service state");
        Ok(active)
    }

    /// Whether a service starts on boot
    ///
    /// # Errors
    /// Returns `LifecycleError` on input or transport errors
    #[instrument(skip(self))]
    pub async fn is_enabled(&self, name: &str) -> Result<bool, LifecycleError> {
        let output = self.status(name, &self.info.is_enabled.render(name)).await?;
        let enabled = match self.info.rc_tool {
            Some(RcTool::Chkconfig) => {
                output.success()
                    && CHKCONFIG_ENABLED
                        .iter()
                        .any(|column| output.stdout.contains(column))
            }
            Some(RcTool::UpdateRcD) | None => output.success(),
        };
        debug!(service = name, enabled, "queried boot state");
        Ok(enabled)
    }

    async fn status(&self, name: &str, command: &str) -> Result<CommandResult, LifecycleError> {
        self.engine.check(&self.unit(name))?;
        self.engine
            .query(command)
            .await
            .map_err(|e| LifecycleError::Command {
                kind: "service",
                id: name.to_string(),
                stage: Stage::Status,
                failure: CommandFailure::transport(command, e),
            })
    }
}

/// Textual state check for `service <name> status`
fn reports_running(output: &str) -> bool {
    let output = output.to_lowercase();
    if STOPPED_KEYWORDS.iter().any(|k| output.contains(k)) {
        return false;
    }
    RUNNING_KEYWORDS.iter().any(|k| output.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_running() {
        assert!(reports_running("kubelet is running"));
        assert!(reports_running(" * containerd active (pid 412)"));
        assert!(!reports_running("kubelet is not running"));
        assert!(!reports_running("Active: inactive (dead)"));
        assert!(!reports_running("unknown service"));
    }
}
