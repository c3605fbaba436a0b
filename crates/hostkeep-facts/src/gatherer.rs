//! Fact gathering
//!
//! OS identity is read first, then hostname, hardware and routes are probed
//! in parallel tasks, and finally the capability detectors run in sequence.

use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use hostkeep_exec::{Connector, ExecOptions};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::detect;
use crate::error::{GatherError, ProbeError};
use crate::platform::{
    HOSTNAME_FQDN, HOSTNAME_SHORT, OsFamily, ProbeSet, parse_first_integer, parse_source_address,
};
use crate::types::Facts;

/// Default per-command timeout for probes
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Fact gatherer
///
/// Holds no state between calls; every [`FactGatherer::gather`] re-probes.
pub struct FactGatherer {
    connector: Arc<dyn Connector>,
    timeout: Duration,
    cancel: CancellationToken,
}

/// Output of one probe task. Each variant owns disjoint `Facts` fields.
#[derive(Debug)]
enum Fragment {
    Hostname(String),
    Resources {
        cpu: u32,
        memory_mib: u64,
    },
    Routes {
        ipv4: Option<IpAddr>,
        ipv6: Option<IpAddr>,
        warnings: Vec<String>,
    },
}

impl Fragment {
    fn merge_into(self, facts: &mut Facts) {
        match self {
            Fragment::Hostname(name) => facts.hostname = name,
            Fragment::Resources { cpu, memory_mib } => {
                facts.total_cpu = cpu;
                facts.total_memory_mib = memory_mib;
            }
            Fragment::Routes {
                ipv4,
                ipv6,
                warnings,
            } => {
                facts.ipv4_default = ipv4;
                facts.ipv6_default = ipv6;
                facts.warnings.extend(warnings);
            }
        }
    }
}

impl FactGatherer {
    /// Create a gatherer for the given connector
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            timeout: DEFAULT_PROBE_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    /// Set per-command timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Tie the gather to a caller-owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Gather facts
    ///
    /// # Errors
    /// - `GatherError::NotConnected` before any probing
    /// - `GatherError::OsIdentity` if the OS cannot be identified
    /// - `GatherError::Probes` if hostname or CPU/memory probing failed or
    ///   the gather was cancelled; the error carries the partial facts
    ///
    /// Package manager, init system and route failures only add warnings.
    #[instrument(skip(self), fields(connector = self.connector.connector_type()))]
    pub async fn gather(&self) -> Result<Facts, GatherError> {
        if !self.connector.is_connected() {
            return Err(GatherError::NotConnected);
        }

        let os = self
            .connector
            .os_info()
            .await
            .map_err(GatherError::OsIdentity)?;
        let family = OsFamily::from_id(&os.id);
        debug!(os = %os.id, %family, "identified operating system");

        let mut facts = Facts::new(os);
        if !family.is_recognized() {
            let message = format!(
                "unrecognized OS id {:?}, probing with Linux commands",
                facts.os.id
            );
            warn!("{message}");
            facts.warnings.push(message);
        }

        let errors = self.run_probes(family.probes(), &mut facts).await;
        if !errors.is_empty() {
            warn!(failed = errors.len(), "fact probes failed");
            return Err(GatherError::Probes {
                partial: Box::new(facts),
                errors,
            });
        }

        self.detect_capabilities(&family, &mut facts).await;

        info!(
            hostname = %facts.hostname,
            cpu = facts.total_cpu,
            memory_mib = facts.total_memory_mib,
            "facts gathered"
        );

        Ok(facts)
    }

    /// Fan out the independent probes and merge what comes back.
    ///
    /// The first failure cancels the remaining tasks; all tasks are drained
    /// before returning so no work outlives the call.
    async fn run_probes(&self, probes: &'static ProbeSet, facts: &mut Facts) -> Vec<ProbeError> {
        let token = self.cancel.child_token();
        let opts = ExecOptions::new().with_timeout(self.timeout);

        let mut tasks: JoinSet<Result<Fragment, ProbeError>> = JoinSet::new();
        tasks.spawn(cancellable(
            token.clone(),
            probe_hostname(Arc::clone(&self.connector), opts),
        ));
        tasks.spawn(cancellable(
            token.clone(),
            probe_resources(Arc::clone(&self.connector), probes, opts),
        ));
        tasks.spawn(cancellable(
            token.clone(),
            probe_routes(Arc::clone(&self.connector), probes, opts),
        ));

        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.unwrap_or_else(|e| Err(ProbeError::Aborted(e.to_string())));
            match outcome {
                Ok(fragment) => fragment.merge_into(facts),
                Err(ProbeError::Cancelled) if !errors.is_empty() => {
                    debug!("sibling probe cancelled after earlier failure");
                }
                Err(e) => {
                    if errors.is_empty() {
                        debug!(error = %e, "probe failed, cancelling siblings");
                        token.cancel();
                    }
                    errors.push(e);
                }
            }
        }

        errors
    }

    async fn detect_capabilities(&self, family: &OsFamily, facts: &mut Facts) {
        match detect::package_manager(self.connector.as_ref(), family).await {
            Ok(info) => {
                debug!(kind = %info.kind, "detected package manager");
                facts.package_manager = Some(info);
            }
            Err(e) => {
                warn!(error = %e, "package manager detection failed");
                facts.warnings.push(format!("package manager: {e}"));
            }
        }

        match detect::init_system(self.connector.as_ref(), family).await {
            Ok(info) => {
                debug!(kind = %info.kind, "detected init system");
                facts.init_system = Some(info);
            }
            Err(e) => {
                warn!(error = %e, "init system detection failed");
                facts.warnings.push(format!("init system: {e}"));
            }
        }
    }
}

async fn cancellable<F>(token: CancellationToken, probe: F) -> Result<Fragment, ProbeError>
where
    F: Future<Output = Result<Fragment, ProbeError>>,
{
    tokio::select! {
        biased;
        () = token.cancelled() => Err(ProbeError::Cancelled),
        result = probe => result,
    }
}

/// Run a probe command and return its trimmed, non-empty stdout
async fn run_stdout(
    connector: &dyn Connector,
    command: &str,
    opts: &ExecOptions,
) -> Result<String, ProbeError> {
    let result = connector
        .exec(command, opts)
        .await
        .map_err(|e| ProbeError::Command {
            command: command.to_string(),
            message: e.to_string(),
        })?;

    if !result.success() {
        return Err(ProbeError::Command {
            command: command.to_string(),
            message: format!("exit status {}: {}", result.status, result.stderr.trim()),
        });
    }

    let stdout = result.stdout.trim();
    if stdout.is_empty() {
        return Err(ProbeError::Command {
            command: command.to_string(),
            message: "empty output".to_string(),
        });
    }

    Ok(stdout.to_string())
}

async fn probe_hostname(
    connector: Arc<dyn Connector>,
    opts: ExecOptions,
) -> Result<Fragment, ProbeError> {
    let fqdn = match run_stdout(connector.as_ref(), HOSTNAME_FQDN, &opts).await {
        Ok(name) => return Ok(Fragment::Hostname(name)),
        Err(e) => {
            debug!(error = %e, "fully-qualified hostname unavailable, trying short form");
            e
        }
    };

    match run_stdout(connector.as_ref(), HOSTNAME_SHORT, &opts).await {
        Ok(name) => Ok(Fragment::Hostname(name)),
        Err(short) => Err(ProbeError::Hostname {
            fqdn: Box::new(fqdn),
            short: Box::new(short),
        }),
    }
}

async fn probe_resources(
    connector: Arc<dyn Connector>,
    probes: &'static ProbeSet,
    opts: ExecOptions,
) -> Result<Fragment, ProbeError> {
    let cpu_output = run_stdout(connector.as_ref(), probes.cpu, &opts).await?;
    let cpu = parse_first_integer(&cpu_output)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| ProbeError::Parse {
            command: probes.cpu.to_string(),
            expected: "core count",
            output: cpu_output.clone(),
        })?;

    let memory_output = run_stdout(connector.as_ref(), probes.memory, &opts).await?;
    let memory = parse_first_integer(&memory_output).ok_or_else(|| ProbeError::Parse {
        command: probes.memory.to_string(),
        expected: "memory size",
        output: memory_output.clone(),
    })?;

    Ok(Fragment::Resources {
        cpu,
        memory_mib: probes.memory_unit.to_mib(memory),
    })
}

async fn probe_routes(
    connector: Arc<dyn Connector>,
    probes: &'static ProbeSet,
    opts: ExecOptions,
) -> Result<Fragment, ProbeError> {
    let mut warnings = Vec::new();
    let ipv4 = default_source(connector.as_ref(), probes.ipv4_route, &opts, &mut warnings).await;
    let ipv6 = default_source(connector.as_ref(), probes.ipv6_route, &opts, &mut warnings).await;

    Ok(Fragment::Routes {
        ipv4,
        ipv6,
        warnings,
    })
}

async fn default_source(
    connector: &dyn Connector,
    command: &str,
    opts: &ExecOptions,
    warnings: &mut Vec<String>,
) -> Option<IpAddr> {
    let output = match run_stdout(connector, command, opts).await {
        Ok(output) => output,
        Err(e) => {
            warn!(error = %e, "default route probe failed");
            warnings.push(format!("default route: {e}"));
            return None;
        }
    };

    let addr = parse_source_address(&output);
    if addr.is_none() {
        warn!(command, output = %output, "no source address in route output");
        warnings.push(format!("default route: no source address in output of `{command}`"));
    }
    addr
}

#[cfg(test)]
mod tests {
    use hostkeep_exec::{ExecError, Reply, ScriptedConnector};

    use super::*;
    use crate::platform::LINUX_PROBES;

    fn linux_host(os: &str) -> ScriptedConnector {
        linux_host_with_cpu(os, Reply::ok("8\n"))
    }

    fn linux_host_with_cpu(os: &str, cpu: Reply) -> ScriptedConnector {
        ScriptedConnector::new(os)
            .on(HOSTNAME_FQDN, Reply::ok("node1.cluster.local\n"))
            .on(LINUX_PROBES.cpu, cpu)
            .on(LINUX_PROBES.memory, Reply::ok("MemTotal:       16384000 kB\n"))
            .on(LINUX_PROBES.ipv4_route, Reply::ok("10.0.0.5"))
            .on(LINUX_PROBES.ipv6_route, Reply::fail(2, "RTNETLINK answers: Network is unreachable"))
            .with_binary("systemctl")
    }

    #[tokio::test]
    async fn test_not_connected_probes_nothing() {
        let connector = Arc::new(linux_host("ubuntu").disconnected());
        let gatherer = FactGatherer::new(connector.clone());

        let err = gatherer.gather().await.unwrap_err();

        assert!(matches!(err, GatherError::NotConnected));
        assert!(connector.commands().is_empty());
    }

    #[tokio::test]
    async fn test_os_failure_aborts() {
        let connector = Arc::new(
            linux_host("ubuntu").with_os_error(ExecError::OsDetection("no os-release".into())),
        );
        let gatherer = FactGatherer::new(connector.clone());

        let err = gatherer.gather().await.unwrap_err();

        assert!(matches!(err, GatherError::OsIdentity(_)));
        assert!(err.partial().is_none());
        assert!(connector.commands().is_empty());
    }

    #[tokio::test]
    async fn test_route_failure_is_warning() {
        let gatherer = FactGatherer::new(Arc::new(linux_host("ubuntu")));

        let facts = gatherer.gather().await.unwrap();

        assert_eq!(facts.ipv4_default, Some("10.0.0.5".parse().unwrap()));
        assert_eq!(facts.ipv6_default, None);
        assert_eq!(facts.total_memory_mib, 16000);
        assert!(facts.warnings.iter().any(|w| w.starts_with("default route")));
    }

    #[tokio::test]
    async fn test_unparseable_cpu_fails_with_partial_facts() {
        let connector = linux_host_with_cpu("ubuntu", Reply::ok("lots"));
        let gatherer = FactGatherer::new(Arc::new(connector));

        let err = gatherer.gather().await.unwrap_err();
        let partial = err.partial().unwrap();

        assert_eq!(partial.os.id, "ubuntu");
        assert!(partial.package_manager.is_none());
        let GatherError::Probes { errors, .. } = &err else {
            panic!("expected probe error, got {err:?}");
        };
        assert!(matches!(errors[0], ProbeError::Parse { .. }));
    }
}
