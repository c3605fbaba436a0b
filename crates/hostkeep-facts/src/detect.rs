//! Package manager and init system detection
//!
//! Both procedures only look binaries up and stat paths; they never run
//! commands on the host.

use hostkeep_exec::Connector;
use tracing::{debug, instrument};

use crate::error::DetectError;
use crate::platform::OsFamily;
use crate::types::{PackageManagerInfo, PackageManagerType, ServiceInfo};

/// systemd control binary
pub const SYSTEMD_BINARY: &str = "systemctl";
/// Generic SysV service control binary
pub const SERVICE_BINARY: &str = "service";
/// Legacy init script directory
pub const INIT_SCRIPT_DIR: &str = "/etc/init.d";

const REDHAT_CANDIDATES: &[PackageManagerType] = &[PackageManagerType::Dnf, PackageManagerType::Yum];
const ANY_CANDIDATES: &[PackageManagerType] = &[
    PackageManagerType::Apt,
    PackageManagerType::Dnf,
    PackageManagerType::Yum,
];

/// Detect the package manager
///
/// Debian hosts get apt without probing. Red Hat hosts must have `dnf` or
/// `yum` (in that order). Other hosts take the first of `apt-get`, `dnf`,
/// `yum` on the search path.
///
/// # Errors
/// Returns `DetectError::NoPackageManager` if no candidate is installed.
#[instrument(skip(connector))]
pub async fn package_manager(
    connector: &dyn Connector,
    family: &OsFamily,
) -> Result<PackageManagerInfo, DetectError> {
    let candidates = match family {
        OsFamily::Debian => return Ok(PackageManagerInfo::for_kind(PackageManagerType::Apt)),
        OsFamily::RedHat => REDHAT_CANDIDATES,
        OsFamily::Darwin | OsFamily::Other(_) => ANY_CANDIDATES,
    };

    for kind in candidates {
        match connector.look_path(kind.binary()).await {
            Ok(path) => {
                debug!(%kind, %path, "found package manager");
                return Ok(PackageManagerInfo::for_kind(*kind));
            }
            Err(e) => debug!(%kind, error = %e, "package manager not present"),
        }
    }

    Err(DetectError::NoPackageManager {
        tried: candidates
            .iter()
            .map(|k| k.binary())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Detect the init system
///
/// `systemctl` on the path means systemd. Otherwise an `/etc/init.d`
/// directory means sysvinit, with or without the `service` binary.
///
/// # Errors
/// Returns `DetectError::NoInitSystem` if neither is found, or
/// `DetectError::Probe` if the init script directory cannot be stat'ed.
#[instrument(skip(connector))]
pub async fn init_system(
    connector: &dyn Connector,
    family: &OsFamily,
) -> Result<ServiceInfo, DetectError> {
    if connector.look_path(SYSTEMD_BINARY).await.is_ok() {
        return Ok(ServiceInfo::systemd());
    }

    let has_service = connector.look_path(SERVICE_BINARY).await.is_ok();
    let scripts = connector.stat(INIT_SCRIPT_DIR).await?;

    if scripts.exists && scripts.is_dir {
        if !has_service {
            debug!(dir = INIT_SCRIPT_DIR, "init scripts present without `service` binary");
        }
        return Ok(ServiceInfo::sysvinit(family));
    }

    Err(DetectError::NoInitSystem)
}
