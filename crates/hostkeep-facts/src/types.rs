//! Facts type definitions

use std::fmt;
use std::net::IpAddr;

use hostkeep_exec::OsInfo;
use serde::{Deserialize, Serialize};

use crate::platform::OsFamily;

// ============================================================================
// Facts
// ============================================================================

/// Snapshot of a host's identity, hardware and management tooling
///
/// Built once per gather and never mutated by the crates afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facts {
    /// Operating system as reported by the connector
    pub os: OsInfo,
    /// Fully-qualified hostname when available, else the short name
    pub hostname: String,
    /// Logical CPU cores
    pub total_cpu: u32,
    /// Total memory in MiB
    pub total_memory_mib: u64,
    /// Source address used for IPv4 default-route traffic
    pub ipv4_default: Option<IpAddr>,
    /// Source address used for IPv6 default-route traffic
    pub ipv6_default: Option<IpAddr>,
    /// Detected package manager
    pub package_manager: Option<PackageManagerInfo>,
    /// Detected init system
    pub init_system: Option<ServiceInfo>,
    /// Non-fatal problems met while gathering
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Facts {
    /// Empty facts for a host with the given OS
    #[must_use]
    pub fn new(os: OsInfo) -> Self {
        Self {
            os,
            hostname: String::new(),
            total_cpu: 0,
            total_memory_mib: 0,
            ipv4_default: None,
            ipv6_default: None,
            package_manager: None,
            init_system: None,
            warnings: Vec::new(),
        }
    }

    /// OS family derived from the OS id
    #[must_use]
    pub fn os_family(&self) -> OsFamily {
        OsFamily::from_id(&self.os.id)
    }
}

// ============================================================================
// Command templates
// ============================================================================

/// Shell command with at most one `{}` placeholder
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate(String);

impl CommandTemplate {
    /// Placeholder token substituted by [`CommandTemplate::render`]
    pub const PLACEHOLDER: &'static str = "{}";

    /// Wrap a template string
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Substitute `arg` for the placeholder. Templates without one are
    /// returned unchanged.
    #[must_use]
    pub fn render(&self, arg: &str) -> String {
        self.0.replacen(Self::PLACEHOLDER, arg, 1)
    }

    /// Raw template text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Package managers
// ============================================================================

/// Package manager type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManagerType {
    /// APT (Debian/Ubuntu)
    Apt,
    /// YUM (older RHEL/CentOS)
    Yum,
    /// DNF (Fedora/RHEL 8+)
    Dnf,
}

impl PackageManagerType {
    /// Binary probed for during detection
    #[must_use]
    pub fn binary(self) -> &'static str {
        match self {
            PackageManagerType::Apt => "apt-get",
            PackageManagerType::Yum => "yum",
            PackageManagerType::Dnf => "dnf",
        }
    }
}

impl fmt::Display for PackageManagerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageManagerType::Apt => write!(f, "apt"),
            PackageManagerType::Yum => write!(f, "yum"),
            PackageManagerType::Dnf => write!(f, "dnf"),
        }
    }
}

/// Package manager with its command templates
///
/// `install`, `remove` and `query` take package name(s); `update` and
/// `clean` take no argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManagerInfo {
    /// Which package manager
    pub kind: PackageManagerType,
    /// Refresh repository metadata
    pub update: CommandTemplate,
    /// Install package(s)
    pub install: CommandTemplate,
    /// Remove package(s)
    pub remove: CommandTemplate,
    /// Check whether a package is installed
    pub query: CommandTemplate,
    /// Drop cached downloads
    pub clean: CommandTemplate,
}

impl PackageManagerInfo {
    /// Templates for the given package manager
    #[must_use]
    pub fn for_kind(kind: PackageManagerType) -> Self {
        match kind {
            PackageManagerType::Apt => Self {
                kind,
                update: CommandTemplate::new("apt-get update"),
                install: CommandTemplate::new(
                    "DEBIAN_FRONTEND=noninteractive apt-get install -y {}",
                ),
                remove: CommandTemplate::new("DEBIAN_FRONTEND=noninteractive apt-get remove -y {}"),
                query: CommandTemplate::new("dpkg -s {}"),
                clean: CommandTemplate::new("apt-get clean"),
            },
            PackageManagerType::Yum | PackageManagerType::Dnf => {
                let tool = kind.binary();
                Self {
                    kind,
                    update: CommandTemplate::new(format!("{tool} makecache")),
                    install: CommandTemplate::new(format!("{tool} install -y {{}}")),
                    remove: CommandTemplate::new(format!("{tool} remove -y {{}}")),
                    query: CommandTemplate::new("rpm -q {}"),
                    clean: CommandTemplate::new(format!("{tool} clean all")),
                }
            }
        }
    }
}

// ============================================================================
// Init systems
// ============================================================================

/// Init system type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitSystemType {
    /// systemd
    Systemd,
    /// SysV init scripts
    Sysvinit,
}

impl fmt::Display for InitSystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitSystemType::Systemd => write!(f, "systemd"),
            InitSystemType::Sysvinit => write!(f, "sysvinit"),
        }
    }
}

/// Tool managing SysV runlevel links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RcTool {
    /// Debian family
    UpdateRcD,
    /// Red Hat family and everything else
    Chkconfig,
}

/// Init system with per-service command templates
///
/// Every template takes the service name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Which init system
    pub kind: InitSystemType,
    /// Runlevel tool, sysvinit only
    pub rc_tool: Option<RcTool>,
    /// Start the service
    pub start: CommandTemplate,
    /// Stop the service gracefully
    pub stop: CommandTemplate,
    /// Kill the service's processes
    pub kill: CommandTemplate,
    /// Restart the service
    pub restart: CommandTemplate,
    /// Start on boot
    pub enable: CommandTemplate,
    /// Do not start on boot
    pub disable: CommandTemplate,
    /// Query whether the service runs
    pub is_active: CommandTemplate,
    /// Query whether the service starts on boot
    pub is_enabled: CommandTemplate,
    /// Reload unit definitions; systemd only
    pub daemon_reload: Option<CommandTemplate>,
}

impl ServiceInfo {
    /// systemd templates
    #[must_use]
    pub fn systemd() -> Self {
        Self {
            kind: InitSystemType::Systemd,
            rc_tool: None,
            start: CommandTemplate::new("systemctl start {}"),
            stop: CommandTemplate::new("systemctl stop {}"),
            kill: CommandTemplate::new("systemctl kill --signal=SIGKILL {}"),
            restart: CommandTemplate::new("systemctl restart {}"),
            enable: CommandTemplate::new("systemctl enable {}"),
            disable: CommandTemplate::new("systemctl disable {}"),
            is_active: CommandTemplate::new("systemctl is-active --quiet {}"),
            is_enabled: CommandTemplate::new("systemctl is-enabled --quiet {}"),
            daemon_reload: Some(CommandTemplate::new("systemctl daemon-reload")),
        }
    }

    /// SysV templates; boot persistence depends on the OS family
    #[must_use]
    pub fn sysvinit(family: &OsFamily) -> Self {
        let (rc_tool, enable, disable, is_enabled) = match family {
            OsFamily::Debian => (
                RcTool::UpdateRcD,
                "update-rc.d {} defaults",
                "update-rc.d -f {} remove",
                "ls /etc/rc2.d/S[0-9][0-9]{}",
            ),
            _ => (
                RcTool::Chkconfig,
                "chkconfig {} on",
                "chkconfig {} off",
                "chkconfig --list {}",
            ),
        };

        Self {
            kind: InitSystemType::Sysvinit,
            rc_tool: Some(rc_tool),
            start: CommandTemplate::new("service {} start"),
            stop: CommandTemplate::new("service {} stop"),
            kill: CommandTemplate::new("killall -s KILL {}"),
            restart: CommandTemplate::new("service {} restart"),
            enable: CommandTemplate::new(enable),
            disable: CommandTemplate::new(disable),
            is_active: CommandTemplate::new("service {} status"),
            is_enabled: CommandTemplate::new(is_enabled),
            daemon_reload: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_template() {
        let template = CommandTemplate::new("systemctl restart {}");
        assert_eq!(template.render("containerd"), "systemctl restart containerd");

        let bare = CommandTemplate::new("apt-get update");
        assert_eq!(bare.render("ignored"), "apt-get update");
    }

    #[test]
    fn test_yum_templates() {
        let info = PackageManagerInfo::for_kind(PackageManagerType::Yum);

        assert_eq!(info.install.render("socat conntrack"), "yum install -y socat conntrack");
        assert_eq!(info.clean.as_str(), "yum clean all");
    }

    #[test]
    fn test_sysvinit_templates_follow_family() {
        let debian = ServiceInfo::sysvinit(&OsFamily::Debian);
        let redhat = ServiceInfo::sysvinit(&OsFamily::RedHat);

        assert_eq!(debian.enable.render("ntp"), "update-rc.d ntp defaults");
        assert_eq!(redhat.enable.render("ntpd"), "chkconfig ntpd on");
        assert_eq!(redhat.rc_tool, Some(RcTool::Chkconfig));
        assert!(debian.daemon_reload.is_none());
    }
}
