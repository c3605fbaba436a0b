//! OS family resolution and per-family probe commands

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Fully-qualified hostname
pub const HOSTNAME_FQDN: &str = "hostname -f";
/// Short hostname
pub const HOSTNAME_SHORT: &str = "hostname";

const DEBIAN_IDS: &[&str] = &[
    "debian", "ubuntu", "raspbian", "linuxmint", "pop", "kali", "deepin", "uos",
];
const REDHAT_IDS: &[&str] = &[
    "centos",
    "rhel",
    "fedora",
    "rocky",
    "almalinux",
    "ol",
    "amzn",
    "kylin",
    "openeuler",
    "anolis",
];
const DARWIN_IDS: &[&str] = &["darwin", "macos"];

/// Operating system family, resolved once from the OS id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    /// Debian, Ubuntu and derivatives
    Debian,
    /// RHEL, CentOS, Fedora and derivatives
    RedHat,
    /// macOS
    Darwin,
    /// Anything else, keeps the raw id
    Other(String),
}

impl OsFamily {
    /// Classify an os-release style id (case-insensitive)
    #[must_use]
    pub fn from_id(id: &str) -> Self {
        let id = id.trim().to_lowercase();
        if DEBIAN_IDS.contains(&id.as_str()) {
            OsFamily::Debian
        } else if REDHAT_IDS.contains(&id.as_str()) {
            OsFamily::RedHat
        } else if DARWIN_IDS.contains(&id.as_str()) {
            OsFamily::Darwin
        } else {
            OsFamily::Other(id)
        }
    }

    /// Whether the id matched a known family
    #[must_use]
    pub fn is_recognized(&self) -> bool {
        !matches!(self, OsFamily::Other(_))
    }

    /// Probe commands for this family. Unrecognized ids use the Linux set.
    #[must_use]
    pub fn probes(&self) -> &'static ProbeSet {
        match self {
            OsFamily::Darwin => &DARWIN_PROBES,
            OsFamily::Debian | OsFamily::RedHat | OsFamily::Other(_) => &LINUX_PROBES,
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Debian => write!(f, "debian"),
            OsFamily::RedHat => write!(f, "redhat"),
            OsFamily::Darwin => write!(f, "darwin"),
            OsFamily::Other(id) => write!(f, "other({id})"),
        }
    }
}

/// Unit the memory probe reports in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryUnit {
    /// `/proc/meminfo`
    Kibibytes,
    /// `sysctl hw.memsize`
    Bytes,
}

impl MemoryUnit {
    /// Convert a raw reading to MiB, rounding down
    #[must_use]
    pub fn to_mib(self, value: u64) -> u64 {
        match self {
            MemoryUnit::Kibibytes => value / 1024,
            MemoryUnit::Bytes => value / (1024 * 1024),
        }
    }
}

/// Commands used to probe hardware and routes
#[derive(Debug)]
pub struct ProbeSet {
    /// Prints the logical core count
    pub cpu: &'static str,
    /// Prints total memory in `memory_unit`
    pub memory: &'static str,
    /// Unit of the memory reading
    pub memory_unit: MemoryUnit,
    /// Prints the IPv4 default-route source
    pub ipv4_route: &'static str,
    /// Prints the IPv6 default-route source
    pub ipv6_route: &'static str,
}

/// Linux probes
pub static LINUX_PROBES: ProbeSet = ProbeSet {
    cpu: "nproc",
    memory: "grep MemTotal /proc/meminfo",
    memory_unit: MemoryUnit::Kibibytes,
    ipv4_route: "ip -4 route get 1.1.1.1",
    ipv6_route: "ip -6 route get 2606:4700:4700::1111",
};

/// macOS probes
pub static DARWIN_PROBES: ProbeSet = ProbeSet {
    cpu: "sysctl -n hw.ncpu",
    memory: "sysctl -n hw.memsize",
    memory_unit: MemoryUnit::Bytes,
    ipv4_route: "ipconfig getifaddr \"$(route -n get default | awk '/interface:/{print $2}')\"",
    ipv6_route: "ifconfig \"$(route -n get -inet6 default | awk '/interface:/{print $2}')\" inet6 | awk '/inet6/ && !/fe80/ {print $2; exit}'",
};

/// First token of `output` that parses as an unsigned integer
///
/// Accepts both bare numbers (`8192000`) and labelled lines
/// (`MemTotal:  8192000 kB`).
#[must_use]
pub fn parse_first_integer(output: &str) -> Option<u64> {
    output
        .split_whitespace()
        .find_map(|token| token.parse::<u64>().ok())
}

/// Source address from route output
///
/// Accepts a bare address or `ip route get` output, where the address
/// follows the `src` keyword.
#[must_use]
pub fn parse_source_address(output: &str) -> Option<IpAddr> {
    let trimmed = output.trim();
    if let Ok(addr) = trimmed.parse::<IpAddr>() {
        return Some(addr);
    }

    let mut tokens = trimmed.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "src" {
            return tokens.next().and_then(|addr| addr.parse().ok());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_from_id() {
        assert_eq!(OsFamily::from_id("ubuntu"), OsFamily::Debian);
        assert_eq!(OsFamily::from_id("CentOS"), OsFamily::RedHat);
        assert_eq!(OsFamily::from_id("darwin"), OsFamily::Darwin);
        assert_eq!(OsFamily::from_id("alpine"), OsFamily::Other("alpine".to_string()));
    }

    #[test]
    fn test_unknown_family_uses_linux_probes() {
        let family = OsFamily::from_id("alpine");

        assert!(!family.is_recognized());
        assert_eq!(family.probes().cpu, "nproc");
        assert_eq!(OsFamily::Darwin.probes().memory_unit, MemoryUnit::Bytes);
    }

    #[test]
    fn test_memory_normalization() {
        assert_eq!(MemoryUnit::Kibibytes.to_mib(8_192_000), 8000);
        assert_eq!(MemoryUnit::Bytes.to_mib(17_179_869_184), 16384);
    }

    #[test]
    fn test_parse_first_integer() {
        assert_eq!(parse_first_integer("8192000\n"), Some(8_192_000));
        assert_eq!(parse_first_integer("MemTotal:       16318480 kB"), Some(16_318_480));
        assert_eq!(parse_first_integer("n/a"), None);
    }

    #[test]
    fn test_parse_source_address() {
        let route = "1.1.1.1 via 192.168.1.1 dev eth0 src 192.168.1.100 uid 1000\n    cache";

        assert_eq!(
            parse_source_address(route),
            Some("192.168.1.100".parse().unwrap())
        );
        assert_eq!(
            parse_source_address("192.168.1.100\n"),
            Some("192.168.1.100".parse().unwrap())
        );
        assert_eq!(parse_source_address("RTNETLINK answers: Network is unreachable"), None);
    }
}
