//! hostkeep-facts: host inventory
//!
//! Builds a [`Facts`] snapshot of a machine (OS, hostname, CPU, memory,
//! default routes, package manager, init system) through a
//! [`hostkeep_exec::Connector`].

pub mod detect;
pub mod error;
pub mod gatherer;
pub mod platform;
pub mod types;

pub use error::{DetectError, GatherError, ProbeError};
pub use gatherer::FactGatherer;
pub use platform::OsFamily;
pub use types::{
    CommandTemplate, Facts, InitSystemType, PackageManagerInfo, PackageManagerType, RcTool,
    ServiceInfo,
};
