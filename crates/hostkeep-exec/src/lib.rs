//! hostkeep-exec: Connector abstraction
//!
//! Defines the capability contract every host handle implements (command
//! execution, OS identification, binary lookup, file access) plus a local
//! implementation backed by `tokio::process`.

pub mod error;
pub mod local;
#[cfg(feature = "mock")]
pub mod mock;
pub mod result;
pub mod traits;

pub use error::ExecError;
pub use local::LocalConnector;
#[cfg(feature = "mock")]
pub use mock::{Reply, ScriptedConnector};
pub use result::{CommandResult, ExecOptions, FileStat, OsInfo};
pub use traits::Connector;
