//! hostkeep-lifecycle: idempotent lifecycle operations
//!
//! Classifies remote command results and drives services, containerd
//! containers and CRI pods through start, stop and remove so that repeating
//! an operation is always safe.

pub mod classify;
pub mod config_patch;
pub mod containerd;
pub mod cri;
pub mod engine;
pub mod error;
pub mod service;

pub use classify::{CommandFailure, FailureCause, Verdict, Vocabulary, classify};
pub use config_patch::{PatchError, PatchOutcome, set_toml_value};
pub use containerd::{ContainerdClient, DEFAULT_NAMESPACE};
pub use cri::CriClient;
pub use engine::{DEFAULT_COMMAND_TIMEOUT, Engine, Target};
pub use error::{LifecycleError, Stage};
pub use service::ServiceManager;
