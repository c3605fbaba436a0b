//! Pods, containers and images through `crictl`

use std::time::Duration;

use tracing::instrument;

use crate::classify::Vocabulary;
use crate::engine::{Engine, Target};
use crate::error::LifecycleError;

/// A pod sandbox
///
/// `crictl stopp` has no forceful variant.
#[derive(Debug, Clone, Copy)]
pub struct PodSandbox<'a>(pub &'a str);

impl Target for PodSandbox<'_> {
    fn kind(&self) -> &'static str {
        "pod"
    }

    fn id(&self) -> &str {
        self.0
    }

    fn graceful_stop_command(&self) -> Option<String> {
        Some(format!("crictl stopp {}", self.0))
    }

    fn remove_command(&self) -> Option<String> {
        Some(format!("crictl rmp {}", self.0))
    }

    fn vocabulary(&self) -> &'static Vocabulary {
        &Vocabulary::CRI
    }
}

/// A CRI container
#[derive(Debug, Clone, Copy)]
pub struct CriContainer<'a>(pub &'a str);

impl Target for CriContainer<'_> {
    fn kind(&self) -> &'static str {
        "container"
    }

    fn id(&self) -> &str {
        self.0
    }

    fn start_command(&self) -> Option<String> {
        Some(format!("crictl start {}", self.0))
    }

    fn graceful_stop_command(&self) -> Option<String> {
        Some(format!("crictl stop {}", self.0))
    }

    fn forceful_stop_command(&self) -> Option<String> {
        Some(format!("crictl stop --timeout 0 {}", self.0))
    }

    fn remove_command(&self) -> Option<String> {
        Some(format!("crictl rm {}", self.0))
    }

    fn vocabulary(&self) -> &'static Vocabulary {
        &Vocabulary::CRI
    }
}

/// A CRI image
#[derive(Debug, Clone, Copy)]
pub struct CriImage<'a>(pub &'a str);

impl Target for CriImage<'_> {
    fn kind(&self) -> &'static str {
        "image"
    }

    fn id(&self) -> &str {
        self.0
    }

    fn remove_command(&self) -> Option<String> {
        Some(format!("crictl rmi {}", self.0))
    }

    fn vocabulary(&self) -> &'static Vocabulary {
        &Vocabulary::CRI
    }
}

/// CRI client
#[derive(Debug, Clone)]
pub struct CriClient {
    engine: Engine,
}

impl CriClient {
    /// Create a new CRI client
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Stop a pod sandbox
    ///
    /// # Errors
    /// Returns `LifecycleError::Command` with stage `graceful stop`
    #[instrument(skip(self))]
    pub async fn stop_pod(&self, id: &str) -> Result<(), LifecycleError> {
        self.engine.stop(&PodSandbox(id), Duration::ZERO).await
    }

    /// Remove a pod sandbox, stopping it first if it still runs
    ///
    /// # Errors
    /// Returns `LifecycleError::Command` with stage `remove` or `remove retry`
    #[instrument(skip(self))]
    pub async fn remove_pod(&self, id: &str) -> Result<(), LifecycleError> {
        self.engine.remove(&PodSandbox(id)).await
    }

    /// Start a container
    ///
    /// # Errors
    /// Returns `LifecycleError` on input errors or a fatal start
    #[instrument(skip(self))]
    pub async fn start_container(&self, id: &str) -> Result<(), LifecycleError> {
        self.engine.start(&CriContainer(id)).await
    }

    /// Stop a container, then stop it with no timeout after `grace`
    ///
    /// # Errors
    /// Returns `LifecycleError::Stop` if both stages fail
    #[instrument(skip(self))]
    pub async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), LifecycleError> {
        self.engine.stop(&CriContainer(id), grace).await
    }

    /// Remove a container
    ///
    /// # Errors
    /// Returns `LifecycleError::Command` with stage `remove` or `remove retry`
    #[instrument(skip(self))]
    pub async fn remove_container(&self, id: &str) -> Result<(), LifecycleError> {
        self.engine.remove(&CriContainer(id)).await
    }

    /// Remove an image
    ///
    /// # Errors
    /// Returns `LifecycleError::Command` with stage `remove`
    #[instrument(skip(self))]
    pub async fn remove_image(&self, reference: &str) -> Result<(), LifecycleError> {
        self.engine.remove(&CriImage(reference)).await
    }
}
