//! containerd task containers and images through `ctr`

use std::time::Duration;

use tracing::instrument;

use crate::engine::{Engine, Target};
use crate::error::LifecycleError;

/// Namespace kubelet-managed containers live in
pub const DEFAULT_NAMESPACE: &str = "k8s.io";

/// A container with its task, addressed by container ID
#[derive(Debug, Clone)]
pub struct TaskContainer<'a> {
    namespace: &'a str,
    id: &'a str,
}

impl<'a> TaskContainer<'a> {
    /// Container `id` in `namespace`
    #[must_use]
    pub fn new(namespace: &'a str, id: &'a str) -> Self {
        Self { namespace, id }
    }
}

impl Target for TaskContainer<'_> {
    fn kind(&self) -> &'static str {
        "container"
    }

    fn id(&self) -> &str {
        self.id
    }

    fn start_command(&self) -> Option<String> {
        Some(format!("ctr -n {} task start -d {}", self.namespace, self.id))
    }

    fn graceful_stop_command(&self) -> Option<String> {
        Some(format!(
            "ctr -n {} task kill --signal SIGTERM {}",
            self.namespace, self.id
        ))
    }

    fn forceful_stop_command(&self) -> Option<String> {
        Some(format!(
            "ctr -n {} task kill --signal SIGKILL {}",
            self.namespace, self.id
        ))
    }

    fn remove_command(&self) -> Option<String> {
        Some(format!("ctr -n {} container rm {}", self.namespace, self.id))
    }
}

/// An image, addressed by reference
#[derive(Debug, Clone)]
pub struct ContainerImage<'a> {
    namespace: &'a str,
    reference: &'a str,
}

impl Target for ContainerImage<'_> {
    fn kind(&self) -> &'static str {
        "image"
    }

    fn id(&self) -> &str {
        self.reference
    }

    fn remove_command(&self) -> Option<String> {
        Some(format!("ctr -n {} image rm {}", self.namespace, self.reference))
    }
}

/// containerd client
#[derive(Debug, Clone)]
pub struct ContainerdClient {
    engine: Engine,
    namespace: String,
}

impl ContainerdClient {
    /// Client for the default namespace
    pub fn new(engine: Engine) -> Self {
        Self::with_namespace(engine, DEFAULT_NAMESPACE)
    }

    /// Client for a specific namespace
    pub fn with_namespace(engine: Engine, namespace: impl Into<String>) -> Self {
        Self {
            engine,
            namespace: namespace.into(),
        }
    }

    /// Namespace in use
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn container<'a>(&'a self, id: &'a str) -> TaskContainer<'a> {
        TaskContainer::new(&self.namespace, id)
    }

    /// Start a container's task detached
    ///
    /// # Errors
    /// Returns `LifecycleError` on input errors or a fatal start
    #[instrument(skip(self))]
    pub async fn start_container(&self, id: &str) -> Result<(), LifecycleError> {
        self.engine.start(&self.container(id)).await
    }

    /// SIGTERM a container's task, then SIGKILL it after `grace`
    ///
    /// # Errors
    /// Returns `LifecycleError::Stop` if both signals fail
    #[instrument(skip(self))]
    pub async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), LifecycleError> {
        self.engine.stop(&self.container(id), grace).await
    }

    /// Remove a container, killing its task first if it has one
    ///
    /// # Errors
    /// Returns `LifecycleError::Command` with stage `remove` or `remove retry`
    #[instrument(skip(self))]
    pub async fn remove_container(&self, id: &str) -> Result<(), LifecycleError> {
        self.engine.remove(&self.container(id)).await
    }

    /// Remove an image
    ///
    /// # Errors
    /// Returns `LifecycleError::Command` with stage `remove`
    #[instrument(skip(self))]
    pub async fn remove_image(&self, reference: &str) -> Result<(), LifecycleError> {
        let image = ContainerImage {
            namespace: &self.namespace,
            reference,
        };
        self.engine.remove(&image).await
    }
}
