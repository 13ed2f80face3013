//! Isolated execution containers and the capability seam over them.

mod docker;

pub use docker::DockerContainerHost;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to initialize container pool: {0}")]
    Initialization(String),
    /// The pool is shutting down; no container will become available.
    #[error("container pool exhausted")]
    Exhausted,
    #[error("container I/O failed: {0}")]
    Io(String),
    /// The deadline fired before the command returned.
    #[error("command timed out")]
    Timeout,
    #[error("failed to execute command in container: {0}")]
    Execution(String),
}

/// Output of one command run inside a container.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A pool of pre-warmed, resource-capped execution containers.
///
/// At most one worker possesses a container at a time: `acquire` flips an
/// idle container to busy and `release` returns it. Use
/// [`ContainerLease`] rather than calling `release` by hand.
#[async_trait]
pub trait ContainerHost: Send + Sync {
    /// Blocks until any container is idle and flips it to busy. Fails
    /// with [`SandboxError::Exhausted`] once the host is shutting down.
    async fn acquire(&self) -> Result<String, SandboxError>;

    /// Returns a container to the idle set. Idempotent.
    fn release(&self, container_id: &str);

    /// Places `contents` at `dir/name` inside the container.
    async fn copy_in(
        &self,
        container_id: &str,
        dir: &str,
        name: &str,
        contents: &[u8],
        timeout: Duration,
    ) -> Result<(), SandboxError>;

    /// Runs `command` in a shell inside the container, feeding `stdin`.
    /// The deadline is enforced; an expired deadline yields
    /// [`SandboxError::Timeout`].
    async fn exec(
        &self,
        container_id: &str,
        command: &str,
        stdin: Option<&str>,
        timeout: Duration,
    ) -> Result<ExecOutput, SandboxError>;

    /// Stops lending containers and tears the pool down. Blocked
    /// acquirers observe [`SandboxError::Exhausted`].
    async fn shutdown(&self);
}

/// Scoped possession of one container.
///
/// Dropping the lease releases the container on every exit path,
/// including unwinding out of a panicking job.
pub struct ContainerLease {
    host: Arc<dyn ContainerHost>,
    container_id: String,
}

impl ContainerLease {
    pub async fn acquire(host: Arc<dyn ContainerHost>) -> Result<Self, SandboxError> {
        let container_id = host.acquire().await?;
        Ok(Self { host, container_id })
    }

    pub fn id(&self) -> &str {
        &self.container_id
    }
}

impl Drop for ContainerLease {
    fn drop(&mut self) {
        self.host.release(&self.container_id);
    }
}
