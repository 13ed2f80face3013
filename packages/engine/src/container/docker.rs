use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::{ContainerHost, ExecOutput, SandboxError};
use crate::config::EngineConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ContainerState {
    Idle,
    Busy,
}

/// Container pool backed by the local Docker daemon.
///
/// Containers are started detached with the configured memory cap and CPU
/// share and kept alive; commands run through `docker exec -i ... sh -c`
/// with stdin piped. One mutex guards the id-to-state table; the
/// semaphore makes `acquire` block until a container is idle.
pub struct DockerContainerHost {
    docker_bin: String,
    states: Mutex<HashMap<String, ContainerState>>,
    idle: Semaphore,
}

impl DockerContainerHost {
    /// Pre-warms `count` containers. Fails closed: if any container
    /// cannot be started, the ones already running are removed and the
    /// error is returned.
    pub async fn initialize(config: &EngineConfig, count: usize) -> Result<Self, SandboxError> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            match start_container(config).await {
                Ok(id) => ids.push(id),
                Err(err) => {
                    for id in &ids {
                        if let Err(rm_err) = remove_container(&config.docker_bin, id).await {
                            warn!(container_id = %id, error = %rm_err, "Failed to remove container during rollback");
                        }
                    }
                    return Err(err);
                }
            }
        }

        info!(
            count,
            memory_limit_bytes = config.memory_limit_bytes,
            cpu_nano_limit = config.cpu_nano_limit,
            "Initialized container pool"
        );

        Ok(Self {
            docker_bin: config.docker_bin.clone(),
            states: Mutex::new(
                ids.into_iter()
                    .map(|id| (id, ContainerState::Idle))
                    .collect(),
            ),
            idle: Semaphore::new(count),
        })
    }

    async fn run_in_container(
        &self,
        container_id: &str,
        command: &str,
        stdin: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<ExecOutput, SandboxError> {
        let start = Instant::now();

        let mut child = Command::new(&self.docker_bin)
            .args(["exec", "-i", container_id, "sh", "-c", command])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| SandboxError::Execution(format!("failed to spawn docker exec: {err}")))?;

        if let Some(mut handle) = child.stdin.take() {
            if let Some(input) = stdin {
                handle
                    .write_all(input)
                    .await
                    .map_err(|err| SandboxError::Io(format!("failed to write stdin: {err}")))?;
            }
            // dropping the handle closes the pipe
        }

        // kill_on_drop reaps the child when the timeout wins the race
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| SandboxError::Timeout)?
            .map_err(|err| {
                SandboxError::Execution(format!("failed to wait for docker exec: {err}"))
            })?;

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
            duration: start.elapsed(),
        })
    }
}

#[async_trait]
impl ContainerHost for DockerContainerHost {
    async fn acquire(&self) -> Result<String, SandboxError> {
        let permit = self
            .idle
            .acquire()
            .await
            .map_err(|_| SandboxError::Exhausted)?;
        permit.forget();

        let mut states = self.states.lock().unwrap();
        match states
            .iter_mut()
            .find(|(_, state)| **state == ContainerState::Idle)
        {
            Some((id, state)) => {
                *state = ContainerState::Busy;
                Ok(id.clone())
            }
            None => {
                // the permit promised an idle container; give it back
                self.idle.add_permits(1);
                Err(SandboxError::Execution(
                    "no idle container despite available permit".into(),
                ))
            }
        }
    }

    fn release(&self, container_id: &str) {
        let mut states = self.states.lock().unwrap();
        if let Some(state) = states.get_mut(container_id)
            && *state == ContainerState::Busy
        {
            *state = ContainerState::Idle;
            self.idle.add_permits(1);
        }
    }

    async fn copy_in(
        &self,
        container_id: &str,
        dir: &str,
        name: &str,
        contents: &[u8],
        timeout: Duration,
    ) -> Result<(), SandboxError> {
        let command = format!("mkdir -p {dir} && cat > {dir}/{name}");
        let output = self
            .run_in_container(container_id, &command, Some(contents), timeout)
            .await?;

        if !output.success() {
            return Err(SandboxError::Io(format!(
                "failed to place {dir}/{name}: {}",
                output.stderr.trim()
            )));
        }

        Ok(())
    }

    async fn exec(
        &self,
        container_id: &str,
        command: &str,
        stdin: Option<&str>,
        timeout: Duration,
    ) -> Result<ExecOutput, SandboxError> {
        self.run_in_container(container_id, command, stdin.map(str::as_bytes), timeout)
            .await
    }

    async fn shutdown(&self) {
        self.idle.close();

        let ids: Vec<String> = {
            let states = self.states.lock().unwrap();
            states.keys().cloned().collect()
        };

        for id in ids {
            if let Err(err) = remove_container(&self.docker_bin, &id).await {
                warn!(container_id = %id, error = %err, "Failed to remove container");
            }
        }

        info!("Container pool shut down");
    }
}

async fn start_container(config: &EngineConfig) -> Result<String, SandboxError> {
    let cpus = config.cpu_nano_limit as f64 / 1_000_000_000.0;

    let output = Command::new(&config.docker_bin)
        .args(["run", "-d", "-i", "--network", "none"])
        .arg(format!("--memory={}b", config.memory_limit_bytes))
        .arg(format!("--cpus={cpus}"))
        .args([config.container_image.as_str(), "sh", "-c", "sleep infinity"])
        .output()
        .await
        .map_err(|err| SandboxError::Initialization(format!("failed to execute docker run: {err}")))?;

    if !output.status.success() {
        return Err(SandboxError::Initialization(format!(
            "docker run failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if id.is_empty() {
        return Err(SandboxError::Initialization(
            "docker run did not return a container id".into(),
        ));
    }

    Ok(id)
}

async fn remove_container(docker_bin: &str, container_id: &str) -> Result<(), SandboxError> {
    let output = Command::new(docker_bin)
        .args(["rm", "-f", container_id])
        .output()
        .await
        .map_err(|err| SandboxError::Execution(format!("failed to execute docker rm: {err}")))?;

    if !output.status.success() {
        return Err(SandboxError::Execution(format!(
            "docker rm failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(())
}
