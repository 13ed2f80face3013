use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables of the sandboxed execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of parallel workers (and pre-warmed containers). Default: 4.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Job queue capacity; submissions beyond it are rejected. Default: 16.
    #[serde(default = "default_max_job_count")]
    pub max_job_count: usize,
    /// Per-container memory cap in bytes. Default: 256 MiB.
    #[serde(default = "default_memory_limit_bytes")]
    pub memory_limit_bytes: i64,
    /// Per-container CPU share in nano-CPUs (1e9 = one full core).
    /// Default: half a core.
    #[serde(default = "default_cpu_nano_limit")]
    pub cpu_nano_limit: i64,
    /// Wall-clock bound for each compile and each test-case run. Default: 15s.
    #[serde(default = "default_code_run_timeout_secs")]
    pub code_run_timeout_secs: u64,
    /// Maximum accepted user code length in bytes. Default: 1000.
    #[serde(default = "default_max_code_length")]
    pub max_code_length: usize,
    /// Image the execution containers are started from. It must carry the
    /// toolchains referenced by the language table.
    #[serde(default = "default_container_image")]
    pub container_image: String,
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,
}

fn default_max_workers() -> usize {
    4
}
fn default_max_job_count() -> usize {
    16
}
fn default_memory_limit_bytes() -> i64 {
    256 * 1024 * 1024
}
fn default_cpu_nano_limit() -> i64 {
    500_000_000
}
fn default_code_run_timeout_secs() -> u64 {
    15
}
fn default_max_code_length() -> usize {
    1000
}
fn default_container_image() -> String {
    "arena-runner:latest".into()
}
fn default_docker_bin() -> String {
    "docker".into()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_job_count: default_max_job_count(),
            memory_limit_bytes: default_memory_limit_bytes(),
            cpu_nano_limit: default_cpu_nano_limit(),
            code_run_timeout_secs: default_code_run_timeout_secs(),
            max_code_length: default_max_code_length(),
            container_image: default_container_image(),
            docker_bin: default_docker_bin(),
        }
    }
}

impl EngineConfig {
    /// The per-step wall-clock bound as a [`Duration`].
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.code_run_timeout_secs)
    }
}
