pub mod analyzer;
pub mod builder;
pub mod config;
pub mod container;
pub mod languages;
pub mod pool;

pub use analyzer::{AnalyzeError, GoPackageAnalyzer, PackageAnalyzer};
pub use builder::{BuildError, CodeBuilder};
pub use config::EngineConfig;
pub use container::{ContainerHost, ContainerLease, DockerContainerHost, ExecOutput, SandboxError};
pub use pool::{ExecuteError, JobError, JobResult, WorkerPool};
