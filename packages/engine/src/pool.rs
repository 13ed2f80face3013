use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use common::{LanguageSpec, TestCaseData};

use crate::config::EngineConfig;
use crate::container::{ContainerHost, ContainerLease, SandboxError};
use crate::languages::{TEMP_FILE_DIR_TOKEN, TEMP_FILE_NAME_TOKEN};

/// Why a job did not pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobError {
    /// The compile step exited non-zero.
    Compile,
    /// A run exited non-zero or the execution environment failed.
    Runtime,
    /// A compile or run step exceeded the wall-clock limit.
    Timeout,
    /// Output mismatch on a test case.
    TestCaseFailed,
}

/// Structured verdict of one job.
#[derive(Clone, Debug, Default)]
pub struct JobResult {
    pub stdout: String,
    pub stderr: String,
    pub message: String,
    pub success: bool,
    pub error: Option<JobError>,
    /// Accumulated run duration across executed test cases, in
    /// milliseconds.
    pub execution_time_ms: i64,
}

#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The job queue is at capacity. Transient; the caller may retry.
    #[error("job queue is full")]
    QueueFull,
    /// The pool is shutting down, or the worker died before reporting a
    /// verdict.
    #[error("worker pool unavailable")]
    Unavailable,
}

struct Job {
    language: LanguageSpec,
    code: String,
    test_cases: Vec<TestCaseData>,
    result: oneshot::Sender<JobResult>,
}

/// Fixed-size set of workers consuming a bounded job queue.
///
/// Each worker holds exactly one container for the duration of one job.
/// Jobs from different rooms run concurrently; ordering within a room is
/// the room loop's concern, not the pool's.
pub struct WorkerPool {
    jobs: mpsc::Sender<Job>,
    shutdown: watch::Sender<bool>,
    run_timeout: Duration,
}

impl WorkerPool {
    pub fn new(config: &EngineConfig, host: Arc<dyn ContainerHost>) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel(config.max_job_count);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let jobs_rx = Arc::new(Mutex::new(jobs_rx));
        let run_timeout = config.run_timeout();

        for id in 1..=config.max_workers {
            let worker = Worker {
                id,
                host: host.clone(),
                jobs: jobs_rx.clone(),
                shutdown: shutdown_rx.clone(),
                run_timeout,
            };
            tokio::spawn(worker.run());
        }

        info!(
            max_workers = config.max_workers,
            max_job_count = config.max_job_count,
            "Initialized worker pool"
        );

        Self {
            jobs: jobs_tx,
            shutdown: shutdown_tx,
            run_timeout,
        }
    }

    /// Submits a job and waits for its verdict.
    ///
    /// The enqueue itself never blocks: a full queue is reported as
    /// [`ExecuteError::QueueFull`] immediately, which callers treat as a
    /// transient overload.
    pub async fn execute_job(
        &self,
        language: LanguageSpec,
        code: String,
        test_cases: Vec<TestCaseData>,
    ) -> Result<JobResult, ExecuteError> {
        if *self.shutdown.borrow() {
            return Err(ExecuteError::Unavailable);
        }

        let (result_tx, result_rx) = oneshot::channel();
        let job = Job {
            language,
            code,
            test_cases,
            result: result_tx,
        };

        self.jobs.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                warn!("Job queue is full, rejecting job");
                ExecuteError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => ExecuteError::Unavailable,
        })?;

        // A worker that dies mid-job drops the sender; surface that as
        // unavailability instead of waiting forever.
        result_rx.await.map_err(|_| ExecuteError::Unavailable)
    }

    /// Signals workers to exit after their current job. Queued jobs that
    /// no worker picks up resolve as [`ExecuteError::Unavailable`] for
    /// their submitters.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// The per-step wall-clock bound jobs run under.
    pub fn run_timeout(&self) -> Duration {
        self.run_timeout
    }
}

struct Worker {
    id: usize,
    host: Arc<dyn ContainerHost>,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    shutdown: watch::Receiver<bool>,
    run_timeout: Duration,
}

impl Worker {
    async fn run(mut self) {
        info!(worker_id = self.id, "Worker started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let job = {
                let mut jobs = self.jobs.lock().await;
                tokio::select! {
                    job = jobs.recv() => job,
                    _ = self.shutdown.changed() => None,
                }
            };

            let Some(job) = job else {
                break;
            };

            let verdict = self.run_job(&job).await;
            if job.result.send(verdict).is_err() {
                warn!(worker_id = self.id, "Job submitter went away before the verdict");
            }
        }

        info!(worker_id = self.id, "Worker shutting down");
    }

    async fn run_job(&self, job: &Job) -> JobResult {
        debug!(
            worker_id = self.id,
            language = %job.language.name,
            test_cases = job.test_cases.len(),
            "Job picked up"
        );

        let lease = match ContainerLease::acquire(self.host.clone()).await {
            Ok(lease) => lease,
            Err(err) => {
                error!(worker_id = self.id, error = %err, "Failed to acquire container");
                return infrastructure_failure("Failed to acquire an execution container.");
            }
        };

        if let Err(err) = self
            .host
            .copy_in(
                lease.id(),
                &job.language.temp_file_dir,
                &job.language.temp_file_name,
                job.code.as_bytes(),
                self.run_timeout,
            )
            .await
        {
            error!(worker_id = self.id, container_id = lease.id(), error = %err, "Failed to copy code to container");
            return infrastructure_failure("Failed to set up execution environment.");
        }

        if !job.language.compile_cmd.is_empty() {
            let compile_cmd = substitute_paths(&job.language.compile_cmd, &job.language);
            match self
                .host
                .exec(lease.id(), &compile_cmd, None, self.run_timeout)
                .await
            {
                Ok(output) if output.success() => {
                    debug!(
                        worker_id = self.id,
                        duration_ms = output.duration.as_millis() as i64,
                        "Compilation successful"
                    );
                }
                Ok(output) => {
                    warn!(worker_id = self.id, stderr = %output.stderr, "Compilation failed");
                    return JobResult {
                        stdout: output.stdout,
                        stderr: output.stderr,
                        message: "Compile failed".into(),
                        success: false,
                        error: Some(JobError::Compile),
                        execution_time_ms: 0,
                    };
                }
                Err(SandboxError::Timeout) => {
                    warn!(worker_id = self.id, "Compilation timed out");
                    return JobResult {
                        message: format!(
                            "Compilation exceeded the {}s limit",
                            self.run_timeout.as_secs()
                        ),
                        error: Some(JobError::Timeout),
                        ..Default::default()
                    };
                }
                Err(err) => {
                    error!(worker_id = self.id, error = %err, "Compile step failed");
                    return infrastructure_failure("Failed to compile code.");
                }
            }
        }

        let run_cmd = substitute_paths(&job.language.run_cmd, &job.language);
        let mut total_ms: i64 = 0;

        for tc in &job.test_cases {
            match self
                .host
                .exec(lease.id(), &run_cmd, Some(&tc.input), self.run_timeout)
                .await
            {
                Ok(output) if output.success() => {
                    total_ms += output.duration.as_millis() as i64;

                    let actual = output.stdout.trim();
                    let expected = tc.expected_output.trim();
                    if actual != expected {
                        warn!(worker_id = self.id, test_case_id = %tc.id, "Wrong answer");
                        let message = format!(
                            "Wrong Answer on test case.\nInput:\n{}\n\nExpected Output:\n{}\n\nYour Output:\n{}",
                            tc.input, expected, actual
                        );
                        return JobResult {
                            stdout: output.stdout,
                            stderr: output.stderr,
                            message,
                            success: false,
                            error: Some(JobError::TestCaseFailed),
                            execution_time_ms: total_ms,
                        };
                    }
                }
                Ok(output) => {
                    total_ms += output.duration.as_millis() as i64;
                    warn!(worker_id = self.id, test_case_id = %tc.id, stderr = %output.stderr, "Runtime error");
                    return JobResult {
                        stdout: output.stdout,
                        stderr: output.stderr,
                        message: "Runtime error".into(),
                        success: false,
                        error: Some(JobError::Runtime),
                        execution_time_ms: total_ms,
                    };
                }
                Err(SandboxError::Timeout) => {
                    warn!(worker_id = self.id, test_case_id = %tc.id, "Run timed out");
                    return JobResult {
                        message: format!(
                            "Time limit exceeded after {}s",
                            self.run_timeout.as_secs()
                        ),
                        success: false,
                        error: Some(JobError::Timeout),
                        execution_time_ms: total_ms,
                        ..Default::default()
                    };
                }
                Err(err) => {
                    error!(worker_id = self.id, test_case_id = %tc.id, error = %err, "Run step failed");
                    return infrastructure_failure("Failed to execute code.");
                }
            }
        }

        info!(
            worker_id = self.id,
            execution_time_ms = total_ms,
            "All test cases passed"
        );

        JobResult {
            message: "All test cases passed!".into(),
            success: true,
            execution_time_ms: total_ms,
            ..Default::default()
        }
    }
}

fn substitute_paths(template: &str, language: &LanguageSpec) -> String {
    template
        .replace(TEMP_FILE_DIR_TOKEN, &language.temp_file_dir)
        .replace(TEMP_FILE_NAME_TOKEN, &language.temp_file_name)
}

fn infrastructure_failure(message: &str) -> JobResult {
    JobResult {
        message: message.into(),
        success: false,
        error: Some(JobError::Runtime),
        ..Default::default()
    }
}
