//! Concurrent install execution
//!
//! Runs one worker per partition, either on dedicated OS threads or as
//! blocking tasks on a tokio runtime. Both go through [`TaskSpawner`], so
//! the executor itself does not care which one backs it. Each worker
//! installs its partition strictly in order and stops at its first error;
//! the executor waits for every worker before reporting.

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::bench::partition::Partition;
use crate::bench::workload::BundleIdentifier;
use crate::framework::{BundleContext, InstallPath, InstalledBundle};
use crate::{BenchError, Result, WorkerFailure};

/// How workers are run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMechanism {
    /// Spawn one OS thread per partition and join them
    #[default]
    Threads,
    /// Submit one task per partition and await all of them
    AsyncTasks,
}

impl ExecutionMechanism {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionMechanism::Threads => "threads",
            ExecutionMechanism::AsyncTasks => "tasks",
        }
    }

    pub fn all() -> [ExecutionMechanism; 2] {
        [ExecutionMechanism::Threads, ExecutionMechanism::AsyncTasks]
    }
}

impl fmt::Display for ExecutionMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExecutionMechanism {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "threads" | "thread" => Ok(ExecutionMechanism::Threads),
            "tasks" | "async" | "async_tasks" => Ok(ExecutionMechanism::AsyncTasks),
            other => Err(BenchError::ConfigError(format!(
                "Unknown execution mechanism '{}' (expected threads or tasks)",
                other
            ))),
        }
    }
}

/// Work submitted for one worker
pub type WorkerJob = Box<dyn FnOnce() -> Result<Vec<InstalledBundle>> + Send + 'static>;

/// Runs a batch of jobs concurrently, one worker per job
pub trait TaskSpawner: Send + Sync {
    fn mechanism(&self) -> ExecutionMechanism;

    /// Run every job and block until all of them finished.
    ///
    /// Outcomes are returned in job order. A worker that panics is
    /// reported as a [`BenchError::WorkerError`].
    fn run_all(&self, jobs: Vec<WorkerJob>) -> Vec<Result<Vec<InstalledBundle>>>;
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Fresh OS threads for every batch
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSpawner;

impl TaskSpawner for ThreadSpawner {
    fn mechanism(&self) -> ExecutionMechanism {
        ExecutionMechanism::Threads
    }

    fn run_all(&self, jobs: Vec<WorkerJob>) -> Vec<Result<Vec<InstalledBundle>>> {
        let handles: Vec<_> = jobs
            .into_iter()
            .enumerate()
            .map(|(i, job)| {
                std::thread::Builder::new()
                    .name(format!("install-worker-{}", i))
                    .spawn(job)
            })
            .collect();

        handles
            .into_iter()
            .map(|spawned| match spawned {
                Ok(handle) => handle.join().unwrap_or_else(|payload| {
                    Err(BenchError::WorkerError(format!(
                        "worker panicked: {}",
                        panic_message(payload.as_ref())
                    )))
                }),
                Err(e) => Err(BenchError::WorkerError(format!(
                    "failed to spawn worker thread: {}",
                    e
                ))),
            })
            .collect()
    }
}

/// Blocking tasks on a runtime owned by the spawner.
///
/// [`TaskSpawner::run_all`] blocks on that runtime, so it must not be
/// called from inside another tokio runtime; use
/// [`AsyncTaskSpawner::run_all_async`] there instead. Dropping the spawner
/// is fine anywhere: the runtime is shut down in the background.
#[derive(Debug)]
pub struct AsyncTaskSpawner {
    runtime: Option<tokio::runtime::Runtime>,
}

impl AsyncTaskSpawner {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("install-task")
            .enable_all()
            .build()?;
        Ok(Self {
            runtime: Some(runtime),
        })
    }

    /// Submit every job to the current runtime and await all of them
    pub async fn run_all_async(jobs: Vec<WorkerJob>) -> Vec<Result<Vec<InstalledBundle>>> {
        let handles: Vec<_> = jobs.into_iter().map(tokio::task::spawn_blocking).collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(match handle.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => Err(BenchError::WorkerError(format!(
                    "worker panicked: {}",
                    panic_message(e.into_panic().as_ref())
                ))),
                Err(e) => Err(BenchError::WorkerError(format!("task join failed: {}", e))),
            });
        }
        outcomes
    }
}

impl TaskSpawner for AsyncTaskSpawner {
    fn mechanism(&self) -> ExecutionMechanism {
        ExecutionMechanism::AsyncTasks
    }

    fn run_all(&self, jobs: Vec<WorkerJob>) -> Vec<Result<Vec<InstalledBundle>>> {
        match &self.runtime {
            Some(runtime) => runtime.block_on(Self::run_all_async(jobs)),
            None => jobs
                .iter()
                .map(|_| Err(BenchError::WorkerError("task runtime shut down".to_string())))
                .collect(),
        }
    }
}

impl Drop for AsyncTaskSpawner {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Build the spawner for a mechanism
pub fn spawner_for(mechanism: ExecutionMechanism) -> Result<Box<dyn TaskSpawner>> {
    Ok(match mechanism {
        ExecutionMechanism::Threads => Box::new(ThreadSpawner),
        ExecutionMechanism::AsyncTasks => Box::new(AsyncTaskSpawner::new()?),
    })
}

/// Install `bundles` one after another, stopping at the first failure
pub fn install_partition(
    context: &dyn BundleContext,
    install_path: InstallPath,
    bundles: &[BundleIdentifier],
) -> Result<Vec<InstalledBundle>> {
    bundles
        .iter()
        .map(|identifier| install_path.install(context, identifier))
        .collect()
}

/// Installs every partition concurrently through one install path
pub struct ConcurrentExecutor {
    spawner: Box<dyn TaskSpawner>,
    install_path: InstallPath,
}

impl ConcurrentExecutor {
    pub fn new(mechanism: ExecutionMechanism, install_path: InstallPath) -> Result<Self> {
        Ok(Self::with_spawner(spawner_for(mechanism)?, install_path))
    }

    pub fn with_spawner(spawner: Box<dyn TaskSpawner>, install_path: InstallPath) -> Self {
        Self {
            spawner,
            install_path,
        }
    }

    pub fn install_path(&self) -> InstallPath {
        self.install_path
    }

    pub fn mechanism(&self) -> ExecutionMechanism {
        self.spawner.mechanism()
    }

    /// Run one worker per partition and wait for all of them.
    ///
    /// Returns every installed bundle, or all worker failures of the batch.
    pub fn execute(
        &self,
        context: &Arc<dyn BundleContext>,
        partitions: &[Partition],
    ) -> Result<Vec<InstalledBundle>> {
        let jobs: Vec<WorkerJob> = partitions
            .iter()
            .map(|partition| {
                let context = Arc::clone(context);
                let bundles = Arc::clone(&partition.bundles);
                let install_path = self.install_path;
                Box::new(move || install_partition(context.as_ref(), install_path, &bundles))
                    as WorkerJob
            })
            .collect();

        let outcomes = self.spawner.run_all(jobs);

        let mut installed = Vec::new();
        let mut failures = Vec::new();
        for (partition, outcome) in partitions.iter().zip(outcomes) {
            match outcome {
                Ok(bundles) => installed.extend(bundles),
                Err(e) => {
                    warn!(worker = partition.index, error = %e, "worker failed");
                    failures.push(WorkerFailure {
                        worker: partition.index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(BenchError::WorkersFailed(failures));
        }
        Ok(installed)
    }
}
