//! Per-case fixture
//!
//! A case goes through `setup`, any number of measured iterations, and
//! `teardown`. Workload generation, partitioning and releasing installed
//! bundles all happen outside the timed window; only the install phase
//! itself is measured.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::bench::partition::{coverage, Partition, Partitioner};
use crate::bench::timer::{time_phase, Runner};
use crate::bench::worker::{ConcurrentExecutor, ExecutionMechanism};
use crate::bench::workload::{WorkloadGenerator, WorkloadMode};
use crate::config::{BenchmarkConfig, ThreadCount};
use crate::framework::{BundleContext, Framework, InstallPath, InstalledBundle};
use crate::Result;

/// What a case installs per iteration
#[derive(Debug, Clone, PartialEq)]
pub enum CaseKind {
    /// One named bundle, installed from the calling thread
    Single { bundle: String },
    /// A generated workload split across concurrent workers
    Concurrent { threads: ThreadCount },
}

/// A registered benchmark case
#[derive(Debug, Clone, PartialEq)]
pub struct CaseSpec {
    pub name: String,
    pub kind: CaseKind,
    pub install_path: InstallPath,
    pub mechanism: ExecutionMechanism,
    pub workload_mode: WorkloadMode,
}

impl CaseSpec {
    pub fn single(name: impl Into<String>, bundle: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CaseKind::Single {
                bundle: bundle.into(),
            },
            install_path: InstallPath::Legacy,
            mechanism: ExecutionMechanism::Threads,
            workload_mode: WorkloadMode::Sequential,
        }
    }

    pub fn concurrent(
        threads: ThreadCount,
        install_path: InstallPath,
        mechanism: ExecutionMechanism,
        workload_mode: WorkloadMode,
    ) -> Self {
        let mut name = format!("ConcurrentInstall/{}/{}/{}", install_path, mechanism, threads);
        if workload_mode == WorkloadMode::Random {
            name.push_str("/random");
        }
        Self {
            name,
            kind: CaseKind::Concurrent { threads },
            install_path,
            mechanism,
            workload_mode,
        }
    }

    pub fn with_install_path(mut self, install_path: InstallPath) -> Self {
        self.install_path = install_path;
        self
    }

    /// The run configuration with this case's parameters applied
    pub fn effective_config(&self, base: &BenchmarkConfig) -> BenchmarkConfig {
        let threads = match &self.kind {
            CaseKind::Single { .. } => ThreadCount::Fixed(1),
            CaseKind::Concurrent { threads } => *threads,
        };
        base.clone()
            .with_threads(threads)
            .with_install_path(self.install_path)
            .with_mechanism(self.mechanism)
            .with_workload_mode(self.workload_mode)
    }
}

impl fmt::Display for CaseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

enum Plan {
    Single {
        bundle: String,
    },
    Concurrent {
        executor: ConcurrentExecutor,
        partitions: Vec<Partition>,
    },
}

/// Live state of one case between setup and teardown
pub struct InstallFixture {
    name: String,
    framework: Arc<dyn Framework>,
    context: Arc<dyn BundleContext>,
    install_path: InstallPath,
    release: bool,
    plan: Plan,
}

impl InstallFixture {
    /// Prepare the workload and start the framework.
    ///
    /// Configuration problems, including a worker count the workload cannot
    /// be split across, are reported here before the framework is started.
    pub fn setup(
        spec: &CaseSpec,
        config: &BenchmarkConfig,
        framework: Arc<dyn Framework>,
    ) -> Result<Self> {
        config.validate()?;

        let plan = match &spec.kind {
            CaseKind::Single { bundle } => Plan::Single {
                bundle: bundle.clone(),
            },
            CaseKind::Concurrent { threads } => {
                let mut generator =
                    WorkloadGenerator::with_seed(config.bundle_prefix.as_str(), config.seed);
                let workload = generator.generate(config.workload_size, spec.workload_mode);
                let partitions = Partitioner::new(threads.resolve())
                    .with_oversubscribed_last(config.oversubscribe_last)
                    .split(&workload)?;
                let executor = ConcurrentExecutor::new(spec.mechanism, spec.install_path)?;
                Plan::Concurrent {
                    executor,
                    partitions,
                }
            }
        };

        framework.start()?;
        let context = framework.context();

        let fixture = Self {
            name: spec.name.clone(),
            framework,
            context,
            install_path: spec.install_path,
            release: config.release_between_iterations,
            plan,
        };
        info!(
            case = %fixture.name,
            workers = fixture.workers(),
            installs = fixture.installs_per_iteration(),
            "case set up"
        );
        Ok(fixture)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn workers(&self) -> usize {
        match &self.plan {
            Plan::Single { .. } => 1,
            Plan::Concurrent { partitions, .. } => partitions.len(),
        }
    }

    /// Install calls issued by one iteration
    pub fn installs_per_iteration(&self) -> usize {
        match &self.plan {
            Plan::Single { .. } => 1,
            Plan::Concurrent { partitions, .. } => coverage(partitions),
        }
    }

    /// Run one timed iteration and return its elapsed time
    pub fn measure_iteration(&mut self) -> Result<Duration> {
        let (installed, elapsed) = match &self.plan {
            Plan::Single { bundle } => time_phase(|| {
                self.install_path
                    .install(self.context.as_ref(), bundle)
                    .map(|bundle| vec![bundle])
            })?,
            Plan::Concurrent {
                executor,
                partitions,
            } => time_phase(|| executor.execute(&self.context, partitions))?,
        };

        debug!(case = %self.name, installed = installed.len(), ?elapsed, "iteration measured");
        if self.release {
            self.release(&installed)?;
        }
        Ok(elapsed)
    }

    /// Uninstall every distinct bundle of an iteration
    fn release(&self, installed: &[InstalledBundle]) -> Result<()> {
        let mut seen = HashSet::new();
        for bundle in installed {
            if seen.insert(bundle.id) {
                self.context.uninstall(bundle)?;
            }
        }
        Ok(())
    }

    /// Hand the measured phase to `runner`
    pub fn run(&mut self, runner: &mut dyn Runner) -> Result<Vec<Duration>> {
        let name = self.name.clone();
        runner.run(&name, &mut || self.measure_iteration())
    }

    /// Stop the framework and wait until it has stopped
    pub fn teardown(self) -> Result<()> {
        self.framework.stop()?;
        self.framework.wait_for_stop(Duration::ZERO)?;
        info!(case = %self.name, "case torn down");
        Ok(())
    }
}
