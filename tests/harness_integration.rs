use std::sync::Arc;
use std::time::Duration;

use bundlebench::bench::partition::coverage;
use bundlebench::bench::{
    reference_framework, run_case, CaseSpec, ConcurrentExecutor, ExecutionMechanism,
    FixedIterations, InstallFixture, Partitioner, Runner, WorkloadGenerator, WorkloadMode,
};
use bundlebench::config::{BenchmarkConfig, ThreadCount};
use bundlebench::framework::{Catalog, Framework, FrameworkState, InstallPath, MemoryFramework};
use bundlebench::{BenchError, Result};
use tempfile::TempDir;

fn config(size: usize) -> BenchmarkConfig {
    BenchmarkConfig::new()
        .with_workload_size(size)
        .with_load_cost(Duration::ZERO)
}

fn concurrent(
    threads: usize,
    install_path: InstallPath,
    mechanism: ExecutionMechanism,
) -> CaseSpec {
    CaseSpec::concurrent(
        ThreadCount::Fixed(threads),
        install_path,
        mechanism,
        WorkloadMode::Sequential,
    )
}

/// Records every sample it is handed, like an external runner would
#[derive(Default)]
struct RecordingRunner {
    cases: Vec<String>,
    samples: Vec<Duration>,
}

impl Runner for RecordingRunner {
    fn run(
        &mut self,
        case: &str,
        measured: &mut dyn FnMut() -> Result<Duration>,
    ) -> Result<Vec<Duration>> {
        self.cases.push(case.to_string());
        let mut samples = Vec::new();
        for _ in 0..2 {
            let elapsed = measured()?;
            self.samples.push(elapsed);
            samples.push(elapsed);
        }
        Ok(samples)
    }
}

#[test]
fn test_single_worker_legacy_installs_sequentially() {
    let config = config(10);
    let framework = reference_framework(&config);
    let spec = concurrent(1, InstallPath::Legacy, ExecutionMechanism::Threads);

    let report = run_case(
        &spec,
        &config,
        Arc::new(framework.clone()),
        &mut FixedIterations::new(1),
    )
    .unwrap();

    assert_eq!(report.workers, 1);
    assert_eq!(report.installs_per_iteration, 10);
    assert_eq!(framework.install_calls().legacy, 10);
    assert_eq!(framework.install_calls().revised, 0);
    assert!(report.samples[0] > Duration::ZERO);
}

#[test]
fn test_four_workers_revised_cover_full_workload() {
    let config = config(5000);
    let workload = WorkloadGenerator::new(config.bundle_prefix.as_str())
        .generate(5000, WorkloadMode::Sequential);
    let partitions = Partitioner::new(4).split(&workload).unwrap();
    let sizes: Vec<_> = partitions.iter().map(|p| p.len()).collect();
    assert_eq!(sizes, vec![1250, 1250, 1250, 1250]);

    let framework = reference_framework(&config);
    let spec = concurrent(4, InstallPath::Revised, ExecutionMechanism::Threads);
    let report = run_case(
        &spec,
        &config,
        Arc::new(framework.clone()),
        &mut FixedIterations::new(1),
    )
    .unwrap();

    assert_eq!(report.installs_per_iteration, 5000);
    assert_eq!(framework.install_calls().revised, 5000);
}

#[test]
fn test_three_workers_absorb_remainder_in_last_partition() {
    let workload = WorkloadGenerator::new("bundles/mwbundle_").generate(5000, WorkloadMode::Sequential);
    let partitions = Partitioner::new(3).split(&workload).unwrap();

    let sizes: Vec<_> = partitions.iter().map(|p| p.len()).collect();
    assert_eq!(sizes, vec![1666, 1666, 1668]);
    assert_eq!(coverage(&partitions), 5000);
    assert_eq!(partitions[2].bundles[1667], "bundles/mwbundle_5000");

    let framework = MemoryFramework::new(Catalog::numbered("bundles/mwbundle_", 5000));
    framework.start().unwrap();
    let executor = ConcurrentExecutor::new(ExecutionMechanism::AsyncTasks, InstallPath::Legacy).unwrap();
    let installed = executor.execute(&framework.context(), &partitions).unwrap();
    assert_eq!(installed.len(), 5000);
    assert_eq!(framework.installed_count(), 5000);
}

#[test]
fn test_failed_iteration_reports_nothing_to_runner() {
    let config = config(20);
    // Catalog that only knows half of the workload
    let framework = MemoryFramework::new(Catalog::numbered(config.bundle_prefix.as_str(), 10));
    let spec = concurrent(2, InstallPath::Revised, ExecutionMechanism::Threads);
    let mut runner = RecordingRunner::default();

    let result = run_case(&spec, &config, Arc::new(framework.clone()), &mut runner);

    assert!(matches!(result, Err(BenchError::WorkersFailed(_))));
    assert_eq!(runner.cases, vec![spec.name.clone()]);
    assert!(runner.samples.is_empty());
    assert_eq!(framework.state(), FrameworkState::Stopped);
}

#[test]
fn test_install_path_does_not_change_installed_count() {
    let config = config(300).with_release_between_iterations(false);
    let mut counts = Vec::new();

    for install_path in InstallPath::all() {
        for mechanism in ExecutionMechanism::all() {
            let framework = reference_framework(&config);
            let spec = concurrent(4, install_path, mechanism);
            let case_config = spec.effective_config(&config);
            let mut fixture =
                InstallFixture::setup(&spec, &case_config, Arc::new(framework.clone())).unwrap();
            fixture.measure_iteration().unwrap();
            counts.push(framework.installed_count());
            fixture.teardown().unwrap();
        }
    }

    assert_eq!(counts, vec![300; 4]);
}

#[test]
fn test_random_workload_is_reproducible_with_seed() {
    let a = WorkloadGenerator::seeded("b_", 99).generate(500, WorkloadMode::Random);
    let b = WorkloadGenerator::seeded("b_", 99).generate(500, WorkloadMode::Random);
    assert_eq!(a, b);
}

#[test]
fn test_oversubscribed_last_partition_adds_one_install() {
    let config = config(100).with_oversubscribe_last(true);
    let framework = reference_framework(&config);
    let spec = concurrent(4, InstallPath::Revised, ExecutionMechanism::Threads);

    let report = run_case(
        &spec,
        &config,
        Arc::new(framework.clone()),
        &mut FixedIterations::new(1),
    )
    .unwrap();

    assert_eq!(report.installs_per_iteration, 101);
    assert_eq!(framework.install_calls().revised, 101);
}

#[test]
fn test_elapsed_time_grows_with_workload() {
    let base = BenchmarkConfig::new().with_load_cost(Duration::from_micros(200));
    let spec = concurrent(1, InstallPath::Legacy, ExecutionMechanism::Threads);

    let mut means = Vec::new();
    for size in [20, 200] {
        let config = base.clone().with_workload_size(size);
        let report = run_case(
            &spec,
            &config,
            Arc::new(reference_framework(&config)),
            &mut FixedIterations::new(2),
        )
        .unwrap();
        means.push(report.stats.mean);
    }

    assert!(means[0] > Duration::ZERO);
    assert!(means[1] > means[0]);
}

#[test]
fn test_directory_catalog_installs_files() {
    let temp_dir = TempDir::new().unwrap();
    for name in ["alpha.bundle", "beta.bundle"] {
        std::fs::write(temp_dir.path().join(name), b"bundle").unwrap();
    }
    let framework = MemoryFramework::new(Catalog::new().with_directory(temp_dir.path()));
    let spec = CaseSpec::single("DirectoryInstall", "beta.bundle");

    let report = run_case(
        &spec,
        &config(1),
        Arc::new(framework.clone()),
        &mut FixedIterations::new(3),
    )
    .unwrap();

    assert_eq!(report.samples.len(), 3);
    assert_eq!(framework.install_calls().legacy, 3);
}

#[tokio::test]
async fn test_async_fixture_released_inside_runtime() {
    let config = config(16);
    let framework = reference_framework(&config);
    let spec = concurrent(4, InstallPath::Revised, ExecutionMechanism::AsyncTasks);
    let case_config = spec.effective_config(&config);

    let fixture = InstallFixture::setup(&spec, &case_config, Arc::new(framework.clone())).unwrap();
    assert_eq!(fixture.workers(), 4);
    fixture.teardown().unwrap();
    assert_eq!(framework.state(), FrameworkState::Stopped);
}
