//! Benchmark registration and case execution

use std::sync::Arc;

use tracing::{error, info};

use crate::bench::fixture::{CaseSpec, InstallFixture};
use crate::bench::timer::Runner;
use crate::bench::worker::ExecutionMechanism;
use crate::config::{BenchmarkConfig, ThreadCount};
use crate::framework::{Catalog, Framework, InstallPath, MemoryFramework};
use crate::models::CaseReport;
use crate::{BenchError, Result};

/// Bundle installed by the small single-install case
pub const SMALL_BUNDLE: &str = "dummyService";
/// Bundle installed by the large single-install case
pub const LARGE_BUNDLE: &str = "largeBundle";

const LARGE_BUNDLE_COST_FACTOR: u32 = 20;

/// Every case registered by default.
///
/// Concurrent cases cover both install paths, both execution mechanisms
/// and 1, 2, 4 and the hardware maximum of workers, all over the
/// configured workload mode. The configured combination of worker count,
/// install path and mechanism is always registered, and the single-install
/// cases use the configured install path.
pub fn default_suite(config: &BenchmarkConfig) -> Vec<CaseSpec> {
    let mut cases = vec![
        CaseSpec::single("BundleInstall", SMALL_BUNDLE).with_install_path(config.install_path),
        CaseSpec::single("LargeBundleInstall", LARGE_BUNDLE)
            .with_install_path(config.install_path),
    ];

    for install_path in InstallPath::all() {
        for mechanism in ExecutionMechanism::all() {
            for threads in ThreadCount::suite() {
                cases.push(CaseSpec::concurrent(
                    threads,
                    install_path,
                    mechanism,
                    config.workload_mode,
                ));
            }
        }
    }

    let configured = CaseSpec::concurrent(
        config.threads,
        config.install_path,
        config.mechanism,
        config.workload_mode,
    );
    if !cases.iter().any(|case| case.name == configured.name) {
        cases.push(configured);
    }
    cases
}

/// Keep cases whose name contains `pattern`
pub fn filter_cases(cases: Vec<CaseSpec>, pattern: Option<&str>) -> Vec<CaseSpec> {
    match pattern {
        Some(pattern) => cases
            .into_iter()
            .filter(|case| case.name.contains(pattern))
            .collect(),
        None => cases,
    }
}

/// In-process framework able to resolve everything the default suite installs
pub fn reference_framework(config: &BenchmarkConfig) -> MemoryFramework {
    let catalog = Catalog::numbered(config.bundle_prefix.as_str(), config.workload_size)
        .with_named(SMALL_BUNDLE)
        .with_named_cost(LARGE_BUNDLE, config.load_cost * LARGE_BUNDLE_COST_FACTOR)
        .with_load_cost(config.load_cost);
    MemoryFramework::new(catalog)
}

/// Set up, measure and tear down one case.
///
/// The framework is stopped even when an iteration fails.
pub fn run_case(
    spec: &CaseSpec,
    config: &BenchmarkConfig,
    framework: Arc<dyn Framework>,
    runner: &mut dyn Runner,
) -> Result<CaseReport> {
    let case_config = spec.effective_config(config);
    let mut fixture = InstallFixture::setup(spec, &case_config, framework)?;
    let workers = fixture.workers();
    let installs = fixture.installs_per_iteration();

    let samples = fixture.run(runner);
    let teardown = fixture.teardown();
    let samples = samples?;
    teardown?;

    Ok(CaseReport::new(
        spec.name.as_str(),
        case_config,
        workers,
        installs,
        samples,
    ))
}

/// Reports of the cases that completed and errors of those that did not
#[derive(Debug, Default)]
pub struct SuiteOutcome {
    pub reports: Vec<CaseReport>,
    pub failures: Vec<(String, BenchError)>,
}

impl SuiteOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run `cases` one after another, each against a fresh framework.
///
/// A failing case is recorded and the remaining cases still run.
pub fn run_suite<F>(
    cases: &[CaseSpec],
    config: &BenchmarkConfig,
    mut make_framework: F,
    runner: &mut dyn Runner,
) -> SuiteOutcome
where
    F: FnMut(&BenchmarkConfig) -> Arc<dyn Framework>,
{
    let mut outcome = SuiteOutcome::default();
    for spec in cases {
        let framework = make_framework(&spec.effective_config(config));
        match run_case(spec, config, framework, runner) {
            Ok(report) => {
                info!(case = %spec.name, mean = ?report.stats.mean, "case finished");
                outcome.reports.push(report);
            }
            Err(e) => {
                error!(case = %spec.name, error = %e, "case failed");
                outcome.failures.push((spec.name.clone(), e));
            }
        }
    }
    outcome
}
