use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use bundlebench::bench::{
    default_suite, filter_cases, reference_framework, run_suite, CaseKind, CaseSpec,
    ExecutionMechanism, FixedIterations, WorkloadMode,
};
use bundlebench::config::persistence::ResultsStorage;
use bundlebench::config::{BenchmarkConfig, ThreadCount};
use bundlebench::framework::{Framework, InstallPath};
use bundlebench::logging::init_logging;
use bundlebench::util::parse_duration;
use bundlebench::Result;

#[derive(Parser, Debug)]
#[command(name = "bundlebench", version, about = "Measure bundle install latency")]
struct Cli {
    /// Configuration file (defaults to the user config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true, default_value = "false")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the registered cases
    Run(RunArgs),
    /// Print registered case names
    List {
        /// Only cases whose name contains this text
        #[arg(long)]
        filter: Option<String>,
    },
    /// Print the effective configuration
    Config {
        /// Write it to the user config location
        #[arg(long, default_value = "false")]
        write: bool,
    },
    /// Print recently saved reports
    History {
        #[arg(long, default_value = "10")]
        count: usize,
        /// Delete the saved history instead
        #[arg(long, default_value = "false")]
        clear: bool,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Only cases whose name contains this text
    #[arg(long)]
    filter: Option<String>,

    /// Bundles installed per iteration of concurrent cases
    #[arg(long)]
    workload_size: Option<usize>,

    /// sequential or random identifiers
    #[arg(long)]
    mode: Option<WorkloadMode>,

    /// Seed for random workloads
    #[arg(long)]
    seed: Option<u64>,

    /// Measured iterations per case
    #[arg(long)]
    iterations: Option<usize>,

    /// Unmeasured iterations per case
    #[arg(long)]
    warmup: Option<usize>,

    /// Only concurrent cases using this mechanism (threads or tasks)
    #[arg(long)]
    mechanism: Option<ExecutionMechanism>,

    /// Only cases using this install path (legacy or revised)
    #[arg(long)]
    install_path: Option<InstallPath>,

    /// Only concurrent cases with this worker count (a number or "max")
    #[arg(long)]
    threads: Option<ThreadCount>,

    /// Simulated artifact load cost, e.g. "20us"
    #[arg(long, value_parser = parse_duration)]
    load_cost: Option<Duration>,

    /// Keep installed bundles between iterations
    #[arg(long, default_value = "false")]
    keep_installed: bool,

    /// Print reports as JSON
    #[arg(long, default_value = "false")]
    json: bool,

    /// Append reports to the results history
    #[arg(long, default_value = "false")]
    save: bool,

    /// Show a progress bar per case
    #[arg(long, default_value = "false")]
    progress: bool,
}

impl RunArgs {
    fn apply(&self, mut config: BenchmarkConfig) -> BenchmarkConfig {
        if let Some(size) = self.workload_size {
            config = config.with_workload_size(size);
        }
        if let Some(mode) = self.mode {
            config = config.with_workload_mode(mode);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(iterations) = self.iterations {
            config = config.with_iterations(iterations);
        }
        if let Some(warmup) = self.warmup {
            config = config.with_warmup_iterations(warmup);
        }
        if let Some(cost) = self.load_cost {
            config = config.with_load_cost(cost);
        }
        if let Some(mechanism) = self.mechanism {
            config = config.with_mechanism(mechanism);
        }
        if let Some(path) = self.install_path {
            config = config.with_install_path(path);
        }
        if let Some(threads) = self.threads {
            config = config.with_threads(threads);
        }
        if self.keep_installed {
            config = config.with_release_between_iterations(false);
        }
        config
    }

    fn selects(&self, case: &CaseSpec) -> bool {
        match &case.kind {
            CaseKind::Single { .. } => self.mechanism.is_none() && self.threads.is_none(),
            CaseKind::Concurrent { threads } => {
                self.mechanism.map_or(true, |m| m == case.mechanism)
                    && self.install_path.map_or(true, |p| p == case.install_path)
                    && self.threads.map_or(true, |t| t == *threads)
            }
        }
    }

    fn select(&self, cases: Vec<CaseSpec>) -> Vec<CaseSpec> {
        filter_cases(cases, self.filter.as_deref())
            .into_iter()
            .filter(|case| self.selects(case))
            .collect()
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<BenchmarkConfig> {
    match path {
        Some(path) => BenchmarkConfig::load_from(path),
        None => BenchmarkConfig::load(),
    }
}

fn run(args: &RunArgs, config: BenchmarkConfig) -> Result<bool> {
    let config = args.apply(config);
    config.validate()?;

    let cases = args.select(default_suite(&config));
    if cases.is_empty() {
        error!("no case matches the selection");
        return Ok(false);
    }
    info!(cases = cases.len(), iterations = config.iterations, "running suite");

    let mut runner = FixedIterations::new(config.iterations)
        .with_warmup(config.warmup_iterations)
        .with_progress(args.progress);
    let outcome = run_suite(
        &cases,
        &config,
        |case_config| Arc::new(reference_framework(case_config)) as Arc<dyn Framework>,
        &mut runner,
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome.reports)?);
    } else {
        for report in &outcome.reports {
            println!("{}", report.summary());
        }
    }
    for (case, e) in &outcome.failures {
        eprintln!("{} failed: {}", case, e);
    }

    if args.save && !outcome.reports.is_empty() {
        let storage = ResultsStorage::new()?;
        let saved = outcome.reports.len();
        storage.append_results(outcome.reports.iter().cloned())?;
        info!(saved, path = %storage.path().display(), "results saved");
    }

    Ok(outcome.is_success())
}

fn execute(cli: Cli) -> Result<bool> {
    let config = load_config(cli.config.as_ref())?;
    init_logging(&config.log_level, cli.log_json);

    match cli.command {
        Command::Run(args) => run(&args, config),
        Command::List { filter } => {
            for case in filter_cases(default_suite(&config), filter.as_deref()) {
                println!("{}", case);
            }
            Ok(true)
        }
        Command::Config { write } => {
            print!("{}", toml::to_string_pretty(&config)?);
            if write {
                config.save()?;
                info!(path = %BenchmarkConfig::config_file_path()?.display(), "configuration saved");
            }
            Ok(true)
        }
        Command::History { count, clear } => {
            let storage = ResultsStorage::new()?;
            if clear {
                storage.clear_results()?;
                return Ok(true);
            }
            for report in storage.get_recent_results(count)? {
                println!(
                    "{} {}",
                    report.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    report.summary()
                );
            }
            Ok(true)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
