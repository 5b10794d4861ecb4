//! Configuration management module
//!
//! Handles loading, saving, and validation of the benchmark configuration.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bench::worker::ExecutionMechanism;
use crate::bench::workload::WorkloadMode;
use crate::framework::InstallPath;
use crate::{BenchError, Result, APP_NAME, CONFIG_FILE, DEFAULT_BUNDLE_PREFIX, DEFAULT_WORKLOAD_SIZE};

pub mod persistence;

const MAX_THREADS: usize = 1024;

/// Benchmark configuration structure containing all run parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Bundles installed per iteration of a concurrent case
    pub workload_size: usize,
    /// How bundle identifiers are generated
    pub workload_mode: WorkloadMode,
    /// Seed for random workloads; entropy when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Number of concurrent workers
    pub threads: ThreadCount,
    /// Install operation under test
    pub install_path: InstallPath,
    /// Threads or async tasks
    pub mechanism: ExecutionMechanism,
    /// Measured iterations per case
    pub iterations: usize,
    /// Unmeasured iterations run before the measured ones
    pub warmup_iterations: usize,
    /// Uninstall everything installed by an iteration before the next one
    pub release_between_iterations: bool,
    /// Append the first bundle of the workload to the last partition
    pub oversubscribe_last: bool,
    /// Prefix of generated bundle identifiers
    pub bundle_prefix: String,
    /// Simulated artifact load cost of the in-process framework
    #[serde(with = "duration_text")]
    pub load_cost: Duration,
    /// Default tracing filter
    pub log_level: String,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            workload_size: DEFAULT_WORKLOAD_SIZE,
            workload_mode: WorkloadMode::Sequential,
            seed: None,
            threads: ThreadCount::Fixed(1),
            install_path: InstallPath::Legacy,
            mechanism: ExecutionMechanism::Threads,
            iterations: 10,
            warmup_iterations: 1,
            release_between_iterations: true,
            oversubscribe_last: false,
            bundle_prefix: DEFAULT_BUNDLE_PREFIX.to_string(),
            load_cost: Duration::from_micros(20),
            log_level: "info".to_string(),
        }
    }
}

/// Worker count of a concurrent case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ThreadCountRepr", into = "ThreadCountRepr")]
pub enum ThreadCount {
    Fixed(usize),
    /// One worker per available hardware thread
    Max,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ThreadCountRepr {
    Count(usize),
    Named(String),
}

impl TryFrom<ThreadCountRepr> for ThreadCount {
    type Error = BenchError;

    fn try_from(repr: ThreadCountRepr) -> Result<Self> {
        match repr {
            ThreadCountRepr::Count(n) => Ok(ThreadCount::Fixed(n)),
            ThreadCountRepr::Named(name) => name.parse(),
        }
    }
}

impl From<ThreadCount> for ThreadCountRepr {
    fn from(count: ThreadCount) -> Self {
        match count {
            ThreadCount::Fixed(n) => ThreadCountRepr::Count(n),
            ThreadCount::Max => ThreadCountRepr::Named("max".to_string()),
        }
    }
}

impl ThreadCount {
    /// Concrete worker count on this machine
    pub fn resolve(&self) -> usize {
        match self {
            ThreadCount::Fixed(n) => *n,
            ThreadCount::Max => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    /// Counts registered by the default suite
    pub fn suite() -> [ThreadCount; 4] {
        [
            ThreadCount::Fixed(1),
            ThreadCount::Fixed(2),
            ThreadCount::Fixed(4),
            ThreadCount::Max,
        ]
    }
}

impl fmt::Display for ThreadCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadCount::Fixed(n) => write!(f, "{}", n),
            ThreadCount::Max => f.write_str("max"),
        }
    }
}

impl FromStr for ThreadCount {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("max") {
            return Ok(ThreadCount::Max);
        }
        s.parse::<usize>()
            .map(ThreadCount::Fixed)
            .map_err(|_| BenchError::ConfigError(format!("Invalid thread count '{}'", s)))
    }
}

impl BenchmarkConfig {
    /// Create a new benchmark configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.workload_size == 0 {
            return Err(BenchError::ConfigError(
                "Workload size must be greater than 0".to_string(),
            ));
        }

        if self.iterations == 0 {
            return Err(BenchError::ConfigError(
                "Iteration count must be greater than 0".to_string(),
            ));
        }

        if let ThreadCount::Fixed(n) = self.threads {
            if n == 0 {
                return Err(BenchError::ConfigError(
                    "Thread count must be greater than 0".to_string(),
                ));
            }
            if n > MAX_THREADS {
                return Err(BenchError::ConfigError(format!(
                    "Too many threads: {} (max: {})",
                    n, MAX_THREADS
                )));
            }
        }

        if self.bundle_prefix.is_empty() {
            return Err(BenchError::ConfigError(
                "Bundle prefix must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_workload_size(mut self, size: usize) -> Self {
        self.workload_size = size;
        self
    }

    pub fn with_workload_mode(mut self, mode: WorkloadMode) -> Self {
        self.workload_mode = mode;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_threads(mut self, threads: ThreadCount) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_install_path(mut self, path: InstallPath) -> Self {
        self.install_path = path;
        self
    }

    pub fn with_mechanism(mut self, mechanism: ExecutionMechanism) -> Self {
        self.mechanism = mechanism;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_warmup_iterations(mut self, warmup: usize) -> Self {
        self.warmup_iterations = warmup;
        self
    }

    pub fn with_release_between_iterations(mut self, release: bool) -> Self {
        self.release_between_iterations = release;
        self
    }

    pub fn with_oversubscribe_last(mut self, enabled: bool) -> Self {
        self.oversubscribe_last = enabled;
        self
    }

    pub fn with_bundle_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.bundle_prefix = prefix.into();
        self
    }

    pub fn with_load_cost(mut self, cost: Duration) -> Self {
        self.load_cost = cost;
        self
    }

    /// Load configuration from the standard config file location
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load and validate configuration from `path`
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BenchError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            BenchError::ConfigError(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the standard config file location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    /// Validate and write configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BenchError::ConfigError(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(self)?;

        fs::write(path, content).map_err(|e| {
            BenchError::ConfigError(format!(
                "Failed to write config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Get the standard configuration file path
    /// Uses $CONFIG_HOME/bundlebench/bundlebench.toml
    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            BenchError::ConfigError("Unable to determine config directory".to_string())
        })?;

        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

/// Human-readable durations ("20us", "1s 500ms") in config files
mod duration_text {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = BenchmarkConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.workload_size, 5000);
        assert_eq!(config.threads, ThreadCount::Fixed(1));
        assert!(config.release_between_iterations);
        assert!(!config.oversubscribe_last);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let base = BenchmarkConfig::new();
        assert!(base.clone().with_workload_size(0).validate().is_err());
        assert!(base.clone().with_iterations(0).validate().is_err());
        assert!(base.clone().with_threads(ThreadCount::Fixed(0)).validate().is_err());
        assert!(base.clone().with_threads(ThreadCount::Fixed(4096)).validate().is_err());
        assert!(base.clone().with_bundle_prefix("").validate().is_err());
        assert!(base.with_threads(ThreadCount::Max).validate().is_ok());
    }

    #[test]
    fn test_thread_count() {
        assert_eq!("max".parse::<ThreadCount>().unwrap(), ThreadCount::Max);
        assert_eq!("4".parse::<ThreadCount>().unwrap(), ThreadCount::Fixed(4));
        assert!("four".parse::<ThreadCount>().is_err());
        assert_eq!(ThreadCount::Fixed(3).resolve(), 3);
        assert!(ThreadCount::Max.resolve() >= 1);
        assert_eq!(ThreadCount::Max.to_string(), "max");
    }

    #[test]
    fn test_toml_serialization() {
        let config = BenchmarkConfig::new()
            .with_threads(ThreadCount::Max)
            .with_workload_mode(WorkloadMode::Random)
            .with_seed(9)
            .with_mechanism(ExecutionMechanism::AsyncTasks)
            .with_install_path(InstallPath::Revised)
            .with_load_cost(Duration::from_micros(250));

        let toml_str = toml::to_string(&config).expect("Failed to serialize to TOML");
        assert!(toml_str.contains("threads = \"max\""));
        assert!(toml_str.contains("load_cost = \"250us\""));

        let deserialized: BenchmarkConfig =
            toml::from_str(&toml_str).expect("Failed to deserialize from TOML");
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BenchmarkConfig = toml::from_str("threads = 4\nworkload_mode = \"random\"\n")
            .expect("partial config");
        assert_eq!(config.threads, ThreadCount::Fixed(4));
        assert_eq!(config.workload_mode, WorkloadMode::Random);
        assert_eq!(config.workload_size, 5000);
    }

    #[test]
    fn test_save_and_load_roundtrip_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = BenchmarkConfig::new().with_iterations(3).with_threads(ThreadCount::Fixed(2));

        config.save_to(&path).unwrap();
        let loaded = BenchmarkConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "iterations = 0\n").unwrap();
        assert!(matches!(
            BenchmarkConfig::load_from(&path),
            Err(BenchError::ConfigError(_))
        ));
    }

    #[test]
    fn test_config_file_path() {
        let path = BenchmarkConfig::config_file_path();
        assert!(path.is_ok());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("bundlebench.toml"));
    }
}
