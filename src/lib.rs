//! bundlebench - Bundle installation benchmarks
//!
//! Measures how long a module framework takes to install bundles, one at a
//! time or from many concurrent workers, and compares the legacy install
//! path against the revised one.

use std::fmt;

pub mod bench;
pub mod config;
pub mod framework;
pub mod logging;
pub mod models;
pub mod util;

/// Failure of a single worker inside one measured iteration
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerFailure {
    /// Index of the worker (and of its partition)
    pub worker: usize,
    /// Rendered error the worker stopped on
    pub reason: String,
}

impl fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker {}: {}", self.worker, self.reason)
    }
}

// Common error types
#[derive(Debug)]
pub enum BenchError {
    /// I/O operation failed
    IoError(std::io::Error),
    /// Configuration validation or parsing error
    ConfigError(String),
    /// The framework could not resolve or rejected a bundle
    InstallError {
        /// Identifier that was being installed
        identifier: String,
        /// Why the framework refused it
        reason: String,
    },
    /// Framework lifecycle misuse or failure
    FrameworkError(String),
    /// A worker terminated abnormally
    WorkerError(String),
    /// One or more workers of an iteration failed
    WorkersFailed(Vec<WorkerFailure>),
    /// Results persistence error
    PersistenceError(String),
}

impl BenchError {
    /// Shorthand for an install failure
    pub fn install(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        BenchError::InstallError {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchError::IoError(err) => write!(f, "I/O error: {}", err),
            BenchError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            BenchError::InstallError { identifier, reason } => {
                write!(f, "Failed to install '{}': {}", identifier, reason)
            }
            BenchError::FrameworkError(msg) => write!(f, "Framework error: {}", msg),
            BenchError::WorkerError(msg) => write!(f, "Worker error: {}", msg),
            BenchError::WorkersFailed(failures) => {
                write!(f, "{} worker(s) failed", failures.len())?;
                for failure in failures {
                    write!(f, "; {}", failure)?;
                }
                Ok(())
            }
            BenchError::PersistenceError(msg) => write!(f, "Results persistence error: {}", msg),
        }
    }
}

impl std::error::Error for BenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BenchError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BenchError {
    fn from(err: std::io::Error) -> Self {
        BenchError::IoError(err)
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        BenchError::PersistenceError(format!("JSON serialization error: {}", err))
    }
}

impl From<toml::de::Error> for BenchError {
    fn from(err: toml::de::Error) -> Self {
        BenchError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

impl From<toml::ser::Error> for BenchError {
    fn from(err: toml::ser::Error) -> Self {
        BenchError::ConfigError(format!("TOML serialization error: {}", err))
    }
}

/// Result type alias for bundlebench operations
pub type Result<T> = std::result::Result<T, BenchError>;

// Common types and constants
pub const APP_NAME: &str = "bundlebench";
pub const CONFIG_FILE: &str = "bundlebench.toml";
pub const RESULTS_FILE: &str = "results.json";
pub const MAX_RESULTS_HISTORY: usize = 100;
/// Bundles installed per measured iteration of a concurrent case
pub const DEFAULT_WORKLOAD_SIZE: usize = 5000;
/// Prefix of generated bundle identifiers
pub const DEFAULT_BUNDLE_PREFIX: &str = "bundles/mwbundle_";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workers_failed_lists_every_worker() {
        let err = BenchError::WorkersFailed(vec![
            WorkerFailure { worker: 0, reason: "missing".into() },
            WorkerFailure { worker: 3, reason: "rejected".into() },
        ]);
        let text = err.to_string();
        assert!(text.starts_with("2 worker(s) failed"));
        assert!(text.contains("worker 0: missing"));
        assert!(text.contains("worker 3: rejected"));
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error;
        let err = BenchError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(err.source().is_some());
        assert!(BenchError::install("a", "b").source().is_none());
    }
}
