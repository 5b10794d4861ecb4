//! Workload generation
//!
//! Produces the bundle identifiers a case installs, either numbered
//! 1..=N in order or drawn uniformly from the same range with replacement.

use std::fmt;
use std::str::FromStr;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{BenchError, Result};

/// Identifier of an installable bundle (a path or symbolic name)
pub type BundleIdentifier = String;

/// How identifiers are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadMode {
    /// `1..=N` in order, no duplicates
    #[default]
    Sequential,
    /// Uniform draws from `1..=N` with replacement
    Random,
}

impl WorkloadMode {
    pub fn name(&self) -> &'static str {
        match self {
            WorkloadMode::Sequential => "sequential",
            WorkloadMode::Random => "random",
        }
    }
}

impl fmt::Display for WorkloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WorkloadMode {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" | "seq" => Ok(WorkloadMode::Sequential),
            "random" | "rand" => Ok(WorkloadMode::Random),
            other => Err(BenchError::ConfigError(format!(
                "Unknown workload mode '{}' (expected sequential or random)",
                other
            ))),
        }
    }
}

/// Generator of bundle identifiers
///
/// Owns its random source. Seed it explicitly for reproducible random
/// workloads; otherwise it is seeded from entropy once at construction.
#[derive(Debug, Clone)]
pub struct WorkloadGenerator {
    prefix: String,
    rng: SmallRng,
}

impl WorkloadGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn seeded(prefix: impl Into<String>, seed: u64) -> Self {
        Self {
            prefix: prefix.into(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn with_seed(prefix: impl Into<String>, seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(prefix, seed),
            None => Self::new(prefix),
        }
    }

    /// Identifier of the `number`-th bundle
    pub fn identifier(&self, number: usize) -> BundleIdentifier {
        format!("{}{}", self.prefix, number)
    }

    /// Generate `size` identifiers
    pub fn generate(&mut self, size: usize, mode: WorkloadMode) -> Vec<BundleIdentifier> {
        match mode {
            WorkloadMode::Sequential => (1..=size).map(|n| self.identifier(n)).collect(),
            WorkloadMode::Random => (0..size)
                .map(|_| {
                    let n = self.rng.gen_range(1..=size);
                    self.identifier(n)
                })
                .collect(),
        }
    }
}
