//! Benchmark result data models
//!
//! Contains structures for storing and serializing case reports and the
//! statistics computed over their timing samples.

use crate::config::BenchmarkConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Outcome of one benchmark case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    /// Timestamp when the case finished
    pub timestamp: DateTime<Utc>,
    /// Registered case name
    pub case: String,
    /// Effective configuration of the case
    pub config: BenchmarkConfig,
    /// Concurrent workers per iteration
    pub workers: usize,
    /// Install calls issued per measured iteration
    pub installs_per_iteration: usize,
    /// Manual samples, one per measured iteration
    #[serde(with = "durations_serde")]
    pub samples: Vec<Duration>,
    /// Statistics over `samples`
    pub stats: SampleStats,
}

/// Summary statistics over iteration samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    #[serde(with = "duration_serde")]
    pub min: Duration,
    #[serde(with = "duration_serde")]
    pub mean: Duration,
    #[serde(with = "duration_serde")]
    pub max: Duration,
    /// Percentiles (50th, 95th, 99th)
    #[serde(with = "percentiles_serde")]
    pub percentiles: BTreeMap<u8, Duration>,
}

impl CaseReport {
    pub fn new(
        case: impl Into<String>,
        config: BenchmarkConfig,
        workers: usize,
        installs_per_iteration: usize,
        samples: Vec<Duration>,
    ) -> Self {
        let stats = SampleStats::from_samples(&samples);
        Self {
            timestamp: Utc::now(),
            case: case.into(),
            config,
            workers,
            installs_per_iteration,
            samples,
            stats,
        }
    }

    /// Mean installs per second across measured iterations
    pub fn installs_per_second(&self) -> f64 {
        crate::util::calculate_rate(self.installs_per_iteration as u64, self.stats.mean)
    }

    /// Get a human-readable summary of the case
    pub fn summary(&self) -> String {
        format!(
            "{} - {} worker(s) - {} installs - mean {} - p95 {} - {}",
            self.case,
            self.workers,
            self.installs_per_iteration,
            crate::util::format_latency(self.stats.mean),
            crate::util::format_latency(self.stats.p95()),
            crate::util::format_rate(self.installs_per_second()),
        )
    }
}

impl SampleStats {
    /// Create statistics from a list of samples
    pub fn from_samples(samples: &[Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort();
        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let mean_nanos: u128 =
            sorted.iter().map(|d| d.as_nanos()).sum::<u128>() / sorted.len() as u128;
        let mean = Duration::from_nanos(mean_nanos as u64);

        let mut percentiles = BTreeMap::new();
        for p in [50u8, 95, 99] {
            let index = (sorted.len() * p as usize / 100).min(sorted.len() - 1);
            percentiles.insert(p, sorted[index]);
        }

        Self {
            min,
            mean,
            max,
            percentiles,
        }
    }

    pub fn p50(&self) -> Duration {
        self.percentiles.get(&50).copied().unwrap_or(self.mean)
    }

    /// Get the 95th percentile
    pub fn p95(&self) -> Duration {
        self.percentiles.get(&95).copied().unwrap_or(self.max)
    }

    /// Get the 99th percentile
    pub fn p99(&self) -> Duration {
        self.percentiles.get(&99).copied().unwrap_or(self.max)
    }
}

// Custom serde modules for Duration serialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

mod durations_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let secs: Vec<f64> = durations.iter().map(Duration::as_secs_f64).collect();
        secs.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<f64>::deserialize(deserializer)?
            .into_iter()
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .collect()
    }
}

mod percentiles_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;
    use std::time::Duration;

    pub fn serialize<S>(
        percentiles: &BTreeMap<u8, Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let secs_map: BTreeMap<u8, f64> = percentiles
            .iter()
            .map(|(&k, v)| (k, v.as_secs_f64()))
            .collect();
        secs_map.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<u8, Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        BTreeMap::<u8, f64>::deserialize(deserializer)?
            .into_iter()
            .map(|(k, secs)| {
                Duration::try_from_secs_f64(secs)
                    .map(|d| (k, d))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}
