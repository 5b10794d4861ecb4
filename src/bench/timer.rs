//! Manual iteration timing
//!
//! The harness measures each iteration itself and hands the elapsed time
//! to whatever drives the iterations. [`Runner`] is that driver's side of
//! the contract; [`FixedIterations`] is the built-in one used by the binary.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error};

use crate::Result;

/// Monotonic stopwatch around one measured phase
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Elapsed time of the measured phase; consumes the stopwatch
    pub fn stop(self) -> Duration {
        self.started.elapsed()
    }
}

/// Run `phase` between two monotonic timestamps.
///
/// Nothing is returned for a failed phase, so a failure never yields a sample.
pub fn time_phase<T, F>(phase: F) -> Result<(T, Duration)>
where
    F: FnOnce() -> Result<T>,
{
    let stopwatch = Stopwatch::start();
    let value = phase()?;
    Ok((value, stopwatch.stop()))
}

/// Receiver of manual timing samples
pub trait SampleSink {
    fn report(&mut self, elapsed: Duration);
}

impl SampleSink for Vec<Duration> {
    fn report(&mut self, elapsed: Duration) {
        self.push(elapsed);
    }
}

/// Elapsed seconds as reported to runners
pub fn as_seconds(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64()
}

/// Drives the measured phase of a case and collects its samples
pub trait Runner {
    /// Invoke `measured` as many times as the runner decides.
    ///
    /// The first failing iteration aborts the case.
    fn run(
        &mut self,
        case: &str,
        measured: &mut dyn FnMut() -> Result<Duration>,
    ) -> Result<Vec<Duration>>;
}

/// Runner with a fixed warmup and iteration count
#[derive(Debug, Clone)]
pub struct FixedIterations {
    pub warmup: usize,
    pub iterations: usize,
    pub show_progress: bool,
}

impl FixedIterations {
    pub fn new(iterations: usize) -> Self {
        Self {
            warmup: 0,
            iterations,
            show_progress: false,
        }
    }

    pub fn with_warmup(mut self, warmup: usize) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn progress_bar(&self, case: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new((self.warmup + self.iterations) as u64);
        if let Ok(style) = ProgressStyle::with_template("{spinner} {prefix} {pos}/{len} {msg}") {
            pb.set_style(style);
        }
        pb.set_prefix(case.to_string());
        Some(pb)
    }
}

impl Runner for FixedIterations {
    fn run(
        &mut self,
        case: &str,
        measured: &mut dyn FnMut() -> Result<Duration>,
    ) -> Result<Vec<Duration>> {
        let pb = self.progress_bar(case);
        let mut samples: Vec<Duration> = Vec::with_capacity(self.iterations);

        for iteration in 0..self.warmup + self.iterations {
            let elapsed = match measured() {
                Ok(elapsed) => elapsed,
                Err(e) => {
                    error!(case, iteration, error = %e, "iteration failed");
                    if let Some(pb) = &pb {
                        pb.abandon_with_message("failed");
                    }
                    return Err(e);
                }
            };

            if iteration >= self.warmup {
                samples.report(elapsed);
            }
            debug!(case, iteration, seconds = as_seconds(elapsed), "iteration done");
            if let Some(pb) = &pb {
                pb.inc(1);
                pb.set_message(crate::util::format_latency(elapsed));
            }
        }

        if let Some(pb) = pb {
            pb.finish();
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BenchError;

    #[test]
    fn test_time_phase_measures_the_phase() {
        let (value, elapsed) = time_phase(|| {
            std::thread::sleep(Duration::from_millis(5));
            Ok(7)
        })
        .unwrap();
        assert_eq!(value, 7);
        assert!(elapsed >= Duration::from_millis(5));
    }

    #[test]
    fn test_failed_phase_yields_no_sample() {
        let result: Result<((), Duration)> =
            time_phase(|| Err(BenchError::WorkerError("down".into())));
        assert!(result.is_err());
    }

    #[test]
    fn test_stopwatch_is_monotonic() {
        let first = Stopwatch::start();
        let second = Stopwatch::start();
        std::thread::sleep(Duration::from_millis(2));
        let inner = second.stop();
        let outer = first.stop();
        assert!(outer >= inner);
        assert!(inner >= Duration::from_millis(2));
        assert!(as_seconds(outer) >= 0.0);
    }

    #[test]
    fn test_fixed_iterations_skips_warmup_samples() {
        let mut calls = 0u64;
        let mut runner = FixedIterations::new(3).with_warmup(2);
        let samples = runner
            .run("case", &mut || {
                calls += 1;
                Ok(Duration::from_millis(calls))
            })
            .unwrap();

        assert_eq!(calls, 5);
        assert_eq!(
            samples,
            vec![
                Duration::from_millis(3),
                Duration::from_millis(4),
                Duration::from_millis(5)
            ]
        );
    }

    #[test]
    fn test_fixed_iterations_stops_at_first_failure() {
        let mut calls = 0;
        let mut runner = FixedIterations::new(10);
        let result = runner.run("case", &mut || {
            calls += 1;
            if calls == 3 {
                Err(BenchError::install("b_3", "missing"))
            } else {
                Ok(Duration::from_millis(1))
            }
        });

        assert!(result.is_err());
        assert_eq!(calls, 3);
    }
}
