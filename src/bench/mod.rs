//! Benchmark engine module
//!
//! Contains workload generation, partitioning, the concurrent executor,
//! manual iteration timing and the per-case fixture.

pub mod fixture;
pub mod partition;
pub mod suite;
pub mod timer;
pub mod worker;
pub mod workload;

// Re-export commonly used types
pub use fixture::{CaseKind, CaseSpec, InstallFixture};
pub use partition::{Partition, Partitioner};
pub use suite::{default_suite, filter_cases, reference_framework, run_case, run_suite, SuiteOutcome};
pub use timer::{FixedIterations, Runner, SampleSink, Stopwatch};
pub use worker::{ConcurrentExecutor, ExecutionMechanism, TaskSpawner};
pub use workload::{BundleIdentifier, WorkloadGenerator, WorkloadMode};
