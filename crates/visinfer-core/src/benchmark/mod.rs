//! Execution-provider benchmarking.
//!
//! The runner loads the current model on each candidate provider in turn,
//! times `k` sequential inferences of the same tensor and reduces them to
//! mean and population standard deviation, sampling memory along the way.

mod clock;
mod memory;
mod report;
mod runner;
mod stats;

pub use clock::{Clock, InstantClock};
pub use memory::{MemoryProbe, NoMemoryProbe, ProcessMemoryProbe, bytes_to_mb};
pub use report::{BenchmarkReport, CSV_HEADER};
pub use runner::{
    BenchmarkEvent, BenchmarkRequest, BenchmarkResult, BenchmarkRunner, BenchmarkStatus,
    CancelFlag,
};
pub use stats::TimingStats;

/// Fewest repetitions per provider.
pub const MIN_ITERATIONS: usize = 1;

/// Most repetitions per provider.
pub const MAX_ITERATIONS: usize = 50;
