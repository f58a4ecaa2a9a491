//! Execution-provider sweep.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use visinfer_inference::ExecutionProvider;

use super::clock::Clock;
use super::memory::{MemoryProbe, bytes_to_mb};
use super::stats::TimingStats;
use super::{MAX_ITERATIONS, MIN_ITERATIONS};
use crate::error::ValidationError;
use crate::session::ModelManager;

/// Shared flag used to stop a running sweep.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Providers to compare and how often to run each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRequest {
    pub providers: Vec<ExecutionProvider>,
    pub iterations: usize,
}

impl BenchmarkRequest {
    pub fn new(providers: Vec<ExecutionProvider>, iterations: usize) -> Self {
        Self {
            providers,
            iterations,
        }
    }

    /// Check the repetition count and the candidate list.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&self.iterations) {
            return Err(ValidationError::IterationsOutOfRange {
                value: self.iterations,
                min: MIN_ITERATIONS,
                max: MAX_ITERATIONS,
            });
        }
        if self.providers.is_empty() {
            return Err(ValidationError::NoCandidates);
        }
        Ok(())
    }
}

/// Outcome of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkStatus {
    Success,
    Error,
    Cancelled,
}

impl BenchmarkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BenchmarkStatus::Success => "success",
            BenchmarkStatus::Error => "error",
            BenchmarkStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BenchmarkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measurements for one execution provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub provider: ExecutionProvider,
    pub avg_ms: f64,
    pub std_dev_ms: f64,
    /// Last memory reading in bytes.
    pub memory_used: Option<u64>,
    /// Highest memory reading in bytes.
    pub memory_peak: Option<u64>,
    pub iterations: usize,
    pub status: BenchmarkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BenchmarkResult {
    fn success(
        provider: ExecutionProvider,
        iterations: usize,
        stats: TimingStats,
        memory_used: Option<u64>,
        memory_peak: Option<u64>,
    ) -> Self {
        Self {
            provider,
            avg_ms: stats.mean_ms,
            std_dev_ms: stats.std_dev_ms,
            memory_used,
            memory_peak,
            iterations,
            status: BenchmarkStatus::Success,
            error: None,
        }
    }

    fn zeroed(
        provider: ExecutionProvider,
        iterations: usize,
        status: BenchmarkStatus,
        error: Option<String>,
    ) -> Self {
        Self {
            provider,
            avg_ms: 0.0,
            std_dev_ms: 0.0,
            memory_used: None,
            memory_peak: None,
            iterations,
            status,
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BenchmarkStatus::Success
    }

    pub fn memory_used_mb(&self) -> Option<f64> {
        self.memory_used.map(bytes_to_mb)
    }

    pub fn memory_peak_mb(&self) -> Option<f64> {
        self.memory_peak.map(bytes_to_mb)
    }
}

/// Progress notifications emitted during a sweep.
#[derive(Debug, Clone, Copy)]
pub enum BenchmarkEvent<'a> {
    /// A candidate is about to be loaded.
    CandidateStarted {
        provider: ExecutionProvider,
        index: usize,
        total: usize,
    },
    /// One timed run finished.
    Iteration {
        provider: ExecutionProvider,
        iteration: usize,
        elapsed_ms: f64,
    },
    /// A candidate's result is final.
    CandidateFinished(&'a BenchmarkResult),
}

/// Runs the same input through each execution provider and times it.
pub struct BenchmarkRunner {
    clock: Box<dyn Clock>,
    memory: Box<dyn MemoryProbe>,
    cancel: CancelFlag,
}

impl BenchmarkRunner {
    pub fn new(clock: impl Clock + 'static, memory: impl MemoryProbe + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            memory: Box::new(memory),
            cancel: CancelFlag::new(),
        }
    }

    /// Observe `flag` between iterations.
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = flag;
        self
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Run the sweep. See [`BenchmarkRunner::run_with_progress`].
    pub fn run(
        &self,
        manager: &mut ModelManager,
        request: &BenchmarkRequest,
        input: &[f32],
    ) -> Result<Vec<BenchmarkResult>, ValidationError> {
        self.run_with_progress(manager, request, input, |_| {})
    }

    /// Run the sweep, reporting progress to `on_event`.
    ///
    /// Preconditions are checked before any candidate is touched. Each
    /// candidate's failure is recorded in its result and the sweep moves on.
    /// Results come back in request order. The manager is left holding the
    /// last candidate that loaded successfully.
    pub fn run_with_progress<F>(
        &self,
        manager: &mut ModelManager,
        request: &BenchmarkRequest,
        input: &[f32],
        mut on_event: F,
    ) -> Result<Vec<BenchmarkResult>, ValidationError>
    where
        F: FnMut(BenchmarkEvent<'_>),
    {
        if input.is_empty() {
            return Err(ValidationError::MissingInput);
        }
        request.validate()?;

        let total = request.providers.len();
        let iterations = request.iterations;
        info!(
            "Benchmarking {} provider(s), {} iteration(s) each",
            total, iterations
        );

        let mut results = Vec::with_capacity(total);
        for (index, &provider) in request.providers.iter().enumerate() {
            on_event(BenchmarkEvent::CandidateStarted {
                provider,
                index,
                total,
            });

            let result = self.run_candidate(manager, provider, iterations, input, &mut on_event);
            let cancelled = result.status == BenchmarkStatus::Cancelled;
            on_event(BenchmarkEvent::CandidateFinished(&result));
            results.push(result);

            if cancelled {
                info!("Benchmark cancelled during {}", provider);
                break;
            }
        }

        Ok(results)
    }

    fn run_candidate<F>(
        &self,
        manager: &mut ModelManager,
        provider: ExecutionProvider,
        iterations: usize,
        input: &[f32],
        on_event: &mut F,
    ) -> BenchmarkResult
    where
        F: FnMut(BenchmarkEvent<'_>),
    {
        if self.cancel.is_cancelled() {
            return BenchmarkResult::zeroed(provider, iterations, BenchmarkStatus::Cancelled, None);
        }

        if let Err(e) = manager.reload_provider(provider) {
            warn!(provider = %provider, error = %e, "Provider failed to load");
            return BenchmarkResult::zeroed(
                provider,
                iterations,
                BenchmarkStatus::Error,
                Some(e.to_string()),
            );
        }

        let mut memory_used = self.memory.used_bytes();
        let mut memory_peak = memory_used;
        let mut samples = Vec::with_capacity(iterations);

        for iteration in 0..iterations {
            if self.cancel.is_cancelled() {
                return BenchmarkResult::zeroed(
                    provider,
                    iterations,
                    BenchmarkStatus::Cancelled,
                    None,
                );
            }

            let start = self.clock.now_ms();
            if let Err(e) = manager.run_raw(input) {
                warn!(provider = %provider, iteration, error = %e, "Inference failed");
                return BenchmarkResult::zeroed(
                    provider,
                    iterations,
                    BenchmarkStatus::Error,
                    Some(e.to_string()),
                );
            }
            let elapsed_ms = self.clock.now_ms() - start;
            samples.push(elapsed_ms);

            memory_used = self.memory.used_bytes();
            memory_peak = match (memory_peak, memory_used) {
                (Some(peak), Some(used)) => Some(peak.max(used)),
                (peak, used) => peak.or(used),
            };

            debug!("{} iteration {}: {:.2} ms", provider, iteration + 1, elapsed_ms);
            on_event(BenchmarkEvent::Iteration {
                provider,
                iteration,
                elapsed_ms,
            });
        }

        let stats = TimingStats::from_samples(&samples);
        info!(
            "{}: {:.2} ms ± {:.2} ms",
            provider, stats.mean_ms, stats.std_dev_ms
        );
        BenchmarkResult::success(provider, iterations, stats, memory_used, memory_peak)
    }
}
