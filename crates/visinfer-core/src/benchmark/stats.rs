//! Timing reduction.

use serde::{Deserialize, Serialize};

/// Mean and population standard deviation of a set of timings, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    pub mean_ms: f64,
    pub std_dev_ms: f64,
}

impl TimingStats {
    /// Reduce samples to mean and `sqrt(Σ(x - mean)² / n)`.
    ///
    /// An empty slice yields zeros.
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

        Self {
            mean_ms: mean,
            std_dev_ms: variance.sqrt(),
        }
    }
}
