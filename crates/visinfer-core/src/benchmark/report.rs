//! Benchmark reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::runner::{BenchmarkResult, BenchmarkStatus};

/// Column names of the CSV export.
pub const CSV_HEADER: [&str; 7] = [
    "Provider",
    "Avg Time (ms)",
    "Std Dev (ms)",
    "Memory (MB)",
    "Peak Memory (MB)",
    "Iterations",
    "Status",
];

/// A finished sweep with the context it ran in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub model_name: String,
    pub image: Option<String>,
    pub iterations: usize,
    pub timestamp: DateTime<Utc>,
    pub results: Vec<BenchmarkResult>,
}

impl BenchmarkReport {
    pub fn new(
        model_name: impl Into<String>,
        iterations: usize,
        results: Vec<BenchmarkResult>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            image: None,
            iterations,
            timestamp: Utc::now(),
            results,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Successful result with the lowest mean time.
    pub fn fastest(&self) -> Option<&BenchmarkResult> {
        self.results
            .iter()
            .filter(|r| r.status == BenchmarkStatus::Success)
            .min_by(|a, b| a.avg_ms.total_cmp(&b.avg_ms))
    }

    /// One CSV record per result, matching [`CSV_HEADER`].
    ///
    /// Unavailable memory readings are written as `N/A`.
    pub fn csv_records(&self) -> Vec<[String; 7]> {
        self.results.iter().map(csv_record).collect()
    }
}

fn csv_record(result: &BenchmarkResult) -> [String; 7] {
    let mb = |value: Option<f64>| value.map_or_else(|| "N/A".to_string(), |v| format!("{:.2}", v));
    [
        result.provider.to_string(),
        format!("{:.2}", result.avg_ms),
        format!("{:.2}", result.std_dev_ms),
        mb(result.memory_used_mb()),
        mb(result.memory_peak_mb()),
        result.iterations.to_string(),
        result.status.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use visinfer_inference::ExecutionProvider;

    fn result(provider: ExecutionProvider, avg_ms: f64, status: BenchmarkStatus) -> BenchmarkResult {
        BenchmarkResult {
            provider,
            avg_ms,
            std_dev_ms: 0.5,
            memory_used: Some(64 * 1024 * 1024),
            memory_peak: Some(96 * 1024 * 1024),
            iterations: 5,
            status,
            error: None,
        }
    }

    #[test]
    fn test_fastest_ignores_failures() {
        let report = BenchmarkReport::new(
            "ResNet18",
            5,
            vec![
                result(ExecutionProvider::Cpu, 12.0, BenchmarkStatus::Success),
                result(ExecutionProvider::Cuda, 0.0, BenchmarkStatus::Error),
                result(ExecutionProvider::Xnnpack, 8.0, BenchmarkStatus::Success),
            ],
        );
        assert_eq!(report.fastest().unwrap().provider, ExecutionProvider::Xnnpack);

        let empty = BenchmarkReport::new("ResNet18", 5, Vec::new());
        assert!(empty.fastest().is_none());
    }

    #[test]
    fn test_csv_records() {
        let mut failed = result(ExecutionProvider::Cuda, 0.0, BenchmarkStatus::Error);
        failed.memory_used = None;
        failed.memory_peak = None;
        let report = BenchmarkReport::new(
            "ResNet18",
            5,
            vec![result(ExecutionProvider::Cpu, 12.345, BenchmarkStatus::Success), failed],
        );

        let records = report.csv_records();
        assert_eq!(
            records[0],
            ["cpu", "12.35", "0.50", "64.00", "96.00", "5", "success"].map(String::from)
        );
        assert_eq!(
            records[1],
            ["cuda", "0.00", "0.50", "N/A", "N/A", "5", "error"].map(String::from)
        );
    }

    #[test]
    fn test_report_json() {
        let report = BenchmarkReport::new(
            "ResNet18",
            5,
            vec![result(ExecutionProvider::Cpu, 10.0, BenchmarkStatus::Success)],
        )
        .with_image("cat.jpg");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["image"], "cat.jpg");
        assert_eq!(json["results"][0]["provider"], "cpu");
        assert_eq!(json["results"][0]["status"], "success");
        assert!(json["results"][0].get("error").is_none());
    }
}
