//! Execution providers and graph optimization levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Hardware/software backend an inference session can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Plain CPU kernels (always available).
    Cpu,
    /// XNNPACK optimized CPU kernels.
    Xnnpack,
    /// NVIDIA CUDA.
    Cuda,
}

impl ExecutionProvider {
    /// All providers known to visinfer, most accelerated first.
    pub const ALL: [ExecutionProvider; 3] = [
        ExecutionProvider::Cuda,
        ExecutionProvider::Xnnpack,
        ExecutionProvider::Cpu,
    ];

    /// Stable lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionProvider::Cpu => "cpu",
            ExecutionProvider::Xnnpack => "xnnpack",
            ExecutionProvider::Cuda => "cuda",
        }
    }

    /// Short human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            ExecutionProvider::Cpu => "Default CPU kernels - best compatibility, lowest throughput",
            ExecutionProvider::Xnnpack => "XNNPACK - SIMD-optimized CPU kernels for float inference",
            ExecutionProvider::Cuda => "CUDA - NVIDIA GPU acceleration",
        }
    }
}

impl fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(ExecutionProvider::Cpu),
            "xnnpack" => Ok(ExecutionProvider::Xnnpack),
            "cuda" => Ok(ExecutionProvider::Cuda),
            other => Err(format!("unknown execution provider: {other}")),
        }
    }
}

/// Provider selection for a session: either a fixed provider or whatever the
/// engine reports as available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProviderPreference {
    /// Every provider the engine can bind, in the engine's preference order.
    #[default]
    Auto,
    /// A single explicit provider.
    Explicit(ExecutionProvider),
}

impl ProviderPreference {
    /// Expand the preference into an ordered provider list.
    pub fn resolve(&self, available: &[ExecutionProvider]) -> Vec<ExecutionProvider> {
        match self {
            ProviderPreference::Auto => available.to_vec(),
            ProviderPreference::Explicit(provider) => vec![*provider],
        }
    }
}

impl fmt::Display for ProviderPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderPreference::Auto => f.write_str("auto"),
            ProviderPreference::Explicit(provider) => provider.fmt(f),
        }
    }
}

impl FromStr for ProviderPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(ProviderPreference::Auto)
        } else {
            s.parse().map(ProviderPreference::Explicit)
        }
    }
}

impl From<ExecutionProvider> for ProviderPreference {
    fn from(provider: ExecutionProvider) -> Self {
        ProviderPreference::Explicit(provider)
    }
}

impl TryFrom<String> for ProviderPreference {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProviderPreference> for String {
    fn from(value: ProviderPreference) -> Self {
        value.to_string()
    }
}

/// Graph optimization level applied when a session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    /// No graph rewrites.
    Disabled,
    /// Redundant node elimination and constant folding.
    Basic,
    /// Basic plus node fusions.
    Extended,
    /// Every available optimization, including layout changes.
    #[default]
    All,
}

impl FromStr for OptimizationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "none" => Ok(OptimizationLevel::Disabled),
            "basic" => Ok(OptimizationLevel::Basic),
            "extended" => Ok(OptimizationLevel::Extended),
            "all" => Ok(OptimizationLevel::All),
            other => Err(format!("unknown optimization level: {other}")),
        }
    }
}
