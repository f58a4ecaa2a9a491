//! Configuration structures for classification and benchmarking.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use visinfer_inference::{ExecutionProvider, OptimizationLevel, ProviderPreference};

use crate::benchmark::{MAX_ITERATIONS, MIN_ITERATIONS};
use crate::error::{Result, ValidationError, VisinferError};
use crate::preprocess::{DEFAULT_MAX_FILE_SIZE, DEFAULT_TARGET_SIZE, ImagePreprocessor};

/// Main configuration for visinfer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Model file locations.
    pub models: ModelConfig,

    /// Session settings.
    pub inference: InferenceConfig,

    /// Image input settings.
    pub image: ImageConfig,

    /// Benchmark defaults.
    pub benchmark: BenchmarkConfig,
}

/// Model file paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing model and label files.
    pub model_dir: PathBuf,

    /// Registry name of the model used when none is given.
    pub default_model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            default_model: "ResNet18".to_string(),
        }
    }
}

/// Inference session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Execution provider, or `auto` for every available one.
    pub execution_provider: ProviderPreference,

    /// Graph optimization level.
    pub optimization_level: OptimizationLevel,

    /// Number of intra-op threads (runtime default when unset).
    pub intra_threads: Option<usize>,

    /// Number of predictions returned by classification.
    pub top_k: usize,

    /// Use the model's declared input shape when it is static.
    pub honor_model_shape: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            execution_provider: ProviderPreference::Auto,
            optimization_level: OptimizationLevel::All,
            intra_threads: None,
            top_k: 5,
            honor_model_shape: true,
        }
    }
}

/// Image input configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Square side the image is resized to.
    pub target_size: u32,

    /// Maximum accepted file size in bytes.
    pub max_file_size: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl ImageConfig {
    /// Build a preprocessor from these settings.
    pub fn preprocessor(&self) -> ImagePreprocessor {
        ImagePreprocessor::new()
            .with_target_size(self.target_size)
            .with_max_file_size(self.max_file_size)
    }
}

/// Benchmark defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Inference repetitions per provider.
    pub iterations: usize,

    /// Providers to compare (empty = every provider the engine offers).
    pub providers: Vec<ExecutionProvider>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            iterations: 5,
            providers: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| VisinferError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| VisinferError::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check value ranges.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.inference.top_k == 0 {
            return Err(ValidationError::InvalidValue {
                field: "inference.top_k".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.image.target_size == 0 {
            return Err(ValidationError::InvalidValue {
                field: "image.target_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&self.benchmark.iterations) {
            return Err(ValidationError::IterationsOutOfRange {
                value: self.benchmark.iterations,
                min: MIN_ITERATIONS,
                max: MAX_ITERATIONS,
            });
        }
        Ok(())
    }

    /// Get full path to a file in the model directory.
    pub fn model_path(&self, file_name: &str) -> PathBuf {
        self.models.model_dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.inference.execution_provider = ProviderPreference::Explicit(ExecutionProvider::Xnnpack);
        config.benchmark.providers = vec![ExecutionProvider::Cpu, ExecutionProvider::Xnnpack];
        config.save(&path).unwrap();

        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"image": {"target_size": 256}}"#).unwrap();

        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded.image.target_size, 256);
        assert_eq!(loaded.image.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(loaded.inference.top_k, 5);
        assert_eq!(loaded.models.default_model, "ResNet18");
    }

    #[test]
    fn test_rejects_out_of_range_iterations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"benchmark": {"iterations": 51}}"#).unwrap();

        let err = AppConfig::from_file(&path).unwrap_err();
        assert!(matches!(
            err,
            VisinferError::Validation(ValidationError::IterationsOutOfRange { value: 51, .. })
        ));
    }

    #[test]
    fn test_model_path() {
        let config = AppConfig::default();
        assert_eq!(
            config.model_path("resnet18.onnx"),
            PathBuf::from("models/resnet18.onnx")
        );
    }
}
