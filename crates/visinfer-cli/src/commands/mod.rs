//! Subcommands and the helpers they share.

pub mod benchmark;
pub mod classify;
pub mod config;
pub mod models;
pub mod providers;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use console::style;
use tracing::{debug, warn};

use visinfer_core::models::find_model;
use visinfer_core::models::registry::IMAGENET_LABELS;
use visinfer_core::{AppConfig, InferenceEngine, LabelTable, LoadRequest, OrtEngine};

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("visinfer")
        .join("config.json")
}

/// Load the configuration from `--config`, the default location, or defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    if let Some(path) = path {
        return Ok(AppConfig::from_file(path)?);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config file {}", default_path.display());
        Ok(AppConfig::from_file(&default_path)?)
    } else {
        Ok(AppConfig::default())
    }
}

/// Engine used by every command.
pub fn create_engine() -> Arc<dyn InferenceEngine> {
    Arc::new(OrtEngine::new())
}

/// Model selection flags shared by `classify` and `benchmark`.
#[derive(Args, Debug, Clone)]
pub struct ModelSelection {
    /// Built-in model name (see `visinfer models list`)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Path to an ONNX model file, overrides --model
    #[arg(long)]
    pub model_path: Option<PathBuf>,

    /// Path to a JSON label file
    #[arg(long)]
    pub labels: Option<PathBuf>,
}

/// Where a model and its labels live on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFiles {
    pub name: String,
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
}

impl ModelSelection {
    /// Resolve the flags against the configuration and the model catalogue.
    pub fn resolve(&self, config: &AppConfig) -> anyhow::Result<ModelFiles> {
        let model_dir = &config.models.model_dir;

        if let Some(path) = &self.model_path {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("custom")
                .to_string();
            let labels_path = self
                .labels
                .clone()
                .unwrap_or_else(|| config.model_path(IMAGENET_LABELS));
            return Ok(ModelFiles {
                name,
                model_path: path.clone(),
                labels_path,
            });
        }

        let name = self.model.as_deref().unwrap_or(&config.models.default_model);
        let spec = find_model(name).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown model '{}'. Run 'visinfer models list' to see available models.",
                name
            )
        })?;

        Ok(ModelFiles {
            name: spec.name.to_string(),
            model_path: spec.model_path(model_dir),
            labels_path: self
                .labels
                .clone()
                .unwrap_or_else(|| spec.labels_path(model_dir)),
        })
    }
}

impl ModelFiles {
    /// Read the model and labels into a load request.
    ///
    /// A missing label file is not fatal: predictions fall back to
    /// `class_<index>` names.
    pub fn load_request(&self, config: &AppConfig) -> anyhow::Result<LoadRequest> {
        if !self.model_path.exists() {
            anyhow::bail!(
                "Model file not found: {}\nPlace the ONNX file there or pass --model-path.",
                self.model_path.display()
            );
        }
        let bytes = fs::read(&self.model_path)?;

        let labels = if self.labels_path.exists() {
            LabelTable::from_file(&self.labels_path)?
        } else {
            warn!("Label file {} not found", self.labels_path.display());
            eprintln!(
                "{} No labels at {}, run 'visinfer models labels' to fetch them.",
                style("⚠").yellow(),
                self.labels_path.display()
            );
            LabelTable::default()
        };

        Ok(LoadRequest::new(self.name.clone(), bytes)
            .with_labels(labels)
            .with_provider(config.inference.execution_provider)
            .with_optimization_level(config.inference.optimization_level)
            .with_intra_threads(config.inference.intra_threads)
            .with_target_size(config.image.target_size)
            .with_honor_model_shape(config.inference.honor_model_shape)
            .with_top_k(config.inference.top_k))
    }
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1}GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.1}MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.1}KB", bytes as f64 / 1_000.0)
    } else {
        format!("{}B", bytes)
    }
}
