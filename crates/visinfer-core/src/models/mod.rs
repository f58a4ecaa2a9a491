//! Configuration and model catalogue.

pub mod config;
pub mod registry;

pub use config::{AppConfig, BenchmarkConfig, ImageConfig, InferenceConfig, ModelConfig};
pub use registry::{ModelSpec, available_models, find_model};
