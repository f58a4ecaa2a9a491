//! Core library for ONNX image classification and execution-provider
//! benchmarking.
//!
//! This crate provides:
//! - Image validation and planar tensor preprocessing
//! - Label tables and top-k selection
//! - A model manager owning one inference session at a time
//! - A benchmark runner comparing execution providers
//! - Application configuration and the built-in model catalogue

pub mod benchmark;
pub mod classify;
pub mod error;
pub mod models;
pub mod preprocess;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use benchmark::{
    BenchmarkReport, BenchmarkRequest, BenchmarkResult, BenchmarkRunner, BenchmarkStatus,
    CancelFlag, TimingStats,
};
pub use classify::{LabelTable, Prediction, top_k};
pub use error::{ErrorKind, ImageError, ModelError, Result, ValidationError, VisinferError};
pub use models::{AppConfig, ModelSpec, available_models, find_model};
pub use preprocess::{ImagePreprocessor, MediaType};
pub use session::{Classification, LoadRequest, ModelInfo, ModelManager};

/// Re-export inference types.
pub use visinfer_inference::{
    ExecutionProvider, InferenceBackend, InferenceEngine, OptimizationLevel, ProviderPreference,
};

#[cfg(feature = "native")]
pub use visinfer_inference::OrtEngine;

#[cfg(feature = "wasm")]
pub use visinfer_inference::TractEngine;
