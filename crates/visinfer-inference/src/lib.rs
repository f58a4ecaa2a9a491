//! ONNX inference abstraction layer for visinfer.
//!
//! This crate provides a unified interface for creating inference sessions
//! and running ONNX models across different backends:
//! - `ort` with CPU, XNNPACK and (optionally) CUDA execution providers for native platforms
//! - `tract` directly for WASM/browser environments
//!
//! Sessions are created through an [`InferenceEngine`], which callers receive
//! explicitly instead of reaching for a process-wide runtime.

mod backend;
mod error;
mod provider;
mod session;
mod tensor;

pub use backend::InferenceBackend;
pub use error::InferenceError;
pub use provider::{ExecutionProvider, OptimizationLevel, ProviderPreference};
pub use session::{InferenceEngine, SessionOptions};
pub use tensor::{InputTensor, OutputTensor, TensorType};

#[cfg(feature = "native")]
pub use backend::ort::{OrtBackend, OrtEngine};

#[cfg(feature = "wasm")]
pub use backend::tract::{TractBackend, TractEngine};

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
