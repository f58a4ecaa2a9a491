//! Inference backend implementations.

#[cfg(feature = "native")]
pub mod ort;

#[cfg(feature = "wasm")]
pub mod tract;

use crate::{InputTensor, OutputTensor, Result};

/// Trait for ONNX inference backends.
///
/// A backend is a live session created by an [`InferenceEngine`](crate::InferenceEngine).
/// It is owned by whoever created it and replaced wholesale when the model or
/// provider changes.
pub trait InferenceBackend: Send + Sync {
    /// Run inference with the given inputs.
    ///
    /// # Arguments
    /// * `inputs` - Named input tensors
    ///
    /// # Returns
    /// Named output tensors from the model
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>>;

    /// Get the input names expected by the model.
    fn input_names(&self) -> &[String];

    /// Get the output names produced by the model.
    fn output_names(&self) -> &[String];

    /// Declared input shapes, one per input. Dynamic dimensions are `-1`.
    fn input_shapes(&self) -> &[Vec<i64>];
}
