//! Tensor types for inference input/output.

use ndarray::{ArrayD, IxDyn};

use crate::{InferenceError, Result};

/// Supported tensor data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorType {
    Float32,
    Int64,
}

/// Input tensor for inference.
#[derive(Debug, Clone)]
pub enum InputTensor {
    Float32(ArrayD<f32>),
}

impl InputTensor {
    /// Create a Float32 tensor from raw data and shape.
    ///
    /// Fails when the element count does not match the shape.
    pub fn from_f32(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let len = data.len();
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(InputTensor::Float32)
            .map_err(|_| {
                InferenceError::InvalidInput(format!(
                    "{} values do not fit shape {:?}",
                    len, shape
                ))
            })
    }

    /// Get the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        match self {
            InputTensor::Float32(arr) => arr.shape(),
        }
    }

    /// Get the data type of the tensor.
    pub fn dtype(&self) -> TensorType {
        match self {
            InputTensor::Float32(_) => TensorType::Float32,
        }
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        match self {
            InputTensor::Float32(arr) => arr.len(),
        }
    }

    /// Whether the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Output tensor from inference.
#[derive(Debug, Clone)]
pub enum OutputTensor {
    Float32(ArrayD<f32>),
    Int64(ArrayD<i64>),
}

impl OutputTensor {
    /// Get the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        match self {
            OutputTensor::Float32(arr) => arr.shape(),
            OutputTensor::Int64(arr) => arr.shape(),
        }
    }

    /// Get the data type of the tensor.
    pub fn dtype(&self) -> TensorType {
        match self {
            OutputTensor::Float32(_) => TensorType::Float32,
            OutputTensor::Int64(_) => TensorType::Int64,
        }
    }

    /// Try to get the inner Float32 array.
    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            OutputTensor::Float32(arr) => Some(arr),
            _ => None,
        }
    }

    /// Flatten a Float32 output into a vector in logical (row-major) order.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        match self {
            OutputTensor::Float32(arr) => Ok(arr.iter().copied().collect()),
            other => Err(InferenceError::OutputExtraction(format!(
                "expected float32 output, got {:?}",
                other.dtype()
            ))),
        }
    }
}
