//! Tract backend for in-browser ONNX inference.

use ndarray::{ArrayD, IxDyn};
use tract_onnx::prelude::*;
use tract_onnx::tract_hir::infer::Factoid;
use tracing::{debug, warn};

use crate::error::InferenceError;
use crate::tensor::{InputTensor, OutputTensor};
use crate::{ExecutionProvider, InferenceBackend, InferenceEngine, Result, SessionOptions};

const ENGINE_NAME: &str = "tract";

/// Fills dynamic input dimensions when the caller provides no shape: one
/// 224x224 RGB image.
const DEFAULT_INPUT_SHAPE: [usize; 4] = [1, 3, 224, 224];

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Engine creating tract sessions. Tract only runs on the CPU.
#[derive(Debug, Clone, Copy, Default)]
pub struct TractEngine;

impl TractEngine {
    /// Create a new engine.
    pub fn new() -> Self {
        Self
    }
}

impl InferenceEngine for TractEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn available_providers(&self) -> Vec<ExecutionProvider> {
        vec![ExecutionProvider::Cpu]
    }

    fn create_session(
        &self,
        model: &[u8],
        options: &SessionOptions,
    ) -> Result<Box<dyn InferenceBackend>> {
        for provider in options
            .providers
            .iter()
            .filter(|p| **p != ExecutionProvider::Cpu)
        {
            if options.strict_providers {
                return Err(InferenceError::UnsupportedProvider {
                    provider: *provider,
                    engine: ENGINE_NAME,
                });
            }
            warn!("Skipping {}: {} only runs on the CPU", provider, ENGINE_NAME);
        }

        let shape = options
            .input_shape
            .clone()
            .unwrap_or_else(|| DEFAULT_INPUT_SHAPE.to_vec());

        Ok(Box::new(TractBackend::from_bytes_with_shape(model, &shape)?))
    }
}

/// Backend using Tract for cross-platform ONNX inference.
pub struct TractBackend {
    model: RunnableModel,
    input_names: Vec<String>,
    output_names: Vec<String>,
    input_shapes: Vec<Vec<i64>>,
}

impl TractBackend {
    /// Load a model from bytes.
    ///
    /// Dimensions the model declares statically are kept; dynamic ones are
    /// taken from `fallback_shape`.
    pub fn from_bytes_with_shape(bytes: &[u8], fallback_shape: &[usize]) -> Result<Self> {
        debug!(
            "Loading ONNX model with Tract from {} bytes, fallback input shape {:?}",
            bytes.len(),
            fallback_shape
        );

        let mut model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(bytes))
            .map_err(|e| InferenceError::ModelLoad(format!("Failed to load model: {}", e)))?;

        let input_names: Vec<String> = model
            .input_outlets()
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?
            .iter()
            .map(|outlet| model.node(outlet.node).name.clone())
            .collect();

        let output_names: Vec<String> = model
            .output_outlets()
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?
            .iter()
            .map(|outlet| model.node(outlet.node).name.clone())
            .collect();

        let declared = declared_dims(
            model
                .input_fact(0)
                .map_err(|e| InferenceError::ModelLoad(e.to_string()))?,
        );
        let input_shape = concrete_shape(&declared, fallback_shape);
        debug!("Model input declared {:?}, planning with {:?}", declared, input_shape);

        model
            .set_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), input_shape.as_slice()),
            )
            .map_err(|e| InferenceError::ModelLoad(format!("Failed to set input shape: {}", e)))?;

        let model = model
            .into_typed()
            .map_err(|e| InferenceError::ModelLoad(format!("Failed to type model: {}", e)))?
            .into_optimized()
            .map_err(|e| InferenceError::ModelLoad(format!("Failed to optimize: {}", e)))?
            .into_runnable()
            .map_err(|e| InferenceError::SessionCreate(e.to_string()))?;

        let input_shapes = vec![declared];

        Ok(Self {
            model,
            input_names,
            output_names,
            input_shapes,
        })
    }

    fn convert_input(&self, tensor: &InputTensor) -> Result<TValue> {
        match tensor {
            InputTensor::Float32(arr) => {
                let data: Vec<f32> = arr.iter().copied().collect();
                let tract_tensor =
                    tract_ndarray::ArrayD::from_shape_vec(tract_ndarray::IxDyn(arr.shape()), data)
                        .map_err(|e| InferenceError::InvalidInput(e.to_string()))?;
                Ok(tract_tensor.into_tvalue())
            }
        }
    }
}

/// Dimensions of a declared input fact, `-1` where unknown or symbolic.
/// Empty when the rank itself is unknown.
fn declared_dims(fact: &InferenceFact) -> Vec<i64> {
    if fact.shape.is_open() {
        return Vec::new();
    }
    fact.shape
        .dims()
        .map(|dim| {
            dim.concretize()
                .and_then(|d| d.to_i64().ok())
                .filter(|&d| d > 0)
                .unwrap_or(-1)
        })
        .collect()
}

/// Merge declared dims with a fallback shape of the same rank.
fn concrete_shape(declared: &[i64], fallback: &[usize]) -> Vec<usize> {
    if declared.len() != fallback.len() {
        return fallback.to_vec();
    }
    declared
        .iter()
        .zip(fallback)
        .map(|(&d, &f)| if d > 0 { d as usize } else { f })
        .collect()
}

impl InferenceBackend for TractBackend {
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>> {
        let tract_inputs: TVec<TValue> = inputs
            .iter()
            .map(|(_, tensor)| self.convert_input(tensor))
            .collect::<Result<TVec<_>>>()?;

        let outputs = self
            .model
            .run(tract_inputs)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let mut results = Vec::with_capacity(outputs.len());

        for (idx, output) in outputs.iter().enumerate() {
            let name = self
                .output_names
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("output_{}", idx));

            let tensor = if let Ok(view) = output.to_array_view::<f32>() {
                let arr = ArrayD::from_shape_vec(IxDyn(view.shape()), view.iter().copied().collect())
                    .map_err(|e| InferenceError::OutputExtraction(e.to_string()))?;
                OutputTensor::Float32(arr)
            } else if let Ok(view) = output.to_array_view::<i64>() {
                let arr = ArrayD::from_shape_vec(IxDyn(view.shape()), view.iter().copied().collect())
                    .map_err(|e| InferenceError::OutputExtraction(e.to_string()))?;
                OutputTensor::Int64(arr)
            } else {
                return Err(InferenceError::OutputExtraction(format!(
                    "unsupported output type for '{}'",
                    name
                )));
            };

            results.push((name, tensor));
        }

        Ok(results)
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn input_shapes(&self) -> &[Vec<i64>] {
        &self.input_shapes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_static_dims_are_kept() {
        assert_eq!(
            concrete_shape(&[1, 3, 256, 256], &[1, 3, 224, 224]),
            vec![1, 3, 256, 256]
        );
    }

    #[test]
    fn test_dynamic_dims_take_fallback() {
        assert_eq!(
            concrete_shape(&[-1, 3, -1, -1], &[1, 3, 224, 224]),
            vec![1, 3, 224, 224]
        );
        assert_eq!(concrete_shape(&[], &[1, 3, 224, 224]), vec![1, 3, 224, 224]);
        assert_eq!(concrete_shape(&[1, 3, 224], &[1, 3, 64, 64]), vec![1, 3, 64, 64]);
    }

    #[test]
    fn test_declared_dims_from_fact() {
        let fact = InferenceFact::dt_shape(f32::datum_type(), &[1usize, 3, 320, 320][..]);
        assert_eq!(declared_dims(&fact), vec![1, 3, 320, 320]);

        assert_eq!(declared_dims(&InferenceFact::default()), Vec::<i64>::new());
    }

    #[test]
    fn test_rejects_accelerators_only_when_strict() {
        let options = SessionOptions::new()
            .with_providers(vec![ExecutionProvider::Xnnpack])
            .with_strict_providers(true);
        let err = TractEngine::new().create_session(&[], &options).err().unwrap();
        assert!(matches!(err, InferenceError::UnsupportedProvider { .. }));

        // Lenient lists get past the provider check and fail on the bytes
        let options = options.with_strict_providers(false);
        let err = TractEngine::new().create_session(&[], &options).err().unwrap();
        assert!(matches!(err, InferenceError::ModelLoad(_)));
    }
}
