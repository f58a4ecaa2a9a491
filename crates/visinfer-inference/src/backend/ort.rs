//! ONNX Runtime (ort) backend for native platforms.

use std::sync::Mutex;

use ndarray::{ArrayD, IxDyn};
use ort::ep::{CPU, ExecutionProviderDispatch, XNNPACK};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::{Session, SessionInputValue};
use ort::value::{Tensor, ValueType};
use tracing::{debug, warn};

use crate::error::InferenceError;
use crate::tensor::{InputTensor, OutputTensor};
use crate::{
    ExecutionProvider, InferenceBackend, InferenceEngine, OptimizationLevel, Result,
    SessionOptions,
};

const ENGINE_NAME: &str = "onnxruntime";

/// Engine creating ONNX Runtime sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrtEngine;

impl OrtEngine {
    /// Create a new engine.
    pub fn new() -> Self {
        Self
    }
}

impl InferenceEngine for OrtEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn available_providers(&self) -> Vec<ExecutionProvider> {
        let mut providers = Vec::with_capacity(3);
        if cfg!(feature = "cuda") {
            providers.push(ExecutionProvider::Cuda);
        }
        providers.push(ExecutionProvider::Xnnpack);
        providers.push(ExecutionProvider::Cpu);
        providers
    }

    fn create_session(
        &self,
        model: &[u8],
        options: &SessionOptions,
    ) -> Result<Box<dyn InferenceBackend>> {
        Ok(Box::new(OrtBackend::from_bytes(model, options)?))
    }
}

/// Backend using ONNX Runtime for native inference.
pub struct OrtBackend {
    session: Mutex<Session>,
    input_names: Vec<String>,
    output_names: Vec<String>,
    input_shapes: Vec<Vec<i64>>,
}

impl OrtBackend {
    /// Create a session from model bytes.
    ///
    /// With `strict_providers` every provider is registered with
    /// error-on-failure, so one that cannot be bound fails the whole session.
    /// Otherwise ONNX Runtime skips it and moves on to the next in the list.
    pub fn from_bytes(bytes: &[u8], options: &SessionOptions) -> Result<Self> {
        debug!(
            "Creating ONNX Runtime session from {} bytes (providers: {:?}, optimization: {:?})",
            bytes.len(),
            options.providers,
            options.optimization_level
        );

        let providers = build_execution_providers(&options.providers, options.strict_providers)?;

        let mut builder = Session::builder()
            .map_err(|e| InferenceError::SessionCreate(e.to_string()))?
            .with_execution_providers(providers)
            .map_err(|e| InferenceError::SessionCreate(e.to_string()))?
            .with_optimization_level(map_optimization_level(options.optimization_level))
            .map_err(|e| InferenceError::SessionCreate(e.to_string()))?;

        if let Some(threads) = options.intra_threads {
            builder = builder
                .with_intra_threads(threads)
                .map_err(|e| InferenceError::SessionCreate(e.to_string()))?;
        }

        Self::commit(builder, bytes)
    }

    fn commit(mut builder: SessionBuilder, bytes: &[u8]) -> Result<Self> {
        let session = builder
            .commit_from_memory(bytes)
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?;

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|i| i.name().to_string())
            .collect();

        let input_shapes: Vec<Vec<i64>> = session
            .inputs()
            .iter()
            .map(|i| match i.dtype() {
                ValueType::Tensor { shape, .. } => shape.iter().copied().collect(),
                _ => Vec::new(),
            })
            .collect();

        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        debug!("Model inputs: {:?} {:?}", input_names, input_shapes);
        debug!("Model outputs: {:?}", output_names);

        Ok(Self {
            session: Mutex::new(session),
            input_names,
            output_names,
            input_shapes,
        })
    }

    fn convert_input(&self, tensor: &InputTensor) -> Result<SessionInputValue<'static>> {
        match tensor {
            InputTensor::Float32(arr) => {
                let shape: Vec<i64> = arr.shape().iter().map(|&s| s as i64).collect();
                let data: Vec<f32> = arr.iter().copied().collect();
                Tensor::from_array((shape, data))
                    .map(Into::into)
                    .map_err(|e| InferenceError::InvalidInput(e.to_string()))
            }
        }
    }
}

fn build_execution_providers(
    providers: &[ExecutionProvider],
    strict: bool,
) -> Result<Vec<ExecutionProviderDispatch>> {
    let mut dispatches = Vec::with_capacity(providers.len());

    for provider in providers {
        let dispatch = match provider {
            ExecutionProvider::Cpu => CPU::default().build(),
            ExecutionProvider::Xnnpack => XNNPACK::default().build(),
            #[cfg(feature = "cuda")]
            ExecutionProvider::Cuda => ort::ep::CUDA::default().build(),
            #[cfg(not(feature = "cuda"))]
            ExecutionProvider::Cuda if strict => {
                return Err(InferenceError::UnsupportedProvider {
                    provider: *provider,
                    engine: ENGINE_NAME,
                });
            }
            #[cfg(not(feature = "cuda"))]
            ExecutionProvider::Cuda => {
                warn!("Skipping {}: not compiled into this build", provider);
                continue;
            }
        };

        dispatches.push(if strict {
            dispatch.error_on_failure()
        } else {
            dispatch
        });
    }

    Ok(dispatches)
}

fn map_optimization_level(level: OptimizationLevel) -> GraphOptimizationLevel {
    match level {
        OptimizationLevel::Disabled => GraphOptimizationLevel::Disable,
        OptimizationLevel::Basic => GraphOptimizationLevel::Level1,
        OptimizationLevel::Extended => GraphOptimizationLevel::Level2,
        OptimizationLevel::All => GraphOptimizationLevel::Level3,
    }
}

impl InferenceBackend for OrtBackend {
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>> {
        let ort_inputs: Vec<(&str, SessionInputValue<'static>)> = inputs
            .iter()
            .map(|(name, tensor)| {
                let value = self.convert_input(tensor)?;
                Ok((*name, value))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut session = self.session.lock().map_err(|e| {
            InferenceError::InferenceFailed(format!("Failed to lock session: {}", e))
        })?;

        let outputs = session
            .run(ort_inputs)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let mut results = Vec::with_capacity(outputs.len());

        for (name, value) in outputs.iter() {
            let tensor = if let Ok((shape_ref, data)) = value.try_extract_tensor::<f32>() {
                let shape: Vec<usize> = shape_ref.iter().map(|&s| s as usize).collect();
                let arr = ArrayD::from_shape_vec(IxDyn(&shape), data.to_vec())
                    .map_err(|e| InferenceError::OutputExtraction(e.to_string()))?;
                OutputTensor::Float32(arr)
            } else if let Ok((shape_ref, data)) = value.try_extract_tensor::<i64>() {
                let shape: Vec<usize> = shape_ref.iter().map(|&s| s as usize).collect();
                let arr = ArrayD::from_shape_vec(IxDyn(&shape), data.to_vec())
                    .map_err(|e| InferenceError::OutputExtraction(e.to_string()))?;
                OutputTensor::Int64(arr)
            } else {
                return Err(InferenceError::OutputExtraction(format!(
                    "unsupported output type for '{}'",
                    name
                )));
            };

            results.push((name.to_string(), tensor));
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

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_missing_cuda_skipped_unless_strict() {
        let providers = [ExecutionProvider::Cuda, ExecutionProvider::Cpu];

        let lenient = build_execution_providers(&providers, false).unwrap();
        assert_eq!(lenient.len(), 1);

        let strict = build_execution_providers(&providers, true);
        assert!(matches!(
            strict,
            Err(InferenceError::UnsupportedProvider {
                provider: ExecutionProvider::Cuda,
                ..
            })
        ));
    }

    #[test]
    fn test_optimization_level_mapping() {
        assert!(matches!(
            map_optimization_level(OptimizationLevel::Disabled),
            GraphOptimizationLevel::Disable
        ));
        assert!(matches!(
            map_optimization_level(OptimizationLevel::All),
            GraphOptimizationLevel::Level3
        ));
    }
}
