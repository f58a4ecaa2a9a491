//! In-memory engine used by unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{ArrayD, IxDyn};

use visinfer_inference::{
    ExecutionProvider, InferenceBackend, InferenceEngine, InferenceError, InputTensor,
    OutputTensor, SessionOptions,
};

/// Engine returning fixed scores, with per-provider failure switches.
///
/// Providers in `fail_to_load` fail a strict session and are skipped in a
/// lenient one.
#[derive(Debug, Clone)]
pub struct FakeEngine {
    pub providers: Vec<ExecutionProvider>,
    pub fail_to_load: Vec<ExecutionProvider>,
    pub fail_to_run: Vec<ExecutionProvider>,
    pub declared_shape: Vec<i64>,
    pub scores: Vec<f32>,
    pub sessions_created: Arc<AtomicUsize>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            providers: vec![ExecutionProvider::Xnnpack, ExecutionProvider::Cpu],
            fail_to_load: Vec::new(),
            fail_to_run: Vec::new(),
            declared_shape: vec![-1, 3, 4, 4],
            scores: vec![0.1, 0.7, 0.2],
            sessions_created: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl InferenceEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn available_providers(&self) -> Vec<ExecutionProvider> {
        self.providers.clone()
    }

    fn create_session(
        &self,
        _model: &[u8],
        options: &SessionOptions,
    ) -> visinfer_inference::Result<Box<dyn InferenceBackend>> {
        let unbindable = options
            .providers
            .iter()
            .find(|p| self.fail_to_load.contains(p));
        if let (true, Some(provider)) = (options.strict_providers, unbindable) {
            return Err(InferenceError::SessionCreate(format!(
                "{} is not available",
                provider
            )));
        }

        let provider = options
            .providers
            .iter()
            .copied()
            .find(|p| !self.fail_to_load.contains(p))
            .ok_or_else(|| InferenceError::SessionCreate("no provider could be bound".into()))?;
        self.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeBackend {
            provider,
            fail: self.fail_to_run.contains(&provider),
            scores: self.scores.clone(),
            input_names: vec!["data".to_string()],
            output_names: vec!["logits".to_string()],
            input_shapes: vec![self.declared_shape.clone()],
        }))
    }
}

pub struct FakeBackend {
    pub provider: ExecutionProvider,
    fail: bool,
    scores: Vec<f32>,
    input_names: Vec<String>,
    output_names: Vec<String>,
    input_shapes: Vec<Vec<i64>>,
}

impl InferenceBackend for FakeBackend {
    fn run(
        &self,
        inputs: &[(&str, InputTensor)],
    ) -> visinfer_inference::Result<Vec<(String, OutputTensor)>> {
        if self.fail {
            return Err(InferenceError::InferenceFailed(format!(
                "{} kernel crashed",
                self.provider
            )));
        }
        if inputs.first().map(|(name, _)| *name) != Some("data") {
            return Err(InferenceError::InvalidInput("expected input 'data'".into()));
        }
        let scores = ArrayD::from_shape_vec(IxDyn(&[1, self.scores.len()]), self.scores.clone())
            .map_err(|e| InferenceError::OutputExtraction(e.to_string()))?;
        Ok(vec![("logits".to_string(), OutputTensor::Float32(scores))])
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
