use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use visinfer_inference::{
    ExecutionProvider, InferenceBackend, InferenceEngine, InferenceError, InputTensor,
    OptimizationLevel, ProviderPreference, SessionOptions,
};

use super::resolve_input_shape;
use crate::classify::{LabelTable, Prediction, top_k};
use crate::error::ModelError;
use crate::preprocess::DEFAULT_TARGET_SIZE;

/// Input name used when a model declares none.
const FALLBACK_INPUT_NAME: &str = "input";

/// Everything needed to create a session.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub model_name: String,
    pub model_bytes: Arc<[u8]>,
    pub labels: Arc<LabelTable>,
    pub provider: ProviderPreference,
    pub optimization_level: OptimizationLevel,
    pub intra_threads: Option<usize>,
    /// Square side the preprocessor produces.
    pub target_size: u32,
    pub honor_model_shape: bool,
    pub top_k: usize,
}

impl LoadRequest {
    /// Create a request with default session settings.
    pub fn new(model_name: impl Into<String>, model_bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            model_name: model_name.into(),
            model_bytes: model_bytes.into(),
            labels: Arc::new(LabelTable::default()),
            provider: ProviderPreference::Auto,
            optimization_level: OptimizationLevel::All,
            intra_threads: None,
            target_size: DEFAULT_TARGET_SIZE,
            honor_model_shape: true,
            top_k: 5,
        }
    }

    /// Read the model file and its JSON label table.
    pub fn from_files(
        model_name: impl Into<String>,
        model_path: &Path,
        labels_path: &Path,
    ) -> Result<Self, ModelError> {
        let model_name = model_name.into();
        let bytes = fs::read(model_path).map_err(|e| ModelError::Load {
            model: model_name.clone(),
            source: InferenceError::ModelLoad(format!("{}: {}", model_path.display(), e)),
        })?;
        let labels = LabelTable::from_file(labels_path)?;
        Ok(Self::new(model_name, bytes).with_labels(labels))
    }

    pub fn with_labels(mut self, labels: LabelTable) -> Self {
        self.labels = Arc::new(labels);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<ProviderPreference>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_optimization_level(mut self, level: OptimizationLevel) -> Self {
        self.optimization_level = level;
        self
    }

    pub fn with_intra_threads(mut self, threads: Option<usize>) -> Self {
        self.intra_threads = threads;
        self
    }

    pub fn with_target_size(mut self, size: u32) -> Self {
        self.target_size = size;
        self
    }

    pub fn with_honor_model_shape(mut self, honor: bool) -> Self {
        self.honor_model_shape = honor;
        self
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }
}

/// A live session plus the metadata needed to feed it.
pub struct LoadedModel {
    backend: Box<dyn InferenceBackend>,
    request: LoadRequest,
    providers: Vec<ExecutionProvider>,
    input_name: String,
    input_shape: Vec<usize>,
}

impl LoadedModel {
    pub fn model_name(&self) -> &str {
        &self.request.model_name
    }

    /// Providers requested for the session, most preferred first.
    pub fn providers(&self) -> &[ExecutionProvider] {
        &self.providers
    }

    /// Shape of the tensor fed to the model.
    pub fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    /// Square side the preprocessor should produce for this model.
    pub fn input_size(&self) -> u32 {
        self.input_shape.get(3).map_or(self.request.target_size, |&w| w as u32)
    }

    /// Number of `f32` values one input tensor holds.
    pub fn input_len(&self) -> usize {
        self.input_shape.iter().product()
    }

    pub fn labels(&self) -> &LabelTable {
        &self.request.labels
    }
}

/// Descriptive metadata of the loaded model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub providers: Vec<ExecutionProvider>,
    pub input_names: Vec<String>,
    pub output_names: Vec<String>,
    pub input_shape: Vec<usize>,
    pub label_count: usize,
}

/// Result of classifying one tensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub model_name: String,
    pub predictions: Vec<Prediction>,
    /// Raw output scores, one per class.
    #[serde(skip)]
    pub scores: Vec<f32>,
}

/// Owner of the current inference session.
pub struct ModelManager {
    engine: Arc<dyn InferenceEngine>,
    current: Option<LoadedModel>,
}

impl ModelManager {
    /// Create an empty manager around an engine.
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            engine,
            current: None,
        }
    }

    pub fn engine(&self) -> &dyn InferenceEngine {
        self.engine.as_ref()
    }

    /// The loaded model, if any.
    pub fn current(&self) -> Option<&LoadedModel> {
        self.current.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.is_some()
    }

    /// Create a session for `request` and make it current.
    ///
    /// On failure the previously loaded model stays in place.
    pub fn reload(&mut self, request: LoadRequest) -> Result<&LoadedModel, ModelError> {
        let providers = request.provider.resolve(&self.engine.available_providers());
        if providers.is_empty() {
            return Err(ModelError::Load {
                model: request.model_name.clone(),
                source: InferenceError::SessionCreate(format!(
                    "{} offers no execution provider",
                    self.engine.name()
                )),
            });
        }

        // An explicit provider must bind; `auto` lists may skip unusable entries
        let strict = matches!(request.provider, ProviderPreference::Explicit(_));
        let side = request.target_size as usize;
        let mut options = SessionOptions::new()
            .with_providers(providers.clone())
            .with_strict_providers(strict)
            .with_optimization_level(request.optimization_level)
            .with_input_shape(vec![1, 3, side, side]);
        if let Some(threads) = request.intra_threads {
            options = options.with_intra_threads(threads);
        }

        info!(
            "Loading model '{}' on {} with providers {:?}",
            request.model_name,
            self.engine.name(),
            providers
        );
        let backend = self
            .engine
            .create_session(&request.model_bytes, &options)
            .map_err(|source| ModelError::Load {
                model: request.model_name.clone(),
                source,
            })?;

        let input_name = backend
            .input_names()
            .first()
            .cloned()
            .unwrap_or_else(|| FALLBACK_INPUT_NAME.to_string());
        let declared = backend.input_shapes().first().map(Vec::as_slice);
        let input_shape = if request.honor_model_shape {
            resolve_input_shape(declared, request.target_size)
        } else {
            resolve_input_shape(None, request.target_size)
        };
        debug!(
            "Model '{}' input '{}' declared {:?}, feeding {:?}",
            request.model_name, input_name, declared, input_shape
        );

        let loaded = LoadedModel {
            backend,
            request,
            providers,
            input_name,
            input_shape,
        };
        Ok(self.current.insert(loaded))
    }

    /// Recreate the current model's session on a single provider.
    pub fn reload_provider(
        &mut self,
        provider: ExecutionProvider,
    ) -> Result<&LoadedModel, ModelError> {
        let request = self
            .current
            .as_ref()
            .ok_or(ModelError::NotLoaded)?
            .request
            .clone()
            .with_provider(provider);
        self.reload(request)
    }

    /// Shape of the tensor the current model expects.
    pub fn input_shape(&self) -> Result<&[usize], ModelError> {
        self.loaded().map(LoadedModel::input_shape)
    }

    /// Run the model and return the raw scores of its first output.
    pub fn run_raw(&self, data: &[f32]) -> Result<Vec<f32>, ModelError> {
        let model = self.loaded()?;
        let tensor = InputTensor::from_f32(data.to_vec(), &model.input_shape)
            .map_err(ModelError::Inference)?;

        let outputs = model
            .backend
            .run(&[(model.input_name.as_str(), tensor)])
            .map_err(ModelError::Inference)?;

        let (name, output) = outputs
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::Output("model produced no outputs".to_string()))?;
        output
            .to_f32_vec()
            .map_err(|e| ModelError::Output(format!("{}: {}", name, e)))
    }

    /// Run the model and select the top predictions.
    pub fn run(&self, data: &[f32]) -> Result<Classification, ModelError> {
        let model = self.loaded()?;
        let scores = self.run_raw(data)?;
        let predictions = top_k(&scores, &model.request.labels, model.request.top_k);

        Ok(Classification {
            model_name: model.request.model_name.clone(),
            predictions,
            scores,
        })
    }

    /// Names and shapes of the loaded model.
    pub fn model_info(&self) -> Result<ModelInfo, ModelError> {
        let model = self.loaded()?;
        Ok(ModelInfo {
            model_name: model.request.model_name.clone(),
            providers: model.providers.clone(),
            input_names: model.backend.input_names().to_vec(),
            output_names: model.backend.output_names().to_vec(),
            input_shape: model.input_shape.clone(),
            label_count: model.request.labels.len(),
        })
    }

    fn loaded(&self) -> Result<&LoadedModel, ModelError> {
        self.current.as_ref().ok_or(ModelError::NotLoaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;

    fn request() -> LoadRequest {
        LoadRequest::new("tiny", vec![0u8; 4])
            .with_labels(LabelTable::new(vec!["cat".into(), "dog".into()]))
            .with_top_k(2)
    }

    #[test]
    fn test_run_without_model() {
        let manager = ModelManager::new(Arc::new(FakeEngine::default()));
        assert!(matches!(manager.run(&[0.0; 48]), Err(ModelError::NotLoaded)));
        assert!(matches!(manager.model_info(), Err(ModelError::NotLoaded)));
        assert!(matches!(
            ModelManager::new(Arc::new(FakeEngine::default())).reload_provider(ExecutionProvider::Cpu),
            Err(ModelError::NotLoaded)
        ));
    }

    #[test]
    fn test_auto_resolves_to_engine_providers() {
        let mut manager = ModelManager::new(Arc::new(FakeEngine::default()));
        let loaded = manager.reload(request()).unwrap();
        assert_eq!(
            loaded.providers(),
            &[ExecutionProvider::Xnnpack, ExecutionProvider::Cpu]
        );
    }

    #[test]
    fn test_auto_skips_unbindable_provider() {
        let engine = FakeEngine {
            fail_to_load: vec![ExecutionProvider::Xnnpack],
            fail_to_run: vec![ExecutionProvider::Xnnpack],
            ..FakeEngine::default()
        };
        let mut manager = ModelManager::new(Arc::new(engine));

        manager.reload(request()).unwrap();
        // Runs on cpu; an xnnpack session would fail here
        assert!(manager.run(&[0.5; 48]).is_ok());

        let explicit = manager.reload(request().with_provider(ExecutionProvider::Xnnpack));
        assert!(matches!(explicit, Err(ModelError::Load { .. })));
    }

    #[test]
    fn test_auto_fails_when_nothing_binds() {
        let engine = FakeEngine {
            fail_to_load: vec![ExecutionProvider::Xnnpack, ExecutionProvider::Cpu],
            ..FakeEngine::default()
        };
        let mut manager = ModelManager::new(Arc::new(engine));
        assert!(matches!(manager.reload(request()), Err(ModelError::Load { .. })));
        assert!(!manager.is_loaded());
    }

    #[test]
    fn test_static_declared_shape_sets_input_size() {
        let engine = FakeEngine {
            declared_shape: vec![1, 3, 8, 8],
            ..FakeEngine::default()
        };
        let mut manager = ModelManager::new(Arc::new(engine));
        let loaded = manager.reload(request()).unwrap();
        assert_eq!(loaded.input_shape(), &[1, 3, 8, 8]);
        assert_eq!(loaded.input_size(), 8);
    }

    #[test]
    fn test_classify() {
        let mut manager = ModelManager::new(Arc::new(FakeEngine::default()));
        manager.reload(request()).unwrap();
        assert_eq!(manager.input_shape().unwrap(), &[1, 3, 4, 4]);

        let result = manager.run(&[0.5; 48]).unwrap();
        assert_eq!(result.model_name, "tiny");
        assert_eq!(result.scores, vec![0.1, 0.7, 0.2]);
        let labels: Vec<&str> = result.predictions.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["dog", "class_2"]);
    }

    #[test]
    fn test_wrong_tensor_length() {
        let mut manager = ModelManager::new(Arc::new(FakeEngine::default()));
        manager.reload(request()).unwrap();
        assert!(matches!(
            manager.run_raw(&[0.5; 10]),
            Err(ModelError::Inference(InferenceError::InvalidInput(_)))
        ));
    }

    #[test]
    fn test_failed_reload_keeps_previous_model() {
        let engine = FakeEngine {
            fail_to_load: vec![ExecutionProvider::Xnnpack],
            ..FakeEngine::default()
        };
        let created = engine.sessions_created.clone();
        let mut manager = ModelManager::new(Arc::new(engine));

        manager
            .reload(request().with_provider(ExecutionProvider::Cpu))
            .unwrap();
        let err = manager
            .reload_provider(ExecutionProvider::Xnnpack)
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::Load { .. }));

        let current = manager.current().unwrap();
        assert_eq!(current.providers(), &[ExecutionProvider::Cpu]);
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(manager.run(&[0.5; 48]).is_ok());
    }

    #[test]
    fn test_ignore_declared_shape() {
        let mut manager = ModelManager::new(Arc::new(FakeEngine::default()));
        let loaded = manager
            .reload(request().with_honor_model_shape(false).with_target_size(8))
            .unwrap();
        assert_eq!(loaded.input_shape(), &[1, 3, 8, 8]);
        assert_eq!(loaded.input_size(), 8);
        assert_eq!(loaded.input_len(), 192);
    }

    #[test]
    fn test_model_info() {
        let mut manager = ModelManager::new(Arc::new(FakeEngine::default()));
        manager.reload(request()).unwrap();
        let info = manager.model_info().unwrap();
        assert_eq!(info.input_names, vec!["data".to_string()]);
        assert_eq!(info.output_names, vec!["logits".to_string()]);
        assert_eq!(info.label_count, 2);
    }

    #[test]
    fn test_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("tiny.onnx");
        let labels = dir.path().join("labels.json");
        fs::write(&model, [1u8, 2, 3]).unwrap();
        fs::write(&labels, r#"["a", "b"]"#).unwrap();

        let request = LoadRequest::from_files("tiny", &model, &labels).unwrap();
        assert_eq!(&*request.model_bytes, &[1u8, 2, 3]);
        assert_eq!(request.labels.len(), 2);

        let missing = LoadRequest::from_files("tiny", &dir.path().join("none.onnx"), &labels);
        assert!(matches!(missing, Err(ModelError::Load { .. })));
    }
}
