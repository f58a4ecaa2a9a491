//! Session creation options and the engine trait.

use crate::{ExecutionProvider, InferenceBackend, OptimizationLevel, Result};

/// Options applied when an engine creates a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Execution providers in order of preference.
    pub providers: Vec<ExecutionProvider>,

    /// Graph optimization level.
    pub optimization_level: OptimizationLevel,

    /// Number of intra-op threads (engine default when `None`).
    pub intra_threads: Option<usize>,

    /// Fail session creation when any listed provider cannot be bound,
    /// instead of skipping it.
    pub strict_providers: bool,

    /// Input shape for engines that need a concrete one to plan the graph.
    /// Only dimensions the model leaves dynamic are taken from it.
    pub input_shape: Option<Vec<usize>>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            providers: vec![ExecutionProvider::Cpu],
            optimization_level: OptimizationLevel::All,
            intra_threads: None,
            strict_providers: false,
            input_shape: None,
        }
    }
}

impl SessionOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the execution provider preference list.
    pub fn with_providers(mut self, providers: Vec<ExecutionProvider>) -> Self {
        self.providers = providers;
        self
    }

    /// Set the graph optimization level.
    pub fn with_optimization_level(mut self, level: OptimizationLevel) -> Self {
        self.optimization_level = level;
        self
    }

    /// Set the number of intra-op threads.
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    /// Require every listed provider to bind.
    pub fn with_strict_providers(mut self, strict: bool) -> Self {
        self.strict_providers = strict;
        self
    }

    /// Set the input shape used for dynamic dimensions.
    pub fn with_input_shape(mut self, shape: Vec<usize>) -> Self {
        self.input_shape = Some(shape);
        self
    }
}

/// Factory for inference sessions.
///
/// Components that need to run models receive an engine explicitly, which
/// keeps the runtime swappable (ort natively, tract in the browser, fakes in
/// tests).
pub trait InferenceEngine: Send + Sync {
    /// Engine name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Providers this engine can bind, most preferred first.
    fn available_providers(&self) -> Vec<ExecutionProvider>;

    /// Create a session from serialized model bytes.
    fn create_session(
        &self,
        model: &[u8],
        options: &SessionOptions,
    ) -> Result<Box<dyn InferenceBackend>>;
}
