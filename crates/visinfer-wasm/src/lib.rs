//! WASM bindings for in-browser image classification.
//!
//! This crate provides WebAssembly bindings for use in browsers: RGBA
//! preprocessing, top-k selection, timing statistics and a `Classifier` class
//! that runs ONNX models with tract and benchmarks them.

mod metrics;

use std::sync::Arc;

use wasm_bindgen::prelude::*;
use web_sys::ImageData;

use visinfer_core::benchmark::{
    BenchmarkReport, BenchmarkRequest, BenchmarkRunner, Clock, TimingStats,
};
use visinfer_core::{
    ExecutionProvider, ImagePreprocessor, LabelTable, LoadRequest, MediaType, ModelManager,
    TractEngine, top_k,
};

pub use metrics::{HeapMemoryProbe, PerformanceClock};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Check a file's declared MIME type and size before reading it.
#[wasm_bindgen]
pub fn validate_image(mime: &str, size: f64) -> Result<(), JsValue> {
    ImagePreprocessor::new()
        .validate(mime, size as u64)
        .map(|_| ())
        .map_err(js_error)
}

/// Convert canvas RGBA pixels into a planar `[0,1]` tensor of `3·S·S` values.
#[wasm_bindgen]
pub fn preprocess_rgba(
    rgba: &[u8],
    width: u32,
    height: u32,
    target_size: u32,
) -> Result<Vec<f32>, JsValue> {
    ImagePreprocessor::new()
        .with_target_size(target_size)
        .planar_from_rgba(rgba, width, height)
        .map_err(js_error)
}

/// Pair scores with a JSON label array and keep the best `k`.
#[wasm_bindgen]
pub fn top_k_predictions(scores: &[f32], labels_json: &str, k: usize) -> Result<JsValue, JsValue> {
    let labels = LabelTable::from_json_str(labels_json).map_err(js_error)?;
    serde_wasm_bindgen::to_value(&top_k(scores, &labels, k)).map_err(js_error)
}

/// Mean and population standard deviation of millisecond samples.
#[wasm_bindgen]
pub fn timing_stats(samples: &[f64]) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&TimingStats::from_samples(samples)).map_err(js_error)
}

/// Whether a MIME type is accepted.
#[wasm_bindgen]
pub fn is_supported_mime(mime: &str) -> bool {
    MediaType::from_mime(mime).is_ok()
}

/// ONNX image classifier for browser use.
#[wasm_bindgen]
pub struct Classifier {
    manager: ModelManager,
}

#[wasm_bindgen]
impl Classifier {
    /// Load a model from its bytes and a JSON label array.
    #[wasm_bindgen(constructor)]
    pub fn new(model: &[u8], labels_json: &str) -> Result<Classifier, JsValue> {
        let labels = LabelTable::from_json_str(labels_json).map_err(js_error)?;
        let request = LoadRequest::new("model", model.to_vec())
            .with_labels(labels)
            .with_provider(ExecutionProvider::Cpu);

        let mut manager = ModelManager::new(Arc::new(TractEngine::new()));
        let shape = manager.reload(request).map_err(js_error)?.input_shape().to_vec();
        web_sys::console::debug_1(&JsValue::from_str(&format!(
            "visinfer: model loaded, input shape {:?}",
            shape
        )));

        Ok(Self { manager })
    }

    /// Square side the model expects.
    #[wasm_bindgen(getter, js_name = inputSize)]
    pub fn input_size(&self) -> u32 {
        self.manager.current().map_or(0, |m| m.input_size())
    }

    /// Input/output names and shape of the loaded model.
    #[wasm_bindgen]
    pub fn info(&self) -> Result<JsValue, JsValue> {
        let info = self.manager.model_info().map_err(js_error)?;
        serde_wasm_bindgen::to_value(&info).map_err(js_error)
    }

    /// Classify RGBA pixels and return the top `k` predictions.
    #[wasm_bindgen]
    pub fn classify(&self, rgba: &[u8], width: u32, height: u32, k: usize) -> Result<JsValue, JsValue> {
        let tensor = self.preprocess(rgba, width, height)?;
        let clock = PerformanceClock::new();

        let start = clock.now_ms();
        let scores = self.manager.run_raw(&tensor).map_err(js_error)?;
        let elapsed_ms = clock.now_ms() - start;

        let model = self
            .manager
            .current()
            .ok_or_else(|| js_error("no model loaded"))?;

        #[derive(serde::Serialize)]
        struct ClassifyResult {
            predictions: Vec<visinfer_core::Prediction>,
            inference_ms: f64,
        }

        let output = ClassifyResult {
            predictions: top_k(&scores, model.labels(), k),
            inference_ms: elapsed_ms,
        };

        serde_wasm_bindgen::to_value(&output).map_err(js_error)
    }

    /// Classify a canvas `ImageData`.
    #[wasm_bindgen(js_name = classifyImageData)]
    pub fn classify_image_data(&self, image: &ImageData, k: usize) -> Result<JsValue, JsValue> {
        let data = image.data();
        self.classify(&data.0, image.width(), image.height(), k)
    }

    /// Time `iterations` inferences and return the benchmark report.
    #[wasm_bindgen]
    pub fn benchmark(
        &mut self,
        rgba: &[u8],
        width: u32,
        height: u32,
        iterations: usize,
    ) -> Result<JsValue, JsValue> {
        let tensor = self.preprocess(rgba, width, height)?;
        let providers = self.manager.engine().available_providers();
        let request = BenchmarkRequest::new(providers, iterations);

        let runner = BenchmarkRunner::new(PerformanceClock::new(), HeapMemoryProbe::new());
        let results = runner
            .run(&mut self.manager, &request, &tensor)
            .map_err(js_error)?;

        let model_name = self
            .manager
            .current()
            .map(|m| m.model_name().to_string())
            .unwrap_or_default();
        let report = BenchmarkReport::new(model_name, iterations, results);

        serde_wasm_bindgen::to_value(&report).map_err(js_error)
    }

    fn preprocess(&self, rgba: &[u8], width: u32, height: u32) -> Result<Vec<f32>, JsValue> {
        ImagePreprocessor::new()
            .with_target_size(self.input_size())
            .planar_from_rgba(rgba, width, height)
            .map_err(js_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visinfer_core::Prediction;
    use visinfer_core::benchmark::MemoryProbe;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_preprocess_rgba() {
        let rgba = vec![255u8; 4 * 4 * 4];
        let tensor = preprocess_rgba(&rgba, 4, 4, 2).unwrap();
        assert_eq!(tensor.len(), 3 * 2 * 2);
        assert!(tensor.iter().all(|&v| (v - 1.0).abs() < 1e-6));

        assert!(preprocess_rgba(&rgba[..10], 4, 4, 2).is_err());
    }

    #[wasm_bindgen_test]
    fn test_top_k_predictions() {
        let value = top_k_predictions(&[0.1, 0.9, 0.5], r#"["a", "b"]"#, 2).unwrap();
        let predictions: Vec<Prediction> = serde_wasm_bindgen::from_value(value).unwrap();
        assert_eq!(predictions[0].label, "b");
        assert_eq!(predictions[1].label, "class_2");
    }

    #[wasm_bindgen_test]
    fn test_timing_stats() {
        let value = timing_stats(&[10.0, 10.0, 10.0]).unwrap();
        let stats: TimingStats = serde_wasm_bindgen::from_value(value).unwrap();
        assert_eq!(stats.mean_ms, 10.0);
        assert_eq!(stats.std_dev_ms, 0.0);
    }

    #[wasm_bindgen_test]
    fn test_validate_image() {
        assert!(validate_image("image/webp", 1024.0).is_ok());
        assert!(validate_image("image/gif", 1024.0).is_err());
        assert!(validate_image("image/png", 11.0 * 1024.0 * 1024.0).is_err());
        assert!(is_supported_mime("image/jpg"));
    }

    #[wasm_bindgen_test]
    fn test_invalid_model() {
        assert!(Classifier::new(&[1, 2, 3], "[]").is_err());
        assert!(Classifier::new(&[1, 2, 3], "not json").is_err());
    }

    #[wasm_bindgen_test]
    fn test_browser_metrics() {
        let clock = PerformanceClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);

        // Absent outside Chromium, never an error
        let _ = HeapMemoryProbe::new().used_bytes();
    }
}
