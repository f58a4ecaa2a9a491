//! Built-in model catalogue.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Label file shared by the ImageNet classifiers.
pub const IMAGENET_LABELS: &str = "imagenet_classes.json";

/// A model known to visinfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelSpec {
    /// Display name, also used on the command line.
    pub name: &'static str,
    /// File name inside the model directory.
    pub file_name: &'static str,
    pub description: &'static str,
    /// Square input side the model was exported with.
    pub input_size: u32,
    /// Label file name inside the model directory.
    pub labels_file: &'static str,
}

impl ModelSpec {
    /// Model file path under `model_dir`.
    pub fn model_path(&self, model_dir: &Path) -> PathBuf {
        model_dir.join(self.file_name)
    }

    /// Label file path under `model_dir`.
    pub fn labels_path(&self, model_dir: &Path) -> PathBuf {
        model_dir.join(self.labels_file)
    }
}

const MODELS: [ModelSpec; 2] = [
    ModelSpec {
        name: "ResNet18",
        file_name: "resnet18.onnx",
        description: "ResNet18 ImageNet classifier",
        input_size: 224,
        labels_file: IMAGENET_LABELS,
    },
    ModelSpec {
        name: "ResNet18-Simplified",
        file_name: "resnet18_simplified.onnx",
        description: "ResNet18 after onnx-simplifier graph cleanup",
        input_size: 224,
        labels_file: IMAGENET_LABELS,
    },
];

/// Every built-in model.
pub fn available_models() -> &'static [ModelSpec] {
    &MODELS
}

/// Look up a model by name, ignoring case.
pub fn find_model(name: &str) -> Option<&'static ModelSpec> {
    MODELS.iter().find(|m| m.name.eq_ignore_ascii_case(name))
}
