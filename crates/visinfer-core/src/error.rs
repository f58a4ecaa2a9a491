//! Error types for the visinfer-core library.

use std::fmt;

use thiserror::Error;

use visinfer_inference::InferenceError;

/// Main error type for the visinfer library.
#[derive(Error, Debug)]
pub enum VisinferError {
    /// Image validation or decoding error.
    #[error("image error: {0}")]
    Image(#[from] ImageError),

    /// Model loading or inference error.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Caller precondition violated.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl VisinferError {
    /// Category of this error, used as a structured log field.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VisinferError::Image(_) => ErrorKind::Image,
            VisinferError::Model(_) => ErrorKind::Model,
            VisinferError::Validation(_) => ErrorKind::Validation,
            VisinferError::Io(_) => ErrorKind::Io,
            VisinferError::Config(_) => ErrorKind::Config,
        }
    }
}

/// Broad error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Image,
    Model,
    Validation,
    Io,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Image => "image",
            ErrorKind::Model => "model",
            ErrorKind::Validation => "validation",
            ErrorKind::Io => "io",
            ErrorKind::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors related to image input.
#[derive(Error, Debug)]
pub enum ImageError {
    /// Declared media type is not in the allow-list.
    #[error("unsupported image format '{0}', expected JPEG, PNG or WebP")]
    UnsupportedFormat(String),

    /// File exceeds the configured size ceiling.
    #[error("image is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    /// The bytes could not be decoded as an image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// Raw pixel buffer does not match its declared dimensions.
    #[error("invalid pixel buffer: {0}")]
    InvalidBuffer(String),

    /// I/O error while reading an image file.
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to model sessions.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Session creation failed.
    #[error("failed to load model '{model}': {source}")]
    Load {
        model: String,
        #[source]
        source: InferenceError,
    },

    /// Running the session failed.
    #[error("inference failed: {0}")]
    Inference(#[source] InferenceError),

    /// No model has been loaded yet.
    #[error("no model loaded")]
    NotLoaded,

    /// The model produced an output that cannot be interpreted.
    #[error("unexpected model output: {0}")]
    Output(String),

    /// The label table could not be read or parsed.
    #[error("failed to load labels: {0}")]
    Labels(String),

    /// I/O error while reading model files.
    #[error("failed to read model file: {0}")]
    Io(#[from] std::io::Error),
}

/// Caller precondition violations.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    /// Repetition count outside the accepted range.
    #[error("iterations must be between {min} and {max}, got {value}")]
    IterationsOutOfRange { value: usize, min: usize, max: usize },

    /// No input tensor was supplied.
    #[error("no input tensor present")]
    MissingInput,

    /// The candidate list is empty.
    #[error("no execution providers to test")]
    NoCandidates,

    /// Generic invalid value.
    #[error("invalid {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for the visinfer library.
pub type Result<T> = std::result::Result<T, VisinferError>;
