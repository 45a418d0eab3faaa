//! Error types for data loading, sampling and checkpointing

use std::path::PathBuf;

use crate::data::ImageShape;

/// Errors produced by the library
#[derive(thiserror::Error, Debug)]
pub enum GanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Pickle error: {0}")]
    Pickle(#[from] serde_pickle::Error),

    #[error("Failed to load data from {path}: {reason}")]
    DataLoad { path: PathBuf, reason: String },

    #[error("Image {index} has {found} values, expected {expected} for shape {shape}")]
    ShapeMismatch {
        index: usize,
        shape: ImageShape,
        expected: usize,
        found: usize,
    },

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Dataset has {available} images, need at least {required}")]
    InsufficientData { available: usize, required: usize },

    #[error("Cannot render images with {0} channels (supported: 1, 3)")]
    UnsupportedChannels(usize),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML decode error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid number: {0}")]
    Parse(#[from] std::num::ParseFloatError),
}

/// Result type for library operations
pub type Result<T> = std::result::Result<T, GanError>;
