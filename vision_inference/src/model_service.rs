use crate::prediction::{Detection, SegmentationInstance};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("Invalid tensor shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("Model output `{0}` is missing")]
    MissingOutput(String),
    #[error("Model output `{name}` has unexpected shape {shape:?}")]
    UnexpectedShape { name: String, shape: Vec<usize> },
    #[error("Mask has {actual} values, expected {expected}")]
    InvalidMask { expected: usize, actual: usize },
    #[error("Session mutex poisoned: {0}")]
    SessionPoisoned(String),
}

/// Runs object detection on a decoded image.
pub trait DetectionService: Send + Sync + 'static {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, InferenceError>;
}

/// Runs instance segmentation on a decoded image.
pub trait SegmentationService: Send + Sync + 'static {
    fn segment(&self, image: &RgbImage) -> Result<Vec<SegmentationInstance>, InferenceError>;
}
