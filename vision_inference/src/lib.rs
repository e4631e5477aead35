mod detr;
mod mask_rcnn;
mod preprocessing;
mod session_pool;

pub mod config;
pub mod labels;
pub mod model_service;
pub mod prediction;

pub use detr::DetrModelService;
pub use labels::LabelMap;
pub use mask_rcnn::MaskRcnnModelService;
pub use model_service::{DetectionService, InferenceError, SegmentationService};
pub use prediction::{BoundingBox, Detection, Mask, SegmentationInstance};

/// Minimum class probability for a DETR query to be reported.
pub const DETECTION_THRESHOLD: f32 = 0.9;
/// Minimum score for a Mask R-CNN instance to be reported.
pub const INSTANCE_THRESHOLD: f32 = 0.5;
/// Mask probability above which a pixel belongs to an instance.
pub const MASK_THRESHOLD: f32 = 0.5;
