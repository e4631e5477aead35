use crate::{model_service::InferenceError, MASK_THRESHOLD};

/// Axis-aligned box in pixel coordinates of the original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Converts a normalized `(cx, cy, w, h)` box into pixel corners.
    pub fn from_normalized_center(
        cx: f32,
        cy: f32,
        w: f32,
        h: f32,
        img_width: u32,
        img_height: u32,
    ) -> Self {
        let (img_w, img_h) = (img_width as f32, img_height as f32);
        Self {
            x_min: (cx - w / 2.) * img_w,
            y_min: (cy - h / 2.) * img_h,
            x_max: (cx + w / 2.) * img_w,
            y_max: (cy + h / 2.) * img_h,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub score: f32,
    pub bbox: BoundingBox,
}

/// Per-pixel instance probabilities, row-major at image resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    probabilities: Vec<f32>,
}

impl Mask {
    pub fn new(width: u32, height: u32, probabilities: Vec<f32>) -> Result<Self, InferenceError> {
        let expected = width as usize * height as usize;
        if probabilities.len() != expected {
            return Err(InferenceError::InvalidMask {
                expected,
                actual: probabilities.len(),
            });
        }
        Ok(Self {
            width,
            height,
            probabilities,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn probability(&self, x: u32, y: u32) -> f32 {
        self.probabilities[(y * self.width + x) as usize]
    }

    /// Whether the pixel clears the binarization threshold.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.probability(x, y) > MASK_THRESHOLD
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationInstance {
    pub label: String,
    pub score: f32,
    pub bbox: BoundingBox,
    pub mask: Mask,
}
