use crate::config::RenderConfig;
use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_hollow_rect_mut, draw_text_mut},
    rect::Rect,
};
use rand::Rng;
use std::path::PathBuf;
use thiserror::Error;
use vision_inference::{Detection, SegmentationInstance};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: i32 = 2;
const LABEL_OFFSET: i32 = 10;
const MASK_OPACITY: f32 = 0.5;

static DEFAULT_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to read font {path:?}: {source}")]
    FontIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid font {0}")]
    InvalidFont(String),
    #[error("Mask is {mask_width}x{mask_height} but image is {image_width}x{image_height}")]
    MaskSize {
        mask_width: u32,
        mask_height: u32,
        image_width: u32,
        image_height: u32,
    },
}

/// Burns predictions into a copy of the uploaded image.
pub struct Overlay {
    font: FontArc,
    font_scale: PxScale,
}

impl Overlay {
    pub fn new(config: &RenderConfig) -> Result<Self, RenderError> {
        let font = match &config.font_path {
            Some(path) => {
                let data = std::fs::read(path).map_err(|source| RenderError::FontIo {
                    path: path.clone(),
                    source,
                })?;
                tracing::info!("Using label font {:?}", path);
                FontArc::try_from_vec(data)
                    .map_err(|_| RenderError::InvalidFont(path.display().to_string()))?
            }
            None => FontArc::try_from_slice(DEFAULT_FONT)
                .map_err(|_| RenderError::InvalidFont("DejaVuSans.ttf (embedded)".to_string()))?,
        };

        Ok(Self {
            font,
            font_scale: PxScale::from(config.font_size),
        })
    }

    /// Green box plus `"<label> <score>"` per detection, in the given order.
    pub fn draw_detections(&self, image: &mut RgbImage, detections: &[Detection]) {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return;
        }

        for detection in detections {
            let bbox = &detection.bbox;
            let x1 = clamp_coord(bbox.x_min, width);
            let y1 = clamp_coord(bbox.y_min, height);
            let x2 = clamp_coord(bbox.x_max, width);
            let y2 = clamp_coord(bbox.y_max, height);

            // corners are inclusive
            for inset in 0..BOX_THICKNESS {
                let rect_width = x2 - x1 + 1 - 2 * inset;
                let rect_height = y2 - y1 + 1 - 2 * inset;
                if rect_width <= 0 || rect_height <= 0 {
                    break;
                }
                let rect = Rect::at(x1 + inset, y1 + inset)
                    .of_size(rect_width as u32, rect_height as u32);
                draw_hollow_rect_mut(image, rect, BOX_COLOR);
            }

            let label = format!("{} {:.2}", detection.label, detection.score);
            let text_y = y1 - LABEL_OFFSET - self.font_scale.y as i32;
            draw_text_mut(image, BOX_COLOR, x1, text_y, self.font_scale, &self.font, &label);
        }
    }

    /// Blends a random color at 50% into every pixel of each instance mask.
    /// Instances are applied in order, so later ones land on top.
    pub fn draw_masks<R: Rng>(
        &self,
        image: &mut RgbImage,
        instances: &[SegmentationInstance],
        rng: &mut R,
    ) -> Result<(), RenderError> {
        for instance in instances {
            let mask = &instance.mask;
            if mask.width() != image.width() || mask.height() != image.height() {
                return Err(RenderError::MaskSize {
                    mask_width: mask.width(),
                    mask_height: mask.height(),
                    image_width: image.width(),
                    image_height: image.height(),
                });
            }

            let color = random_color(rng);
            tracing::debug!(
                "Blending {} ({:.2}) inside {:?}",
                instance.label,
                instance.score,
                instance.bbox
            );
            for (x, y, pixel) in image.enumerate_pixels_mut() {
                if mask.contains(x, y) {
                    *pixel = blend(*pixel, color);
                }
            }
        }

        Ok(())
    }
}

/// Pixel index in `[0, size - 1]`. Non-finite coordinates collapse onto the border.
fn clamp_coord(value: f32, size: u32) -> i32 {
    value.max(0.0).min((size - 1) as f32) as i32
}

pub fn random_color<R: Rng>(rng: &mut R) -> Rgb<u8> {
    Rgb([
        rng.random_range(0..255),
        rng.random_range(0..255),
        rng.random_range(0..255),
    ])
}

fn blend(pixel: Rgb<u8>, color: Rgb<u8>) -> Rgb<u8> {
    let mix = |p: u8, c: u8| (p as f32 * (1.0 - MASK_OPACITY) + c as f32 * MASK_OPACITY) as u8;
    Rgb([
        mix(pixel[0], color[0]),
        mix(pixel[1], color[1]),
        mix(pixel[2], color[2]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use vision_inference::{BoundingBox, Mask};

    fn overlay() -> Overlay {
        Overlay::new(&RenderConfig::default()).unwrap()
    }

    fn instance(width: u32, height: u32, lit: &[(u32, u32)]) -> SegmentationInstance {
        let mut probabilities = vec![0.1; (width * height) as usize];
        for (x, y) in lit {
            probabilities[(y * width + x) as usize] = 0.8;
        }
        SegmentationInstance {
            label: "person".to_string(),
            score: 0.9,
            bbox: BoundingBox::new(0.0, 0.0, width as f32, height as f32),
            mask: Mask::new(width, height, probabilities).unwrap(),
        }
    }

    #[test]
    fn test_blend_truncates() {
        assert_eq!(blend(Rgb([255, 0, 11]), Rgb([0, 255, 0])), Rgb([127, 127, 5]));
    }

    #[test]
    fn test_draw_detections_keeps_dimensions() {
        let mut img = RgbImage::from_pixel(50, 40, Rgb([10, 10, 10]));
        let detections = vec![Detection {
            label: "cat".to_string(),
            score: 0.97,
            bbox: BoundingBox::new(5.6, 5.2, 30.9, 20.1),
        }];

        overlay().draw_detections(&mut img, &detections);

        assert_eq!(img.dimensions(), (50, 40));
        assert_eq!(*img.get_pixel(5, 5), BOX_COLOR);
        assert_eq!(*img.get_pixel(6, 10), BOX_COLOR);
        assert_eq!(*img.get_pixel(15, 12), Rgb([10, 10, 10]));
    }

    #[test]
    fn test_boxes_outside_image_are_clamped() {
        let mut img = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        let detections = vec![Detection {
            label: "car".to_string(),
            score: 0.95,
            bbox: BoundingBox::new(-3.0, -3.0, 100.0, 100.0),
        }];

        overlay().draw_detections(&mut img, &detections);

        assert_eq!(img.dimensions(), (20, 20));
        assert_eq!(*img.get_pixel(0, 5), BOX_COLOR);
        assert_eq!(*img.get_pixel(5, 0), BOX_COLOR);
        assert_eq!(*img.get_pixel(19, 10), BOX_COLOR);
        assert_eq!(*img.get_pixel(10, 19), BOX_COLOR);
        assert_eq!(*img.get_pixel(10, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_non_finite_box_does_not_panic() {
        let mut img = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        let detections = vec![Detection {
            label: "kite".to_string(),
            score: 0.91,
            bbox: BoundingBox::new(f32::NEG_INFINITY, f32::NAN, f32::INFINITY, f32::INFINITY),
        }];

        overlay().draw_detections(&mut img, &detections);

        assert_eq!(*img.get_pixel(0, 0), BOX_COLOR);
        assert_eq!(*img.get_pixel(9, 9), BOX_COLOR);
    }

    #[test]
    fn test_label_is_drawn_above_box_with_default_font() {
        let mut img = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
        let detections = vec![Detection {
            label: "person".to_string(),
            score: 0.97,
            bbox: BoundingBox::new(10.0, 60.0, 90.0, 95.0),
        }];

        overlay().draw_detections(&mut img, &detections);

        let lit_above_box = img
            .enumerate_pixels()
            .filter(|(_, y, pixel)| *y < 60 && **pixel != Rgb([0, 0, 0]))
            .count();
        assert!(lit_above_box > 0);
    }

    #[test]
    fn test_draw_masks_leaves_outside_pixels_untouched() {
        let original = RgbImage::from_fn(4, 3, |x, y| Rgb([x as u8 * 40, y as u8 * 60, 200]));
        let mut img = original.clone();
        let instances = vec![instance(4, 3, &[(1, 1), (2, 1)])];

        overlay()
            .draw_masks(&mut img, &instances, &mut StdRng::seed_from_u64(7))
            .unwrap();

        let color = random_color(&mut StdRng::seed_from_u64(7));
        for (x, y, pixel) in img.enumerate_pixels() {
            let before = *original.get_pixel(x, y);
            if y == 1 && (x == 1 || x == 2) {
                assert_eq!(*pixel, blend(before, color));
            } else {
                assert_eq!(*pixel, before);
            }
        }
    }

    #[test]
    fn test_later_instances_land_on_top() {
        let original = RgbImage::from_pixel(3, 1, Rgb([100, 100, 100]));
        let mut img = original.clone();
        let instances = vec![instance(3, 1, &[(0, 0), (1, 0)]), instance(3, 1, &[(1, 0), (2, 0)])];

        overlay()
            .draw_masks(&mut img, &instances, &mut StdRng::seed_from_u64(42))
            .unwrap();

        let mut replay = StdRng::seed_from_u64(42);
        let first = random_color(&mut replay);
        let second = random_color(&mut replay);
        let base = Rgb([100, 100, 100]);

        assert_eq!(*img.get_pixel(0, 0), blend(base, first));
        assert_eq!(*img.get_pixel(1, 0), blend(blend(base, first), second));
        assert_eq!(*img.get_pixel(2, 0), blend(base, second));
    }

    #[test]
    fn test_mask_size_mismatch_is_an_error() {
        let mut img = RgbImage::new(4, 4);
        let instances = vec![instance(2, 2, &[])];

        let err = overlay()
            .draw_masks(&mut img, &instances, &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(err, RenderError::MaskSize { mask_width: 2, .. }));
    }

    #[test]
    fn test_font_path_overrides_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label.ttf");
        std::fs::write(&path, DEFAULT_FONT).unwrap();
        let config = RenderConfig {
            font_path: Some(path),
            font_size: 12.0,
        };
        assert!(Overlay::new(&config).is_ok());

        let garbage = dir.path().join("garbage.ttf");
        std::fs::write(&garbage, b"not a font").unwrap();
        let config = RenderConfig {
            font_path: Some(garbage),
            font_size: 12.0,
        };
        assert!(matches!(
            Overlay::new(&config),
            Err(RenderError::InvalidFont(_))
        ));
    }

    #[test]
    fn test_missing_font_is_reported() {
        let config = RenderConfig {
            font_path: Some(PathBuf::from("./no/such/font.ttf")),
            font_size: 12.0,
        };
        assert!(matches!(
            Overlay::new(&config),
            Err(RenderError::FontIo { .. })
        ));
    }
}
