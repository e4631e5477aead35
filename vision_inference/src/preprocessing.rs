use image::{imageops::FilterType, RgbImage};
use ndarray::{Array, Ix3, Ix4};

const DETR_SHORTEST_EDGE: u32 = 800;
const DETR_LONGEST_EDGE: u32 = 1333;
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Output `(width, height)` for DETR: shortest edge to 800 unless the
/// longest edge would then exceed 1333.
pub fn detr_target_size(width: u32, height: u32) -> (u32, u32) {
    let mut size = DETR_SHORTEST_EDGE as f64;
    let min_original = width.min(height) as f64;
    let max_original = width.max(height) as f64;

    let mut raw_size = None;
    if max_original / min_original * size > DETR_LONGEST_EDGE as f64 {
        let raw = DETR_LONGEST_EDGE as f64 * min_original / max_original;
        raw_size = Some(raw);
        size = raw.round_ties_even();
    }
    let size_px = size as u32;

    if (height <= width && height == size_px) || (width <= height && width == size_px) {
        return (width, height);
    }

    let scale_from = raw_size.unwrap_or(size);
    if width < height {
        let new_height = (scale_from * height as f64 / width as f64) as u32;
        (size_px, new_height)
    } else {
        let new_width = (scale_from * width as f64 / height as f64) as u32;
        (new_width, size_px)
    }
}

/// Resized, ImageNet-normalized NCHW tensor for DETR.
pub fn detr_pixel_values(image: &RgbImage) -> Array<f32, Ix4> {
    let (width, height) = detr_target_size(image.width(), image.height());
    let resized = image::imageops::resize(image, width, height, FilterType::Triangle);

    let mut input = Array::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let value = pixel.0[c] as f32 / 255.;
            input[[0, c, y, x]] = (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }

    input
}

/// CHW tensor scaled to [0, 1] at the original resolution, as expected
/// by the torchvision Mask R-CNN export.
pub fn mask_rcnn_input(image: &RgbImage) -> Array<f32, Ix3> {
    let (width, height) = image.dimensions();
    let mut input = Array::zeros((3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        let [r, g, b] = pixel.0;
        input[[0, y, x]] = (r as f32) / 255.;
        input[[1, y, x]] = (g as f32) / 255.;
        input[[2, y, x]] = (b as f32) / 255.;
    }

    input
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_detr_target_size_scales_shortest_edge() {
        assert_eq!(detr_target_size(640, 480), (1066, 800));
        assert_eq!(detr_target_size(480, 640), (800, 1066));
    }

    #[test]
    fn test_detr_target_size_caps_longest_edge() {
        assert_eq!(detr_target_size(2000, 500), (1333, 333));
    }

    #[test]
    fn test_detr_target_size_keeps_matching_image() {
        assert_eq!(detr_target_size(1000, 800), (1000, 800));
    }

    #[test]
    fn test_detr_pixel_values() {
        let img = RgbImage::from_pixel(100, 50, Rgb([255, 0, 0]));
        let input = detr_pixel_values(&img);

        assert_eq!(input.shape(), &[1, 3, 666, 1333]);
        let red = input[[0, 0, 10, 10]];
        let green = input[[0, 1, 10, 10]];
        assert!((red - (1.0 - 0.485) / 0.229).abs() < 1e-4);
        assert!((green - (0.0 - 0.456) / 0.224).abs() < 1e-4);
    }

    #[test]
    fn test_mask_rcnn_input() {
        let img = RgbImage::from_pixel(4, 3, Rgb([0, 51, 255]));
        let input = mask_rcnn_input(&img);

        assert_eq!(input.shape(), &[3, 3, 4]);
        assert_eq!(input[[0, 2, 3]], 0.0);
        assert!((input[[1, 0, 0]] - 0.2).abs() < 1e-6);
        assert_eq!(input[[2, 1, 1]], 1.0);
    }
}
