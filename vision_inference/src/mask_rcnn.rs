use crate::{
    config::{SegmentationModelConfig, Validatable},
    labels::LabelMap,
    model_service::{InferenceError, SegmentationService},
    prediction::{BoundingBox, Mask, SegmentationInstance},
    preprocessing::mask_rcnn_input,
    session_pool::{extract_array, SessionPool},
    INSTANCE_THRESHOLD,
};
use image::RgbImage;
use ndarray::{s, ArrayD, Ix1, Ix2, Ix4};
use ort::value::TensorRef;

/// Mask R-CNN segmenter backed by an ONNX export of torchvision's
/// `maskrcnn_resnet50_fpn`.
#[derive(Clone)]
pub struct MaskRcnnModelService {
    pool: SessionPool,
    labels: LabelMap,
    config: SegmentationModelConfig,
}

struct MaskRcnnOutputs {
    boxes: ArrayD<f32>,
    labels: ArrayD<i64>,
    scores: ArrayD<f32>,
    masks: ArrayD<f32>,
}

impl MaskRcnnModelService {
    pub fn new(config: &SegmentationModelConfig, labels: LabelMap) -> Result<Self, InferenceError> {
        let pool = SessionPool::new(&config.get_path(), config.num_instances)?;
        Ok(Self {
            pool,
            labels,
            config: config.clone(),
        })
    }
}

impl SegmentationService for MaskRcnnModelService {
    fn segment(&self, image: &RgbImage) -> Result<Vec<SegmentationInstance>, InferenceError> {
        let input = mask_rcnn_input(image);
        let cfg = &self.config;

        let outputs = self.pool.with_session(|session| {
            let tensor_ref = TensorRef::from_array_view(input.view())?;
            let outputs = session.run(ort::inputs![cfg.input_name.as_str() => tensor_ref])?;

            Ok(MaskRcnnOutputs {
                boxes: extract_array::<f32>(&outputs, &cfg.boxes_output)?,
                labels: extract_array::<i64>(&outputs, &cfg.labels_output)?,
                scores: extract_array::<f32>(&outputs, &cfg.scores_output)?,
                masks: extract_array::<f32>(&outputs, &cfg.masks_output)?,
            })
        })?;

        let instances = decode_mask_rcnn_outputs(&outputs, &self.labels, INSTANCE_THRESHOLD)?;

        tracing::debug!("Mask R-CNN kept {} instances", instances.len());
        Ok(instances)
    }
}

/// Keeps instances scoring above `threshold`, in model order, each with its
/// first mask channel.
fn decode_mask_rcnn_outputs(
    outputs: &MaskRcnnOutputs,
    labels: &LabelMap,
    threshold: f32,
) -> Result<Vec<SegmentationInstance>, InferenceError> {
    let boxes = outputs
        .boxes
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| unexpected_shape("boxes", outputs.boxes.shape()))?;
    let class_ids = outputs
        .labels
        .view()
        .into_dimensionality::<Ix1>()
        .map_err(|_| unexpected_shape("labels", outputs.labels.shape()))?;
    let scores = outputs
        .scores
        .view()
        .into_dimensionality::<Ix1>()
        .map_err(|_| unexpected_shape("scores", outputs.scores.shape()))?;
    let masks = outputs
        .masks
        .view()
        .into_dimensionality::<Ix4>()
        .map_err(|_| unexpected_shape("masks", outputs.masks.shape()))?;

    let count = scores.len();
    if boxes.shape() != [count, 4]
        || class_ids.len() != count
        || masks.shape()[0] != count
        || masks.shape()[1] == 0
    {
        return Err(unexpected_shape("masks", masks.shape()));
    }
    let (mask_height, mask_width) = (masks.shape()[2] as u32, masks.shape()[3] as u32);

    let mut instances = Vec::new();
    for i in 0..count {
        let score = scores[i];
        if score <= threshold {
            continue;
        }

        let probabilities: Vec<f32> = masks.slice(s![i, 0, .., ..]).iter().copied().collect();
        instances.push(SegmentationInstance {
            label: labels.name(class_ids[i].max(0) as usize),
            score,
            bbox: BoundingBox::new(boxes[[i, 0]], boxes[[i, 1]], boxes[[i, 2]], boxes[[i, 3]]),
            mask: Mask::new(mask_width, mask_height, probabilities)?,
        });
    }

    Ok(instances)
}

fn unexpected_shape(name: &str, shape: &[usize]) -> InferenceError {
    InferenceError::UnexpectedShape {
        name: name.to_string(),
        shape: shape.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn labels() -> LabelMap {
        LabelMap::from(vec!["N/A".to_string(), "person".to_string(), "bicycle".to_string()])
    }

    fn outputs(scores: Vec<f32>, class_ids: Vec<i64>) -> MaskRcnnOutputs {
        let n = scores.len();
        let mut masks = Vec::new();
        for i in 0..n {
            // 2x3 mask, instance i lights up pixel i
            let mut mask = vec![0.0f32; 6];
            mask[i] = 0.9;
            masks.extend(mask);
        }
        MaskRcnnOutputs {
            boxes: Array::from_shape_vec((n, 4), vec![1.0; n * 4]).unwrap().into_dyn(),
            labels: Array::from_shape_vec(n, class_ids).unwrap().into_dyn(),
            scores: Array::from_shape_vec(n, scores).unwrap().into_dyn(),
            masks: Array::from_shape_vec((n, 1, 2, 3), masks).unwrap().into_dyn(),
        }
    }

    #[test]
    fn test_decode_filters_by_score_in_model_order() {
        let outputs = outputs(vec![0.95, 0.5, 0.51], vec![1, 2, 2]);
        let instances = decode_mask_rcnn_outputs(&outputs, &labels(), INSTANCE_THRESHOLD).unwrap();

        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].label, "person");
        assert_eq!(instances[1].label, "bicycle");
        assert_eq!(instances[1].score, 0.51);
    }

    #[test]
    fn test_decode_keeps_mask_layout() {
        let outputs = outputs(vec![0.9, 0.9], vec![1, 1]);
        let instances = decode_mask_rcnn_outputs(&outputs, &labels(), INSTANCE_THRESHOLD).unwrap();

        let mask = &instances[1].mask;
        assert_eq!((mask.width(), mask.height()), (3, 2));
        assert!(mask.contains(1, 0));
        assert!(!mask.contains(0, 0));
        let lit = (0..3)
            .flat_map(|x| (0..2).map(move |y| (x, y)))
            .filter(|&(x, y)| mask.contains(x, y))
            .count();
        assert_eq!(lit, 1);
    }

    #[test]
    fn test_empty_prediction() {
        let outputs = MaskRcnnOutputs {
            boxes: Array::<f32, _>::zeros((0, 4)).into_dyn(),
            labels: Array::<i64, _>::zeros(0).into_dyn(),
            scores: Array::<f32, _>::zeros(0).into_dyn(),
            masks: Array::<f32, _>::zeros((0, 1, 5, 5)).into_dyn(),
        };

        let instances = decode_mask_rcnn_outputs(&outputs, &labels(), INSTANCE_THRESHOLD).unwrap();
        assert!(instances.is_empty());
    }

    #[test]
    fn test_masks_without_channel_are_rejected() {
        let mut outputs = outputs(vec![0.9], vec![1]);
        outputs.masks = Array::<f32, _>::zeros((1, 0, 2, 3)).into_dyn();

        let err = decode_mask_rcnn_outputs(&outputs, &labels(), INSTANCE_THRESHOLD).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::UnexpectedShape { ref shape, .. } if shape == &[1, 0, 2, 3]
        ));
    }

    #[test]
    fn test_inconsistent_counts_are_rejected() {
        let mut outputs = outputs(vec![0.9, 0.9], vec![1, 1]);
        outputs.labels = Array::from_shape_vec(1, vec![1i64]).unwrap().into_dyn();

        let err = decode_mask_rcnn_outputs(&outputs, &labels(), INSTANCE_THRESHOLD).unwrap_err();
        assert!(matches!(err, InferenceError::UnexpectedShape { .. }));
    }
}
