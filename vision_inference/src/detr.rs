use crate::{
    config::{DetectionModelConfig, Validatable},
    labels::LabelMap,
    model_service::{DetectionService, InferenceError},
    preprocessing::detr_pixel_values,
    prediction::{BoundingBox, Detection},
    session_pool::{extract_array, SessionPool},
    DETECTION_THRESHOLD,
};
use image::RgbImage;
use ndarray::{ArrayD, Axis, Ix3};
use ort::value::TensorRef;

/// DETR detector backed by an ONNX export of `facebook/detr-resnet-50`.
#[derive(Clone)]
pub struct DetrModelService {
    pool: SessionPool,
    labels: LabelMap,
    input_name: String,
    logits_output: String,
    boxes_output: String,
}

impl DetrModelService {
    pub fn new(config: &DetectionModelConfig, labels: LabelMap) -> Result<Self, InferenceError> {
        let pool = SessionPool::new(&config.get_path(), config.num_instances)?;
        Ok(Self {
            pool,
            labels,
            input_name: config.input_name.clone(),
            logits_output: config.logits_output.clone(),
            boxes_output: config.boxes_output.clone(),
        })
    }
}

impl DetectionService for DetrModelService {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, InferenceError> {
        let input = detr_pixel_values(image);

        let (logits, boxes) = self.pool.with_session(|session| {
            let tensor_ref = TensorRef::from_array_view(input.view())?;
            let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor_ref])?;

            let logits = extract_array::<f32>(&outputs, &self.logits_output)?;
            let boxes = extract_array::<f32>(&outputs, &self.boxes_output)?;
            Ok((logits, boxes))
        })?;

        let detections = decode_detr_outputs(
            &logits,
            &boxes,
            image.width(),
            image.height(),
            &self.labels,
            DETECTION_THRESHOLD,
        )?;

        tracing::debug!("DETR kept {} detections", detections.len());
        Ok(detections)
    }
}

/// Turns `logits [1, Q, C+1]` and `pred_boxes [1, Q, 4]` into detections in
/// query order. The last class is the "no object" class.
pub fn decode_detr_outputs(
    logits: &ArrayD<f32>,
    boxes: &ArrayD<f32>,
    img_width: u32,
    img_height: u32,
    labels: &LabelMap,
    threshold: f32,
) -> Result<Vec<Detection>, InferenceError> {
    let logits = logits
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|_| unexpected_shape("logits", logits.shape()))?;
    let boxes = boxes
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|_| unexpected_shape("pred_boxes", boxes.shape()))?;

    let num_queries = logits.shape()[1];
    if logits.shape()[2] < 2 || boxes.shape()[1] != num_queries || boxes.shape()[2] != 4 {
        return Err(unexpected_shape("pred_boxes", boxes.shape()));
    }

    let logits = logits.index_axis(Axis(0), 0);
    let boxes = boxes.index_axis(Axis(0), 0);

    let mut detections = Vec::new();
    for (query, row) in logits.axis_iter(Axis(0)).enumerate() {
        let max_logit = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = row.iter().map(|v| (v - max_logit).exp()).collect();
        let sum: f32 = exps.iter().sum();

        let (class_id, prob) = exps[..exps.len() - 1]
            .iter()
            .enumerate()
            .map(|(index, value)| (index, value / sum))
            .reduce(|accum, item| if item.1 > accum.1 { item } else { accum })
            .unwrap_or((0, 0.0));

        if prob <= threshold {
            continue;
        }

        let b = boxes.index_axis(Axis(0), query);
        detections.push(Detection {
            label: labels.name(class_id),
            score: prob,
            bbox: BoundingBox::from_normalized_center(b[0], b[1], b[2], b[3], img_width, img_height),
        });
    }

    Ok(detections)
}

fn unexpected_shape(name: &str, shape: &[usize]) -> InferenceError {
    InferenceError::UnexpectedShape {
        name: name.to_string(),
        shape: shape.to_vec(),
    }
}
