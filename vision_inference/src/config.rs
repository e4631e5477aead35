use serde::Deserialize;
use std::path::PathBuf;

pub trait Validatable {
    fn get_path(&self) -> PathBuf;

    fn validate(&self) -> Result<(), String> {
        let path = self.get_path();
        if !path.exists() {
            return Err(format!("File not found: {:?}", path));
        }
        Ok(())
    }
}

/// DETR object detection model exported to ONNX.
#[derive(Debug, Deserialize, Clone)]
pub struct DetectionModelConfig {
    pub onnx_file: String,
    pub model_dir: PathBuf,
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
    #[serde(default = "default_detr_input")]
    pub input_name: String,
    #[serde(default = "default_detr_logits")]
    pub logits_output: String,
    #[serde(default = "default_detr_boxes")]
    pub boxes_output: String,
}

/// Mask R-CNN instance segmentation model exported to ONNX.
#[derive(Debug, Deserialize, Clone)]
pub struct SegmentationModelConfig {
    pub onnx_file: String,
    pub model_dir: PathBuf,
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
    #[serde(default = "default_mask_rcnn_input")]
    pub input_name: String,
    #[serde(default = "default_mask_rcnn_boxes")]
    pub boxes_output: String,
    #[serde(default = "default_mask_rcnn_labels")]
    pub labels_output: String,
    #[serde(default = "default_mask_rcnn_scores")]
    pub scores_output: String,
    #[serde(default = "default_mask_rcnn_masks")]
    pub masks_output: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LabelsConfig {
    pub labels_file: String,
    pub labels_dir: PathBuf,
}

// Both models are large, a couple of sessions is enough to overlap requests.
fn default_model_instances() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(2))
        .unwrap_or(1)
}

fn default_detr_input() -> String {
    "pixel_values".into()
}

fn default_detr_logits() -> String {
    "logits".into()
}

fn default_detr_boxes() -> String {
    "pred_boxes".into()
}

fn default_mask_rcnn_input() -> String {
    "image".into()
}

fn default_mask_rcnn_boxes() -> String {
    "boxes".into()
}

fn default_mask_rcnn_labels() -> String {
    "labels".into()
}

fn default_mask_rcnn_scores() -> String {
    "scores".into()
}

fn default_mask_rcnn_masks() -> String {
    "masks".into()
}

impl Validatable for DetectionModelConfig {
    fn get_path(&self) -> PathBuf {
        self.model_dir.join(&self.onnx_file)
    }
}

impl Validatable for SegmentationModelConfig {
    fn get_path(&self) -> PathBuf {
        self.model_dir.join(&self.onnx_file)
    }
}

impl Validatable for LabelsConfig {
    fn get_path(&self) -> PathBuf {
        self.labels_dir.join(&self.labels_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_fails_validation() {
        let config = DetectionModelConfig {
            onnx_file: "detr.onnx".to_string(),
            model_dir: PathBuf::from("./does_not_exist"),
            num_instances: 1,
            input_name: default_detr_input(),
            logits_output: default_detr_logits(),
            boxes_output: default_detr_boxes(),
        };

        let err = config.validate().unwrap_err();
        assert!(err.contains("detr.onnx"));
    }

    #[test]
    fn test_existing_labels_pass_validation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("labels.txt"), "person\n").unwrap();

        let config = LabelsConfig {
            labels_file: "labels.txt".to_string(),
            labels_dir: dir.path().to_path_buf(),
        };

        assert!(config.validate().is_ok());
        assert_eq!(config.get_path(), dir.path().join("labels.txt"));
    }
}
