use crate::config::{LabelsConfig, Validatable};
use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

/// Class index to class name table shared by both COCO models.
#[derive(Debug, Clone)]
pub struct LabelMap {
    class_labels: Vec<String>,
}

impl LabelMap {
    pub fn new(labels_cfg: &LabelsConfig) -> Result<Self, String> {
        match load_coco_labels(&labels_cfg.get_path()) {
            Ok(labels) => Ok(LabelMap {
                class_labels: labels,
            }),
            Err(e) => Err(format!("Failed to load labels: {}", e)),
        }
    }

    /// Name for a class index, `LABEL_<id>` when the table has no entry.
    pub fn name(&self, class_id: usize) -> String {
        self.class_labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("LABEL_{}", class_id))
    }

    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }
}

impl From<Vec<String>> for LabelMap {
    fn from(class_labels: Vec<String>) -> Self {
        Self { class_labels }
    }
}

/// One label per line, line number is the class index.
pub fn load_coco_labels(filepath: &Path) -> io::Result<Vec<String>> {
    let file = File::open(filepath)?;
    let reader = io::BufReader::new(file);
    let mut labels = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        let label = line.trim();

        if label.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Empty label at line {}", labels.len() + 1),
            ));
        }
        labels.push(label.to_string());
    }

    if labels.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Labels file is empty",
        ));
    }

    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_labels(contents: &str) -> (tempfile::TempDir, LabelsConfig) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("coco.txt"), contents).unwrap();
        let cfg = LabelsConfig {
            labels_file: "coco.txt".to_string(),
            labels_dir: dir.path().to_path_buf(),
        };
        (dir, cfg)
    }

    #[test]
    fn test_load_labels_by_line_index() {
        let (_dir, cfg) = write_labels("N/A\nperson\n bicycle \n");
        let labels = LabelMap::new(&cfg).unwrap();

        assert_eq!(labels.num_classes(), 3);
        assert_eq!(labels.name(1), "person");
        assert_eq!(labels.name(2), "bicycle");
    }

    #[test]
    fn test_unknown_class_falls_back_to_generic_name() {
        let labels = LabelMap::from(vec!["N/A".to_string()]);
        assert_eq!(labels.name(42), "LABEL_42");
    }

    #[test]
    fn test_blank_line_is_rejected() {
        let (_dir, cfg) = write_labels("person\n\ncar\n");
        let err = LabelMap::new(&cfg).unwrap_err();
        assert!(err.contains("Empty label at line 2"));
    }

    #[test]
    fn test_bundled_coco_table() {
        let cfg = LabelsConfig {
            labels_file: "coco_labels.txt".to_string(),
            labels_dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("../configuration/labels"),
        };
        let labels = LabelMap::new(&cfg).unwrap();

        assert_eq!(labels.num_classes(), 91);
        assert_eq!(labels.name(1), "person");
        assert_eq!(labels.name(18), "dog");
        assert_eq!(labels.name(90), "toothbrush");
    }
}
