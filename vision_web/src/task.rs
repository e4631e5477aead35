/// The two annotation tools the service offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Detection,
    Segmentation,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Detection => "detection",
            Task::Segmentation => "segmentation",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Task::Detection => "Object Detection",
            Task::Segmentation => "Instance Segmentation",
        }
    }

    pub fn route(&self) -> &'static str {
        match self {
            Task::Detection => "/detection/",
            Task::Segmentation => "/segmentation/",
        }
    }
}
