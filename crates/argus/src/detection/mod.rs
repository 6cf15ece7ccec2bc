//! Detector output: raw SSD decode, non-maximum suppression, and the letterbox-removal step
//! shared by detections and landmarks.

pub mod decode;
pub mod nms;

use argus_geometry::{BoundingBox, Keypoint};

/// A single decoded detection: a bounding box, confidence score, and any alignment keypoints
/// (e.g. eye centers, used to orient the next-frame ROI).
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    confidence: f32,
    bounding_box: BoundingBox,
    keypoints: Vec<Keypoint>,
}

impl RawDetection {
    pub fn new(confidence: f32, bounding_box: BoundingBox) -> Self {
        Self { confidence, bounding_box, keypoints: Vec::new() }
    }

    pub fn with_keypoints(confidence: f32, bounding_box: BoundingBox, keypoints: Vec<Keypoint>) -> Self {
        Self { confidence, bounding_box, keypoints }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    pub fn set_bounding_box(&mut self, bounding_box: BoundingBox) {
        self.bounding_box = bounding_box;
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn keypoints_mut(&mut self) -> &mut Vec<Keypoint> {
        &mut self.keypoints
    }
}
