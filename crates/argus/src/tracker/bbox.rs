//! IoU-based similarity, for tracking whole-body or whole-object detections where a bounding box
//! is the only stable signal.

use super::{Pose, Similarity, Track};

#[derive(Debug, Clone, Copy)]
pub struct BoxSimilarity {
    pub iou_threshold: f32,
}

impl Similarity for BoxSimilarity {
    fn similarity(&self, pose: &Pose, track: &Track) -> f32 {
        let (Some(pose_box), Some(track_box)) = (pose.bounding_box, track.bounding_box) else {
            return 0.0;
        };
        let iou = pose_box.iou(&track_box);
        if iou < self.iou_threshold {
            0.0
        } else {
            iou
        }
    }
}
