//! Object Keypoint Similarity (OKS): the metric COCO-style pose evaluation uses, adapted here as
//! a tracking association score instead of an evaluation score.

use argus_geometry::BoundingBox;

use super::{Pose, Similarity, Track};

/// OKS-based similarity between a pose's keypoints and a track's last-known keypoints.
///
/// `falloff[i]` is the per-keypoint normalized standard deviation (COCO calls this `sigma`);
/// keypoints without a matching falloff entry, or whose pose- *or* track-side score is below
/// `keypoint_confidence_threshold`, are excluded from the sum. The area term is the bounding box
/// of the track's *valid* keypoints (not the pose's), so a momentarily-occluded pose is still
/// compared against a stable reference frame.
#[derive(Debug, Clone)]
pub struct KeypointSimilarity {
    pub keypoint_confidence_threshold: f32,
    pub falloff: Vec<f32>,
    pub min_number_of_keypoints: usize,
}

impl Similarity for KeypointSimilarity {
    fn similarity(&self, pose: &Pose, track: &Track) -> f32 {
        let n = self.falloff.len().min(pose.keypoints.len()).min(track.keypoints.len());

        let valid: Vec<usize> = (0..n)
            .filter(|&i| {
                track.keypoints[i].score.unwrap_or(1.0) >= self.keypoint_confidence_threshold
                    && pose.keypoints[i].score.unwrap_or(1.0) >= self.keypoint_confidence_threshold
            })
            .collect();

        if valid.len() < self.min_number_of_keypoints {
            return 0.0;
        }

        let area = bounding_box_area(valid.iter().map(|&i| track.keypoints[i])) + 1e-6;

        let sum: f32 = valid
            .iter()
            .map(|&i| {
                let p = pose.keypoints[i];
                let t = track.keypoints[i];
                let dx = p.x - t.x;
                let dy = p.y - t.y;
                let d2 = dx * dx + dy * dy;
                let fo = self.falloff[i];
                (-d2 / (2.0 * area * (2.0 * fo) * (2.0 * fo))).exp()
            })
            .sum();

        sum / valid.len() as f32
    }
}

fn bounding_box_area(keypoints: impl Iterator<Item = argus_geometry::Keypoint>) -> f32 {
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    let mut any = false;
    for kp in keypoints {
        any = true;
        min_x = min_x.min(kp.x);
        min_y = min_y.min(kp.y);
        max_x = max_x.max(kp.x);
        max_y = max_y.max(kp.y);
    }
    if !any {
        return 0.0;
    }
    BoundingBox { x_min: min_x, y_min: min_y, x_max: max_x, y_max: max_y }.area()
}
