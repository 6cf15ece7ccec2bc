//! SSD-style tensor-to-detections decode.
//!
//! Generalizes the single hardcoded BlazeFace box layout into the parametric scheme needed to
//! support both tensor contracts in spec.md §6 (the 13-value `[score, 12 coords]` "Pose A" layout
//! and others that reorder or drop the alignment keypoints).

use argus_geometry::{BoundingBox, Keypoint};
use argus_utils::num::sigmoid;

use super::RawDetection;

/// Decode parameters for one model's box/keypoint layout.
#[derive(Debug, Clone)]
pub struct DecodeParams {
    pub x_scale: f32,
    pub y_scale: f32,
    pub w_scale: f32,
    pub h_scale: f32,
    pub apply_exponential_on_box_size: bool,
    /// Swaps the raw box layout from `[y, x, h, w, ...]` to `[x, y, w, h, ...]`.
    pub reverse_output_order: bool,
    pub num_keypoints: usize,
    pub num_values_per_keypoint: usize,
    pub flip_vertically: bool,
    pub min_score_thresh: f32,
    pub apply_sigmoid_to_score: bool,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            x_scale: 1.0,
            y_scale: 1.0,
            w_scale: 1.0,
            h_scale: 1.0,
            apply_exponential_on_box_size: false,
            reverse_output_order: false,
            num_keypoints: 0,
            num_values_per_keypoint: 2,
            flip_vertically: false,
            min_score_thresh: 0.5,
            apply_sigmoid_to_score: true,
        }
    }
}

/// Decodes `scores` (one per box, already the best-class score) and `boxes`
/// (`num_boxes` rows of `num_coords` raw values each) against `anchors`, keeping only boxes whose
/// score clears `params.min_score_thresh`.
///
/// `anchors.len()` must equal `scores.len()` and `boxes.len() / anchors.len()`.
pub fn tensors_to_detections(
    scores: &[f32],
    boxes: &[f32],
    anchors: &[argus_geometry::Rect],
    params: &DecodeParams,
) -> Vec<RawDetection> {
    assert_eq!(scores.len(), anchors.len(), "one score per anchor");
    assert_eq!(boxes.len() % anchors.len(), 0, "boxes must be a whole number of rows");
    let num_coords = boxes.len() / anchors.len();
    let min_required = 4 + params.num_keypoints * params.num_values_per_keypoint;
    assert!(num_coords >= min_required, "box row too short for configured keypoints");

    let mut detections = Vec::new();
    for (i, anchor) in anchors.iter().enumerate() {
        let raw_score = scores[i];
        let score = if params.apply_sigmoid_to_score { sigmoid(raw_score) } else { raw_score };
        if score < params.min_score_thresh {
            continue;
        }

        let row = &boxes[i * num_coords..(i + 1) * num_coords];
        let (raw_x, raw_y, raw_w, raw_h) =
            if params.reverse_output_order { (row[0], row[1], row[2], row[3]) } else { (row[1], row[0], row[3], row[2]) };

        let cx = raw_x / params.x_scale * anchor.width() + anchor.x_center();
        let mut cy = raw_y / params.y_scale * anchor.height() + anchor.y_center();
        let w = if params.apply_exponential_on_box_size {
            (raw_w / params.w_scale).exp() * anchor.width()
        } else {
            raw_w / params.w_scale * anchor.width()
        };
        let h = if params.apply_exponential_on_box_size {
            (raw_h / params.h_scale).exp() * anchor.height()
        } else {
            raw_h / params.h_scale * anchor.height()
        };
        if params.flip_vertically {
            cy = 1.0 - cy;
        }

        let mut keypoints = Vec::with_capacity(params.num_keypoints);
        let kp_values = &row[4..4 + params.num_keypoints * params.num_values_per_keypoint];
        for chunk in kp_values.chunks_exact(params.num_values_per_keypoint) {
            let x = chunk[0] / params.x_scale + anchor.x_center();
            let mut y = chunk[1] / params.y_scale + anchor.y_center();
            if params.flip_vertically {
                y = 1.0 - y;
            }
            keypoints.push(Keypoint::new(x, y));
        }

        detections.push(RawDetection::with_keypoints(score, BoundingBox::from_center(cx, cy, w, h), keypoints));
    }
    detections
}

#[cfg(test)]
mod tests {
    use argus_geometry::Rect;

    use super::*;

    #[test]
    fn decodes_identity_box_at_anchor_center() {
        let anchors = vec![Rect::new(0.5, 0.5, 0.2, 0.2, 0.0).unwrap()];
        let params = DecodeParams { apply_sigmoid_to_score: false, min_score_thresh: 0.0, ..Default::default() };
        // raw row in [y, x, h, w] order, all zero => decoded box sits exactly at the anchor.
        let detections = tensors_to_detections(&[1.0], &[0.0, 0.0, 0.0, 0.0], &anchors, &params);
        assert_eq!(detections.len(), 1);
        let bb = detections[0].bounding_box();
        assert!((bb.x_center() - 0.5).abs() < 1e-6);
        assert!((bb.y_center() - 0.5).abs() < 1e-6);
        assert!((bb.width() - 0.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_boxes_below_score_threshold() {
        let anchors = vec![Rect::new(0.5, 0.5, 0.2, 0.2, 0.0).unwrap()];
        let params = DecodeParams { apply_sigmoid_to_score: false, min_score_thresh: 0.5, ..Default::default() };
        let detections = tensors_to_detections(&[0.1], &[0.0, 0.0, 0.0, 0.0], &anchors, &params);
        assert!(detections.is_empty());
    }

    #[test]
    fn decodes_alignment_keypoints_relative_to_anchor() {
        let anchors = vec![Rect::new(0.5, 0.5, 1.0, 1.0, 0.0).unwrap()];
        let params = DecodeParams {
            apply_sigmoid_to_score: false,
            min_score_thresh: 0.0,
            num_keypoints: 1,
            num_values_per_keypoint: 2,
            ..Default::default()
        };
        let row = [0.0, 0.0, 0.0, 0.0, 0.1, -0.1];
        let detections = tensors_to_detections(&[1.0], &row, &anchors, &params);
        let kp = &detections[0].keypoints()[0];
        assert!((kp.x - 0.6).abs() < 1e-6);
        assert!((kp.y - 0.4).abs() < 1e-6);
    }
}
