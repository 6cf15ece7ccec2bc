//! Tensor-to-landmarks decode: reshapes a flat `[N*5]` tensor into keypoints with normalized
//! position, depth, and a combined visibility/presence confidence.

use argus_geometry::Keypoint;
use argus_utils::num::sigmoid;

/// The activation applied to a landmark model's raw visibility/presence logits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Sigmoid,
    Identity,
}

impl Activation {
    fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Sigmoid => sigmoid(x),
            Activation::Identity => x,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LandmarkDecodeParams {
    pub visibility_activation: Activation,
    pub input_image_width: f32,
    pub input_image_height: f32,
    /// Divides the raw `z` value's normalization factor; `1.0` leaves it at
    /// `input_image_width`.
    pub normalize_z: f32,
    pub flip_horizontally: bool,
    pub flip_vertically: bool,
}

impl Default for LandmarkDecodeParams {
    fn default() -> Self {
        Self {
            visibility_activation: Activation::Sigmoid,
            input_image_width: 1.0,
            input_image_height: 1.0,
            normalize_z: 1.0,
            flip_horizontally: false,
            flip_vertically: false,
        }
    }
}

/// Decodes a flat `[N*5]` tensor (`x, y, z, visibility, presence` per landmark) into `N`
/// keypoints. The keypoint's `score` is the product of the activated visibility and presence
/// confidences — the two raw signals the model predicts separately, combined here into the
/// single confidence the rest of the pipeline (heatmap refinement, temporal filters, the OKS
/// tracker) consumes.
pub fn decode_landmarks(raw: &[f32], params: &LandmarkDecodeParams) -> Vec<Keypoint> {
    assert_eq!(raw.len() % 5, 0, "landmark tensor must be a whole number of [x,y,z,vis,pres] rows");

    raw.chunks_exact(5)
        .map(|c| {
            let mut x = c[0] / params.input_image_width;
            let mut y = c[1] / params.input_image_height;
            let z = c[2] / (params.input_image_width / params.normalize_z.max(f32::EPSILON));

            if params.flip_horizontally {
                x = 1.0 - x;
            }
            if params.flip_vertically {
                y = 1.0 - y;
            }

            let visibility = params.visibility_activation.apply(c[3]);
            let presence = params.visibility_activation.apply(c[4]);

            Keypoint::new(x, y).with_z(z).with_score(visibility * presence)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_and_normalizes_by_input_size() {
        let params = LandmarkDecodeParams {
            input_image_width: 100.0,
            input_image_height: 200.0,
            visibility_activation: Activation::Identity,
            ..Default::default()
        };
        let raw = [50.0, 100.0, 10.0, 1.0, 1.0];
        let kps = decode_landmarks(&raw, &params);
        assert_eq!(kps.len(), 1);
        assert!((kps[0].x - 0.5).abs() < 1e-6);
        assert!((kps[0].y - 0.5).abs() < 1e-6);
        assert!((kps[0].z.unwrap() - 0.1).abs() < 1e-6);
        assert!((kps[0].score.unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn flip_horizontally_mirrors_x() {
        let params = LandmarkDecodeParams { flip_horizontally: true, ..Default::default() };
        let raw = [0.2, 0.5, 0.0, 0.0, 0.0];
        let kps = decode_landmarks(&raw, &params);
        assert!((kps[0].x - 0.8).abs() < 1e-6);
    }

    #[test]
    fn sigmoid_activation_maps_zero_logit_to_half_confidence() {
        let params = LandmarkDecodeParams::default();
        let raw = [0.0, 0.0, 0.0, 0.0, 0.0];
        let kps = decode_landmarks(&raw, &params);
        assert!((kps[0].score.unwrap() - 0.25).abs() < 1e-6);
    }
}
