//! Per-keypoint low-pass smoothing of the `score` (visibility) field only; coordinates are left
//! untouched.

use argus_geometry::Keypoint;

use super::lowpass::LowPassFilter;

#[derive(Debug, Clone)]
pub struct VisibilityFilter {
    alpha: f32,
    filters: Vec<LowPassFilter>,
}

impl VisibilityFilter {
    pub fn new(alpha: f32) -> Self {
        Self { alpha, filters: Vec::new() }
    }

    pub fn apply(&mut self, keypoints: &[Keypoint]) -> Vec<Keypoint> {
        if self.filters.len() != keypoints.len() {
            self.filters = (0..keypoints.len()).map(|_| LowPassFilter::new(self.alpha)).collect();
        }

        keypoints
            .iter()
            .zip(self.filters.iter_mut())
            .map(|(kp, filter)| {
                let mut out = *kp;
                if let Some(score) = kp.score {
                    out.score = Some(filter.apply(score));
                }
                out
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.filters.clear();
    }
}
