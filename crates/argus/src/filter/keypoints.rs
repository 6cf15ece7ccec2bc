//! Parallel-array keypoint smoothing: a scalar filter per (x, y, z) per keypoint, plus the
//! tagged-variant composite calculator that applies one of them to a whole keypoint set.

use argus_geometry::{ImageSize, Keypoint};

use super::{one_euro::OneEuroFilter, velocity::RelativeVelocityFilter};

/// Describes which scalar-filter kind a [`KeypointsFilter`] should build, without a trait object:
/// the hot path is one call per keypoint per axis per frame, so dispatch stays a `match` on a
/// small enum instead of a heap-allocated `dyn` filter.
#[derive(Debug, Clone)]
pub enum ScalarFilterKind {
    Velocity { window_size: usize, velocity_scale: f32, min_allowed_object_scale: f32 },
    OneEuro { frequency: f32, min_cutoff: f32, beta: f32, derivate_cutoff: f32 },
}

impl ScalarFilterKind {
    fn build(&self) -> ScalarFilter {
        match *self {
            ScalarFilterKind::Velocity { window_size, velocity_scale, min_allowed_object_scale } => {
                let mut f = RelativeVelocityFilter::new(window_size, velocity_scale);
                f.set_min_allowed_object_scale(min_allowed_object_scale);
                ScalarFilter::Velocity(f)
            }
            ScalarFilterKind::OneEuro { frequency, min_cutoff, beta, derivate_cutoff } => {
                ScalarFilter::OneEuro(OneEuroFilter::new(frequency, min_cutoff, beta, derivate_cutoff))
            }
        }
    }
}

#[derive(Debug, Clone)]
enum ScalarFilter {
    Velocity(RelativeVelocityFilter),
    OneEuro(OneEuroFilter),
}

impl ScalarFilter {
    fn apply(&mut self, timestamp_us: i64, value: f32, object_scale: f32) -> f32 {
        match self {
            ScalarFilter::Velocity(f) => f.apply(timestamp_us, value, object_scale),
            ScalarFilter::OneEuro(f) => f.apply(timestamp_us, value),
        }
    }

    fn reset(&mut self) {
        match self {
            ScalarFilter::Velocity(f) => f.reset(),
            ScalarFilter::OneEuro(f) => f.reset(),
        }
    }
}

/// Filters an entire keypoint set's x/y/z arrays in parallel. Re-initializes (a soft reset) if
/// the incoming keypoint count differs from the stored array length.
#[derive(Debug, Clone)]
pub struct KeypointsFilter {
    kind: ScalarFilterKind,
    x: Vec<ScalarFilter>,
    y: Vec<ScalarFilter>,
    z: Vec<ScalarFilter>,
}

impl KeypointsFilter {
    pub fn new(kind: ScalarFilterKind) -> Self {
        Self { kind, x: Vec::new(), y: Vec::new(), z: Vec::new() }
    }

    fn ensure_len(&mut self, n: usize) {
        if self.x.len() != n {
            self.x = (0..n).map(|_| self.kind.build()).collect();
            self.y = (0..n).map(|_| self.kind.build()).collect();
            self.z = (0..n).map(|_| self.kind.build()).collect();
        }
    }

    pub fn apply(&mut self, keypoints: &[Keypoint], timestamp_us: i64, object_scale: f32) -> Vec<Keypoint> {
        self.ensure_len(keypoints.len());
        assert_eq!(keypoints.len(), self.x.len(), "keypoint array length out of sync with filter state");

        let mut out = Vec::with_capacity(keypoints.len());
        for (i, kp) in keypoints.iter().enumerate() {
            let mut filtered = Keypoint::new(
                self.x[i].apply(timestamp_us, kp.x, object_scale),
                self.y[i].apply(timestamp_us, kp.y, object_scale),
            );
            if let Some(z) = kp.z {
                filtered = filtered.with_z(self.z[i].apply(timestamp_us, z, object_scale));
            }
            if let Some(score) = kp.score {
                filtered = filtered.with_score(score);
            }
            out.push(filtered);
        }
        out
    }

    pub fn reset(&mut self) {
        self.x.clear();
        self.y.clear();
        self.z.clear();
    }
}

/// Applies a [`KeypointsFilter`] to keypoints that may be normalized (`[0, 1]`) or absolute
/// pixels: if `image_size` is given, keypoints are denormalized before filtering and
/// re-normalized after, so the filter's internal state (and its velocity/cutoff parameters)
/// always operates in a consistent unit.
#[derive(Debug, Clone)]
pub struct KeypointSmoother {
    filter: KeypointsFilter,
}

impl KeypointSmoother {
    pub fn new(kind: ScalarFilterKind) -> Self {
        Self { filter: KeypointsFilter::new(kind) }
    }

    pub fn apply(
        &mut self,
        keypoints: &[Keypoint],
        timestamp_us: i64,
        object_scale: f32,
        image_size: Option<ImageSize>,
    ) -> Vec<Keypoint> {
        let denormalized: Vec<Keypoint> = match image_size {
            Some((w, h)) => keypoints
                .iter()
                .map(|kp| {
                    let mut out = Keypoint::new(kp.x * w as f32, kp.y * h as f32);
                    if let Some(z) = kp.z {
                        out = out.with_z(z);
                    }
                    if let Some(score) = kp.score {
                        out = out.with_score(score);
                    }
                    out
                })
                .collect(),
            None => keypoints.to_vec(),
        };

        let filtered = self.filter.apply(&denormalized, timestamp_us, object_scale);

        match image_size {
            Some((w, h)) => filtered
                .into_iter()
                .map(|kp| {
                    let mut out = Keypoint::new(kp.x / w as f32, kp.y / h as f32);
                    if let Some(z) = kp.z {
                        out = out.with_z(z);
                    }
                    if let Some(score) = kp.score {
                        out = out.with_score(score);
                    }
                    out
                })
                .collect(),
            None => filtered,
        }
    }

    pub fn reset(&mut self) {
        self.filter.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn velocity_kind() -> ScalarFilterKind {
        ScalarFilterKind::Velocity { window_size: 5, velocity_scale: 10.0, min_allowed_object_scale: 1e-6 }
    }

    #[test]
    fn output_length_matches_input_length() {
        let mut filter = KeypointsFilter::new(velocity_kind());
        let kps = vec![Keypoint::new(0.1, 0.2), Keypoint::new(0.3, 0.4), Keypoint::new(0.5, 0.6)];
        let out = filter.apply(&kps, 0, 1.0);
        assert_eq!(out.len(), kps.len());
    }

    #[test]
    fn resizing_input_reinitializes_filters() {
        let mut filter = KeypointsFilter::new(velocity_kind());
        filter.apply(&[Keypoint::new(0.0, 0.0)], 0, 1.0);
        let out = filter.apply(&[Keypoint::new(1.0, 1.0), Keypoint::new(2.0, 2.0)], 1000, 1.0);
        // First sample after a resize always passes through unchanged (treated as a soft reset).
        assert_eq!(out[0].x, 1.0);
        assert_eq!(out[1].x, 2.0);
    }

    #[test]
    fn smoother_round_trips_normalized_coordinates() {
        let mut smoother = KeypointSmoother::new(velocity_kind());
        let kps = vec![Keypoint::new(0.5, 0.5)];
        let out = smoother.apply(&kps, 0, 1.0, Some((640, 480)));
        assert!((out[0].x - 0.5).abs() < 1e-5);
        assert!((out[0].y - 0.5).abs() < 1e-5);
    }
}
