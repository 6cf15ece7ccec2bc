//! Temporal smoothing of landmark/keypoint streams: a low-pass primitive and two adaptive
//! filters built on it, plus the parallel-array wrappers the pipeline drives per keypoint.

mod keypoints;
mod lowpass;
mod one_euro;
mod velocity;
mod visibility;

pub use keypoints::{KeypointSmoother, KeypointsFilter, ScalarFilterKind};
pub use lowpass::LowPassFilter;
pub use one_euro::OneEuroFilter;
pub use velocity::RelativeVelocityFilter;
pub use visibility::VisibilityFilter;
