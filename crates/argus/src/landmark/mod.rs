//! Landmark tensor decode, heatmap refinement, letterbox removal, and ROI projection.

mod decode;
mod heatmap;
mod project;
mod segmentation;

pub use decode::{decode_landmarks, Activation, LandmarkDecodeParams};
pub use heatmap::refine_with_heatmap;
pub use project::{copy_scores, project_landmark, project_world_landmark, remove_landmark_letterbox};
pub use segmentation::smooth_segmentation_mask;
