//! Real-time human-pose estimation core: SSD anchor generation and detector decode, landmark
//! tensor decode and heatmap refinement, ROI caching across frames, a family of temporal
//! smoothing filters, and a greedy multi-object tracker.
//!
//! This crate deliberately knows nothing about any particular neural-network runtime — it talks
//! to models only through [`argus_nn::InferenceBackend`] — and nothing about image decoding,
//! camera capture, or rendering, all of which are external concerns left to the caller.

pub mod anchors;
pub mod detection;
mod error;
pub mod filter;
pub mod landmark;
mod pipeline;
pub mod tracker;

pub use error::Error;
pub use pipeline::{
    DetectorIo, EstimationConfig, HeatmapConfig, LandmarkIo, ModelConfig, Pipeline, Pose, SmoothingConfig,
};

pub use argus_geometry::{image::Image, BoundingBox, ImageSize, Keypoint, Padding, Rect};
pub use argus_nn::{InferenceBackend, Tensor};
