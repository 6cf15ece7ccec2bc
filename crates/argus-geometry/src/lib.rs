//! Geometry primitives for region-of-interest tracking: oriented rectangles, axis-aligned
//! bounding boxes, keypoints, letterbox padding, and the affine-transform math that ties them
//! to a model's fixed-size input tensor.
//!
//! This crate deliberately does not decode or encode images (that's an external concern); it
//! only provides the pixel buffer shape needed to sample a source image into a model input
//! tensor ([`image::Image`]) plus the pure geometry used throughout the pose-estimation pipeline.

mod error;
pub mod image;
mod keypoint;
mod rect;
pub mod transform;

pub use error::Error;
pub use keypoint::Keypoint;
pub use rect::{BoundingBox, Padding, Rect};

/// The width and height of an image, in pixels. Both values must be strictly positive.
pub type ImageSize = (u32, u32);
