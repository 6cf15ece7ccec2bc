//! Dynamic-shape tensors and the [`InferenceBackend`] abstraction used to run the pose-estimation
//! models underneath `argus`.
//!
//! This crate intentionally knows nothing about poses, detections, or landmarks — it only knows
//! how to describe and move tensors around. The actual model semantics live in the `argus` crate.

pub mod backend;
mod error;
pub mod tensor;

pub use backend::InferenceBackend;
pub use error::Error;
pub use tensor::{Tensor, TensorView};
