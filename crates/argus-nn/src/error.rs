use thiserror::Error;

/// Errors produced while loading or running a model through an [`crate::backend::InferenceBackend`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to load model: {0}")]
    Load(String),

    #[error("model has {actual} input(s), expected exactly {expected}")]
    InputCount { expected: usize, actual: usize },

    #[error("no input/output named {0:?}")]
    UnknownTensor(String),

    #[error("tensor shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },

    #[error("backend failed to run inference: {0}")]
    Inference(String),
}
