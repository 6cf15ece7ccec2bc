use thiserror::Error;

/// Errors produced by the geometry primitives in this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("rectangle width and height must be positive, got {width}x{height}")]
    NonPositiveRect { width: f32, height: f32 },

    #[error("padding fractions must be non-negative and sum to less than 1 along each axis")]
    InvalidPadding,

    #[error("image and target dimensions must be non-zero")]
    ZeroDimension,

    #[error("cannot transform a degenerate value range [{from_min}, {from_max}]")]
    DegenerateRange { from_min: f32, from_max: f32 },

    #[error("affine matrix is not invertible")]
    SingularMatrix,
}
