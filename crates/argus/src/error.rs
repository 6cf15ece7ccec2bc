use thiserror::Error as ThisError;

/// Errors produced by the pose-estimation pipeline and its components.
///
/// Per spec.md §7: [`Error::Config`] is raised at construction time and is always fatal;
/// [`Error::ShapeMismatch`] and [`Error::Backend`] are raised per-frame and are fatal (the
/// caller must treat them as a hard failure, not an empty-result frame) — low-confidence and
/// empty-detection conditions are *not* represented here, since those are recovered locally by
/// resetting pipeline state and returning an empty pose list (see [`crate::Pipeline::estimate_poses`]).
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("inference backend returned an unexpected tensor shape: {0}")]
    ShapeMismatch(String),

    #[error(transparent)]
    Geometry(#[from] argus_geometry::Error),

    #[error(transparent)]
    Backend(#[from] argus_nn::Error),
}
