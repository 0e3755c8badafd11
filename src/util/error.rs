//! Error types for tileloc.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for tileloc operations.
pub type LocateResult<T> = std::result::Result<T, LocateError>;

/// Errors surfaced to callers of the localization core.
///
/// Numerical degeneracy (an all-zero or non-finite score vector) is never an
/// error: the filter recovers locally with a uniform weight distribution and
/// reports the fallback count in the returned estimate.
#[derive(Debug, Error, PartialEq)]
pub enum LocateError {
    /// The image at `path` could not be read or decoded.
    #[error("failed to load image {path:?}: {reason}")]
    ImageLoad { path: PathBuf, reason: String },
    /// Width or height is zero, or their product overflows.
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// The backing buffer is shorter than the declared dimensions require.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A requested window does not fit inside the image.
    #[error(
        "window ({x}, {y}) {width}x{height} out of bounds for {img_width}x{img_height} image"
    )]
    WindowOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        img_width: usize,
        img_height: usize,
    },
    /// The tile is below the minimum usable size after physical rescale.
    #[error("template too small after rescale: {width}x{height} (minimum {min}x{min})")]
    TemplateTooSmall {
        width: usize,
        height: usize,
        min: usize,
    },
    /// The template does not fit inside the reference image at all.
    #[error(
        "reference image {img_width}x{img_height} smaller than template {tpl_width}x{tpl_height}"
    )]
    ReferenceTooSmall {
        tpl_width: usize,
        tpl_height: usize,
        img_width: usize,
        img_height: usize,
    },
    /// A configuration invariant was violated.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}
