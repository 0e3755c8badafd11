//! Tileloc localizes a small probe image ("tile") with a known physical
//! footprint on a larger calibrated reference image.
//!
//! The estimator is a structure-gated particle filter: correlation peaks
//! seed a population of position hypotheses which are diffused, scored
//! against high-pass, orientation-histogram, and gradient-magnitude
//! features, softmax-reweighted, and resampled for a fixed number of
//! iterations. A dense local search refines the cloud mean, a mirror check
//! resolves two-fold reference symmetry, and the result is reported in
//! physical Cartesian units with a covariance and a confidence scalar.
//!
//! Each localization call is independent: a [`ReferenceContext`] is built
//! once per reference image and shared read-only across requests, and all
//! randomness comes from a caller-supplied seedable generator.

pub mod config;
pub mod context;
pub mod feature;
pub mod io;
mod locate;
mod pf;
pub mod raster;
mod refine;
pub mod template;
mod trace;
pub mod units;
pub mod util;

pub use config::LocateConfig;
pub use context::ReferenceContext;
pub use locate::{localize_raster, localize_template, localize_tile, PoseEstimate, WindowBox};
pub use raster::{Raster, RasterView};
pub use template::{Template, MIN_TEMPLATE_SIDE};
pub use util::{LocateError, LocateResult};
