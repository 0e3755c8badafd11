//! Per-request localization pipeline.
//!
//! One call runs template preparation, particle filtering, dense refinement,
//! mirror disambiguation, and unit conversion, producing a [`PoseEstimate`].
//! The reference context is read-only and may be shared across requests.

use crate::config::LocateConfig;
use crate::context::ReferenceContext;
use crate::io;
use crate::pf;
use crate::pf::weights::confidence;
use crate::raster::Raster;
use crate::refine;
use crate::template::Template;
use crate::trace::trace_span;
use crate::units;
use crate::util::LocateResult;
use rand::Rng;
use std::path::Path;

/// Pixel-domain bounding box of the matched window, for renderers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowBox {
    /// Top-left column of the window.
    pub x0: i64,
    /// Top-left row of the window.
    pub y0: i64,
    /// Window width in pixels.
    pub width: usize,
    /// Window height in pixels.
    pub height: usize,
}

/// Localization result for one tile.
#[derive(Clone, Debug)]
pub struct PoseEstimate {
    /// Position in physical units, y-up Cartesian.
    pub mean: [f64; 2],
    /// Covariance in physical units squared.
    pub cov: [[f64; 2]; 2],
    /// Confidence in `[0, 1]` from the terminal weight distribution.
    pub confidence: f64,
    /// Refined, disambiguated window-center position in pixels.
    pub pixel_xy: [f64; 2],
    /// Matched window in pixel coordinates.
    pub window: WindowBox,
    /// Whether the mirror candidate replaced the refined position.
    pub mirror_chosen: bool,
    /// Iterations whose weights collapsed to the uniform fallback; nonzero
    /// values flag numerical degeneracy to diagnostics.
    pub uniform_fallbacks: usize,
}

impl PoseEstimate {
    /// Marginal standard deviations from the covariance diagonal.
    pub fn std_devs(&self) -> [f64; 2] {
        [self.cov[0][0].sqrt(), self.cov[1][1].sqrt()]
    }
}

/// Loads a tile from disk and localizes it against the reference context.
pub fn localize_tile<P: AsRef<Path>, R: Rng>(
    ctx: &ReferenceContext,
    tile_path: P,
    cfg: &LocateConfig,
    rng: &mut R,
) -> LocateResult<PoseEstimate> {
    let raw = io::load_gray(tile_path)?;
    localize_raster(ctx, &raw, cfg, rng)
}

/// Localizes a raw in-memory tile (row-noise correction and physical rescale
/// included).
pub fn localize_raster<R: Rng>(
    ctx: &ReferenceContext,
    raw: &Raster,
    cfg: &LocateConfig,
    rng: &mut R,
) -> LocateResult<PoseEstimate> {
    cfg.validate()?;
    let template = Template::prepare(raw, ctx, cfg)?;
    localize_template(ctx, &template, cfg, rng)
}

/// Localizes an already prepared template.
pub fn localize_template<R: Rng>(
    ctx: &ReferenceContext,
    template: &Template,
    cfg: &LocateConfig,
    rng: &mut R,
) -> LocateResult<PoseEstimate> {
    cfg.validate()?;
    let _span = trace_span!(
        "localize",
        tpl_width = template.width(),
        tpl_height = template.height()
    )
    .entered();

    let outcome = pf::run(ctx, template, cfg, rng)?;
    let (mean_px, cov_px) = outcome.estimate();

    let (x_refined, y_refined) =
        refine::refine_dense(ctx, template, cfg, mean_px[0], mean_px[1]);
    let (x_final, y_final, mirror_chosen) =
        refine::mirror_disambiguate(ctx, template, cfg, x_refined, y_refined);

    let conf = confidence(&outcome.weights);

    let (mean, cov) = units::to_physical(
        [x_final, y_final],
        cov_px,
        cfg.origin_px,
        ctx.px_per_unit(),
        cfg.measurement_noise,
    );

    let (x0, y0) = pf::window_origin(x_final, y_final, template);
    Ok(PoseEstimate {
        mean,
        cov,
        confidence: conf,
        pixel_xy: [x_final, y_final],
        window: WindowBox {
            x0,
            y0,
            width: template.width(),
            height: template.height(),
        },
        mirror_chosen,
        uniform_fallbacks: outcome.uniform_fallbacks,
    })
}
