//! Structure-gated composite window scoring.
//!
//! A candidate window is scored as `w1 * zncc(highpass) + w2 *
//! cos(orientation histograms) + w3 * zncc(gradient magnitude)`. Windows that
//! leave the image or cover too little structured content receive the gate
//! sentinel instead; the function is total over all integer placements.

use crate::config::LocateConfig;
use crate::context::ReferenceContext;
use crate::feature;
use crate::template::Template;

/// Sentinel for gated windows; far below any reachable composite score.
pub(crate) const GATE_SCORE: f64 = -1.0e3;

/// Composite score of the window whose top-left pixel is `(x0, y0)`.
///
/// Out-of-bounds placements and windows whose structured fraction falls
/// below the configured minimum return [`GATE_SCORE`].
pub(crate) fn composite_score(
    ctx: &ReferenceContext,
    tpl: &Template,
    cfg: &LocateConfig,
    x0: i64,
    y0: i64,
) -> f64 {
    let tpl_width = tpl.width();
    let tpl_height = tpl.height();
    if x0 < 0 || y0 < 0 {
        return GATE_SCORE;
    }
    let (x0, y0) = (x0 as usize, y0 as usize);
    if x0 + tpl_width > ctx.width() || y0 + tpl_height > ctx.height() {
        return GATE_SCORE;
    }

    if ctx.structured_fraction(x0, y0, tpl_width, tpl_height)
        < f64::from(cfg.min_structure_fraction)
    {
        return GATE_SCORE;
    }

    let Ok(hp_win) = ctx.highpass().window(x0, y0, tpl_width, tpl_height) else {
        return GATE_SCORE;
    };
    let s_hp = feature::zncc_normed(hp_win, tpl.hp_norm());

    // Orientation histogram of the grayscale window, gradient recomputed on
    // the crop so borders match the template's own treatment.
    let Ok(gray_win) = ctx.gray().window(x0, y0, tpl_width, tpl_height) else {
        return GATE_SCORE;
    };
    let crop = gray_win.to_raster();
    let (ori, mag) = feature::grad_ori_unsigned(&crop);
    let hist = feature::orientation_hist(&ori, &mag, cfg.hist_bins);
    let s_hist = feature::hist_cosine(&hist, tpl.hist());

    let s_mag = match tpl.mag_norm() {
        Some(mag_norm) => match ctx.grad_mag().window(x0, y0, tpl_width, tpl_height) {
            Ok(mag_win) => feature::zncc_normed(mag_win, mag_norm),
            Err(_) => return GATE_SCORE,
        },
        None => 0.0,
    };

    cfg.weight_zncc_hp * s_hp + cfg.weight_hist * s_hist + cfg.weight_zncc_mag * s_mag
}
