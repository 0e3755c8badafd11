//! Sub-particle refinement and mirror-symmetry disambiguation.

use crate::config::LocateConfig;
use crate::context::ReferenceContext;
use crate::feature;
use crate::pf::score::composite_score;
use crate::pf::window_origin;
use crate::template::Template;
use crate::trace::trace_event;

/// Dense local search around the particle-cloud mean.
///
/// Evaluates the high-pass ZNCC term on a grid of offsets within
/// `refine_radius` at `refine_step`, candidate centers clipped into the
/// valid region, and returns the best-scoring center. Corrects the cloud's
/// bias toward the single best-matching location.
pub(crate) fn refine_dense(
    ctx: &ReferenceContext,
    tpl: &Template,
    cfg: &LocateConfig,
    x: f64,
    y: f64,
) -> (f64, f64) {
    let half_w = tpl.width() as f64 / 2.0;
    let half_h = tpl.height() as f64 / 2.0;
    let x_max = ctx.width() as f64 - half_w;
    let y_max = ctx.height() as f64 - half_h;

    let mut best = (f64::NEG_INFINITY, x, y);
    let mut dy = -cfg.refine_radius;
    while dy <= cfg.refine_radius {
        let mut dx = -cfg.refine_radius;
        while dx <= cfg.refine_radius {
            let xc = (x + dx as f64).clamp(half_w, x_max);
            let yc = (y + dy as f64).clamp(half_h, y_max);
            let (x0, y0) = window_origin(xc, yc, tpl);
            if x0 >= 0 && y0 >= 0 {
                if let Ok(win) =
                    ctx.highpass()
                        .window(x0 as usize, y0 as usize, tpl.width(), tpl.height())
                {
                    let score = feature::zncc_normed(win, tpl.hp_norm());
                    if score > best.0 {
                        best = (score, xc, yc);
                    }
                }
            }
            dx += cfg.refine_step;
        }
        dy += cfg.refine_step;
    }
    (best.1, best.2)
}

/// Compares the refined position against its point reflection through the
/// image center using the full composite score, and keeps the better one.
///
/// Assumes the reference's symmetry axis coincides with the geometric image
/// center; an offset symmetry axis is a calibration property this check does
/// not model. Out-of-bounds or low-structure mirror candidates score at the
/// gate sentinel and are never selected.
pub(crate) fn mirror_disambiguate(
    ctx: &ReferenceContext,
    tpl: &Template,
    cfg: &LocateConfig,
    x: f64,
    y: f64,
) -> (f64, f64, bool) {
    let (x0, y0) = window_origin(x, y, tpl);
    let s_here = composite_score(ctx, tpl, cfg, x0, y0);

    let mx = ctx.width() as f64 - x;
    let my = ctx.height() as f64 - y;
    let (mx0, my0) = window_origin(mx, my, tpl);
    let s_mirror = composite_score(ctx, tpl, cfg, mx0, my0);

    trace_event!("mirror_check", here = s_here, mirror = s_mirror);
    if s_mirror > s_here {
        (mx, my, true)
    } else {
        (x, y, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Raster;

    fn textured(width: usize, height: usize) -> Raster {
        let data = (0..width * height)
            .map(|i| {
                let (x, y) = (i % width, i / width);
                (((x * 13) ^ (y * 7) ^ (x * y)) % 251) as f32 / 251.0
            })
            .collect();
        Raster::new(data, width, height).unwrap()
    }

    fn test_config() -> LocateConfig {
        LocateConfig {
            apply_row_noise: false,
            min_structure_fraction: 0.0,
            ..LocateConfig::default()
        }
    }

    #[test]
    fn dense_refinement_recovers_exact_position() {
        let cfg = test_config();
        let img = textured(90, 70);
        let tpl =
            Template::from_matched(img.window(40, 25, 16, 16).unwrap().to_raster(), &cfg)
                .unwrap();
        let ctx = ReferenceContext::from_raster(img, &cfg).unwrap();

        // True center is (48, 33); start the search a few pixels off.
        let (x, y) = refine_dense(&ctx, &tpl, &cfg, 45.0, 36.0);
        assert!((x - 48.0).abs() <= 1.0, "refined x = {x}");
        assert!((y - 33.0).abs() <= 1.0, "refined y = {y}");
    }

    #[test]
    fn mirror_is_kept_when_it_scores_higher() {
        let cfg = test_config();
        // Patch pasted at the mirror position only; starting from the
        // non-matching side must jump to the mirror.
        let width = 90;
        let height = 70;
        let mut base = textured(width, height);
        let patch = textured(16, 16);
        for y in 0..16 {
            let dst = &mut base.row_mut(50 + y)[60..76];
            dst.copy_from_slice(patch.row(y));
        }
        let tpl = Template::from_matched(patch, &cfg).unwrap();
        let ctx = ReferenceContext::from_raster(base, &cfg).unwrap();

        // Mirror of (22, 12) through the center is (68, 58) = patch center.
        let (x, y, flipped) = mirror_disambiguate(&ctx, &tpl, &cfg, 22.0, 12.0);
        assert!(flipped);
        assert!((x - 68.0).abs() < 1e-9);
        assert!((y - 58.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_bounds_mirror_is_never_selected() {
        let cfg = test_config();
        let img = textured(90, 70);
        let tpl =
            Template::from_matched(img.window(40, 25, 16, 16).unwrap().to_raster(), &cfg)
                .unwrap();
        let ctx = ReferenceContext::from_raster(img, &cfg).unwrap();

        // Both the candidate and its mirror leave the image: the gate scores
        // them equally and the original position is kept.
        let (x, y, flipped) = mirror_disambiguate(&ctx, &tpl, &cfg, 4.0, 35.0);
        assert!(!flipped);
        assert!((x - 4.0).abs() < 1e-9);
        assert!((y - 35.0).abs() < 1e-9);
    }
}
