//! End-to-end localization scenarios on synthetic references.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tileloc::{
    localize_raster, localize_template, LocateConfig, LocateError, Raster, ReferenceContext,
    Template,
};

/// Uniform noise raster; every window is unique and well structured.
fn noise_raster(rng: &mut StdRng, width: usize, height: usize) -> Raster {
    let data = (0..width * height).map(|_| rng.random_range(0.0..1.0)).collect();
    Raster::new(data, width, height).unwrap()
}

fn crop(img: &Raster, x0: usize, y0: usize, width: usize, height: usize) -> Raster {
    img.window(x0, y0, width, height).unwrap().to_raster()
}

fn paste(img: &mut Raster, patch: &Raster, x0: usize, y0: usize) {
    for y in 0..patch.height() {
        let src = patch.row(y);
        let width = img.width();
        let dst = &mut img.as_mut_slice()[(y0 + y) * width + x0..];
        dst[..patch.width()].copy_from_slice(src);
    }
}

#[test]
fn unique_patch_localizes_with_high_confidence() {
    let mut rng = StdRng::seed_from_u64(20240915);
    let reference = noise_raster(&mut rng, 320, 240);
    // Patch centered at pixel (200, 150): a 32x32 window with top-left
    // (184, 134), cropped exactly (no noise, no rescale).
    let tile = crop(&reference, 184, 134, 32, 32);

    let cfg = LocateConfig {
        apply_row_noise: false,
        num_particles: 12,
        num_iters: 1,
        step_px: 0.0,
        seed_std_px: 0.0,
        seed_topk: 10,
        ..LocateConfig::default()
    };
    let ctx = ReferenceContext::from_raster(reference, &cfg).unwrap();
    let template = Template::from_matched(tile, &cfg).unwrap();

    let mut pf_rng = StdRng::seed_from_u64(7);
    let pose = localize_template(&ctx, &template, &cfg, &mut pf_rng).unwrap();

    assert!(
        (pose.pixel_xy[0] - 200.0).abs() <= 2.0,
        "x = {}, expected near 200",
        pose.pixel_xy[0]
    );
    assert!(
        (pose.pixel_xy[1] - 150.0).abs() <= 2.0,
        "y = {}, expected near 150",
        pose.pixel_xy[1]
    );
    assert!(
        pose.confidence > 0.8,
        "confidence = {}, expected > 0.8",
        pose.confidence
    );
    assert!(!pose.mirror_chosen);
    assert_eq!(pose.window.width, 32);
    assert_eq!(pose.window.height, 32);
    // The matched window box encloses the refined center.
    assert!((pose.window.x0 - 184).abs() <= 2);
    assert!((pose.window.y0 - 134).abs() <= 2);
}

#[test]
fn symmetric_reference_selects_higher_scoring_mirror_candidate() {
    let mut rng = StdRng::seed_from_u64(42);
    let width = 240;
    let height = 180;

    // Exact 180-degree rotational symmetry: the second half of the buffer
    // mirrors the first (row-major point reflection is index reversal).
    let mut reference = noise_raster(&mut rng, width, height);
    let total = width * height;
    for i in 0..total / 2 {
        reference.as_mut_slice()[total - 1 - i] = reference.as_mut_slice()[i];
    }

    // A patch that equals its own 180-degree rotation, so both placements
    // are genuinely ambiguous.
    let mut patch = noise_raster(&mut rng, 24, 24);
    let n = 24 * 24;
    for i in 0..n / 2 {
        let mean = 0.5 * (patch.as_slice()[i] + patch.as_slice()[n - 1 - i]);
        patch.as_mut_slice()[i] = mean;
        patch.as_mut_slice()[n - 1 - i] = mean;
    }

    // Clean copy at the mirror position, corrupted copy at the original:
    // window centers (70, 60) and (170, 120) are point reflections through
    // the image center.
    let corrupt_noise = noise_raster(&mut rng, 24, 24);
    let mut corrupted = patch.clone();
    for (v, &noise) in corrupted
        .as_mut_slice()
        .iter_mut()
        .zip(corrupt_noise.as_slice())
    {
        *v = 0.7 * *v + 0.3 * noise;
    }
    paste(&mut reference, &corrupted, 58, 48);
    paste(&mut reference, &patch, 158, 108);

    let cfg = LocateConfig {
        apply_row_noise: false,
        num_particles: 3000,
        num_iters: 20,
        seed_topk: 6,
        seed_std_px: 6.0,
        ..LocateConfig::default()
    };
    let ctx = ReferenceContext::from_raster(reference, &cfg).unwrap();
    let template = Template::from_matched(patch, &cfg).unwrap();

    let mut rng_a = StdRng::seed_from_u64(123);
    let pose_a = localize_template(&ctx, &template, &cfg, &mut rng_a).unwrap();

    // The clean copy scores higher under the full composite score.
    assert!(
        (pose_a.pixel_xy[0] - 170.0).abs() <= 2.0,
        "x = {}, expected the clean copy near 170",
        pose_a.pixel_xy[0]
    );
    assert!(
        (pose_a.pixel_xy[1] - 120.0).abs() <= 2.0,
        "y = {}, expected the clean copy near 120",
        pose_a.pixel_xy[1]
    );

    // Deterministic for a fixed seed.
    let mut rng_b = StdRng::seed_from_u64(123);
    let pose_b = localize_template(&ctx, &template, &cfg, &mut rng_b).unwrap();
    assert_eq!(pose_a.pixel_xy, pose_b.pixel_xy);
    assert_eq!(pose_a.mean, pose_b.mean);
    assert_eq!(pose_a.confidence, pose_b.confidence);
    assert_eq!(pose_a.mirror_chosen, pose_b.mirror_chosen);
}

#[test]
fn too_small_tile_fails_before_any_particle_computation() {
    let mut rng = StdRng::seed_from_u64(5);
    let reference = noise_raster(&mut rng, 120, 100);
    let cfg = LocateConfig {
        apply_row_noise: false,
        ..LocateConfig::default()
    };
    let ctx = ReferenceContext::from_raster(reference, &cfg).unwrap();

    // A narrow 30x500 raw tile shrinks 5x to 6 px wide after the physical
    // rescale (reference: 2 px/unit, tile native: 10 px/unit).
    let raw = noise_raster(&mut rng, 30, 500);
    let mut pf_rng = StdRng::seed_from_u64(6);
    let err = localize_raster(&ctx, &raw, &cfg, &mut pf_rng).unwrap_err();
    assert!(matches!(err, LocateError::TemplateTooSmall { min: 8, .. }));

    // Same for an already pixel-matched tile below the minimum.
    let tiny = noise_raster(&mut rng, 6, 6);
    assert!(matches!(
        Template::from_matched(tiny, &cfg),
        Err(LocateError::TemplateTooSmall { .. })
    ));
}

#[test]
fn structure_gate_keeps_estimate_away_from_flat_regions() {
    // Textured upper two thirds, flat lower third: windows over the flat
    // band are gated, so the estimate must stay on the textured patch.
    let mut rng = StdRng::seed_from_u64(17);
    let width = 200;
    let height = 150;
    let mut reference = noise_raster(&mut rng, width, height);
    for v in &mut reference.as_mut_slice()[100 * width..] {
        *v = 0.5;
    }

    let tile = crop(&reference, 60, 40, 24, 24);
    let cfg = LocateConfig {
        apply_row_noise: false,
        num_particles: 3000,
        num_iters: 20,
        seed_topk: 5,
        seed_std_px: 5.0,
        ..LocateConfig::default()
    };
    let ctx = ReferenceContext::from_raster(reference, &cfg).unwrap();
    let template = Template::from_matched(tile, &cfg).unwrap();

    let mut pf_rng = StdRng::seed_from_u64(8);
    let pose = localize_template(&ctx, &template, &cfg, &mut pf_rng).unwrap();
    assert!((pose.pixel_xy[0] - 72.0).abs() <= 2.0, "x = {}", pose.pixel_xy[0]);
    assert!((pose.pixel_xy[1] - 52.0).abs() <= 2.0, "y = {}", pose.pixel_xy[1]);
}

#[test]
fn one_context_serves_multiple_tiles() {
    let mut rng = StdRng::seed_from_u64(31);
    let reference = noise_raster(&mut rng, 260, 200);
    let cfg = LocateConfig {
        apply_row_noise: false,
        num_particles: 3000,
        num_iters: 20,
        seed_topk: 5,
        seed_std_px: 5.0,
        ..LocateConfig::default()
    };
    let tile_a = crop(&reference, 30, 20, 28, 28);
    let tile_b = crop(&reference, 190, 140, 28, 28);
    let ctx = ReferenceContext::from_raster(reference, &cfg).unwrap();

    let mut pf_rng = StdRng::seed_from_u64(9);
    let pose_a = localize_template(
        &ctx,
        &Template::from_matched(tile_a, &cfg).unwrap(),
        &cfg,
        &mut pf_rng,
    )
    .unwrap();
    let pose_b = localize_template(
        &ctx,
        &Template::from_matched(tile_b, &cfg).unwrap(),
        &cfg,
        &mut pf_rng,
    )
    .unwrap();

    assert!((pose_a.pixel_xy[0] - 44.0).abs() <= 2.0);
    assert!((pose_a.pixel_xy[1] - 34.0).abs() <= 2.0);
    assert!((pose_b.pixel_xy[0] - 204.0).abs() <= 2.0);
    assert!((pose_b.pixel_xy[1] - 154.0).abs() <= 2.0);

    // Physical conversion round-trips through the configured calibration.
    let back = tileloc::units::to_pixel(pose_a.mean, cfg.origin_px, ctx.px_per_unit());
    assert!((back[0] - pose_a.pixel_xy[0]).abs() < 1e-9);
    assert!((back[1] - pose_a.pixel_xy[1]).abs() < 1e-9);
}
