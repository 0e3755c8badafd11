//! Probe-tile preparation and cached template descriptors.
//!
//! The tile is denoised, rescaled so one tile pixel covers the same physical
//! extent as one reference pixel, and reduced to the descriptors the scoring
//! function consumes.

use crate::config::LocateConfig;
use crate::context::ReferenceContext;
use crate::feature;
use crate::raster::Raster;
use crate::util::{LocateError, LocateResult};

/// Minimum usable template side after rescale, in pixels.
pub const MIN_TEMPLATE_SIDE: usize = 8;

/// Rescale factors closer to identity than this skip resampling.
const RESCALE_IDENTITY_TOL: f64 = 1e-6;

/// Prepared tile with cached feature descriptors.
///
/// Constructed per request and discarded with it.
pub struct Template {
    raster: Raster,
    hp_norm: Raster,
    hist: Vec<f32>,
    mag_norm: Option<Raster>,
}

impl Template {
    /// Prepares a raw tile against a reference context.
    ///
    /// Applies row-noise correction when enabled, rescales the tile so its
    /// calibrated physical height spans `calib_height_units * px_per_unit`
    /// reference pixels, and fails with [`LocateError::TemplateTooSmall`] if
    /// either resulting dimension drops below [`MIN_TEMPLATE_SIDE`].
    pub fn prepare(
        raw: &Raster,
        ctx: &ReferenceContext,
        cfg: &LocateConfig,
    ) -> LocateResult<Self> {
        let small = if cfg.apply_row_noise {
            feature::row_noise_correct(raw, cfg.row_detrend, cfg.row_window)
        } else {
            raw.clone()
        };

        // The raw tile spans calib_height_units physical units vertically, so
        // its native scale is raw_height / calib_height_units px per unit.
        let native_px_per_unit = raw.height() as f64 / f64::from(cfg.calib_height_units);
        let scale = ctx.px_per_unit() / native_px_per_unit;
        let tile = if (scale - 1.0).abs() < RESCALE_IDENTITY_TOL {
            small
        } else {
            resize_bilinear(&small, scale)?
        };

        Self::from_matched(tile, cfg)
    }

    /// Builds descriptors for a tile whose pixel scale already matches the
    /// reference calibration.
    ///
    /// Fails with [`LocateError::TemplateTooSmall`] below the minimum usable
    /// size; no particle computation happens for such tiles.
    pub fn from_matched(tile: Raster, cfg: &LocateConfig) -> LocateResult<Self> {
        if tile.width() < MIN_TEMPLATE_SIDE || tile.height() < MIN_TEMPLATE_SIDE {
            return Err(LocateError::TemplateTooSmall {
                width: tile.width(),
                height: tile.height(),
                min: MIN_TEMPLATE_SIDE,
            });
        }
        let hp = feature::highpass(&tile, cfg.hp_sigma_template);
        let hp_norm = feature::zscore(&hp);
        let (ori, mag) = feature::grad_ori_unsigned(&tile);
        let hist = feature::orientation_hist(&ori, &mag, cfg.hist_bins);
        let mag_norm = (cfg.weight_zncc_mag > 0.0).then(|| feature::zscore(&mag));
        Ok(Self {
            raster: tile,
            hp_norm,
            hist,
            mag_norm,
        })
    }

    /// Template width in reference pixels.
    pub fn width(&self) -> usize {
        self.raster.width()
    }

    /// Template height in reference pixels.
    pub fn height(&self) -> usize {
        self.raster.height()
    }

    /// The prepared tile raster.
    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    /// Z-scored high-pass patch.
    pub(crate) fn hp_norm(&self) -> &Raster {
        &self.hp_norm
    }

    /// L2-normalized unsigned orientation histogram.
    pub(crate) fn hist(&self) -> &[f32] {
        &self.hist
    }

    /// Z-scored gradient-magnitude patch, present when the magnitude term is
    /// enabled.
    pub(crate) fn mag_norm(&self) -> Option<&Raster> {
        self.mag_norm.as_ref()
    }
}

/// Bilinear resize by a uniform scale factor (center-aligned sampling).
fn resize_bilinear(img: &Raster, scale: f64) -> LocateResult<Raster> {
    let out_width = ((img.width() as f64 * scale).round() as usize).max(1);
    let out_height = ((img.height() as f64 * scale).round() as usize).max(1);
    let mut out = Raster::zeros(out_width, out_height)?;

    let max_x = img.width() - 1;
    let max_y = img.height() - 1;
    for y in 0..out_height {
        let sy = ((y as f64 + 0.5) / scale - 0.5).clamp(0.0, max_y as f64);
        let y0 = sy.floor() as usize;
        let y1 = (y0 + 1).min(max_y);
        let fy = (sy - y0 as f64) as f32;
        let row0 = img.row(y0);
        let row1 = img.row(y1);
        let dst = out.row_mut(y);
        for (x, d) in dst.iter_mut().enumerate() {
            let sx = ((x as f64 + 0.5) / scale - 0.5).clamp(0.0, max_x as f64);
            let x0 = sx.floor() as usize;
            let x1 = (x0 + 1).min(max_x);
            let fx = (sx - x0 as f64) as f32;
            let top = row0[x0] * (1.0 - fx) + row0[x1] * fx;
            let bottom = row1[x0] * (1.0 - fx) + row1[x1] * fx;
            *d = top * (1.0 - fy) + bottom * fy;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ReferenceContext;

    fn test_config() -> LocateConfig {
        LocateConfig {
            apply_row_noise: false,
            ..LocateConfig::default()
        }
    }

    fn reference(width: usize, height: usize, cfg: &LocateConfig) -> ReferenceContext {
        let data = (0..width * height)
            .map(|i| ((i * 31) % 97) as f32 / 97.0)
            .collect();
        ReferenceContext::from_raster(Raster::new(data, width, height).unwrap(), cfg).unwrap()
    }

    #[test]
    fn identity_scale_skips_resampling() {
        let cfg = test_config();
        // Reference: 100 px over 50 units = 2 px/unit; tile of 100 px over
        // the same 50 units is already matched.
        let ctx = reference(120, 100, &cfg);
        let raw = Raster::new(vec![0.3; 100 * 100], 100, 100).unwrap();
        let tpl = Template::prepare(&raw, &ctx, &cfg).unwrap();
        assert_eq!(tpl.width(), 100);
        assert_eq!(tpl.height(), 100);
    }

    #[test]
    fn tile_is_rescaled_to_reference_calibration() {
        let cfg = test_config();
        let ctx = reference(120, 100, &cfg); // 2 px/unit
        // The raw tile oversamples the calibrated height 4x; after rescale it
        // must span calib_height_units * px_per_unit = 100 reference pixels.
        let raw = Raster::new(vec![0.3; 200 * 200], 200, 200).unwrap();
        let tpl = Template::prepare(&raw, &ctx, &cfg).unwrap();
        assert_eq!(tpl.height(), 100);
        assert_eq!(tpl.width(), 100);
    }

    #[test]
    fn too_small_template_is_rejected() {
        let cfg = test_config();
        let ctx = reference(120, 100, &cfg); // 2 px/unit
        // A narrow 30x500 raw tile shrinks 5x to 6x100, below the minimum.
        let raw = Raster::new(vec![0.3; 30 * 500], 30, 500).unwrap();
        let tpl = Template::prepare(&raw, &ctx, &cfg);
        assert!(matches!(tpl, Err(LocateError::TemplateTooSmall { .. })));
    }

    #[test]
    fn matched_tile_below_minimum_is_rejected() {
        let cfg = test_config();
        let tile = Raster::new(vec![0.3; 6 * 6], 6, 6).unwrap();
        assert!(matches!(
            Template::from_matched(tile, &cfg),
            Err(LocateError::TemplateTooSmall { .. })
        ));
    }

    #[test]
    fn resize_preserves_constant_images() {
        let img = Raster::new(vec![0.6; 40 * 30], 40, 30).unwrap();
        let out = resize_bilinear(&img, 0.5).unwrap();
        assert_eq!(out.width(), 20);
        assert_eq!(out.height(), 15);
        for &v in out.as_slice() {
            assert!((v - 0.6).abs() < 1e-6);
        }
    }
}
