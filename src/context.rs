//! Reference-image context: feature maps, structure mask, calibration.

use crate::config::LocateConfig;
use crate::feature;
use crate::io;
use crate::raster::Raster;
use crate::trace::trace_span;
use crate::util::LocateResult;
use std::path::Path;

/// Derived state of one reference image.
///
/// Built once, immutable afterwards; one context may serve any number of
/// tile requests against the same reference.
pub struct ReferenceContext {
    gray: Raster,
    highpass: Raster,
    grad_mag: Raster,
    /// Summed-area table of the structure mask, `(height + 1) * (width + 1)`,
    /// so window fractions cost O(1) per particle.
    struct_integral: Vec<u64>,
    px_per_unit: f64,
}

impl ReferenceContext {
    /// Loads the reference image from disk and derives its feature maps.
    pub fn from_path<P: AsRef<Path>>(path: P, cfg: &LocateConfig) -> LocateResult<Self> {
        let gray = io::load_gray(path)?;
        Self::from_raster(gray, cfg)
    }

    /// Builds a context from an in-memory grayscale raster.
    pub fn from_raster(gray: Raster, cfg: &LocateConfig) -> LocateResult<Self> {
        cfg.validate()?;
        let _span = trace_span!(
            "build_reference_context",
            width = gray.width(),
            height = gray.height()
        )
        .entered();

        let highpass = feature::highpass(&gray, cfg.hp_sigma_reference);
        let grad_mag = feature::grad_mag(&gray);

        let tau = quantile(grad_mag.as_slice(), cfg.structure_quantile);
        let struct_integral = integral_of_mask(&grad_mag, tau);

        let px_per_unit = gray.height() as f64 / f64::from(cfg.calib_height_units);

        Ok(Self {
            gray,
            highpass,
            grad_mag,
            struct_integral,
            px_per_unit,
        })
    }

    /// Reference width in pixels.
    pub fn width(&self) -> usize {
        self.gray.width()
    }

    /// Reference height in pixels.
    pub fn height(&self) -> usize {
        self.gray.height()
    }

    /// Pixels per physical calibration unit.
    pub fn px_per_unit(&self) -> f64 {
        self.px_per_unit
    }

    /// Raw grayscale reference.
    pub fn gray(&self) -> &Raster {
        &self.gray
    }

    /// High-pass-filtered reference.
    pub fn highpass(&self) -> &Raster {
        &self.highpass
    }

    /// Gradient-magnitude map of the reference.
    pub fn grad_mag(&self) -> &Raster {
        &self.grad_mag
    }

    /// Fraction of structured pixels inside the window with top-left
    /// `(x, y)`. The caller guarantees the window fits.
    pub(crate) fn structured_fraction(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> f64 {
        let cols = self.gray.width() + 1;
        let at = |xx: usize, yy: usize| self.struct_integral[yy * cols + xx];
        let sum = at(x + width, y + height) + at(x, y) - at(x + width, y) - at(x, y + height);
        sum as f64 / (width * height) as f64
    }
}

/// Linearly interpolated quantile, matching the common `numpy` convention.
fn quantile(values: &[f32], q: f32) -> f32 {
    let mut sorted: Vec<f32> = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = f64::from(q.clamp(0.0, 1.0)) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = (pos - lo as f64) as f32;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Summed-area table of `mag >= tau`.
fn integral_of_mask(mag: &Raster, tau: f32) -> Vec<u64> {
    let width = mag.width();
    let height = mag.height();
    let cols = width + 1;
    let mut integral = vec![0u64; (height + 1) * cols];
    for y in 0..height {
        let row = mag.row(y);
        let mut run = 0u64;
        for x in 0..width {
            if row[x] >= tau {
                run += 1;
            }
            integral[(y + 1) * cols + (x + 1)] = integral[y * cols + (x + 1)] + run;
        }
    }
    integral
}
