//! Localization configuration.

use crate::util::{LocateError, LocateResult};

/// Immutable parameter set for reference preparation and localization.
///
/// One validated config may serve any number of requests; per-request
/// transient state (the RNG, output paths) stays with the caller.
#[derive(Clone, Debug)]
pub struct LocateConfig {
    /// Physical height represented by the tile, in calibration units.
    pub calib_height_units: f32,
    /// Number of position hypotheses.
    pub num_particles: usize,
    /// Number of diffuse/score/resample iterations. Zero estimates from the
    /// initial cloud.
    pub num_iters: usize,
    /// Apply row-noise correction to the raw tile.
    pub apply_row_noise: bool,
    /// Detrend rows with a moving average during row-noise correction.
    pub row_detrend: bool,
    /// Moving-average window width for detrending, in pixels.
    pub row_window: usize,
    /// Gaussian sigma of the tile high-pass filter.
    pub hp_sigma_template: f32,
    /// Gaussian sigma of the reference high-pass filter.
    pub hp_sigma_reference: f32,
    /// Per-iteration diffusion standard deviation, in pixels.
    pub step_px: f32,
    /// Softmax temperature gain converting scores to weights.
    pub softmax_gain: f64,
    /// Quantile of reference gradient magnitude defining the structure mask.
    pub structure_quantile: f32,
    /// Minimum structured fraction a window needs to be scored at all.
    pub min_structure_fraction: f32,
    /// Weight of the high-pass ZNCC term.
    pub weight_zncc_hp: f64,
    /// Weight of the orientation-histogram cosine term.
    pub weight_hist: f64,
    /// Weight of the gradient-magnitude ZNCC term; zero disables the term.
    pub weight_zncc_mag: f64,
    /// Number of orientation histogram bins over `[0, PI)`.
    pub hist_bins: usize,
    /// Number of correlation peaks used to seed the particle cloud.
    pub seed_topk: usize,
    /// Isotropic standard deviation of seed clusters, in pixels.
    pub seed_std_px: f32,
    /// Half-width of the dense refinement search, in pixels.
    pub refine_radius: i64,
    /// Grid step of the dense refinement search, in pixels.
    pub refine_step: i64,
    /// Calibrated physical origin in reference-image pixels.
    pub origin_px: [f64; 2],
    /// Diagonal measurement noise added to the physical covariance, in
    /// calibration units squared.
    pub measurement_noise: f64,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            calib_height_units: 50.0,
            num_particles: 7500,
            num_iters: 25,
            apply_row_noise: true,
            row_detrend: true,
            row_window: 51,
            hp_sigma_template: 2.0,
            hp_sigma_reference: 2.0,
            step_px: 1.0,
            softmax_gain: 20.0,
            structure_quantile: 0.55,
            min_structure_fraction: 0.25,
            weight_zncc_hp: 0.55,
            weight_hist: 0.35,
            weight_zncc_mag: 0.10,
            hist_bins: 16,
            seed_topk: 10,
            seed_std_px: 12.0,
            refine_radius: 8,
            refine_step: 1,
            origin_px: [887.1, 513.6],
            measurement_noise: 1.0,
        }
    }
}

impl LocateConfig {
    /// Checks the configuration invariants.
    pub fn validate(&self) -> LocateResult<()> {
        if !(self.calib_height_units.is_finite() && self.calib_height_units > 0.0) {
            return Err(LocateError::InvalidConfig(
                "calib_height_units must be positive and finite",
            ));
        }
        if self.num_particles == 0 {
            return Err(LocateError::InvalidConfig("num_particles must be positive"));
        }
        if !(self.step_px.is_finite() && self.step_px >= 0.0) {
            return Err(LocateError::InvalidConfig("step_px must be non-negative"));
        }
        if !self.softmax_gain.is_finite() {
            return Err(LocateError::InvalidConfig("softmax_gain must be finite"));
        }
        if !(0.0..=1.0).contains(&self.structure_quantile) {
            return Err(LocateError::InvalidConfig(
                "structure_quantile must lie in [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_structure_fraction) {
            return Err(LocateError::InvalidConfig(
                "min_structure_fraction must lie in [0, 1]",
            ));
        }
        for w in [self.weight_zncc_hp, self.weight_hist, self.weight_zncc_mag] {
            if !(w.is_finite() && w >= 0.0) {
                return Err(LocateError::InvalidConfig(
                    "score weights must be non-negative and finite",
                ));
            }
        }
        if self.hist_bins == 0 {
            return Err(LocateError::InvalidConfig("hist_bins must be positive"));
        }
        if !(self.seed_std_px.is_finite() && self.seed_std_px >= 0.0) {
            return Err(LocateError::InvalidConfig(
                "seed_std_px must be non-negative",
            ));
        }
        if self.refine_radius < 0 {
            return Err(LocateError::InvalidConfig(
                "refine_radius must be non-negative",
            ));
        }
        if self.refine_step < 1 {
            return Err(LocateError::InvalidConfig("refine_step must be positive"));
        }
        if !(self.origin_px[0].is_finite() && self.origin_px[1].is_finite()) {
            return Err(LocateError::InvalidConfig("origin_px must be finite"));
        }
        if !(self.measurement_noise.is_finite() && self.measurement_noise >= 0.0) {
            return Err(LocateError::InvalidConfig(
                "measurement_noise must be non-negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(LocateConfig::default().validate().is_ok());
    }

    #[test]
    fn negative_weight_is_rejected() {
        let cfg = LocateConfig {
            weight_hist: -0.1,
            ..LocateConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(LocateError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_particles_is_rejected() {
        let cfg = LocateConfig {
            num_particles: 0,
            ..LocateConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_refine_step_is_rejected() {
        let cfg = LocateConfig {
            refine_step: 0,
            ..LocateConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
