//! Particle-filter position estimator.
//!
//! A population of window-center hypotheses is seeded from correlation
//! peaks, diffused, scored through the structure gate, reweighted with a
//! temperature softmax, and multinomially resampled for a fixed number of
//! iterations. The terminal cloud yields a weighted mean and covariance in
//! pixel coordinates.

pub(crate) mod score;
pub(crate) mod seed;
pub(crate) mod weights;

use crate::config::LocateConfig;
use crate::context::ReferenceContext;
use crate::template::Template;
use crate::trace::{trace_event, trace_span};
use crate::util::{LocateError, LocateResult};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Fraction of the population drawn around correlation seeds.
const SEED_FRACTION: f64 = 0.8;

/// Result of one filter run, in pixel coordinates.
pub(crate) struct PfOutcome {
    /// Final (resampled) particle positions, window centers.
    pub(crate) particles: Vec<[f32; 2]>,
    /// Weights computed in the last scoring pass, normalized.
    pub(crate) weights: Vec<f64>,
    /// Number of iterations that hit the uniform-weight fallback.
    pub(crate) uniform_fallbacks: usize,
}

impl PfOutcome {
    /// Weighted mean and covariance of the terminal cloud under the last
    /// computed weights.
    pub(crate) fn estimate(&self) -> ([f64; 2], [[f64; 2]; 2]) {
        let (mean, cov) = weighted_moments(&self.particles, &self.weights);
        trace_event!(
            "pf_estimate",
            x = mean[0],
            y = mean[1],
            fallbacks = self.uniform_fallbacks
        );
        (mean, cov)
    }
}

/// Valid range for particle coordinates: window centers keeping the whole
/// template window inside the reference image.
#[derive(Clone, Copy)]
pub(crate) struct Bounds {
    pub(crate) x_min: f32,
    pub(crate) x_max: f32,
    pub(crate) y_min: f32,
    pub(crate) y_max: f32,
}

impl Bounds {
    pub(crate) fn for_template(
        ctx: &ReferenceContext,
        tpl: &Template,
    ) -> LocateResult<Self> {
        if tpl.width() > ctx.width() || tpl.height() > ctx.height() {
            return Err(LocateError::ReferenceTooSmall {
                tpl_width: tpl.width(),
                tpl_height: tpl.height(),
                img_width: ctx.width(),
                img_height: ctx.height(),
            });
        }
        let half_w = tpl.width() as f32 / 2.0;
        let half_h = tpl.height() as f32 / 2.0;
        Ok(Self {
            x_min: half_w,
            x_max: ctx.width() as f32 - half_w,
            y_min: half_h,
            y_max: ctx.height() as f32 - half_h,
        })
    }

    pub(crate) fn clip(&self, p: [f32; 2]) -> [f32; 2] {
        [
            p[0].clamp(self.x_min, self.x_max),
            p[1].clamp(self.y_min, self.y_max),
        ]
    }
}

/// Top-left corner of the window centered at `(xc, yc)`.
pub(crate) fn window_origin(xc: f64, yc: f64, tpl: &Template) -> (i64, i64) {
    let x0 = (xc - tpl.width() as f64 / 2.0).round() as i64;
    let y0 = (yc - tpl.height() as f64 / 2.0).round() as i64;
    (x0, y0)
}

fn gaussian(mean: f32, std: f32) -> LocateResult<Normal<f32>> {
    Normal::new(mean, std)
        .map_err(|_| LocateError::InvalidConfig("Gaussian std must be finite and non-negative"))
}

/// Draws the initial particle cloud: `SEED_FRACTION` of the population in
/// Gaussian clusters around the seeds (split evenly), the rest uniform over
/// the valid region. With no usable seeds the whole population is uniform.
fn init_particles<R: Rng>(
    seeds: &[[f32; 2]],
    bounds: Bounds,
    cfg: &LocateConfig,
    rng: &mut R,
) -> LocateResult<Vec<[f32; 2]>> {
    let n = cfg.num_particles;
    let mut particles = Vec::with_capacity(n);

    if !seeds.is_empty() {
        let per_seed = ((SEED_FRACTION * n as f64 / seeds.len() as f64) as usize).max(1);
        'seeding: for &[sx, sy] in seeds {
            let dist_x = gaussian(sx.clamp(bounds.x_min, bounds.x_max), cfg.seed_std_px)?;
            let dist_y = gaussian(sy.clamp(bounds.y_min, bounds.y_max), cfg.seed_std_px)?;
            for _ in 0..per_seed {
                if particles.len() == n {
                    break 'seeding;
                }
                particles.push(bounds.clip([dist_x.sample(rng), dist_y.sample(rng)]));
            }
        }
    }
    while particles.len() < n {
        particles.push([
            sample_range(rng, bounds.x_min, bounds.x_max),
            sample_range(rng, bounds.y_min, bounds.y_max),
        ]);
    }
    Ok(particles)
}

/// Uniform draw tolerating a collapsed range (template as wide as the
/// reference leaves a single valid coordinate).
fn sample_range<R: Rng>(rng: &mut R, lo: f32, hi: f32) -> f32 {
    if hi > lo {
        rng.random_range(lo..hi)
    } else {
        lo
    }
}

/// Runs the filter to completion and extracts the pixel-domain estimate.
pub(crate) fn run<R: Rng>(
    ctx: &ReferenceContext,
    tpl: &Template,
    cfg: &LocateConfig,
    rng: &mut R,
) -> LocateResult<PfOutcome> {
    let bounds = Bounds::for_template(ctx, tpl)?;
    let n = cfg.num_particles;

    let _span = trace_span!("particle_filter", particles = n, iters = cfg.num_iters).entered();

    let seeds = seed::seed_centers(ctx, tpl, cfg.seed_topk);
    let mut particles = init_particles(&seeds, bounds, cfg, rng)?;
    let mut weights = vec![1.0 / n as f64; n];
    let mut uniform_fallbacks = 0usize;

    let diffusion = gaussian(0.0, cfg.step_px)?;
    let mut scores = vec![0.0f64; n];

    for iter in 0..cfg.num_iters {
        for p in &mut particles {
            let moved = [p[0] + diffusion.sample(rng), p[1] + diffusion.sample(rng)];
            *p = bounds.clip(moved);
        }

        for (s, p) in scores.iter_mut().zip(&particles) {
            let (x0, y0) = window_origin(f64::from(p[0]), f64::from(p[1]), tpl);
            *s = score::composite_score(ctx, tpl, cfg, x0, y0);
        }

        let (new_weights, fallback) = weights::softmax_weights(&scores, cfg.softmax_gain);
        weights = new_weights;
        if fallback {
            uniform_fallbacks += 1;
            trace_event!("uniform_fallback", iter = iter);
        }

        let indices = weights::resample_indices(&weights, rng);
        particles = indices.iter().map(|&i| particles[i]).collect();
    }

    Ok(PfOutcome {
        particles,
        weights,
        uniform_fallbacks,
    })
}

/// Weighted mean and covariance of the cloud, with a small diagonal
/// regularizer keeping the covariance positive-definite.
fn weighted_moments(particles: &[[f32; 2]], weights: &[f64]) -> ([f64; 2], [[f64; 2]; 2]) {
    let sum: f64 = weights.iter().sum();
    let inv = 1.0 / (sum + 1e-12);

    let mut mean = [0.0f64; 2];
    for (p, &w) in particles.iter().zip(weights) {
        mean[0] += w * inv * f64::from(p[0]);
        mean[1] += w * inv * f64::from(p[1]);
    }

    let mut cov = [[0.0f64; 2]; 2];
    for (p, &w) in particles.iter().zip(weights) {
        let dx = f64::from(p[0]) - mean[0];
        let dy = f64::from(p[1]) - mean[1];
        let w = w * inv;
        cov[0][0] += w * dx * dx;
        cov[0][1] += w * dx * dy;
        cov[1][0] += w * dy * dx;
        cov[1][1] += w * dy * dy;
    }
    cov[0][0] += 1e-9;
    cov[1][1] += 1e-9;
    (mean, cov)
}
