//! Score-to-weight conversion, multinomial resampling, and the confidence
//! statistic derived from the terminal weight vector.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

/// Exponent clamp keeping `exp` finite in f64.
const EXP_CLAMP: f64 = 700.0;

/// Margin-to-confidence scale before clamping to `[0, 1]`.
const MARGIN_SCALE: f64 = 5.0;

/// Converts raw scores to a normalized weight vector via a temperature
/// softmax.
///
/// Subtracts the maximum finite score, scales by `gain`, exponentiates with
/// a clamped exponent, and treats non-finite terms as zero probability. A
/// fully collapsed vector falls back to the uniform distribution; the second
/// return value reports that degeneracy so callers can surface it.
pub(crate) fn softmax_weights(scores: &[f64], gain: f64) -> (Vec<f64>, bool) {
    let n = scores.len();
    let max = scores
        .iter()
        .copied()
        .filter(|s| s.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return (vec![1.0 / n as f64; n], true);
    }

    let mut weights: Vec<f64> = scores
        .iter()
        .map(|&s| {
            let z = (gain * (s - max)).clamp(-EXP_CLAMP, EXP_CLAMP).exp();
            if z.is_finite() {
                z
            } else {
                0.0
            }
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return (vec![1.0 / n as f64; n], true);
    }
    for w in &mut weights {
        *w /= sum;
    }
    (weights, false)
}

/// Draws `weights.len()` indices with replacement from the categorical
/// distribution the weights define (multinomial resampling).
///
/// Non-finite or negative entries count as zero; an all-zero vector samples
/// uniformly.
pub(crate) fn resample_indices<R: Rng>(weights: &[f64], rng: &mut R) -> Vec<usize> {
    let n = weights.len();
    let sanitized: Vec<f64> = weights
        .iter()
        .map(|&w| if w.is_finite() && w > 0.0 { w } else { 0.0 })
        .collect();
    match WeightedIndex::new(&sanitized) {
        Ok(dist) => (0..n).map(|_| dist.sample(rng)).collect(),
        // All-zero or otherwise degenerate weights: uniform fallback.
        Err(_) => (0..n).map(|_| rng.random_range(0..n)).collect(),
    }
}

/// Confidence in `[0, 1]` from the terminal normalized weight vector.
///
/// Averages a normalized-entropy term (1 when all mass sits on a single
/// particle, 0 when uniform) with a clamped top-two weight margin.
pub(crate) fn confidence(weights: &[f64]) -> f64 {
    let n = weights.len();
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = weights.iter().sum();
    let norm: Vec<f64> = weights.iter().map(|&w| w / (sum + 1e-12)).collect();

    let mut top = [0.0f64; 2];
    for &w in &norm {
        if w > top[0] {
            top[1] = top[0];
            top[0] = w;
        } else if w > top[1] {
            top[1] = w;
        }
    }
    let margin = if n > 1 { top[0] - top[1] } else { 0.0 };

    let entropy: f64 = norm
        .iter()
        .filter(|&&w| w > 0.0)
        .map(|&w| -w * (w + 1e-12).ln())
        .sum();
    let entropy_term = 1.0 - entropy / (n as f64 + 1e-12).ln();

    (0.5 * entropy_term + 0.5 * (margin * MARGIN_SCALE).clamp(0.0, 1.0)).clamp(0.0, 1.0)
}
