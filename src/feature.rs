//! Feature extraction: row-noise correction, Gaussian high-pass, Sobel
//! gradients, unsigned orientation histograms, and ZNCC scoring.
//!
//! Filters use symmetric-reflect borders so results are stable near edges.
//! Orientations are unsigned (`atan2(|gy|, |gx|)` in `[0, PI)`): dark-on-light
//! and light-on-dark edges of the same direction land in the same bin.

use crate::raster::{Raster, RasterView};

/// Guard added to standard deviations before division.
pub(crate) const STD_EPS: f32 = 1e-6;

/// Guard added to norms and ranges before division.
const NORM_EPS: f32 = 1e-9;

const SOBEL_DERIV: [f32; 3] = [-1.0, 0.0, 1.0];
const SOBEL_SMOOTH: [f32; 3] = [1.0, 2.0, 1.0];

/// Reflects an index into `[0, n)` (symmetric boundary, `d c b a | a b c d`).
fn reflect(mut i: isize, n: usize) -> usize {
    let n = n as isize;
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= n {
            i = 2 * n - 1 - i;
        } else {
            return i as usize;
        }
    }
}

/// Removes per-row banding noise from a scanned tile.
///
/// Subtracts the per-row median, optionally detrends by subtracting a
/// centered moving average of width `win` along each row (edge-clamped),
/// then rescales the result to `[0, 1]`.
pub fn row_noise_correct(img: &Raster, detrend: bool, win: usize) -> Raster {
    let width = img.width();
    let height = img.height();
    let mut out = img.clone();

    let mut sorted = vec![0.0f32; width];
    for y in 0..height {
        sorted.copy_from_slice(img.row(y));
        sorted.sort_by(f32::total_cmp);
        let median = if width % 2 == 1 {
            sorted[width / 2]
        } else {
            0.5 * (sorted[width / 2 - 1] + sorted[width / 2])
        };
        for v in out.row_mut(y) {
            *v -= median;
        }
    }

    if detrend && win > 0 {
        let mut trend = vec![0.0f32; width];
        let lo = (win / 2) as isize;
        for y in 0..height {
            let row = out.row(y);
            for (i, t) in trend.iter_mut().enumerate() {
                let start = i as isize - lo;
                let mut sum = 0.0f64;
                for k in 0..win as isize {
                    let idx = (start + k).clamp(0, width as isize - 1) as usize;
                    sum += row[idx] as f64;
                }
                *t = (sum / win as f64) as f32;
            }
            let row = out.row_mut(y);
            for (v, t) in row.iter_mut().zip(&trend) {
                *v -= *t;
            }
        }
    }

    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in out.as_slice() {
        min = min.min(v);
        max = max.max(v);
    }
    let inv_range = 1.0 / (max - min + NORM_EPS);
    for v in out.as_mut_slice() {
        *v = (*v - min) * inv_range;
    }
    out
}

/// Separable Gaussian blur with symmetric-reflect borders.
///
/// The kernel radius follows `(4 * sigma + 0.5)` truncation.
pub fn gaussian_blur(img: &Raster, sigma: f32) -> Raster {
    if sigma <= 0.0 {
        return img.clone();
    }
    let radius = (4.0 * sigma + 0.5) as usize;
    let mut kernel = Vec::with_capacity(2 * radius + 1);
    let inv_two_sigma_sq = 1.0 / (2.0 * f64::from(sigma) * f64::from(sigma));
    let mut sum = 0.0f64;
    for k in -(radius as isize)..=(radius as isize) {
        let w = (-(k * k) as f64 * inv_two_sigma_sq).exp();
        kernel.push(w);
        sum += w;
    }
    for w in &mut kernel {
        *w /= sum;
    }

    let width = img.width();
    let height = img.height();
    let r = radius as isize;

    // Horizontal pass into a scratch raster, then vertical.
    let mut tmp = img.clone();
    for y in 0..height {
        let src = img.row(y);
        let dst = tmp.row_mut(y);
        for (x, d) in dst.iter_mut().enumerate() {
            let mut acc = 0.0f64;
            for (ki, &w) in kernel.iter().enumerate() {
                let sx = reflect(x as isize + ki as isize - r, width);
                acc += w * src[sx] as f64;
            }
            *d = acc as f32;
        }
    }

    let mut out = tmp.clone();
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0f64;
            for (ki, &w) in kernel.iter().enumerate() {
                let sy = reflect(y as isize + ki as isize - r, height);
                acc += w * tmp.row(sy)[x] as f64;
            }
            out.row_mut(y)[x] = acc as f32;
        }
    }
    out
}

/// High-pass filter: the image minus its Gaussian blur. Identity for
/// `sigma <= 0`.
pub fn highpass(img: &Raster, sigma: f32) -> Raster {
    if sigma <= 0.0 {
        return img.clone();
    }
    let mut out = gaussian_blur(img, sigma);
    for (v, &orig) in out.as_mut_slice().iter_mut().zip(img.as_slice()) {
        *v = orig - *v;
    }
    out
}

/// Horizontal and vertical Sobel derivatives with reflect borders.
fn sobel_pair(img: &Raster) -> (Raster, Raster) {
    let width = img.width();
    let height = img.height();
    let mut gx = img.clone();
    let mut gy = img.clone();

    for y in 0..height {
        let rows = [
            img.row(reflect(y as isize - 1, height)),
            img.row(y),
            img.row(reflect(y as isize + 1, height)),
        ];
        for x in 0..width {
            let xs = [
                reflect(x as isize - 1, width),
                x,
                reflect(x as isize + 1, width),
            ];
            let mut sum_x = 0.0f32;
            let mut sum_y = 0.0f32;
            for (ky, row) in rows.iter().enumerate() {
                for (kx, &xi) in xs.iter().enumerate() {
                    let v = row[xi];
                    sum_x += v * SOBEL_DERIV[kx] * SOBEL_SMOOTH[ky];
                    sum_y += v * SOBEL_SMOOTH[kx] * SOBEL_DERIV[ky];
                }
            }
            gx.row_mut(y)[x] = sum_x;
            gy.row_mut(y)[x] = sum_y;
        }
    }
    (gx, gy)
}

/// Gradient magnitude (Euclidean norm of the Sobel pair).
pub fn grad_mag(img: &Raster) -> Raster {
    let (gx, mut gy) = sobel_pair(img);
    for (m, &x) in gy.as_mut_slice().iter_mut().zip(gx.as_slice()) {
        *m = m.hypot(x);
    }
    gy
}

/// Unsigned gradient orientation in `[0, PI)` and magnitude per pixel.
pub fn grad_ori_unsigned(img: &Raster) -> (Raster, Raster) {
    let (gx, gy) = sobel_pair(img);
    let mut ori = gx.clone();
    let mut mag = gx.clone();
    for i in 0..ori.as_slice().len() {
        let x = gx.as_slice()[i];
        let y = gy.as_slice()[i];
        ori.as_mut_slice()[i] = y.abs().atan2(x.abs());
        mag.as_mut_slice()[i] = x.hypot(y);
    }
    (ori, mag)
}

/// Magnitude-weighted histogram of unsigned orientations, L2-normalized.
///
/// An all-zero magnitude map yields the all-zero vector (the norm guard
/// avoids dividing by zero).
pub fn orientation_hist(ori: &Raster, mag: &Raster, bins: usize) -> Vec<f32> {
    let mut hist = vec![0.0f32; bins];
    let scale = bins as f32 / std::f32::consts::PI;
    for (&o, &m) in ori.as_slice().iter().zip(mag.as_slice()) {
        let idx = ((o * scale) as usize).min(bins - 1);
        hist[idx] += m;
    }
    let norm = hist.iter().map(|&v| f64::from(v) * f64::from(v)).sum::<f64>();
    let inv = 1.0 / (norm.sqrt() as f32 + NORM_EPS);
    for v in &mut hist {
        *v *= inv;
    }
    hist
}

/// Cosine similarity between two L2-normalized histograms.
pub fn hist_cosine(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum()
}

/// Z-scores a raster: subtract the mean, divide by std + epsilon.
pub fn zscore(img: &Raster) -> Raster {
    let (mean, std) = img.view().mean_std();
    let inv = 1.0 / (std + STD_EPS);
    let mut out = img.clone();
    for v in out.as_mut_slice() {
        *v = (*v - mean) * inv;
    }
    out
}

/// ZNCC between a window and a pre-normalized (z-scored) template.
///
/// Z-scores the window on the fly and returns the mean elementwise product
/// with the template buffer. Both shapes must match; callers guarantee this
/// by construction.
pub fn zncc_normed(patch: RasterView<'_>, tpl_norm: &Raster) -> f64 {
    let (mean, std) = patch.mean_std();
    let inv = 1.0 / f64::from(std + STD_EPS);
    let mean = f64::from(mean);
    let mut acc = 0.0f64;
    for y in 0..patch.height() {
        let prow = patch.row(y);
        let trow = tpl_norm.row(y);
        for (&p, &t) in prow.iter().zip(trow) {
            acc += (f64::from(p) - mean) * inv * f64::from(t);
        }
    }
    acc / (patch.width() * patch.height()) as f64
}
