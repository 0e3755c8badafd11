//! Correlation seeding: dense ZNCC scan of the reference high-pass image
//! against the template high-pass patch, keeping the top-K peaks.
//!
//! Peaks are taken as-is, without minimum-separation suppression; near-
//! duplicate peaks may concentrate several seed clusters in one area.

use crate::context::ReferenceContext;
use crate::template::Template;
use crate::trace::trace_event;
use std::cmp::Ordering;

/// Windows with ZNCC variance below this are skipped during seeding.
const MIN_WINDOW_VAR: f64 = 1e-8;

/// Correlation peak at a valid top-left placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Peak {
    pub(crate) x: usize,
    pub(crate) y: usize,
    pub(crate) score: f64,
}

fn peak_cmp_desc(a: &Peak, b: &Peak) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.y.cmp(&b.y))
        .then_with(|| a.x.cmp(&b.x))
}

/// Top-K peak collector with O(k) insertion cost.
struct TopK {
    k: usize,
    items: Vec<Peak>,
}

impl TopK {
    fn new(k: usize) -> Self {
        Self {
            k,
            items: Vec::with_capacity(k),
        }
    }

    fn push(&mut self, peak: Peak) {
        if self.k == 0 {
            return;
        }
        if self.items.len() < self.k {
            self.items.push(peak);
            return;
        }
        let mut worst_idx = 0usize;
        for (idx, item) in self.items.iter().enumerate().skip(1) {
            if peak_cmp_desc(item, &self.items[worst_idx]) == Ordering::Greater {
                worst_idx = idx;
            }
        }
        if peak_cmp_desc(&peak, &self.items[worst_idx]) == Ordering::Less {
            self.items[worst_idx] = peak;
        }
    }

    fn into_sorted_desc(mut self) -> Vec<Peak> {
        self.items.sort_by(peak_cmp_desc);
        self.items
    }
}

/// Scans all valid placements of the template high-pass patch over the
/// reference high-pass map and returns the top-K peak *centers* in pixels.
///
/// Returns an empty list when the template high-pass is degenerate (zero
/// variance) or no window clears the variance floor; initialization then
/// falls back to a fully uniform spread.
pub(crate) fn seed_centers(
    ctx: &ReferenceContext,
    tpl: &Template,
    topk: usize,
) -> Vec<[f32; 2]> {
    let image = ctx.highpass();
    let t_prime = tpl.hp_norm();
    let tpl_width = t_prime.width();
    let tpl_height = t_prime.height();
    let img_width = image.width();
    let img_height = image.height();
    if topk == 0 || img_width < tpl_width || img_height < tpl_height {
        return Vec::new();
    }

    let count = (tpl_width * tpl_height) as f64;
    let var_t: f64 = t_prime
        .as_slice()
        .iter()
        .map(|&v| f64::from(v) * f64::from(v))
        .sum();
    if var_t <= MIN_WINDOW_VAR {
        return Vec::new();
    }

    let max_x = img_width - tpl_width;
    let max_y = img_height - tpl_height;
    let mut topk_buf = TopK::new(topk);
    for y in 0..=max_y {
        for x in 0..=max_x {
            let mut dot = 0.0f64;
            let mut sum_i = 0.0f64;
            let mut sum_i2 = 0.0f64;
            for ty in 0..tpl_height {
                let img_row = &image.row(y + ty)[x..x + tpl_width];
                let tpl_row = t_prime.row(ty);
                for (&value, &t) in img_row.iter().zip(tpl_row) {
                    let value = f64::from(value);
                    dot += f64::from(t) * value;
                    sum_i += value;
                    sum_i2 += value * value;
                }
            }
            let var_i = sum_i2 - (sum_i * sum_i) / count;
            if var_i <= MIN_WINDOW_VAR {
                continue;
            }
            let score = dot / (var_t * var_i).sqrt();
            if score.is_finite() {
                topk_buf.push(Peak { x, y, score });
            }
        }
    }

    let peaks = topk_buf.into_sorted_desc();
    trace_event!("seed_peaks", count = peaks.len());
    let half_w = tpl_width as f32 / 2.0;
    let half_h = tpl_height as f32 / 2.0;
    peaks
        .iter()
        .map(|p| [p.x as f32 + half_w, p.y as f32 + half_h])
        .collect()
}
