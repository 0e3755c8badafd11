//! Pixel-to-physical coordinate conversion.
//!
//! Image coordinates are y-down; physical coordinates are presented y-up
//! (standard Cartesian), so the transform is `x = (px - ox) / ppu`,
//! `y = -(py - oy) / ppu`.

/// Converts a pixel-domain mean and covariance into physical units.
///
/// The covariance transforms through `J * cov * J^T` with
/// `J = diag(1/ppu, -1/ppu)`, then `noise` is added to the diagonal so a
/// fully collapsed particle cloud never reports a near-singular
/// uncertainty.
pub fn to_physical(
    pixel_mean: [f64; 2],
    pixel_cov: [[f64; 2]; 2],
    origin_px: [f64; 2],
    px_per_unit: f64,
    noise: f64,
) -> ([f64; 2], [[f64; 2]; 2]) {
    let u = 1.0 / px_per_unit;
    let mean = [
        (pixel_mean[0] - origin_px[0]) * u,
        -((pixel_mean[1] - origin_px[1]) * u),
    ];
    let u2 = u * u;
    let cov = [
        [pixel_cov[0][0] * u2 + noise, -pixel_cov[0][1] * u2],
        [-pixel_cov[1][0] * u2, pixel_cov[1][1] * u2 + noise],
    ];
    (mean, cov)
}

/// Inverse of the positional part of [`to_physical`].
pub fn to_pixel(physical: [f64; 2], origin_px: [f64; 2], px_per_unit: f64) -> [f64; 2] {
    [
        origin_px[0] + physical[0] * px_per_unit,
        origin_px[1] - physical[1] * px_per_unit,
    ]
}
