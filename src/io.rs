//! Image loading via the `image` crate.
//!
//! All inputs are converted to single-channel `f32` luma in `[0, 1]`; RGB
//! rasters go through the standard luminance weighting performed by
//! `DynamicImage::to_luma32f`.

use crate::raster::Raster;
use crate::util::{LocateError, LocateResult};
use std::path::Path;

/// Loads an image from disk as a grayscale raster.
pub fn load_gray<P: AsRef<Path>>(path: P) -> LocateResult<Raster> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|err| LocateError::ImageLoad {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    raster_from_dynamic(&img)
}

/// Converts a decoded image to a grayscale raster.
pub fn raster_from_dynamic(img: &image::DynamicImage) -> LocateResult<Raster> {
    let gray = img.to_luma32f();
    let width = gray.width() as usize;
    let height = gray.height() as usize;
    Raster::new(gray.into_raw(), width, height)
}
