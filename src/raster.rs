//! Owned grayscale rasters and borrowed window views.
//!
//! The whole pipeline works on dense single-channel `f32` buffers. `Raster`
//! owns a contiguous row-major buffer; `RasterView` is a zero-copy window
//! into one, used for per-particle patch extraction.

use crate::util::{LocateError, LocateResult};

/// Owned contiguous grayscale `f32` image.
#[derive(Clone, Debug)]
pub struct Raster {
    data: Vec<f32>,
    width: usize,
    height: usize,
}

impl Raster {
    /// Creates a raster from a contiguous row-major buffer.
    pub fn new(data: Vec<f32>, width: usize, height: usize) -> LocateResult<Self> {
        let needed = checked_area(width, height)?;
        if data.len() < needed {
            return Err(LocateError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        if data.len() > needed {
            return Err(LocateError::InvalidDimensions { width, height });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Creates a zero-filled raster.
    pub fn zeros(width: usize, height: usize) -> LocateResult<Self> {
        let needed = checked_area(width, height)?;
        Ok(Self {
            data: vec![0.0; needed],
            width,
            height,
        })
    }

    /// Returns the width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the backing row-major slice.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Returns the backing slice mutably.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Returns row `y`.
    ///
    /// Panics if `y` is out of bounds; internal callers iterate `0..height`.
    pub fn row(&self, y: usize) -> &[f32] {
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    pub(crate) fn row_mut(&mut self, y: usize) -> &mut [f32] {
        let start = y * self.width;
        &mut self.data[start..start + self.width]
    }

    /// Returns the pixel at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[y * self.width + x])
    }

    /// Returns a zero-copy window view with top-left `(x, y)`.
    pub fn window(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> LocateResult<RasterView<'_>> {
        if width == 0 || height == 0 {
            return Err(LocateError::InvalidDimensions { width, height });
        }
        let fits_x = x.checked_add(width).is_some_and(|end| end <= self.width);
        let fits_y = y.checked_add(height).is_some_and(|end| end <= self.height);
        if !fits_x || !fits_y {
            return Err(LocateError::WindowOutOfBounds {
                x,
                y,
                width,
                height,
                img_width: self.width,
                img_height: self.height,
            });
        }
        Ok(RasterView {
            raster: self,
            x,
            y,
            width,
            height,
        })
    }

    /// Returns a view covering the whole raster.
    pub fn view(&self) -> RasterView<'_> {
        RasterView {
            raster: self,
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
        }
    }
}

/// Borrowed rectangular window into a [`Raster`].
#[derive(Clone, Copy)]
pub struct RasterView<'a> {
    raster: &'a Raster,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
}

impl<'a> RasterView<'a> {
    /// Returns the window width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the window height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns row `y` of the window (relative coordinates).
    pub fn row(&self, y: usize) -> &'a [f32] {
        let start = (self.y + y) * self.raster.width() + self.x;
        &self.raster.as_slice()[start..start + self.width]
    }

    /// Materializes the window into an owned raster.
    pub fn to_raster(&self) -> Raster {
        let mut data = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            data.extend_from_slice(self.row(y));
        }
        Raster {
            data,
            width: self.width,
            height: self.height,
        }
    }

    /// Mean and population standard deviation of the window.
    pub fn mean_std(&self) -> (f32, f32) {
        let count = (self.width * self.height) as f64;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for y in 0..self.height {
            for &v in self.row(y) {
                let v = v as f64;
                sum += v;
                sum_sq += v * v;
            }
        }
        let mean = sum / count;
        let var = (sum_sq / count - mean * mean).max(0.0);
        (mean as f32, var.sqrt() as f32)
    }
}

fn checked_area(width: usize, height: usize) -> LocateResult<usize> {
    if width == 0 || height == 0 {
        return Err(LocateError::InvalidDimensions { width, height });
    }
    width
        .checked_mul(height)
        .ok_or(LocateError::InvalidDimensions { width, height })
}
