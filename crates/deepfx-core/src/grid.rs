//! Per-pixel sample counts.
//!
//! The [`DeepPixelGrid`] is the single source of truth for how many samples
//! each pixel holds. Channels mirror it: at rest, every channel's sample array
//! at `(x, y)` has exactly `count(x, y)` entries.
//!
//! Only [`crate::DeepImage`] mutates a grid, and it does so after every
//! channel has already been extended (see [`crate::DeepImage::add_sample`]).
//!
//! # Memory Layout
//!
//! Counts are stored row-major, one `u32` per pixel:
//!
//! ```text
//! index = y * width + x
//! ```

use crate::error::{Error, Result};

/// Width×height table of per-pixel sample counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepPixelGrid {
    width: u32,
    height: u32,
    counts: Vec<u32>,
}

impl DeepPixelGrid {
    /// Creates a grid with zero samples in every pixel.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            counts: vec![0; width as usize * height as usize],
        }
    }

    /// Creates a grid from an existing count table.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCounts`] if `counts.len() != width * height`.
    pub fn from_counts(width: u32, height: u32, counts: Vec<u32>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if counts.len() != expected {
            return Err(Error::InvalidCounts(format!(
                "expected {} counts for {}x{}, got {}",
                expected,
                width,
                height,
                counts.len()
            )));
        }
        Ok(Self {
            width,
            height,
            counts,
        })
    }

    /// Image width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels (`width * height`).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.counts.len()
    }

    /// Row-major index of pixel `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    #[inline]
    pub fn pixel_index(&self, x: u32, y: u32) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({}, {}) out of bounds for {}x{}",
            x,
            y,
            self.width,
            self.height
        );
        y as usize * self.width as usize + x as usize
    }

    /// Checked variant of [`pixel_index`](Self::pixel_index).
    #[inline]
    pub fn checked_index(&self, x: u32, y: u32) -> Result<usize> {
        if x >= self.width || y >= self.height {
            return Err(Error::out_of_bounds(x, y, self.width, self.height));
        }
        Ok(y as usize * self.width as usize + x as usize)
    }

    /// Sample count at `(x, y)`.
    #[inline]
    pub fn count(&self, x: u32, y: u32) -> usize {
        self.counts[self.pixel_index(x, y)] as usize
    }

    /// Sample count by row-major pixel index.
    #[inline]
    pub fn count_at(&self, index: usize) -> usize {
        self.counts[index] as usize
    }

    /// The raw count table.
    #[inline]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Total samples across all pixels.
    pub fn total_samples(&self) -> usize {
        self.counts.iter().map(|&c| c as usize).sum()
    }

    /// Largest sample count of any pixel.
    pub fn max_samples(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0) as usize
    }

    /// Returns `true` when both grids have the same resolution.
    #[inline]
    pub fn same_resolution(&self, other: &DeepPixelGrid) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Commits one more sample at `index`.
    ///
    /// Callers must have extended every channel first.
    #[inline]
    pub(crate) fn increment(&mut self, index: usize) {
        self.counts[index] += 1;
    }
}
