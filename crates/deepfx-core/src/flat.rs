//! Flat (non-deep) RGBA images.
//!
//! A [`FlatImage`] is what a deep image collapses into: one premultiplied
//! RGBA value per pixel, row-major. Decomposition emits one per layer, and
//! the sum of all layers reproduces the flattened composite.

use glam::Vec4;

use crate::error::{Error, Result};

/// Width×height premultiplied RGBA buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatImage {
    /// Image width
    pub width: u32,
    /// Image height
    pub height: u32,
    /// Row-major pixels
    pub pixels: Vec<Vec4>,
}

impl FlatImage {
    /// Creates a fully transparent image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Vec4::ZERO; width as usize * height as usize],
        }
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
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

    /// Pixel value at `(x, y)`.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[self.index(x, y)]
    }

    /// Sets the pixel at `(x, y)`.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: Vec4) {
        let i = self.index(x, y);
        self.pixels[i] = value;
    }

    /// Alpha channel as a scalar buffer.
    pub fn alpha(&self) -> Vec<f32> {
        self.pixels.iter().map(|p| p.w).collect()
    }

    /// Returns `true` if every pixel's alpha is at most `eps`.
    pub fn is_empty(&self, eps: f32) -> bool {
        self.pixels.iter().all(|p| p.w.abs() <= eps)
    }

    /// Additive sum of same-sized images.
    ///
    /// # Errors
    ///
    /// [`Error::DimensionMismatch`] if any image differs from the first.
    /// An empty slice yields a 0×0 image.
    pub fn sum(images: &[FlatImage]) -> Result<FlatImage> {
        let Some(first) = images.first() else {
            return Ok(FlatImage::new(0, 0));
        };
        let mut out = FlatImage::new(first.width, first.height);
        for image in images {
            if image.width != out.width || image.height != out.height {
                return Err(Error::dimension_mismatch(
                    (out.width, out.height),
                    (image.width, image.height),
                ));
            }
            for (dst, src) in out.pixels.iter_mut().zip(&image.pixels) {
                *dst += *src;
            }
        }
        Ok(out)
    }

    /// Largest per-component absolute difference to `other`.
    ///
    /// # Errors
    ///
    /// [`Error::DimensionMismatch`] if the sizes differ.
    pub fn max_abs_difference(&self, other: &FlatImage) -> Result<f32> {
        if self.width != other.width || self.height != other.height {
            return Err(Error::dimension_mismatch(
                (self.width, self.height),
                (other.width, other.height),
            ));
        }
        Ok(self
            .pixels
            .iter()
            .zip(&other.pixels)
            .map(|(a, b)| (*a - *b).abs().max_element())
            .fold(0.0, f32::max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_empty() {
        let img = FlatImage::new(3, 2);
        assert_eq!(img.pixels.len(), 6);
        assert!(img.is_empty(0.0));
    }

    #[test]
    fn test_sum() {
        let mut a = FlatImage::new(2, 1);
        let mut b = FlatImage::new(2, 1);
        a.set(0, 0, Vec4::new(0.2, 0.0, 0.0, 0.2));
        b.set(1, 0, Vec4::ONE);

        let sum = FlatImage::sum(&[a, b]).unwrap();
        assert_eq!(sum.get(0, 0), Vec4::new(0.2, 0.0, 0.0, 0.2));
        assert_eq!(sum.get(1, 0), Vec4::ONE);
    }

    #[test]
    fn test_sum_size_mismatch() {
        let err = FlatImage::sum(&[FlatImage::new(2, 2), FlatImage::new(1, 2)]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn test_max_abs_difference() {
        let a = FlatImage::new(1, 1);
        let mut b = FlatImage::new(1, 1);
        b.set(0, 0, Vec4::new(0.0, -0.25, 0.1, 0.0));
        assert_eq!(a.max_abs_difference(&b).unwrap(), 0.25);
    }
}
