//! Premultiplied compositing primitives.
//!
//! All colors here are premultiplied RGBA [`Vec4`]s, alpha in `w`.
//!
//! - [`over`]: `front + back * (1 - front.a)`
//! - [`unpremultiply`]: scalar divide guarded against near-zero alpha
//!
//! # Example
//!
//! ```rust
//! use deepfx_core::composite::over;
//! use glam::Vec4;
//!
//! let red = Vec4::new(0.5, 0.0, 0.0, 0.5);
//! let blue = Vec4::new(0.0, 0.0, 1.0, 1.0);
//! let out = over(red, blue);
//! assert_eq!(out, Vec4::new(0.5, 0.0, 0.5, 1.0));
//! ```

use glam::Vec4;

/// Alpha below which a sample counts as fully transparent.
pub const ALPHA_EPSILON: f32 = 1e-6;

/// Premultiplied Porter-Duff over.
#[inline]
pub fn over(front: Vec4, back: Vec4) -> Vec4 {
    front + back * (1.0 - front.w)
}

/// Divides a premultiplied scalar by its alpha.
///
/// Returns 0 when `alpha < ALPHA_EPSILON`, never Inf or NaN.
#[inline]
pub fn unpremultiply(value: f32, alpha: f32) -> f32 {
    if alpha < ALPHA_EPSILON { 0.0 } else { value / alpha }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_over_opaque_front_hides_back() {
        let front = Vec4::new(1.0, 0.0, 0.0, 1.0);
        let back = Vec4::new(0.0, 1.0, 0.0, 1.0);
        assert_eq!(over(front, back), front);
    }

    #[test]
    fn test_over_transparent_front() {
        let back = Vec4::new(0.2, 0.3, 0.4, 0.5);
        assert_eq!(over(Vec4::ZERO, back), back);
    }

    #[test]
    fn test_unpremultiply_guard() {
        assert_eq!(unpremultiply(0.25, 0.5), 0.5);
        assert_eq!(unpremultiply(0.25, 0.0), 0.0);
        assert_eq!(unpremultiply(1.0, 1e-9), 0.0);
    }
}
