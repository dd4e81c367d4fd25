//! Exact Euclidean distance transform with nearest-seed tracking.
//!
//! Given a per-pixel value in `[0, 1]`, every pixel learns its distance to the
//! nearest *seed* pixel and that seed's coordinate.
//!
//! # Seed Policy
//!
//! | Value            | Meaning                                        |
//! |------------------|------------------------------------------------|
//! | `<= 0.01`        | seed, distance offset 0                        |
//! | `>= 0.99`        | not a seed                                     |
//! | in between       | seed, reported distance offset by the value    |
//!
//! Values at the thresholds are clamped, never interpolated. The offset lets an
//! antialiased edge pixel count as "partly" a seed: a pixel half covered by an
//! object sits half a pixel away from it.
//!
//! The nearest seed is chosen by plain Euclidean distance; its offset is added
//! afterwards. A partial seed therefore wins over a full seed that is farther
//! away even when the full seed would report the smaller distance (a 0.98
//! seed at 1 gives 1.98 where a full seed at `sqrt(2)` would give 1.414). The
//! error is bounded by the offset, which is below one pixel.
//!
//! [`DistanceField::from_coverage`] runs the transform on `1 - coverage`, so
//! fully covered pixels are the seeds and the field measures distance to the
//! object.
//!
//! # Algorithm
//!
//! Two separable passes over the binary seed indicator:
//!
//! 1. **Columns**: a down and an up scan find, for every pixel, the nearest
//!    seed row in its own column.
//! 2. **Rows**: with `g(i)` the vertical distance found in column `i`, the
//!    lower envelope of the parabolas `(x - i)^2 + g(i)^2` gives, for every
//!    `x`, the column of the nearest seed. The envelope is built left to right
//!    on a monotonic stack of apexes, then read back left to right.
//!
//! Columns are independent in pass 1 and rows in pass 2; both run in
//! parallel under the `parallel` feature.
//!
//! Pixels that see no seed get distance `width + height` and no nearest pixel.
//!
//! # Example
//!
//! ```rust
//! use deepfx_ops::distance::DistanceField;
//!
//! // One covered pixel in the middle of a 5x5 image.
//! let mut coverage = vec![0.0; 25];
//! coverage[12] = 1.0;
//!
//! let field = DistanceField::from_coverage(5, 5, &coverage).unwrap();
//! assert_eq!(field.distance(2, 2), 0.0);
//! assert_eq!(field.distance(4, 2), 2.0);
//! assert_eq!(field.nearest(0, 0), Some((2, 2)));
//! ```

use tracing::debug;

use crate::parallel::{for_each_chunk, map_indices};
use crate::{OpsError, OpsResult};

/// Values at or below this are full seeds.
pub const SEED_THRESHOLD: f32 = 0.01;

/// Values at or above this are not seeds.
pub const UNSEEDED_THRESHOLD: f32 = 0.99;

/// Per-pixel result of the transform.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    distance: f32,
    nearest: Option<(u32, u32)>,
}

/// Distance to, and location of, the nearest seed for every pixel.
#[derive(Debug, Clone)]
pub struct DistanceField {
    width: u32,
    height: u32,
    entries: Vec<Entry>,
}

/// Seed offset for a raw value, `None` when the pixel is not a seed.
#[inline]
fn seed_offset(value: f32) -> Option<f32> {
    let v = if value.is_nan() { 1.0 } else { value.clamp(0.0, 1.0) };
    if v <= SEED_THRESHOLD {
        Some(0.0)
    } else if v >= UNSEEDED_THRESHOLD {
        None
    } else {
        Some(v)
    }
}

impl DistanceField {
    /// Runs the transform on `value(x, y)`.
    pub fn compute<F>(width: u32, height: u32, value: F) -> Self
    where
        F: Fn(u32, u32) -> f32 + Sync + Send,
    {
        let w = width as usize;
        let h = height as usize;
        debug!(width, height, "Computing distance field");

        let offsets: Vec<Option<f32>> = map_indices(w * h, |i| {
            seed_offset(value((i % w.max(1)) as u32, (i / w.max(1)) as u32))
        });

        // Pass 1: nearest seed row per column, stored column-major.
        let mut column_rows: Vec<Option<u32>> = vec![None; w * h];
        for_each_chunk(&mut column_rows, h, |x, column| {
            let mut last: Option<usize> = None;
            for (y, slot) in column.iter_mut().enumerate() {
                if offsets[y * w + x].is_some() {
                    last = Some(y);
                }
                *slot = last.map(|r| r as u32);
            }
            let mut next: Option<usize> = None;
            for y in (0..h).rev() {
                if offsets[y * w + x].is_some() {
                    next = Some(y);
                }
                if let Some(below) = next {
                    let closer = match column[y] {
                        Some(above) => below - y < y - above as usize,
                        None => true,
                    };
                    if closer {
                        column[y] = Some(below as u32);
                    }
                }
            }
        });

        // Pass 2: lower envelope of parabolas along each row.
        let unreachable = Entry {
            distance: (width + height) as f32,
            nearest: None,
        };
        let mut entries = vec![unreachable; w * h];
        for_each_chunk(&mut entries, w, |y, row| {
            let seed_row = |i: usize| column_rows[i * h + y];
            let g = |i: usize| {
                seed_row(i).map(|r| {
                    let dy = r as f64 - y as f64;
                    dy * dy
                })
            };

            let mut apex: Vec<usize> = Vec::with_capacity(w);
            let mut bounds: Vec<f64> = Vec::with_capacity(w + 1);
            for q in 0..w {
                let Some(fq) = g(q) else { continue };
                let qf = q as f64;
                loop {
                    let Some(&p) = apex.last() else {
                        apex.push(q);
                        bounds.push(f64::NEG_INFINITY);
                        break;
                    };
                    let pf = p as f64;
                    let fp = g(p).unwrap_or(f64::INFINITY);
                    let s = ((fq + qf * qf) - (fp + pf * pf)) / (2.0 * (qf - pf));
                    if bounds.last().is_some_and(|&z| s <= z) {
                        apex.pop();
                        bounds.pop();
                    } else {
                        apex.push(q);
                        bounds.push(s);
                        break;
                    }
                }
            }
            if apex.is_empty() {
                return;
            }

            let mut k = 0;
            for (x, entry) in row.iter_mut().enumerate() {
                let xf = x as f64;
                while k + 1 < apex.len() && bounds[k + 1] < xf {
                    k += 1;
                }
                let sx = apex[k];
                let Some(sy) = seed_row(sx) else { continue };
                let dx = xf - sx as f64;
                let dy = y as f64 - sy as f64;
                let offset = offsets[sy as usize * w + sx].unwrap_or(0.0);
                *entry = Entry {
                    distance: (dx * dx + dy * dy).sqrt() as f32 + offset,
                    nearest: Some((sx as u32, sy)),
                };
            }
        });

        Self {
            width,
            height,
            entries,
        }
    }

    /// Runs the transform on `1 - coverage`, measuring distance to the covered region.
    ///
    /// # Errors
    ///
    /// [`OpsError::InvalidParameter`] if `coverage.len() != width * height`.
    pub fn from_coverage(width: u32, height: u32, coverage: &[f32]) -> OpsResult<Self> {
        let expected = width as usize * height as usize;
        if coverage.len() != expected {
            return Err(OpsError::InvalidParameter(format!(
                "coverage has {} values, expected {} for {}x{}",
                coverage.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self::compute(width, height, |x, y| {
            1.0 - coverage[y as usize * width as usize + x as usize]
        }))
    }

    /// Field width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Field height.
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn entry(&self, x: u32, y: u32) -> Entry {
        self.entries[y as usize * self.width as usize + x as usize]
    }

    /// Distance from `(x, y)` to its nearest seed, plus that seed's offset.
    #[inline]
    pub fn distance(&self, x: u32, y: u32) -> f32 {
        self.entry(x, y).distance
    }

    /// Coordinate of the nearest seed, `None` if there is none.
    #[inline]
    pub fn nearest(&self, x: u32, y: u32) -> Option<(u32, u32)> {
        self.entry(x, y).nearest
    }
}
