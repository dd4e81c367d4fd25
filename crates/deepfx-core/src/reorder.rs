//! In-place sample reordering.
//!
//! Reordering a pixel must move the samples of every channel identically.
//! Rather than permuting each channel through a scratch buffer, a target order
//! is compiled once into a [`SwapPlan`]: a short list of element swaps that,
//! replayed against any slice of the right length, produces the new order.
//!
//! For a target `order` (new position `i` takes old sample `order[i]`) the plan
//! walks each cycle of the permutation and emits at most `n - 1` swaps.
//! Already-placed elements and the identity permutation emit nothing.
//!
//! # Example
//!
//! ```rust
//! use deepfx_core::SwapPlan;
//!
//! let plan = SwapPlan::from_order(&[2, 0, 1]).unwrap();
//! let mut values = ['a', 'b', 'c'];
//! plan.apply(&mut values);
//! assert_eq!(values, ['c', 'a', 'b']);
//! ```

use smallvec::SmallVec;

use crate::error::{Error, Result};

/// A compiled reorder: swaps to replay against every channel of a pixel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapPlan {
    len: usize,
    swaps: SmallVec<[(u32, u32); 8]>,
}

impl SwapPlan {
    /// Compiles `order` into a swap plan.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPermutation`] if `order` is not a permutation of
    /// `0..order.len()`.
    pub fn from_order(order: &[usize]) -> Result<Self> {
        let n = order.len();
        let mut seen = vec![false; n];
        for &k in order {
            if k >= n {
                return Err(Error::InvalidPermutation(format!(
                    "index {} out of range for {} samples",
                    k, n
                )));
            }
            if seen[k] {
                return Err(Error::InvalidPermutation(format!("index {} repeated", k)));
            }
            seen[k] = true;
        }

        // `seen` doubles as the visited set for the cycle walk.
        let mut visited = seen;
        visited.fill(false);
        let mut swaps = SmallVec::new();

        for i in 0..n {
            if visited[i] {
                continue;
            }
            let mut j = i;
            loop {
                visited[j] = true;
                let k = order[j];
                if k == i {
                    break;
                }
                swaps.push((j as u32, k as u32));
                j = k;
            }
        }

        Ok(Self { len: n, swaps })
    }

    /// Length of the slices this plan applies to.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of swaps the plan performs.
    #[inline]
    pub fn swap_count(&self) -> usize {
        self.swaps.len()
    }

    /// Returns `true` if replaying the plan changes nothing.
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.swaps.is_empty()
    }

    /// Replays the plan against `values`.
    ///
    /// # Panics
    ///
    /// Panics if `values.len()` differs from the plan length.
    pub fn apply<T>(&self, values: &mut [T]) {
        assert_eq!(
            values.len(),
            self.len,
            "swap plan built for {} samples applied to {}",
            self.len,
            values.len()
        );
        for &(a, b) in &self.swaps {
            values.swap(a as usize, b as usize);
        }
    }
}

/// Sample order that places the farthest sample first.
///
/// Indices are sorted by descending depth; equal depths keep their relative
/// order. NaN depths sort as the largest values.
pub fn depth_order(depths: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..depths.len()).collect();
    order.sort_by(|&a, &b| depths[b].total_cmp(&depths[a]));
    order
}
