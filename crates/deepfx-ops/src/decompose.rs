//! Order-independent layer decomposition.
//!
//! Splits a depth-sorted deep image into one flat image per object group such
//! that adding all layers together gives back the flattened composite:
//!
//! ```text
//! sum(layers) == image.flatten()
//! ```
//!
//! # Groups and Ranks
//!
//! A [`LayerMap`] assigns each object id a rank. Ids missing from the map fall
//! into the default group ([`LayerMap::default_id`]). Layers are returned in
//! ascending rank order. When the default id has no rank of its own it ranks
//! below every mapped id.
//!
//! # Per-Pixel Algorithm
//!
//! Samples are walked back to front. Each group `g` keeps an accumulator
//! `A[g]` and a deferred factor `P[g]` (initially 1). For a sample of group
//! `g` with rank `r`, alpha `a` and premultiplied color `S`:
//!
//! ```text
//! A[h] *= 1 - a      for every group h with rank(h) <= r
//! P[h] *= 1 - a      for every group h with rank(h) >  r
//! A[g] += S / P[g]
//! layer[g] = A[g] * P[g]           at the end of the pixel
//! ```
//!
//! Coverage of the same or a higher rank attenuates a group directly. Coverage
//! of a lower rank is only recorded in `P`. A sample inserted while `P[g] < 1`
//! is boosted by `1 / P[g]` so that the final `* P[g]` leaves it with exactly
//! the visibility it has in the plain composite. When `P[g]` falls below
//! [`REBASE_EPSILON`] it is folded into `A[g]` and reset to 1, which keeps the
//! boost finite. Every sample therefore contributes `S` times the
//! transmittance of everything in front of it, and the layers sum to the
//! composite.
//!
//! # Masks
//!
//! [`decompose_masked`] multiplies each contribution by the sample's mask
//! value divided by its own alpha (masks arrive premultiplied). Zero-alpha
//! samples get a mask of 0.

use std::collections::BTreeMap;

use glam::Vec4;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use deepfx_core::composite::unpremultiply;
use deepfx_core::{DeepImage, FlatImage, ScalarProjection, ScalarSource, names};

use crate::parallel::map_indices;
use crate::{OpsError, OpsResult};

/// Deferred factor below which a group's accumulator is rebased.
pub const REBASE_EPSILON: f32 = 1e-4;

/// Alpha at or below which a layer counts as empty.
pub const EMPTY_LAYER_EPSILON: f32 = 1e-6;

/// Object id to rank mapping with a default group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerMap {
    /// Rank per object id. Higher ranks composite on top.
    pub ranks: BTreeMap<u32, i32>,
    /// Group receiving every unmapped id.
    pub default_id: u32,
}

impl LayerMap {
    /// Creates a map from `(id, rank)` pairs.
    pub fn new(default_id: u32, ranks: impl IntoIterator<Item = (u32, i32)>) -> Self {
        Self {
            ranks: ranks.into_iter().collect(),
            default_id,
        }
    }

    /// Checks that ranks form a total order (no two ids share a rank).
    pub fn validate(&self) -> OpsResult<()> {
        let mut seen: BTreeMap<i32, u32> = BTreeMap::new();
        for (&id, &rank) in &self.ranks {
            if let Some(other) = seen.insert(rank, id) {
                return Err(OpsError::InvalidParameter(format!(
                    "ids {} and {} share rank {}",
                    other, id, rank
                )));
            }
        }
        Ok(())
    }

    /// Returns `true` if `id` has its own layer.
    #[inline]
    pub fn is_mapped(&self, id: u32) -> bool {
        id == self.default_id || self.ranks.contains_key(&id)
    }

    /// Group id that `id` belongs to.
    #[inline]
    pub fn group_of(&self, id: u32) -> u32 {
        if self.is_mapped(id) { id } else { self.default_id }
    }

    /// Rank of a group; an unranked default group ranks lowest.
    pub fn rank_of(&self, group: u32) -> i32 {
        self.ranks.get(&group).copied().unwrap_or(i32::MIN)
    }

    /// `(id, rank)` of every group in ascending rank order.
    pub fn ordered_groups(&self) -> Vec<(u32, i32)> {
        let mut groups: Vec<(u32, i32)> = self.ranks.iter().map(|(&id, &r)| (id, r)).collect();
        if !self.ranks.contains_key(&self.default_id) {
            debug!(default_id = self.default_id, "Default group has no rank, placing it lowest");
            groups.push((self.default_id, i32::MIN));
        }
        groups.sort_by_key(|&(id, rank)| (rank, id));
        groups
    }
}

/// One decomposed output layer.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Group id
    pub id: u32,
    /// Group rank
    pub rank: i32,
    /// Premultiplied contribution of the group
    pub image: FlatImage,
}

impl Layer {
    /// Returns `true` if the layer has no visible alpha anywhere.
    pub fn is_empty(&self) -> bool {
        self.image.is_empty(EMPTY_LAYER_EPSILON)
    }
}

/// Rewrites ids many-to-one; returns the number of samples changed.
pub fn combine_ids(image: &mut DeepImage, remap: &BTreeMap<u32, u32>) -> OpsResult<usize> {
    if remap.is_empty() {
        return Ok(0);
    }
    debug!(mappings = remap.len(), "Combining object ids");
    let ids = image.channel_mut::<u32>(names::ID)?;
    let mut changed = 0;
    for y in 0..ids.height() {
        for x in 0..ids.width() {
            for id in ids.samples_mut(x, y) {
                if let Some(&to) = remap.get(&*id) {
                    if to != *id {
                        *id = to;
                        changed += 1;
                    }
                }
            }
        }
    }
    trace!(samples = changed, "Ids combined");
    Ok(changed)
}

/// Rewrites every id without a rank to the default id.
///
/// Returns the number of samples rewritten and logs a warning when nonzero.
pub fn collapse_unmapped(image: &mut DeepImage, map: &LayerMap) -> OpsResult<usize> {
    let ids = image.channel_mut::<u32>(names::ID)?;
    let mut collapsed = 0;
    let mut unmapped: SmallVec<[u32; 8]> = SmallVec::new();
    for y in 0..ids.height() {
        for x in 0..ids.width() {
            for id in ids.samples_mut(x, y) {
                if !map.is_mapped(*id) {
                    if !unmapped.contains(id) {
                        unmapped.push(*id);
                    }
                    *id = map.default_id;
                    collapsed += 1;
                }
            }
        }
    }
    if collapsed > 0 {
        warn!(
            samples = collapsed,
            ids = ?unmapped.as_slice(),
            default_id = map.default_id,
            "Unmapped object ids collapsed into default group"
        );
    }
    Ok(collapsed)
}

/// Splits `image` into per-group layers that sum to its composite.
///
/// Sorts the image first if flagged. Unmapped ids go to the default group.
///
/// # Errors
///
/// Schema errors for missing `rgba`/`id`/`Z`, [`OpsError::InvalidParameter`]
/// for a map with duplicate ranks.
pub fn decompose(image: &mut DeepImage, map: &LayerMap) -> OpsResult<Vec<Layer>> {
    decompose_impl(image, map, None)
}

/// Like [`decompose`], weighting each sample by the unpremultiplied `mask` channel.
///
/// `mask` may be any channel kind; its first component is used.
pub fn decompose_masked(image: &mut DeepImage, map: &LayerMap, mask: &str) -> OpsResult<Vec<Layer>> {
    decompose_impl(image, map, Some(mask))
}

fn decompose_impl(image: &mut DeepImage, map: &LayerMap, mask: Option<&str>) -> OpsResult<Vec<Layer>> {
    map.validate()?;
    image.ensure_sorted()?;

    let groups = map.ordered_groups();
    let index_of: BTreeMap<u32, usize> = groups.iter().enumerate().map(|(i, &(id, _))| (id, i)).collect();
    let ranks: Vec<i32> = groups.iter().map(|&(_, r)| r).collect();

    let (width, height) = (image.width(), image.height());
    debug!(width, height, groups = groups.len(), mask, "Decomposing deep image");

    let rgba = image.channel::<Vec4>(names::RGBA)?;
    let ids = image.channel::<u32>(names::ID)?;
    let mask: Option<ScalarProjection<'_>> = mask.map(|name| image.projection(name, 0)).transpose()?;

    let w = width as usize;
    let default_index = index_of.get(&map.default_id).copied().unwrap_or(0);
    let pixels: Vec<SmallVec<[Vec4; 4]>> = map_indices(w * height as usize, |i| {
        let (x, y) = ((i % w) as u32, (i / w) as u32);
        let mut acc: SmallVec<[Vec4; 4]> = SmallVec::from_elem(Vec4::ZERO, ranks.len());
        let mut deferred: SmallVec<[f32; 4]> = SmallVec::from_elem(1.0, ranks.len());

        for (s, (&color, &id)) in rgba.samples_at(i).iter().zip(ids.samples_at(i)).enumerate() {
            let g = index_of.get(&map.group_of(id)).copied().unwrap_or(default_index);
            let rank = ranks[g];
            let alpha = color.w;
            let keep = 1.0 - alpha;

            for h in 0..ranks.len() {
                if ranks[h] <= rank {
                    acc[h] *= keep;
                } else {
                    deferred[h] *= keep;
                }
            }

            if deferred[g] < REBASE_EPSILON {
                acc[g] *= deferred[g];
                deferred[g] = 1.0;
            }

            let contribution = match &mask {
                Some(m) => color * unpremultiply(m.get(x, y, s), alpha),
                None => color,
            };
            acc[g] += contribution / deferred[g];
        }

        for (a, p) in acc.iter_mut().zip(&deferred) {
            *a *= *p;
        }
        acc
    });

    let mut layers: Vec<Layer> = groups
        .iter()
        .map(|&(id, rank)| Layer {
            id,
            rank,
            image: FlatImage::new(width, height),
        })
        .collect();
    for (i, values) in pixels.into_iter().enumerate() {
        for (layer, value) in layers.iter_mut().zip(values) {
            layer.image.pixels[i] = value;
        }
    }

    for layer in layers.iter().filter(|l| l.is_empty()) {
        warn!(id = layer.id, rank = layer.rank, "Layer is empty");
    }
    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use deepfx_core::SampleInit;

    fn sample(rgb: [f32; 3], a: f32, z: f32, id: u32) -> SampleInit {
        SampleInit::new(Vec4::new(rgb[0] * a, rgb[1] * a, rgb[2] * a, a), z, id)
    }

    #[test]
    fn test_ordered_groups_default_lowest() {
        let map = LayerMap::new(0, [(5, 2), (3, 7)]);
        assert_eq!(map.ordered_groups(), vec![(0, i32::MIN), (5, 2), (3, 7)]);
        assert_eq!(map.group_of(9), 0);
        assert_eq!(map.group_of(3), 3);
    }

    #[test]
    fn test_duplicate_ranks_rejected() {
        let map = LayerMap::new(0, [(1, 1), (2, 1)]);
        assert!(map.validate().unwrap_err().is_config_error());
    }

    #[test]
    fn test_interleaved_ranks_reconstruct() {
        // Back to front: id 2 (high rank), id 1 (low rank), id 2 again.
        let mut image = DeepImage::new(1, 1);
        image.push_sample(0, 0, sample([0.0, 0.0, 1.0], 0.6, 9.0, 2)).unwrap();
        image.push_sample(0, 0, sample([1.0, 0.0, 0.0], 0.5, 5.0, 1)).unwrap();
        image.push_sample(0, 0, sample([0.0, 1.0, 0.0], 0.3, 1.0, 2)).unwrap();

        let map = LayerMap::new(0, [(1, 1), (2, 2)]);
        let layers = decompose(&mut image, &map).unwrap();
        assert_eq!(layers.iter().map(|l| l.id).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(layers[0].is_empty());

        let flat = image.flatten().unwrap();
        let images: Vec<FlatImage> = layers.iter().map(|l| l.image.clone()).collect();
        let sum = FlatImage::sum(&images).unwrap();
        assert!(sum.max_abs_difference(&flat).unwrap() < 1e-5);

        // Id 1 sits under id 2's front sample only.
        let red = layers[1].image.get(0, 0);
        assert_abs_diff_eq!(red.x, 0.5 * 0.7, epsilon = 1e-6);
    }

    #[test]
    fn test_rebase_keeps_values_finite() {
        let mut image = DeepImage::new(1, 1);
        image.push_sample(0, 0, sample([0.0, 0.0, 1.0], 0.5, 10.0, 2)).unwrap();
        for i in 0..20 {
            image
                .push_sample(0, 0, sample([1.0, 0.0, 0.0], 0.9, 9.0 - i as f32 * 0.1, 1))
                .unwrap();
        }
        image.push_sample(0, 0, sample([0.0, 1.0, 0.0], 0.5, 0.5, 2)).unwrap();

        let map = LayerMap::new(1, [(1, 1), (2, 2)]);
        let layers = decompose(&mut image, &map).unwrap();
        let images: Vec<FlatImage> = layers.iter().map(|l| l.image.clone()).collect();
        let sum = FlatImage::sum(&images).unwrap();
        assert!(sum.pixels[0].is_finite());
        assert!(sum.max_abs_difference(&image.flatten().unwrap()).unwrap() < 1e-5);
    }

    #[test]
    fn test_masked_scales_contribution() {
        let mut image = DeepImage::new(1, 1);
        image.add_channel::<f32>("mask").unwrap();
        let s = image.push_sample(0, 0, sample([1.0, 1.0, 1.0], 0.5, 1.0, 1)).unwrap();
        // Premultiplied mask of 0.25 at alpha 0.5 means half strength.
        image.channel_mut::<f32>("mask").unwrap().set(0, 0, s, 0.25);

        let map = LayerMap::new(1, [(1, 0)]);
        let layers = decompose_masked(&mut image, &map, "mask").unwrap();
        assert_eq!(layers.len(), 1);
        assert_abs_diff_eq!(layers[0].image.get(0, 0).w, 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_combine_and_collapse() {
        let mut image = DeepImage::new(2, 1);
        image.push_sample(0, 0, sample([1.0; 3], 1.0, 1.0, 4)).unwrap();
        image.push_sample(1, 0, sample([1.0; 3], 1.0, 1.0, 5)).unwrap();
        image.push_sample(1, 0, sample([1.0; 3], 1.0, 2.0, 9)).unwrap();

        let remap = BTreeMap::from([(4, 1), (5, 1)]);
        assert_eq!(combine_ids(&mut image, &remap).unwrap(), 2);

        let map = LayerMap::new(0, [(1, 1)]);
        assert_eq!(collapse_unmapped(&mut image, &map).unwrap(), 1);
        assert_eq!(image.channel::<u32>(names::ID).unwrap().samples(1, 0), &[1, 0]);
    }
}
