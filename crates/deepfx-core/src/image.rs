//! The deep image container.
//!
//! A [`DeepImage`] owns a [`DeepPixelGrid`], a set of named [`AnyChannel`]s
//! and an [`Attrs`] bag. It is the only type allowed to change sample counts,
//! which is how the grid invariant is kept:
//!
//! > at rest, every channel's sample array at `(x, y)` has exactly
//! > `count(x, y)` entries.
//!
//! # Sample Order
//!
//! Samples are stored farthest first: index 0 is the sample with the largest
//! `Z`, the last index is nearest to the camera. This is compositing order,
//! so a flatten is a forward walk applying [`over`] onto the accumulator.
//!
//! Operations that append samples or splice images together leave the order
//! undefined and set [`DeepImage::needs_sort`]. Depth-dependent operations
//! call [`DeepImage::ensure_sorted`] first.
//!
//! # Example
//!
//! ```rust
//! use deepfx_core::{DeepImage, SampleInit, names};
//! use glam::Vec4;
//!
//! let mut image = DeepImage::new(2, 2);
//! image.push_sample(0, 0, SampleInit::new(Vec4::new(0.5, 0.0, 0.0, 0.5), 1.0, 7)).unwrap();
//! image.push_sample(0, 0, SampleInit::new(Vec4::new(0.0, 0.0, 1.0, 1.0), 4.0, 8)).unwrap();
//!
//! image.sort_by_depth().unwrap();
//! assert_eq!(image.channel::<f32>(names::Z).unwrap().samples(0, 0), &[4.0, 1.0]);
//!
//! let flat = image.flatten().unwrap();
//! assert_eq!(flat.get(0, 0), Vec4::new(0.5, 0.0, 0.5, 1.0));
//! ```

use std::collections::BTreeMap;

use glam::Vec4;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::attrs::Attrs;
use crate::channel::{AnyChannel, Channel, ChannelKind, SampleValue};
use crate::composite::over;
use crate::error::{Error, Result};
use crate::flat::FlatImage;
use crate::grid::DeepPixelGrid;
use crate::projection::ScalarProjection;
use crate::reorder::{SwapPlan, depth_order};

/// Well-known channel names.
pub mod names {
    /// Premultiplied color, `vec4`.
    pub const RGBA: &str = "rgba";
    /// Object id, `uint`.
    pub const ID: &str = "id";
    /// Front depth, `float`.
    pub const Z: &str = "Z";
    /// Back depth, `float`.
    pub const Z_BACK: &str = "ZBack";
    /// World position, `vec3`.
    pub const P: &str = "P";
    /// World normal, `vec3`.
    pub const N: &str = "N";
}

/// Field values for [`DeepImage::push_sample`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleInit {
    /// Premultiplied color
    pub rgba: Vec4,
    /// Front depth
    pub z: f32,
    /// Back depth, defaults to `z`
    pub z_back: Option<f32>,
    /// Object id
    pub id: u32,
}

impl SampleInit {
    /// Sample with color, depth and id.
    pub fn new(rgba: Vec4, z: f32, id: u32) -> Self {
        Self {
            rgba,
            z,
            z_back: None,
            id,
        }
    }

    /// Sets the back depth.
    pub fn with_z_back(mut self, z_back: f32) -> Self {
        self.z_back = Some(z_back);
        self
    }
}

/// Summary statistics of a deep image.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeepStats {
    /// Total number of samples
    pub total_samples: usize,
    /// Largest sample count of one pixel
    pub max_samples_per_pixel: usize,
    /// Mean samples per pixel
    pub avg_samples_per_pixel: f64,
    /// Pixels with no samples
    pub empty_pixels: usize,
    /// Pixels with more than one sample
    pub multi_sample_pixels: usize,
    /// Depth range `(min, max)`, if a `Z` channel holds any samples
    pub z_range: Option<(f32, f32)>,
}

/// Deep raster: per-pixel sample lists across named typed channels.
#[derive(Debug, Clone)]
pub struct DeepImage {
    grid: DeepPixelGrid,
    channels: BTreeMap<String, AnyChannel>,
    attrs: Attrs,
    needs_sort: bool,
}

impl DeepImage {
    /// Creates an image with no samples and no channels.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            grid: DeepPixelGrid::new(width, height),
            channels: BTreeMap::new(),
            attrs: Attrs::new(),
            needs_sort: false,
        }
    }

    /// Creates an image from a per-pixel count table.
    ///
    /// Channels added afterwards are sized to these counts. The image is
    /// flagged unsorted.
    pub fn from_counts(width: u32, height: u32, counts: Vec<u32>) -> Result<Self> {
        Ok(Self {
            grid: DeepPixelGrid::from_counts(width, height, counts)?,
            channels: BTreeMap::new(),
            attrs: Attrs::new(),
            needs_sort: true,
        })
    }

    /// Image width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.grid.width()
    }

    /// Image height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.grid.height()
    }

    /// The sample count grid.
    #[inline]
    pub fn grid(&self) -> &DeepPixelGrid {
        &self.grid
    }

    /// Sample count at `(x, y)`.
    #[inline]
    pub fn count(&self, x: u32, y: u32) -> usize {
        self.grid.count(x, y)
    }

    /// Image attributes.
    #[inline]
    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// Mutable image attributes.
    #[inline]
    pub fn attrs_mut(&mut self) -> &mut Attrs {
        &mut self.attrs
    }

    // === Channels ===

    /// Adds a default-filled channel, or returns the existing one.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelType`] if `name` exists with another value type.
    pub fn add_channel<T: SampleValue>(&mut self, name: &str) -> Result<&mut Channel<T>> {
        let grid = &self.grid;
        let any = self
            .channels
            .entry(name.to_string())
            .or_insert_with(|| T::into_any(Channel::new(grid)));
        let found = any.kind();
        T::from_any_mut(any).ok_or_else(|| Error::channel_type(name, T::KIND, found))
    }

    /// Adds a default-filled channel of a runtime kind.
    pub fn add_channel_of_kind(&mut self, name: &str, kind: ChannelKind) -> Result<()> {
        if let Some(existing) = self.channels.get(name) {
            if existing.kind() != kind {
                return Err(Error::channel_type(name, kind, existing.kind()));
            }
            return Ok(());
        }
        self.channels
            .insert(name.to_string(), AnyChannel::with_kind(kind, &self.grid));
        Ok(())
    }

    /// Removes a channel.
    pub fn remove_channel(&mut self, name: &str) -> Option<AnyChannel> {
        self.channels.remove(name)
    }

    /// Typed channel lookup.
    ///
    /// # Errors
    ///
    /// [`Error::MissingChannel`] or [`Error::ChannelType`].
    pub fn channel<T: SampleValue>(&self, name: &str) -> Result<&Channel<T>> {
        self.try_channel(name)?
            .ok_or_else(|| Error::missing_channel(name))
    }

    /// Mutable typed channel lookup.
    pub fn channel_mut<T: SampleValue>(&mut self, name: &str) -> Result<&mut Channel<T>> {
        let any = self
            .channels
            .get_mut(name)
            .ok_or_else(|| Error::missing_channel(name))?;
        let found = any.kind();
        T::from_any_mut(any).ok_or_else(|| Error::channel_type(name, T::KIND, found))
    }

    /// Optional typed lookup: `Ok(None)` if absent, error if mistyped.
    pub fn try_channel<T: SampleValue>(&self, name: &str) -> Result<Option<&Channel<T>>> {
        match self.channels.get(name) {
            None => Ok(None),
            Some(any) => T::from_any(any)
                .map(Some)
                .ok_or_else(|| Error::channel_type(name, T::KIND, any.kind())),
        }
    }

    /// Untyped channel lookup.
    pub fn any_channel(&self, name: &str) -> Result<&AnyChannel> {
        self.channels
            .get(name)
            .ok_or_else(|| Error::missing_channel(name))
    }

    /// Value type of `name`, if present.
    pub fn channel_kind(&self, name: &str) -> Option<ChannelKind> {
        self.channels.get(name).map(AnyChannel::kind)
    }

    /// Returns `true` if a channel called `name` exists.
    #[inline]
    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    /// Channel names in sorted order.
    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// (name, channel) pairs in name order.
    pub fn channels(&self) -> impl Iterator<Item = (&str, &AnyChannel)> {
        self.channels.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Scalar view over one component of `name`.
    pub fn projection(&self, name: &str, component: usize) -> Result<ScalarProjection<'_>> {
        ScalarProjection::new(name, self.any_channel(name)?, component)
    }

    /// Copies `src`'s samples at `(x, y)` into channel `dest` from `dest_start`.
    ///
    /// # Errors
    ///
    /// [`Error::MissingChannel`] if `dest` does not exist,
    /// [`Error::ChannelType`] if the value types differ,
    /// [`Error::SampleRange`] if the copy overruns the pixel.
    pub fn copy_samples(&mut self, dest: &str, src: &AnyChannel, x: u32, y: u32, dest_start: usize) -> Result<()> {
        let channel = self
            .channels
            .get_mut(dest)
            .ok_or_else(|| Error::missing_channel(dest))?;
        channel.copy_samples_from(dest, src, x, y, dest_start)
    }

    // === Samples ===

    /// Appends one default-valued sample at `(x, y)` to every channel.
    ///
    /// Returns the new sample's index.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfBounds`] for coordinates outside the image. Nothing is
    /// modified in that case.
    pub fn add_sample(&mut self, x: u32, y: u32) -> Result<usize> {
        let index = self.grid.checked_index(x, y)?;
        for channel in self.channels.values_mut() {
            channel.push_default(index);
        }
        self.grid.increment(index);
        Ok(self.grid.count_at(index) - 1)
    }

    /// Appends a sample and fills its color, depth and id.
    ///
    /// Creates `rgba`, `Z` and `id` if missing. `ZBack` is written only when
    /// the channel exists. The image is flagged unsorted.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfBounds`] before any channel is created, or a type error
    /// if one of the standard channels exists with another value type.
    pub fn push_sample(&mut self, x: u32, y: u32, init: SampleInit) -> Result<usize> {
        self.grid.checked_index(x, y)?;
        self.add_channel::<Vec4>(names::RGBA)?;
        self.add_channel::<f32>(names::Z)?;
        self.add_channel::<u32>(names::ID)?;
        let z_back = self.try_channel::<f32>(names::Z_BACK)?.is_some();

        let s = self.add_sample(x, y)?;
        self.channel_mut::<Vec4>(names::RGBA)?.set(x, y, s, init.rgba);
        self.channel_mut::<f32>(names::Z)?.set(x, y, s, init.z);
        self.channel_mut::<u32>(names::ID)?.set(x, y, s, init.id);
        if z_back {
            self.channel_mut::<f32>(names::Z_BACK)?
                .set(x, y, s, init.z_back.unwrap_or(init.z));
        }
        self.needs_sort = true;
        Ok(s)
    }

    // === Ordering ===

    /// Reorders pixel `(x, y)` in every channel: new slot `i` takes old slot `order[i]`.
    pub fn reorder_pixel(&mut self, x: u32, y: u32, order: &[usize]) -> Result<()> {
        let index = self.grid.checked_index(x, y)?;
        let count = self.grid.count_at(index);
        if order.len() != count {
            return Err(Error::InvalidPermutation(format!(
                "order has {} entries, pixel ({}, {}) has {} samples",
                order.len(),
                x,
                y,
                count
            )));
        }
        let plan = SwapPlan::from_order(order)?;
        if plan.is_identity() {
            return Ok(());
        }
        for channel in self.channels.values_mut() {
            channel.apply_plan(index, &plan);
        }
        Ok(())
    }

    /// Returns `true` if sample order is not known to be farthest first.
    #[inline]
    pub fn needs_sort(&self) -> bool {
        self.needs_sort
    }

    /// Flags the image as needing a depth sort.
    #[inline]
    pub fn mark_unsorted(&mut self) {
        self.needs_sort = true;
    }

    /// Sorts every pixel farthest first by `Z`.
    ///
    /// Returns the number of pixels whose order changed.
    ///
    /// # Errors
    ///
    /// Schema error if `Z` is missing or not a `float` channel.
    pub fn sort_by_depth(&mut self) -> Result<usize> {
        let z = self.channel::<f32>(names::Z)?;
        debug!(
            width = self.width(),
            height = self.height(),
            samples = self.grid.total_samples(),
            "Sorting deep samples by depth"
        );

        let plans = (0..self.grid.pixel_count())
            .into_par_iter()
            .map(|index| {
                let depths = z.samples_at(index);
                if depths.len() < 2 {
                    return Ok(None);
                }
                let plan = SwapPlan::from_order(&depth_order(depths))?;
                Ok((!plan.is_identity()).then_some(plan))
            })
            .collect::<Result<Vec<Option<SwapPlan>>>>()?;

        let reordered = plans.iter().filter(|p| p.is_some()).count();
        if reordered > 0 {
            for channel in self.channels.values_mut() {
                channel.apply_plans(&plans);
            }
        }
        trace!(pixels = reordered, "Depth sort applied");

        self.needs_sort = false;
        Ok(reordered)
    }

    /// Sorts only if the image is flagged unsorted.
    pub fn ensure_sorted(&mut self) -> Result<()> {
        if self.needs_sort {
            self.sort_by_depth()?;
        }
        Ok(())
    }

    // === Inspection ===

    /// Re-checks that every channel matches the grid.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCounts`] naming the first mismatching channel and pixel.
    pub fn validate(&self) -> Result<()> {
        for (name, channel) in &self.channels {
            for index in 0..self.grid.pixel_count() {
                let expected = self.grid.count_at(index);
                let actual = channel.len_at(index);
                if actual != expected {
                    return Err(Error::InvalidCounts(format!(
                        "channel '{}' has {} samples at pixel {}, grid has {}",
                        name, actual, index, expected
                    )));
                }
            }
        }
        Ok(())
    }

    /// Sample statistics.
    pub fn statistics(&self) -> DeepStats {
        let counts = self.grid.counts();
        let total = self.grid.total_samples();
        let mut stats = DeepStats {
            total_samples: total,
            max_samples_per_pixel: self.grid.max_samples(),
            avg_samples_per_pixel: if counts.is_empty() {
                0.0
            } else {
                total as f64 / counts.len() as f64
            },
            empty_pixels: counts.iter().filter(|&&c| c == 0).count(),
            multi_sample_pixels: counts.iter().filter(|&&c| c > 1).count(),
            z_range: None,
        };

        if let Ok(Some(z)) = self.try_channel::<f32>(names::Z) {
            stats.z_range = (0..counts.len())
                .flat_map(|i| z.samples_at(i).iter().copied())
                .fold(None, |range, v| match range {
                    None => Some((v, v)),
                    Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                });
        }
        stats
    }

    // === Flattening ===

    /// Composites every sample back to front into a flat image.
    ///
    /// Uses stored order; sort first if it may be stale.
    pub fn flatten(&self) -> Result<FlatImage> {
        let rgba = self.channel::<Vec4>(names::RGBA)?;
        Ok(self.flatten_with(|index| {
            rgba.samples_at(index)
                .iter()
                .fold(Vec4::ZERO, |acc, &s| over(s, acc))
        }))
    }

    /// Composites only samples whose id passes `keep`.
    pub fn flatten_filtered<F>(&self, keep: F) -> Result<FlatImage>
    where
        F: Fn(u32) -> bool + Sync,
    {
        let rgba = self.channel::<Vec4>(names::RGBA)?;
        let ids = self.channel::<u32>(names::ID)?;
        Ok(self.flatten_with(|index| {
            rgba.samples_at(index)
                .iter()
                .zip(ids.samples_at(index))
                .filter(|&(_, &id)| keep(id))
                .fold(Vec4::ZERO, |acc, (&s, _)| over(s, acc))
        }))
    }

    fn flatten_with<F>(&self, pixel: F) -> FlatImage
    where
        F: Fn(usize) -> Vec4 + Sync,
    {
        let mut out = FlatImage::new(self.width(), self.height());
        out.pixels
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, value)| *value = pixel(index));
        out
    }
}
