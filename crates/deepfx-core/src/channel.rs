//! Typed per-pixel sample channels.
//!
//! A channel stores one value per sample for every pixel of a deep image.
//! The value type is one of a closed set, described by [`ChannelKind`]:
//!
//! | Kind    | Rust type    | Typical channels      |
//! |---------|--------------|-----------------------|
//! | `uint`  | `u32`        | `id`                  |
//! | `float` | `f32`        | `Z`, `ZBack`, masks   |
//! | `vec3`  | [`Vec3`]     | `P`, `N`              |
//! | `vec4`  | [`Vec4`]     | `rgba` (premultiplied)|
//!
//! [`Channel<T>`] is the statically-typed storage, generic over
//! [`SampleValue`]. [`AnyChannel`] is the tagged union the image keeps in its
//! channel map, so operations that do not care about the value type (append,
//! reorder, clone, create-same-type, copy) can run over every channel at once.
//!
//! # Storage
//!
//! Each pixel owns a `SmallVec<[T; 4]>`. Pixels with up to four samples stay
//! inline; deeper pixels spill to the heap and grow in place.
//!
//! Channels never change their own lengths through the public API. Lengths
//! move only through [`crate::DeepImage`], which keeps every channel in
//! lock-step with the pixel grid.

use std::fmt;

use glam::{Vec3, Vec4};
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::grid::DeepPixelGrid;
use crate::reorder::SwapPlan;

/// Sample array of one pixel.
pub type SampleArray<T> = SmallVec<[T; 4]>;

/// The value type stored by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Unsigned 32-bit integer (object ids).
    UInt,
    /// Scalar 32-bit float (depth, masks).
    Float,
    /// Three-component float vector (position, normal).
    Vec3,
    /// Four-component float vector (premultiplied RGBA).
    Vec4,
}

impl ChannelKind {
    /// Number of scalar components a value of this kind has.
    #[inline]
    pub const fn components(self) -> usize {
        match self {
            Self::UInt | Self::Float => 1,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
        }
    }

    /// Lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for u32 {}
    impl Sealed for f32 {}
    impl Sealed for glam::Vec3 {}
    impl Sealed for glam::Vec4 {}
}

/// A value type a channel can store.
///
/// Implemented for `u32`, `f32`, [`Vec3`] and [`Vec4`] only.
pub trait SampleValue:
    sealed::Sealed + Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// Kind tag of this value type.
    const KIND: ChannelKind;

    /// Scalar component `index` as `f32`.
    ///
    /// `index` must be below `Self::KIND.components()`.
    fn component(&self, index: usize) -> f32;

    /// Borrows the typed channel out of an [`AnyChannel`] of the same kind.
    fn from_any(channel: &AnyChannel) -> Option<&Channel<Self>>;

    /// Mutably borrows the typed channel out of an [`AnyChannel`].
    fn from_any_mut(channel: &mut AnyChannel) -> Option<&mut Channel<Self>>;

    /// Wraps a typed channel.
    fn into_any(channel: Channel<Self>) -> AnyChannel;
}

macro_rules! impl_sample_value {
    ($ty:ty, $variant:ident, |$v:ident, $i:ident| $component:expr) => {
        impl SampleValue for $ty {
            const KIND: ChannelKind = ChannelKind::$variant;

            #[inline]
            fn component(&self, $i: usize) -> f32 {
                let $v = self;
                $component
            }

            #[inline]
            fn from_any(channel: &AnyChannel) -> Option<&Channel<Self>> {
                match channel {
                    AnyChannel::$variant(c) => Some(c),
                    _ => None,
                }
            }

            #[inline]
            fn from_any_mut(channel: &mut AnyChannel) -> Option<&mut Channel<Self>> {
                match channel {
                    AnyChannel::$variant(c) => Some(c),
                    _ => None,
                }
            }

            #[inline]
            fn into_any(channel: Channel<Self>) -> AnyChannel {
                AnyChannel::$variant(channel)
            }
        }
    };
}

impl_sample_value!(u32, UInt, |v, _i| *v as f32);
impl_sample_value!(f32, Float, |v, _i| *v);
impl_sample_value!(Vec3, Vec3, |v, i| v[i]);
impl_sample_value!(Vec4, Vec4, |v, i| v[i]);

/// Per-pixel sample arrays of one value type.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel<T: SampleValue> {
    width: u32,
    height: u32,
    pixels: Vec<SampleArray<T>>,
}

impl<T: SampleValue> Channel<T> {
    /// Creates a channel sized to `grid`, every sample set to `T::default()`.
    pub fn new(grid: &DeepPixelGrid) -> Self {
        let pixels = grid
            .counts()
            .iter()
            .map(|&count| SmallVec::from_elem(T::default(), count as usize))
            .collect();
        Self {
            width: grid.width(),
            height: grid.height(),
            pixels,
        }
    }

    /// Creates an empty channel of the same value type, sized to `grid`.
    ///
    /// Used when building a derived image that receives copied samples.
    pub fn create_same_type(&self, grid: &DeepPixelGrid) -> Self {
        Self::new(grid)
    }

    /// Value type of this channel.
    #[inline]
    pub fn kind(&self) -> ChannelKind {
        T::KIND
    }

    /// Channel width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Channel height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
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

    /// Samples of pixel `(x, y)`.
    #[inline]
    pub fn samples(&self, x: u32, y: u32) -> &[T] {
        &self.pixels[self.index(x, y)]
    }

    /// Mutable samples of pixel `(x, y)`. The length cannot change.
    #[inline]
    pub fn samples_mut(&mut self, x: u32, y: u32) -> &mut [T] {
        let index = self.index(x, y);
        &mut self.pixels[index]
    }

    /// Samples by row-major pixel index.
    #[inline]
    pub fn samples_at(&self, index: usize) -> &[T] {
        &self.pixels[index]
    }

    /// Mutable samples by row-major pixel index.
    #[inline]
    pub fn samples_at_mut(&mut self, index: usize) -> &mut [T] {
        &mut self.pixels[index]
    }

    /// Number of samples stored at `(x, y)`.
    #[inline]
    pub fn len(&self, x: u32, y: u32) -> usize {
        self.samples(x, y).len()
    }

    /// Value of sample `s` at `(x, y)`.
    #[inline]
    pub fn get(&self, x: u32, y: u32, s: usize) -> T {
        self.samples(x, y)[s]
    }

    /// Sets sample `s` at `(x, y)`.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, s: usize, value: T) {
        self.samples_mut(x, y)[s] = value;
    }

    /// Copies every sample of `src` at `(x, y)` into this channel starting
    /// at `dest_start`.
    ///
    /// # Errors
    ///
    /// - [`Error::DimensionMismatch`] if the channels differ in resolution
    /// - [`Error::OutOfBounds`] for coordinates outside the channel
    /// - [`Error::SampleRange`] if the copy would overrun this pixel
    pub fn copy_samples_from(&mut self, src: &Channel<T>, x: u32, y: u32, dest_start: usize) -> Result<()> {
        if self.width != src.width || self.height != src.height {
            return Err(Error::dimension_mismatch(
                (self.width, self.height),
                (src.width, src.height),
            ));
        }
        if x >= self.width || y >= self.height {
            return Err(Error::out_of_bounds(x, y, self.width, self.height));
        }
        let source = src.samples(x, y);
        let dest = self.samples_mut(x, y);
        let end = dest_start
            .checked_add(source.len())
            .filter(|&end| end <= dest.len());
        let Some(end) = end else {
            return Err(Error::SampleRange {
                x,
                y,
                start: dest_start,
                len: source.len(),
                count: dest.len(),
            });
        };
        dest[dest_start..end].copy_from_slice(source);
        Ok(())
    }

    /// Appends a default sample to the pixel at `index`.
    #[inline]
    pub(crate) fn push_default(&mut self, index: usize) {
        self.pixels[index].push(T::default());
    }

    /// Replays a reorder plan against the pixel at `index`.
    #[inline]
    pub(crate) fn apply_plan(&mut self, index: usize, plan: &SwapPlan) {
        plan.apply(self.pixels[index].as_mut_slice());
    }

    /// All per-pixel arrays, row-major.
    #[inline]
    pub(crate) fn pixels_mut(&mut self) -> &mut [SampleArray<T>] {
        &mut self.pixels
    }
}

/// A channel of any supported value type.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyChannel {
    /// `u32` samples.
    UInt(Channel<u32>),
    /// `f32` samples.
    Float(Channel<f32>),
    /// [`Vec3`] samples.
    Vec3(Channel<Vec3>),
    /// [`Vec4`] samples.
    Vec4(Channel<Vec4>),
}

macro_rules! dispatch {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            AnyChannel::UInt($c) => $body,
            AnyChannel::Float($c) => $body,
            AnyChannel::Vec3($c) => $body,
            AnyChannel::Vec4($c) => $body,
        }
    };
}

impl AnyChannel {
    /// Creates a default-filled channel of `kind` sized to `grid`.
    pub fn with_kind(kind: ChannelKind, grid: &DeepPixelGrid) -> Self {
        match kind {
            ChannelKind::UInt => Self::UInt(Channel::new(grid)),
            ChannelKind::Float => Self::Float(Channel::new(grid)),
            ChannelKind::Vec3 => Self::Vec3(Channel::new(grid)),
            ChannelKind::Vec4 => Self::Vec4(Channel::new(grid)),
        }
    }

    /// Value type of the wrapped channel.
    pub fn kind(&self) -> ChannelKind {
        dispatch!(self, c => c.kind())
    }

    /// Empty channel of the same value type sized to `grid`.
    pub fn create_same_type(&self, grid: &DeepPixelGrid) -> Self {
        Self::with_kind(self.kind(), grid)
    }

    /// Number of samples stored at `(x, y)`.
    pub fn len(&self, x: u32, y: u32) -> usize {
        dispatch!(self, c => c.len(x, y))
    }

    /// Copies `src`'s samples at `(x, y)` into this channel from `dest_start`.
    ///
    /// `name` only labels the error.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelType`] if the two channels store different types,
    /// plus everything [`Channel::copy_samples_from`] returns.
    pub fn copy_samples_from(
        &mut self,
        name: &str,
        src: &AnyChannel,
        x: u32,
        y: u32,
        dest_start: usize,
    ) -> Result<()> {
        match (self, src) {
            (Self::UInt(d), Self::UInt(s)) => d.copy_samples_from(s, x, y, dest_start),
            (Self::Float(d), Self::Float(s)) => d.copy_samples_from(s, x, y, dest_start),
            (Self::Vec3(d), Self::Vec3(s)) => d.copy_samples_from(s, x, y, dest_start),
            (Self::Vec4(d), Self::Vec4(s)) => d.copy_samples_from(s, x, y, dest_start),
            (d, s) => Err(Error::channel_type(name, d.kind(), s.kind())),
        }
    }

    pub(crate) fn push_default(&mut self, index: usize) {
        dispatch!(self, c => c.push_default(index))
    }

    pub(crate) fn apply_plan(&mut self, index: usize, plan: &SwapPlan) {
        dispatch!(self, c => c.apply_plan(index, plan))
    }

    /// Replays per-pixel plans over every pixel, in parallel.
    pub(crate) fn apply_plans(&mut self, plans: &[Option<SwapPlan>]) {
        use rayon::prelude::*;

        dispatch!(self, c => {
            c.pixels_mut()
                .par_iter_mut()
                .zip(plans.par_iter())
                .for_each(|(samples, plan)| {
                    if let Some(plan) = plan {
                        plan.apply(samples.as_mut_slice());
                    }
                })
        })
    }

    /// Sample count of the pixel at `index`.
    pub(crate) fn len_at(&self, index: usize) -> usize {
        dispatch!(self, c => c.samples_at(index).len())
    }
}

impl<T: SampleValue> From<Channel<T>> for AnyChannel {
    fn from(channel: Channel<T>) -> Self {
        T::into_any(channel)
    }
}
