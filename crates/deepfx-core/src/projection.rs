//! Scalar views over typed channels.
//!
//! Many algorithms only need "one number per sample": alpha is component 3 of
//! `rgba`, a mask is a `float` channel, a position axis is one component of
//! `P`. [`ScalarSource`] is that interface.
//!
//! Two implementations exist:
//!
//! - [`ComponentView`]: statically typed, built from a [`Channel<T>`].
//! - [`ScalarProjection`]: resolved once from a channel name at runtime via
//!   [`crate::DeepImage::projection`], then read without re-checking types.

use crate::channel::{AnyChannel, Channel, ChannelKind, SampleValue};
use crate::error::{Error, Result};

/// Read-only per-sample scalar access.
pub trait ScalarSource {
    /// Number of samples at `(x, y)`.
    fn count(&self, x: u32, y: u32) -> usize;

    /// Scalar value of sample `s` at `(x, y)`.
    fn get(&self, x: u32, y: u32, s: usize) -> f32;
}

/// One component of a typed channel.
#[derive(Debug, Clone, Copy)]
pub struct ComponentView<'a, T: SampleValue> {
    channel: &'a Channel<T>,
    component: usize,
}

impl<'a, T: SampleValue> ComponentView<'a, T> {
    /// Component index this view reads.
    #[inline]
    pub fn component(&self) -> usize {
        self.component
    }
}

impl<T: SampleValue> ScalarSource for ComponentView<'_, T> {
    #[inline]
    fn count(&self, x: u32, y: u32) -> usize {
        self.channel.len(x, y)
    }

    #[inline]
    fn get(&self, x: u32, y: u32, s: usize) -> f32 {
        self.channel.get(x, y, s).component(self.component)
    }
}

impl<T: SampleValue> Channel<T> {
    /// View of component `index`, or `None` past the type's arity.
    pub fn component(&self, index: usize) -> Option<ComponentView<'_, T>> {
        (index < T::KIND.components()).then_some(ComponentView {
            channel: self,
            component: index,
        })
    }
}

/// Runtime-resolved scalar view over any channel kind.
#[derive(Debug, Clone, Copy)]
pub enum ScalarProjection<'a> {
    /// Over a `uint` channel
    UInt(ComponentView<'a, u32>),
    /// Over a `float` channel
    Float(ComponentView<'a, f32>),
    /// Over one component of a `vec3` channel
    Vec3(ComponentView<'a, glam::Vec3>),
    /// Over one component of a `vec4` channel
    Vec4(ComponentView<'a, glam::Vec4>),
}

impl<'a> ScalarProjection<'a> {
    /// Binds `channel` to `component`.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelType`] when `component` exceeds the channel's arity.
    pub fn new(name: &str, channel: &'a AnyChannel, component: usize) -> Result<Self> {
        let kind = channel.kind();
        let projection = match channel {
            AnyChannel::UInt(c) => c.component(component).map(Self::UInt),
            AnyChannel::Float(c) => c.component(component).map(Self::Float),
            AnyChannel::Vec3(c) => c.component(component).map(Self::Vec3),
            AnyChannel::Vec4(c) => c.component(component).map(Self::Vec4),
        };
        projection.ok_or_else(|| {
            // Report the smallest kind that has the requested component.
            let expected = if component < 3 {
                ChannelKind::Vec3
            } else {
                ChannelKind::Vec4
            };
            Error::channel_type(name, expected, kind)
        })
    }
}

impl ScalarSource for ScalarProjection<'_> {
    #[inline]
    fn count(&self, x: u32, y: u32) -> usize {
        match self {
            Self::UInt(v) => v.count(x, y),
            Self::Float(v) => v.count(x, y),
            Self::Vec3(v) => v.count(x, y),
            Self::Vec4(v) => v.count(x, y),
        }
    }

    #[inline]
    fn get(&self, x: u32, y: u32, s: usize) -> f32 {
        match self {
            Self::UInt(v) => v.get(x, y, s),
            Self::Float(v) => v.get(x, y, s),
            Self::Vec3(v) => v.get(x, y, s),
            Self::Vec4(v) => v.get(x, y, s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::DeepPixelGrid;
    use glam::Vec4;

    fn rgba_channel() -> Channel<Vec4> {
        let grid = DeepPixelGrid::from_counts(1, 1, vec![2]).unwrap();
        let mut channel = Channel::new(&grid);
        channel.set(0, 0, 0, Vec4::new(0.1, 0.2, 0.3, 0.4));
        channel.set(0, 0, 1, Vec4::new(0.5, 0.6, 0.7, 0.8));
        channel
    }

    #[test]
    fn test_component_view_alpha() {
        let channel = rgba_channel();
        let alpha = channel.component(3).unwrap();
        assert_eq!(alpha.count(0, 0), 2);
        assert_eq!(alpha.get(0, 0, 1), 0.8);
        assert!(channel.component(4).is_none());
    }

    #[test]
    fn test_projection_from_any() {
        let any = AnyChannel::from(rgba_channel());
        let proj = ScalarProjection::new("rgba", &any, 0).unwrap();
        assert_eq!(proj.get(0, 0, 0), 0.1);
    }

    #[test]
    fn test_projection_arity_error() {
        let grid = DeepPixelGrid::from_counts(1, 1, vec![1]).unwrap();
        let any = AnyChannel::with_kind(ChannelKind::Float, &grid);
        let err = ScalarProjection::new("mask", &any, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::ChannelType {
                found: ChannelKind::Float,
                ..
            }
        ));
    }
}
