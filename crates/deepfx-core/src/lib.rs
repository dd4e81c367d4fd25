//! # deepfx-core
//!
//! Deep image data model for post-render compositing.
//!
//! A deep image stores, per pixel, a variable-length list of partially
//! transparent samples instead of one RGBA value. This crate provides:
//!
//! - [`DeepPixelGrid`] - per-pixel sample counts, the single source of truth
//! - [`Channel`], [`AnyChannel`] - typed per-sample storage (`uint`, `float`, `vec3`, `vec4`)
//! - [`DeepImage`] - grid + named channels + [`Attrs`], with append, reorder and depth sort
//! - [`SwapPlan`] - in-place multi-channel reordering via cycle decomposition
//! - [`ScalarSource`], [`ScalarProjection`] - "one float per sample" views
//! - [`FlatImage`] and [`composite`] - flattened output and premultiplied over
//!
//! ## Invariant
//!
//! Every channel's sample array at `(x, y)` has exactly `count(x, y)` entries
//! whenever control is outside a [`DeepImage`] method. Appending extends all
//! channels first and commits the count last. Reordering replays one swap plan
//! against every channel.
//!
//! ## Crate Structure
//!
//! ```text
//! deepfx-core (this crate)
//!    ^
//!    |
//!    +-- deepfx-ops (distance field, strokes, decomposition, merge)
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod attrs;
pub mod channel;
pub mod composite;
pub mod error;
pub mod flat;
pub mod grid;
pub mod image;
pub mod projection;
pub mod reorder;

// Re-exports for convenience
pub use attrs::{AttrValue, Attrs, DisplayWindow};
pub use channel::{AnyChannel, Channel, ChannelKind, SampleArray, SampleValue};
pub use error::{Error, Result};
pub use flat::FlatImage;
pub use grid::DeepPixelGrid;
pub use image::{DeepImage, DeepStats, SampleInit, names};
pub use projection::{ComponentView, ScalarProjection, ScalarSource};
pub use reorder::{SwapPlan, depth_order};

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```
/// use deepfx_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::attrs::{AttrValue, Attrs, DisplayWindow};
    pub use crate::channel::{AnyChannel, Channel, ChannelKind, SampleValue};
    pub use crate::composite::{ALPHA_EPSILON, over, unpremultiply};
    pub use crate::error::{Error, Result};
    pub use crate::flat::FlatImage;
    pub use crate::grid::DeepPixelGrid;
    pub use crate::image::{DeepImage, DeepStats, SampleInit, names};
    pub use crate::projection::{ScalarProjection, ScalarSource};
    pub use crate::reorder::{SwapPlan, depth_order};
}
