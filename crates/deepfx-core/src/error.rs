//! Error types for deepfx-core operations.
//!
//! Every failure in the deep data model falls into one of two groups:
//!
//! - **Schema errors**: a channel the operation needs is missing, or exists
//!   with a different value type ([`Error::MissingChannel`], [`Error::ChannelType`]).
//! - **Configuration errors**: the caller asked for something that cannot be
//!   satisfied (bad permutation, missing camera attribute, out-of-range copy).
//!
//! Lookups never hand back a null-like default. A caller that can live without
//! a channel asks for it through [`crate::DeepImage::try_channel`] and gets an
//! explicit `Option`.
//!
//! # Usage
//!
//! ```rust
//! use deepfx_core::{DeepImage, Error};
//!
//! let image = DeepImage::new(4, 4);
//! let err = image.channel::<f32>("Z").unwrap_err();
//! assert!(matches!(err, Error::MissingChannel { .. }));
//! assert!(err.is_schema_error());
//! ```

use thiserror::Error;

use crate::channel::ChannelKind;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the deep pixel store and its helpers.
#[derive(Debug, Error)]
pub enum Error {
    /// A required channel does not exist.
    #[error("channel '{name}' not found")]
    MissingChannel {
        /// Requested channel name
        name: String,
    },

    /// A channel exists but stores a different value type.
    #[error("channel '{name}' has type {found}, expected {expected}")]
    ChannelType {
        /// Channel name
        name: String,
        /// Type the caller asked for
        expected: ChannelKind,
        /// Type actually stored
        found: ChannelKind,
    },

    /// Two images (or an image and a buffer) disagree on resolution.
    #[error("dimension mismatch: {a_width}x{a_height} vs {b_width}x{b_height}")]
    DimensionMismatch {
        /// First width
        a_width: u32,
        /// First height
        a_height: u32,
        /// Second width
        b_width: u32,
        /// Second height
        b_height: u32,
    },

    /// Pixel coordinates are outside the image.
    #[error("pixel ({x}, {y}) out of bounds for image {width}x{height}")]
    OutOfBounds {
        /// X coordinate
        x: u32,
        /// Y coordinate
        y: u32,
        /// Image width
        width: u32,
        /// Image height
        height: u32,
    },

    /// A sample copy would run past the end of a pixel's sample array.
    #[error("copying {len} samples to ({x}, {y}) at offset {start} overruns {count} samples")]
    SampleRange {
        /// X coordinate
        x: u32,
        /// Y coordinate
        y: u32,
        /// First destination index
        start: usize,
        /// Number of samples copied
        len: usize,
        /// Samples available at the destination pixel
        count: usize,
    },

    /// A reorder target is not a permutation of `0..n`.
    #[error("invalid permutation: {0}")]
    InvalidPermutation(String),

    /// A per-pixel sample count table does not fit the image.
    #[error("invalid sample counts: {0}")]
    InvalidCounts(String),

    /// A required attribute is missing from the attribute bag.
    #[error("attribute '{name}' not found")]
    MissingAttribute {
        /// Attribute key
        name: String,
    },

    /// An attribute exists but holds a different kind of value.
    #[error("attribute '{name}' is a {found}, expected {expected}")]
    AttributeType {
        /// Attribute key
        name: String,
        /// Expected value kind
        expected: &'static str,
        /// Stored value kind
        found: &'static str,
    },

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates an [`Error::MissingChannel`] error.
    #[inline]
    pub fn missing_channel(name: impl Into<String>) -> Self {
        Self::MissingChannel { name: name.into() }
    }

    /// Creates an [`Error::ChannelType`] error.
    #[inline]
    pub fn channel_type(name: impl Into<String>, expected: ChannelKind, found: ChannelKind) -> Self {
        Self::ChannelType {
            name: name.into(),
            expected,
            found,
        }
    }

    /// Creates an [`Error::DimensionMismatch`] error.
    #[inline]
    pub fn dimension_mismatch(a: (u32, u32), b: (u32, u32)) -> Self {
        Self::DimensionMismatch {
            a_width: a.0,
            a_height: a.1,
            b_width: b.0,
            b_height: b.1,
        }
    }

    /// Creates an [`Error::OutOfBounds`] error.
    #[inline]
    pub fn out_of_bounds(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self::OutOfBounds {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates an [`Error::MissingAttribute`] error.
    #[inline]
    pub fn missing_attribute(name: impl Into<String>) -> Self {
        Self::MissingAttribute { name: name.into() }
    }

    /// Creates an [`Error::Other`] error.
    #[inline]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Returns `true` if a channel is missing or has the wrong type.
    #[inline]
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::MissingChannel { .. } | Self::ChannelType { .. })
    }

    /// Returns `true` for invalid parameters or missing configuration.
    #[inline]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPermutation(_)
                | Self::InvalidCounts(_)
                | Self::SampleRange { .. }
                | Self::MissingAttribute { .. }
                | Self::AttributeType { .. }
        )
    }
}
