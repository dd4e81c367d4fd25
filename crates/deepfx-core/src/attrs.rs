//! Image-level attributes: camera matrices and display window.
//!
//! A deep render carries the cameras it was made with. Operations that work in
//! world space (the intersection stroke) read them back from an [`Attrs`] bag:
//!
//! - [`WORLD_TO_CAMERA`]: world space to camera space, 4x4.
//! - [`WORLD_TO_NDC`]: world space to normalized device coordinates, 4x4.
//!   NDC spans `[-1, 1]` on both axes.
//! - [`DISPLAY_WINDOW`]: inclusive integer pixel rectangle of the display.
//!
//! # Example
//!
//! ```rust
//! use deepfx_core::{Attrs, DisplayWindow, attrs};
//! use glam::Mat4;
//!
//! let mut bag = Attrs::new();
//! bag.set(attrs::WORLD_TO_CAMERA, Mat4::IDENTITY);
//! bag.set(attrs::DISPLAY_WINDOW, DisplayWindow::from_size(1920, 1080));
//!
//! assert_eq!(bag.matrix(attrs::WORLD_TO_CAMERA).unwrap(), Mat4::IDENTITY);
//! assert_eq!(bag.display_window().unwrap().width(), 1920);
//! ```

use std::collections::BTreeMap;

use glam::Mat4;

use crate::error::{Error, Result};

/// World to camera matrix key.
pub const WORLD_TO_CAMERA: &str = "worldToCamera";
/// World to NDC matrix key.
pub const WORLD_TO_NDC: &str = "worldToNDC";
/// Display window key.
pub const DISPLAY_WINDOW: &str = "displayWindow";

/// Inclusive pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayWindow {
    /// Minimum x (inclusive)
    pub min_x: i32,
    /// Minimum y (inclusive)
    pub min_y: i32,
    /// Maximum x (inclusive)
    pub max_x: i32,
    /// Maximum y (inclusive)
    pub max_y: i32,
}

impl DisplayWindow {
    /// Window covering `0..width` by `0..height`.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            min_x: 0,
            min_y: 0,
            max_x: width as i32 - 1,
            max_y: height as i32 - 1,
        }
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        (self.max_x - self.min_x + 1).max(0) as u32
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        (self.max_y - self.min_y + 1).max(0) as u32
    }
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// UTF-8 string
    Str(String),
    /// Signed integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// 4x4 matrix
    Matrix(Mat4),
    /// Pixel rectangle
    Window(DisplayWindow),
}

impl AttrValue {
    /// Type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Str(_) => "string",
            AttrValue::Int(_) => "int",
            AttrValue::Float(_) => "float",
            AttrValue::Matrix(_) => "matrix",
            AttrValue::Window(_) => "window",
        }
    }

    /// Tries to get as a matrix.
    #[inline]
    pub fn as_matrix(&self) -> Option<Mat4> {
        match self {
            AttrValue::Matrix(m) => Some(*m),
            _ => None,
        }
    }

    /// Tries to get as a display window.
    #[inline]
    pub fn as_window(&self) -> Option<DisplayWindow> {
        match self {
            AttrValue::Window(w) => Some(*w),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<Mat4> for AttrValue {
    fn from(v: Mat4) -> Self {
        AttrValue::Matrix(v)
    }
}

impl From<DisplayWindow> for AttrValue {
    fn from(v: DisplayWindow) -> Self {
        AttrValue::Window(v)
    }
}

/// Attribute container: string key to typed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attrs {
    map: BTreeMap<String, AttrValue>,
}

impl Attrs {
    /// Creates an empty container.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value, replacing any previous one.
    #[inline]
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.map.insert(key.into(), value.into());
    }

    /// Gets a value by key.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.map.get(key)
    }

    /// Removes a value.
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.map.remove(key)
    }

    /// Checks if a key exists.
    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Number of attributes.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if no attributes are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates (key, value) pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.map.iter()
    }

    /// Reads a required matrix.
    ///
    /// # Errors
    ///
    /// [`Error::MissingAttribute`] if absent, [`Error::AttributeType`] if the
    /// value is not a matrix.
    pub fn matrix(&self, key: &str) -> Result<Mat4> {
        let value = self.get(key).ok_or_else(|| Error::missing_attribute(key))?;
        value.as_matrix().ok_or_else(|| Error::AttributeType {
            name: key.to_string(),
            expected: "matrix",
            found: value.type_name(),
        })
    }

    /// Reads the required display window.
    pub fn display_window(&self) -> Result<DisplayWindow> {
        let value = self
            .get(DISPLAY_WINDOW)
            .ok_or_else(|| Error::missing_attribute(DISPLAY_WINDOW))?;
        value.as_window().ok_or_else(|| Error::AttributeType {
            name: DISPLAY_WINDOW.to_string(),
            expected: "window",
            found: value.type_name(),
        })
    }
}
