//! # deepfx-ops
//!
//! Processing operations over [`deepfx_core::DeepImage`].
//!
//! # Modules
//!
//! - [`distance`] - Exact Euclidean distance transform with nearest-seed tracking
//! - [`stroke`] - Depth-aware outline and intersection strokes
//! - [`decompose`] - Split a deep image into additive per-object layers
//! - [`merge`] - Concatenate deep images sample-wise
//! - [`config`] - YAML pipeline configuration
//! - [`pipeline`] - Stroke + decomposition driver
//!
//! # Example
//!
//! ```rust
//! use deepfx_core::{DeepImage, FlatImage, SampleInit};
//! use deepfx_ops::decompose::{LayerMap, decompose};
//! use glam::Vec4;
//!
//! let mut image = DeepImage::new(2, 1);
//! image.push_sample(0, 0, SampleInit::new(Vec4::new(1.0, 0.0, 0.0, 1.0), 1.0, 1)).unwrap();
//! image.push_sample(1, 0, SampleInit::new(Vec4::new(0.0, 0.0, 1.0, 1.0), 1.0, 2)).unwrap();
//!
//! let layers = decompose(&mut image, &LayerMap::new(0, [(1, 1), (2, 2)])).unwrap();
//! let images: Vec<FlatImage> = layers.iter().map(|l| l.image.clone()).collect();
//! let sum = FlatImage::sum(&images).unwrap();
//! assert_eq!(sum, image.flatten().unwrap());
//! ```
//!
//! # Feature Flags
//!
//! - `parallel` (default) - run distance field passes and per-pixel analysis with rayon

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod intersection;
mod parallel;

pub mod config;
pub mod decompose;
pub mod distance;
pub mod merge;
pub mod pipeline;
pub mod stroke;

pub use config::{LayerConfig, PipelineConfig};
pub use decompose::{Layer, LayerMap};
pub use distance::DistanceField;
pub use error::{OpsError, OpsResult};
pub use pipeline::run_pipeline;
pub use stroke::{IntersectionConfig, StrokeConfig, StrokeReport};
