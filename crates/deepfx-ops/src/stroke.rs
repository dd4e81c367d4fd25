//! Depth-aware stroke synthesis.
//!
//! A stroke outlines one or more objects by inserting new deep samples around
//! them. Because the strokes are real samples at real depths, anything nearer
//! than the outlined object still occludes its stroke after the image is
//! flattened.
//!
//! # Pipeline
//!
//! 1. **Coverage**: the outline pass flattens only the target objects'
//!    samples. The intersection pass, when `intersections` is set, uses the
//!    discontinuity mask from [`intersection_coverage`]. Each enabled pass runs
//!    steps 2 to 5 on its own coverage.
//! 2. **Distance**: [`DistanceField::from_coverage`] gives every pixel its
//!    distance to the coverage and the nearest covered pixel (the *donor*).
//! 3. **Falloff**: [`stroke_alpha`] turns distance into opacity.
//! 4. **Depth**: the stroke sits at `min(donor depth, destination depth) - camera_bias`,
//!    where each depth is the nearest target-object sample at that pixel.
//! 5. **Visibility**: target and output-id samples at or nearer than the donor
//!    depth are accumulated front to back. The stroke goes *under* that
//!    accumulation; the emitted sample carries only the stroke's share of the
//!    mix, `stroke * (1 - above.a)`.
//! 6. **Insert**: samples from every pass are appended after the whole image
//!    has been evaluated, then the image is flagged for a re-sort.
//!
//! # Example
//!
//! ```rust
//! use deepfx_core::{Channel, DeepImage, SampleInit, names};
//! use deepfx_ops::stroke::{StrokeConfig, synthesize_stroke};
//! use glam::Vec4;
//!
//! let mut image = DeepImage::new(9, 9);
//! image.push_sample(4, 4, SampleInit::new(Vec4::new(1.0, 0.0, 0.0, 1.0), 5.0, 1)).unwrap();
//!
//! let config = StrokeConfig {
//!     objects: vec![1],
//!     radius: 2.0,
//!     ..Default::default()
//! };
//! let report = synthesize_stroke(&mut image, &config).unwrap();
//! assert!(report.samples_added > 0);
//! assert!(image.needs_sort());
//! ```

use glam::Vec4;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace};

use deepfx_core::composite::over;
use deepfx_core::{Channel, DeepImage, SampleInit, names};

use crate::distance::DistanceField;
use crate::parallel::map_indices;
use crate::{OpsError, OpsResult};

pub use crate::intersection::{IntersectionConfig, intersection_coverage};

/// Opacity below which a stroke sample is not emitted.
pub const NEGLIGIBLE_ALPHA: f32 = 0.00001;

/// Accumulated alpha at which the stroke is fully hidden.
const OPAQUE_ALPHA: f32 = 1.0 - 1e-6;

/// Stroke parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokeConfig {
    /// Object ids to outline.
    pub objects: Vec<u32>,
    /// Id written to the stroke samples. Defaults to the first object.
    pub output_id: Option<u32>,
    /// Full-opacity radius in pixels.
    pub radius: f32,
    /// Linear falloff width beyond `radius`, in pixels.
    pub fade: f32,
    /// Straight (not premultiplied) RGBA.
    pub color: [f32; 4],
    /// Depth pulled toward the camera.
    pub camera_bias: f32,
    /// Outline the object silhouettes.
    pub outline: bool,
    /// Also outline depth discontinuities inside the objects.
    pub intersections: Option<IntersectionConfig>,
}

impl Default for StrokeConfig {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            output_id: None,
            radius: 1.0,
            fade: 0.0,
            color: [0.0, 0.0, 0.0, 1.0],
            camera_bias: 0.01,
            outline: true,
            intersections: None,
        }
    }
}

impl StrokeConfig {
    /// Checks parameter ranges.
    ///
    /// # Errors
    ///
    /// [`OpsError::InvalidParameter`] describing the first bad value.
    pub fn validate(&self) -> OpsResult<()> {
        if self.objects.is_empty() {
            return Err(OpsError::InvalidParameter("stroke needs at least one object id".into()));
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(OpsError::InvalidParameter(format!(
                "stroke radius must be > 0, got {}",
                self.radius
            )));
        }
        if !(self.fade.is_finite() && self.fade >= 0.0) {
            return Err(OpsError::InvalidParameter(format!(
                "stroke fade must be >= 0, got {}",
                self.fade
            )));
        }
        let alpha = self.color[3];
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(OpsError::InvalidParameter(format!(
                "stroke alpha must be in (0, 1], got {}",
                alpha
            )));
        }
        if !self.camera_bias.is_finite() {
            return Err(OpsError::InvalidParameter("camera bias must be finite".into()));
        }
        if !self.outline && self.intersections.is_none() {
            return Err(OpsError::InvalidParameter(
                "stroke needs outline, intersections, or both".into(),
            ));
        }
        if let Some(intersections) = &self.intersections {
            intersections.validate()?;
        }
        Ok(())
    }

    /// Id the stroke samples are written with.
    pub fn effective_output_id(&self) -> Option<u32> {
        self.output_id.or_else(|| self.objects.first().copied())
    }

    /// Premultiplied stroke color at `falloff` opacity.
    fn premultiplied(&self, falloff: f32) -> Vec4 {
        let a = self.color[3] * falloff;
        Vec4::new(self.color[0] * a, self.color[1] * a, self.color[2] * a, a)
    }
}

/// Outcome of one stroke pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrokeReport {
    /// Samples appended to the image.
    pub samples_added: usize,
    /// Pixels where the stroke was fully hidden by the object, counted once
    /// per pass.
    pub occluded_pixels: usize,
}

/// Stroke opacity fraction at `distance` from the object.
///
/// 1 within `radius`, 0 at `radius + fade` and beyond, linear in between.
/// A zero `fade` gives a hard edge.
#[inline]
pub fn stroke_alpha(distance: f32, radius: f32, fade: f32) -> f32 {
    if distance <= radius {
        1.0
    } else if fade <= 0.0 || distance >= radius + fade {
        0.0
    } else {
        1.0 - (distance - radius) / fade
    }
}

/// Result of evaluating one destination pixel.
enum PixelStroke {
    Skip,
    Occluded,
    Emit(Vec4, f32),
}

/// Channels and per-pixel object depths shared by every pass.
struct StrokeContext<'a> {
    config: &'a StrokeConfig,
    output_id: u32,
    width: usize,
    rgba: &'a Channel<Vec4>,
    ids: &'a Channel<u32>,
    depths: &'a Channel<f32>,
    object_depth: Vec<Option<f32>>,
}

impl<'a> StrokeContext<'a> {
    fn new(image: &'a DeepImage, config: &'a StrokeConfig, output_id: u32) -> OpsResult<Self> {
        let rgba = image.channel::<Vec4>(names::RGBA)?;
        let ids = image.channel::<u32>(names::ID)?;
        let depths = image.channel::<f32>(names::Z)?;
        let pixels = image.width() as usize * image.height() as usize;

        let object_depth = map_indices(pixels, |i| {
            depths
                .samples_at(i)
                .iter()
                .zip(ids.samples_at(i))
                .filter(|&(_, &id)| config.objects.contains(&id))
                .map(|(&z, _)| z)
                .reduce(f32::min)
        });

        Ok(Self {
            config,
            output_id,
            width: image.width() as usize,
            rgba,
            ids,
            depths,
            object_depth,
        })
    }

    fn is_object(&self, id: u32) -> bool {
        self.config.objects.contains(&id)
    }

    /// Evaluates every pixel against one distance field.
    fn evaluate(&self, field: &DistanceField) -> Vec<PixelStroke> {
        map_indices(self.object_depth.len(), |i| self.evaluate_pixel(field, i))
    }

    fn evaluate_pixel(&self, field: &DistanceField, i: usize) -> PixelStroke {
        let config = self.config;
        let (x, y) = ((i % self.width) as u32, (i / self.width) as u32);
        let falloff = stroke_alpha(field.distance(x, y), config.radius, config.fade);
        if falloff * config.color[3] < NEGLIGIBLE_ALPHA {
            return PixelStroke::Skip;
        }
        let Some((nx, ny)) = field.nearest(x, y) else {
            return PixelStroke::Skip;
        };

        let donor = self.object_depth[ny as usize * self.width + nx as usize].unwrap_or(f32::MAX);
        let dest = self.object_depth[i].unwrap_or(f32::INFINITY);
        let z = donor.min(dest) - config.camera_bias;

        // Front to back: stored order is farthest first.
        let mut above = Vec4::ZERO;
        for ((&s, &id), &sz) in self
            .rgba
            .samples_at(i)
            .iter()
            .zip(self.ids.samples_at(i))
            .zip(self.depths.samples_at(i))
            .rev()
        {
            if (self.is_object(id) || id == self.output_id) && sz <= donor {
                above = over(above, s);
                if above.w >= OPAQUE_ALPHA {
                    return PixelStroke::Occluded;
                }
            }
        }

        let mixed = over(above, config.premultiplied(falloff));
        if mixed.w < NEGLIGIBLE_ALPHA {
            return PixelStroke::Skip;
        }
        let contribution = mixed - above;
        if contribution.w < NEGLIGIBLE_ALPHA {
            return PixelStroke::Skip;
        }
        PixelStroke::Emit(contribution, z)
    }
}

/// Adds stroke samples around `config.objects`.
///
/// Requires `rgba` (vec4), `id` (uint) and `Z` (float). `ZBack` is written
/// when present. The image is sorted first if flagged, and left flagged
/// unsorted when anything was added.
///
/// With both `outline` and `intersections` enabled, each pass is evaluated
/// against the unmodified image and a pixel may receive one sample from each.
///
/// # Errors
///
/// Configuration errors from [`StrokeConfig::validate`], schema errors for
/// missing channels, and everything [`intersection_coverage`] returns.
pub fn synthesize_stroke(image: &mut DeepImage, config: &StrokeConfig) -> OpsResult<StrokeReport> {
    config.validate()?;
    let output_id = config
        .effective_output_id()
        .ok_or_else(|| OpsError::InvalidParameter("stroke needs at least one object id".into()))?;

    let (width, height) = (image.width(), image.height());
    debug!(
        width,
        height,
        radius = config.radius,
        fade = config.fade,
        objects = ?config.objects,
        output_id,
        outline = config.outline,
        intersections = config.intersections.is_some(),
        "Synthesizing stroke"
    );

    image.ensure_sorted()?;

    let mut coverages: SmallVec<[Vec<f32>; 2]> = SmallVec::new();
    if config.outline {
        coverages.push(image.flatten_filtered(|id| config.objects.contains(&id))?.alpha());
    }
    if let Some(intersections) = &config.intersections {
        coverages.push(intersection_coverage(image, config, intersections)?);
    }

    let passes = {
        let context = StrokeContext::new(image, config, output_id)?;
        let mut passes = Vec::with_capacity(coverages.len());
        for coverage in &coverages {
            let field = DistanceField::from_coverage(width, height, coverage)?;
            passes.push(context.evaluate(&field));
        }
        passes
    };

    let mut report = StrokeReport::default();
    let w = width as usize;
    for pending in passes {
        for (i, stroke) in pending.into_iter().enumerate() {
            match stroke {
                PixelStroke::Skip => {}
                PixelStroke::Occluded => report.occluded_pixels += 1,
                PixelStroke::Emit(rgba, z) => {
                    let (x, y) = ((i % w) as u32, (i / w) as u32);
                    image.push_sample(x, y, SampleInit::new(rgba, z, output_id).with_z_back(z))?;
                    report.samples_added += 1;
                }
            }
        }
    }

    if report.samples_added > 0 {
        image.mark_unsorted();
    }
    trace!(
        samples = report.samples_added,
        occluded = report.occluded_pixels,
        passes = coverages.len(),
        "Stroke samples emitted"
    );
    Ok(report)
}
