//! Depth-discontinuity detection for intersection strokes.
//!
//! An ordinary outline only follows an object's silhouette against the
//! background. Where two surfaces of the outlined objects overlap on screen, the
//! boundary between them shows up as a jump in world position between
//! neighboring pixels. This module turns those jumps into a coverage mask that
//! the stroke synthesizer can outline.
//!
//! For every target-object sample and each of its 4 neighbors that holds
//! target-object samples farther from the camera, the smallest world distance
//! between the sample's `P` and those neighbor `P` values is compared against a
//! screen-space threshold:
//!
//! ```text
//! gap_pixels = world_gap * pixels_per_unit(P)
//! strength   = clamp(gap_pixels / threshold - 1, 0, 1)
//! ```
//!
//! `pixels_per_unit` projects `P` and `P + camera_right` through `worldToNDC`
//! and scales the NDC delta by half the display window, so a fixed world gap
//! counts for less far from the camera. Each sample's strength is weighted by
//! its visibility (its alpha times the transmittance of everything nearer)
//! and by an optional mask, then summed per pixel and clamped to `[0, 1]`.
//!
//! Only the nearer side of a jump is marked. The stroke synthesizer then draws
//! onto the farther surface next to it, the same way an outline draws onto the
//! background next to a silhouette.

use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use deepfx_core::attrs::{WORLD_TO_CAMERA, WORLD_TO_NDC};
use deepfx_core::composite::unpremultiply;
use deepfx_core::{DeepImage, ScalarSource, names};

use crate::parallel::map_indices;
use crate::stroke::StrokeConfig;
use crate::{OpsError, OpsResult};

/// Pixel density below which a sample's scale is treated as degenerate.
const MIN_PIXELS_PER_UNIT: f32 = 1e-8;

/// Intersection detection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionConfig {
    /// World gap, in pixels at the sample's depth, that starts to count.
    pub threshold: f32,
    /// Optional premultiplied scalar channel weighting each sample.
    pub mask: Option<String>,
}

impl Default for IntersectionConfig {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            mask: None,
        }
    }
}

impl IntersectionConfig {
    /// Checks parameter ranges.
    pub fn validate(&self) -> OpsResult<()> {
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(OpsError::InvalidParameter(format!(
                "intersection threshold must be > 0, got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Screen-space scale derived from the image's cameras.
#[derive(Debug, Clone, Copy)]
struct ScreenScale {
    world_to_ndc: Mat4,
    camera_right: Vec3,
    half_width: f32,
    half_height: f32,
}

impl ScreenScale {
    fn from_image(image: &DeepImage) -> OpsResult<Self> {
        let attrs = image.attrs();
        let world_to_camera = attrs.matrix(WORLD_TO_CAMERA)?;
        let world_to_ndc = attrs.matrix(WORLD_TO_NDC)?;
        let window = attrs.display_window()?;
        let camera_right = world_to_camera
            .inverse()
            .transform_vector3(Vec3::X)
            .normalize_or_zero();
        Ok(Self {
            world_to_ndc,
            camera_right,
            half_width: window.width() as f32 * 0.5,
            half_height: window.height() as f32 * 0.5,
        })
    }

    /// Pixels covered by one world unit at `p`, `None` when degenerate.
    fn pixels_per_unit(&self, p: Vec3) -> Option<f32> {
        let a = self.world_to_ndc.project_point3(p);
        let b = self.world_to_ndc.project_point3(p + self.camera_right);
        let dx = (b.x - a.x) * self.half_width;
        let dy = (b.y - a.y) * self.half_height;
        let ppu = (dx * dx + dy * dy).sqrt();
        (ppu.is_finite() && ppu > MIN_PIXELS_PER_UNIT).then_some(ppu)
    }
}

/// Per-pixel discontinuity strength in `[0, 1]` for `config.objects`.
///
/// Requires `rgba`, `id`, `Z`, `P` (vec3) and the `worldToCamera`, `worldToNDC`
/// and `displayWindow` attributes. Samples whose pixel density is degenerate
/// contribute nothing and are reported once with `warn!`.
///
/// # Errors
///
/// Schema errors for missing channels or mask, configuration errors for
/// missing attributes or a bad threshold.
pub fn intersection_coverage(
    image: &DeepImage,
    config: &StrokeConfig,
    intersections: &IntersectionConfig,
) -> OpsResult<Vec<f32>> {
    intersections.validate()?;
    let scale = ScreenScale::from_image(image)?;
    let rgba = image.channel::<Vec4>(names::RGBA)?;
    let ids = image.channel::<u32>(names::ID)?;
    let depths = image.channel::<f32>(names::Z)?;
    let positions = image.channel::<Vec3>(names::P)?;
    let mask = intersections
        .mask
        .as_deref()
        .map(|name| image.projection(name, 0))
        .transpose()?;

    let (width, height) = (image.width(), image.height());
    let w = width as usize;
    debug!(
        width,
        height,
        threshold = intersections.threshold,
        masked = mask.is_some(),
        "Detecting intersections"
    );

    let is_object = |id: u32| config.objects.contains(&id);

    let results: Vec<(f32, usize)> = map_indices(w * height as usize, |i| {
        let (x, y) = ((i % w) as u32, (i / w) as u32);
        let colors = rgba.samples_at(i);
        let sample_ids = ids.samples_at(i);
        let points = positions.samples_at(i);

        let neighbors = [
            (x > 0).then(|| (x - 1, y)),
            (x + 1 < width).then(|| (x + 1, y)),
            (y > 0).then(|| (x, y - 1)),
            (y + 1 < height).then(|| (x, y + 1)),
        ];

        let mut strength = 0.0f32;
        let mut degenerate = 0usize;
        let mut transmittance = 1.0f32;

        // Nearest first so transmittance reflects what is in front.
        for s in (0..colors.len()).rev() {
            let alpha = colors[s].w;
            let visibility = alpha * transmittance;
            transmittance *= 1.0 - alpha;
            if !is_object(sample_ids[s]) || visibility <= 0.0 {
                continue;
            }

            let (p, z) = (points[s], depths.samples_at(i)[s]);
            let Some(ppu) = scale.pixels_per_unit(p) else {
                degenerate += 1;
                continue;
            };

            let mut best = 0.0f32;
            for (nx, ny) in neighbors.into_iter().flatten() {
                let n = ny as usize * w + nx as usize;
                let gap = ids
                    .samples_at(n)
                    .iter()
                    .zip(positions.samples_at(n))
                    .zip(depths.samples_at(n))
                    .filter(|&((&id, _), &nz)| is_object(id) && nz > z)
                    .map(|((_, q), _)| p.distance(*q))
                    .reduce(f32::min);
                if let Some(gap) = gap {
                    let ratio = gap * ppu / intersections.threshold - 1.0;
                    best = best.max(ratio.clamp(0.0, 1.0));
                }
            }

            let weight = match &mask {
                Some(m) => unpremultiply(m.get(x, y, s), alpha),
                None => 1.0,
            };
            strength += best * visibility * weight;
        }

        (strength.clamp(0.0, 1.0), degenerate)
    });

    let degenerate: usize = results.iter().map(|&(_, d)| d).sum();
    if degenerate > 0 {
        warn!(
            samples = degenerate,
            "Zero pixel density in intersection detection, samples skipped"
        );
    }
    Ok(results.into_iter().map(|(s, _)| s).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::synthesize_stroke;
    use deepfx_core::{DisplayWindow, SampleInit};

    /// Orthographic camera looking down -Z, NDC spanning [-w/2, w/2] x [-h/2, h/2] world units.
    fn ortho_image(width: u32, height: u32) -> DeepImage {
        let mut image = DeepImage::new(width, height);
        image.add_channel::<Vec3>(names::P).unwrap();
        let ndc = Mat4::from_scale(Vec3::new(2.0 / width as f32, 2.0 / height as f32, 1.0));
        let attrs = image.attrs_mut();
        attrs.set(WORLD_TO_CAMERA, Mat4::IDENTITY);
        attrs.set(WORLD_TO_NDC, ndc);
        attrs.set(deepfx_core::attrs::DISPLAY_WINDOW, DisplayWindow::from_size(width, height));
        image
    }

    fn put(image: &mut DeepImage, x: u32, y: u32, p: Vec3, id: u32) {
        let s = image
            .push_sample(x, y, SampleInit::new(Vec4::new(1.0, 1.0, 1.0, 1.0), -p.z, id))
            .unwrap();
        image.channel_mut::<Vec3>(names::P).unwrap().set(x, y, s, p);
    }

    fn config() -> StrokeConfig {
        StrokeConfig {
            objects: vec![1],
            intersections: Some(IntersectionConfig::default()),
            ..Default::default()
        }
    }

    #[test]
    fn test_pixels_per_unit_ortho() {
        let image = ortho_image(8, 8);
        let scale = ScreenScale::from_image(&image).unwrap();
        let ppu = scale.pixels_per_unit(Vec3::new(0.0, 0.0, -5.0)).unwrap();
        assert!((ppu - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_flat_surface_has_no_edges() {
        let mut image = ortho_image(4, 1);
        for x in 0..4 {
            put(&mut image, x, 0, Vec3::new(x as f32, 0.0, -5.0), 1);
        }
        let cfg = config();
        let edges = intersection_coverage(&image, &cfg, cfg.intersections.as_ref().unwrap()).unwrap();
        assert!(edges.iter().all(|&e| e == 0.0));
    }

    #[test]
    fn test_depth_jump_is_detected() {
        let mut image = ortho_image(4, 1);
        put(&mut image, 0, 0, Vec3::new(0.0, 0.0, -5.0), 1);
        put(&mut image, 1, 0, Vec3::new(1.0, 0.0, -5.0), 1);
        put(&mut image, 2, 0, Vec3::new(2.0, 0.0, -20.0), 1);
        put(&mut image, 3, 0, Vec3::new(3.0, 0.0, -20.0), 1);
        let cfg = config();
        let edges = intersection_coverage(&image, &cfg, cfg.intersections.as_ref().unwrap()).unwrap();
        // Only the nearer side of the jump is marked.
        assert_eq!(edges, vec![0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_missing_camera_is_config_error() {
        let mut image = DeepImage::new(2, 2);
        image.add_channel::<Vec3>(names::P).unwrap();
        image.add_channel::<Vec4>(names::RGBA).unwrap();
        image.add_channel::<u32>(names::ID).unwrap();
        let cfg = config();
        let err = intersection_coverage(&image, &cfg, cfg.intersections.as_ref().unwrap()).unwrap_err();
        assert!(err.is_config_error());
    }

    /// Object 1 over six pixels: near surface at x = 1..3, far surface at x = 3..5.
    fn stepped_image() -> DeepImage {
        let mut image = ortho_image(6, 1);
        for x in 1..3 {
            put(&mut image, x, 0, Vec3::new(x as f32, 0.0, -5.0), 1);
        }
        for x in 3..5 {
            put(&mut image, x, 0, Vec3::new(x as f32, 0.0, -20.0), 1);
        }
        image
    }

    #[test]
    fn test_stroke_outline_and_intersection_passes() {
        let mut image = stepped_image();
        let mut cfg = config();
        cfg.color = [1.0, 0.0, 0.0, 1.0];
        let report = synthesize_stroke(&mut image, &cfg).unwrap();

        // Outline at x = 0 and 5, intersection line on the far surface at x = 3.
        assert_eq!(report.samples_added, 3);
        image.ensure_sorted().unwrap();
        assert_eq!(image.count(0, 0), 1);
        assert_eq!(image.count(5, 0), 1);
        assert_eq!(image.count(3, 0), 2);
        assert_eq!(image.count(4, 0), 1);

        let z = image.channel::<f32>(names::Z).unwrap();
        assert_eq!(z.samples(3, 0)[0], 20.0);
        assert!((z.samples(3, 0)[1] - (5.0 - cfg.camera_bias)).abs() < 1e-6);
        let flat = image.flatten().unwrap();
        assert_eq!(flat.get(3, 0), Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(flat.get(2, 0), Vec4::ONE);
    }

    #[test]
    fn test_outline_alone_misses_interior_jump() {
        let mut image = stepped_image();
        let mut cfg = config();
        cfg.intersections = None;
        let report = synthesize_stroke(&mut image, &cfg).unwrap();
        assert_eq!(report.samples_added, 2);
        assert_eq!(image.count(3, 0), 1);

        let mut image = stepped_image();
        let mut cfg = config();
        cfg.outline = false;
        let report = synthesize_stroke(&mut image, &cfg).unwrap();
        assert_eq!(report.samples_added, 1);
        assert_eq!(image.count(3, 0), 2);
    }

    #[test]
    fn test_zero_mask_suppresses() {
        let mut image = ortho_image(2, 1);
        image.add_channel::<f32>("mask").unwrap();
        put(&mut image, 0, 0, Vec3::new(0.0, 0.0, -5.0), 1);
        put(&mut image, 1, 0, Vec3::new(1.0, 0.0, -50.0), 1);
        let mut cfg = config();
        cfg.intersections = Some(IntersectionConfig {
            mask: Some("mask".into()),
            ..Default::default()
        });
        let edges = intersection_coverage(&image, &cfg, cfg.intersections.as_ref().unwrap()).unwrap();
        assert_eq!(edges, vec![0.0, 0.0]);
    }
}
