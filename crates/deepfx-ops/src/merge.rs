//! Deep image merge.
//!
//! Concatenates the samples of several same-resolution deep images. Per pixel,
//! the merged list is the first image's samples followed by the second's, and
//! so on: the merge is order-sensitive and does no depth sorting. The result
//! is flagged unsorted.
//!
//! The channel set is the first image's. Channels only present in later
//! images are dropped; later images missing a channel leave its slots at the
//! default value.

use tracing::debug;

use deepfx_core::DeepImage;

use crate::{OpsError, OpsResult};

/// Merges `images` into one deep image, in input order.
///
/// # Errors
///
/// - [`OpsError::NoInput`] if `images` is empty
/// - dimension mismatch if resolutions differ
/// - channel type error if a later image stores a shared channel with another type
///
/// # Example
///
/// ```rust
/// use deepfx_core::{DeepImage, SampleInit, names};
/// use deepfx_ops::merge::merge;
/// use glam::Vec4;
///
/// let mut a = DeepImage::new(1, 1);
/// a.push_sample(0, 0, SampleInit::new(Vec4::ONE, 1.0, 1)).unwrap();
/// let mut b = DeepImage::new(1, 1);
/// b.push_sample(0, 0, SampleInit::new(Vec4::ONE, 2.0, 2)).unwrap();
///
/// let merged = merge(&[&a, &b]).unwrap();
/// assert_eq!(merged.channel::<u32>(names::ID).unwrap().samples(0, 0), &[1, 2]);
/// ```
pub fn merge(images: &[&DeepImage]) -> OpsResult<DeepImage> {
    let Some(first) = images.first() else {
        return Err(OpsError::NoInput("merge needs at least one image".into()));
    };
    let (width, height) = (first.width(), first.height());
    for image in &images[1..] {
        if image.width() != width || image.height() != height {
            return Err(deepfx_core::Error::dimension_mismatch(
                (width, height),
                (image.width(), image.height()),
            )
            .into());
        }
    }
    debug!(width, height, inputs = images.len(), "Merging deep images");

    let pixel_count = first.grid().pixel_count();
    let counts: Vec<u32> = (0..pixel_count)
        .map(|i| images.iter().map(|img| img.grid().counts()[i]).sum())
        .collect();
    let mut merged = DeepImage::from_counts(width, height, counts)?;
    *merged.attrs_mut() = first.attrs().clone();

    for (name, channel) in first.channels() {
        merged.add_channel_of_kind(name, channel.kind())?;
    }
    for image in &images[1..] {
        for name in image.channel_names().filter(|n| !first.has_channel(n)) {
            debug!(channel = name, "Channel missing from first image, dropped");
        }
    }

    let names: Vec<String> = first.channel_names().map(str::to_string).collect();
    for y in 0..height {
        for x in 0..width {
            let mut offset = 0;
            for image in images {
                for name in &names {
                    if let Ok(src) = image.any_channel(name) {
                        merged.copy_samples(name, src, x, y, offset)?;
                    }
                }
                offset += image.count(x, y);
            }
        }
    }

    merged.mark_unsorted();
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepfx_core::{SampleInit, names};
    use glam::{Vec3, Vec4};

    #[test]
    fn test_empty_input() {
        assert!(matches!(merge(&[]), Err(OpsError::NoInput(_))));
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = DeepImage::new(2, 2);
        let b = DeepImage::new(2, 3);
        let err = merge(&[&a, &b]).unwrap_err();
        assert!(matches!(err, OpsError::Core(deepfx_core::Error::DimensionMismatch { .. })));
    }

    #[test]
    fn test_type_mismatch() {
        let mut a = DeepImage::new(1, 1);
        a.add_channel::<f32>("mask").unwrap();
        let mut b = DeepImage::new(1, 1);
        b.add_channel::<Vec3>("mask").unwrap();
        b.add_sample(0, 0).unwrap();
        assert!(merge(&[&a, &b]).unwrap_err().is_schema_error());
    }

    #[test]
    fn test_channels_follow_first_image() {
        let mut a = DeepImage::new(1, 1);
        a.push_sample(0, 0, SampleInit::new(Vec4::ONE, 1.0, 1)).unwrap();
        a.add_channel::<f32>("mask").unwrap().set(0, 0, 0, 0.5);

        let mut b = DeepImage::new(1, 1);
        b.push_sample(0, 0, SampleInit::new(Vec4::ONE, 2.0, 2)).unwrap();
        b.add_channel::<Vec3>(names::N).unwrap();

        let merged = merge(&[&a, &b]).unwrap();
        assert!(merged.needs_sort());
        assert!(!merged.has_channel(names::N));
        assert_eq!(merged.channel::<f32>("mask").unwrap().samples(0, 0), &[0.5, 0.0]);
        merged.validate().unwrap();
    }
}
