//! Pipeline driver: strokes, then layer decomposition.
//!
//! Order of operations:
//!
//! 1. combine ids (`layers.combine`)
//! 2. depth sort if needed
//! 3. every stroke, in file order
//! 4. depth sort (strokes append unsorted samples)
//! 5. collapse unmapped ids into the default group
//! 6. decompose, masked when `layers.mask` is set

use tracing::{debug, info};

use deepfx_core::DeepImage;

use crate::OpsResult;
use crate::config::PipelineConfig;
use crate::decompose::{Layer, collapse_unmapped, combine_ids, decompose, decompose_masked};
use crate::stroke::synthesize_stroke;

/// Runs `config` against `image` and returns the layers.
///
/// `image` is left holding the stroked, sorted, id-collapsed samples.
pub fn run_pipeline(image: &mut DeepImage, config: &PipelineConfig) -> OpsResult<Vec<Layer>> {
    config.validate()?;
    debug!(
        width = image.width(),
        height = image.height(),
        strokes = config.strokes.len(),
        "Running deep pipeline"
    );

    combine_ids(image, &config.layers.combine)?;
    image.ensure_sorted()?;

    let mut added = 0;
    for stroke in &config.strokes {
        added += synthesize_stroke(image, stroke)?.samples_added;
    }
    image.ensure_sorted()?;

    let map = config.layers.layer_map();
    collapse_unmapped(image, &map)?;
    let layers = match &config.layers.mask {
        Some(mask) => decompose_masked(image, &map, mask)?,
        None => decompose(image, &map)?,
    };

    info!(
        stroke_samples = added,
        layers = layers.len(),
        empty = layers.iter().filter(|l| l.is_empty()).count(),
        "Deep pipeline finished"
    );
    Ok(layers)
}
