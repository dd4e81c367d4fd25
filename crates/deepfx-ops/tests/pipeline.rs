//! Pipeline tests driven by YAML configuration files.

use std::io::Write;

use glam::Vec4;
use tempfile::NamedTempFile;

use deepfx_core::{DeepImage, FlatImage, SampleInit, names};
use deepfx_ops::{OpsError, PipelineConfig, run_pipeline};

const CONFIG: &str = r#"
strokes:
  - objects: [1]
    radius: 1.0
    color: [1.0, 1.0, 0.0, 1.0]
layers:
  default_id: 0
  ranks: {1: 1, 2: 2}
  combine: {7: 2}
"#;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// 5x5: id 1 in the center pixel, id 7 in the bottom row, id 9 in a corner.
fn scene() -> DeepImage {
    let mut image = DeepImage::new(5, 5);
    image
        .push_sample(2, 2, SampleInit::new(Vec4::new(1.0, 0.0, 0.0, 1.0), 10.0, 1))
        .unwrap();
    for x in 0..5 {
        image
            .push_sample(x, 4, SampleInit::new(Vec4::new(0.0, 0.0, 1.0, 1.0), 20.0, 7))
            .unwrap();
    }
    image
        .push_sample(0, 0, SampleInit::new(Vec4::new(0.0, 0.5, 0.0, 0.5), 30.0, 9))
        .unwrap();
    image
}

#[test]
fn config_loads_from_file() {
    let file = write_config(CONFIG);
    let config = PipelineConfig::from_file(file.path()).unwrap();
    assert_eq!(config.strokes.len(), 1);
    assert_eq!(config.layers.ranks.get(&2), Some(&2));
    assert_eq!(config.layers.combine.get(&7), Some(&2));
}

#[test]
fn missing_file_is_io_error() {
    let err = PipelineConfig::from_file("/nonexistent/deepfx/pipeline.yaml").unwrap_err();
    assert!(matches!(err, OpsError::Io(_)));
}

#[test]
fn pipeline_strokes_then_decomposes() {
    let config = PipelineConfig::from_str(CONFIG).unwrap();
    let mut image = scene();
    let layers = run_pipeline(&mut image, &config).unwrap();

    assert_eq!(layers.iter().map(|l| l.id).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert!(!image.needs_sort());

    // Stroke around the center pixel, yellow, tagged with id 1.
    let ids = image.channel::<u32>(names::ID).unwrap();
    assert_eq!(ids.samples(2, 1), &[1]);
    assert_eq!(layers[1].image.get(2, 1), Vec4::new(1.0, 1.0, 0.0, 1.0));
    assert_eq!(layers[1].image.get(2, 2), Vec4::new(1.0, 0.0, 0.0, 1.0));

    // Id 7 was combined into 2, id 9 collapsed into the default group.
    assert_eq!(layers[2].image.get(3, 4), Vec4::new(0.0, 0.0, 1.0, 1.0));
    assert_eq!(ids.samples(0, 0), &[0]);
    assert_eq!(layers[0].image.get(0, 0), Vec4::new(0.0, 0.5, 0.0, 0.5));

    let images: Vec<FlatImage> = layers.iter().map(|l| l.image.clone()).collect();
    let sum = FlatImage::sum(&images).unwrap();
    assert!(sum.max_abs_difference(&image.flatten().unwrap()).unwrap() < 1e-6);
}

#[test]
fn masked_pipeline_requires_mask_channel() {
    let yaml = "layers:\n  default_id: 1\n  mask: holdout\n";
    let config = PipelineConfig::from_str(yaml).unwrap();
    let mut image = scene();
    let err = run_pipeline(&mut image, &config).unwrap_err();
    assert!(err.is_schema_error());
}
