//! YAML pipeline configuration.
//!
//! A pipeline file lists the strokes to synthesize and how to split the
//! result into layers:
//!
//! ```yaml
//! strokes:
//!   - objects: [1, 2]
//!     output_id: 1
//!     radius: 3.0
//!     fade: 1.5
//!     color: [1.0, 1.0, 1.0, 1.0]
//!   - objects: [2]
//!     outline: false
//!     intersections:
//!       threshold: 2.0
//!       mask: edgeMask
//! layers:
//!   default_id: 0
//!   ranks: {1: 10, 2: 20}
//!   combine: {5: 2, 6: 2}
//!   mask: holdout
//! ```
//!
//! Every field has a default, so partial files are fine. Values are checked
//! by [`PipelineConfig::validate`] after parsing.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decompose::LayerMap;
use crate::stroke::StrokeConfig;
use crate::OpsResult;

/// Layer decomposition settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Group for unmapped ids.
    pub default_id: u32,
    /// Rank per object id.
    pub ranks: BTreeMap<u32, i32>,
    /// Many-to-one id remap applied before anything else.
    pub combine: BTreeMap<u32, u32>,
    /// Optional mask channel for a masked decomposition.
    pub mask: Option<String>,
}

impl LayerConfig {
    /// Rank map for [`crate::decompose::decompose`].
    pub fn layer_map(&self) -> LayerMap {
        LayerMap {
            ranks: self.ranks.clone(),
            default_id: self.default_id,
        }
    }
}

/// Full pipeline: strokes, then layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Strokes, applied in order.
    pub strokes: Vec<StrokeConfig>,
    /// Decomposition settings.
    pub layers: LayerConfig,
}

impl PipelineConfig {
    /// Loads and validates a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> OpsResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading pipeline config");
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses and validates YAML.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(yaml: &str) -> OpsResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes back to YAML.
    pub fn to_yaml(&self) -> OpsResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validates every stroke and the layer map.
    pub fn validate(&self) -> OpsResult<()> {
        for stroke in &self.strokes {
            stroke.validate()?;
        }
        self.layers.layer_map().validate()
    }
}
