use crate::layout::text::{DEFAULT_FACE_NAME, DEFAULT_TEXT_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementConfig {
    /// Canvas size used when the scene does not set one.
    pub width: f64,
    pub height: f64,
    pub scale_factor: f64,
    /// Bucket size of the detector's spatial hash, in pixels.
    pub cell_size: f64,
    pub max_grid_candidates: Option<usize>,
    /// Defaults for features whose style names no face or size.
    pub font_family: String,
    pub font_size: f64,
    /// Measure text with the average advance instead of loading fonts.
    pub fast_text_metrics: bool,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 768.0,
            scale_factor: 1.0,
            cell_size: 64.0,
            max_grid_candidates: None,
            font_family: DEFAULT_FACE_NAME.to_string(),
            font_size: DEFAULT_TEXT_SIZE,
            fast_text_metrics: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    width: Option<f64>,
    height: Option<f64>,
    scale_factor: Option<f64>,
    cell_size: Option<f64>,
    max_grid_candidates: Option<usize>,
    font_family: Option<String>,
    font_size: Option<f64>,
    fast_text_metrics: Option<bool>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<PlacementConfig> {
    let mut config = PlacementConfig::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = serde_json::from_str(&contents)?;
    apply_overrides(&mut config, parsed);
    Ok(config)
}

fn apply_overrides(config: &mut PlacementConfig, parsed: ConfigFile) {
    if let Some(v) = parsed.width {
        config.width = v;
    }
    if let Some(v) = parsed.height {
        config.height = v;
    }
    if let Some(v) = parsed.scale_factor
        && v > 0.0
    {
        config.scale_factor = v;
    }
    if let Some(v) = parsed.cell_size {
        config.cell_size = v;
    }
    if let Some(v) = parsed.max_grid_candidates {
        config.max_grid_candidates = Some(v);
    }
    if let Some(v) = parsed.font_family
        && !v.trim().is_empty()
    {
        config.font_family = v;
    }
    if let Some(v) = parsed.font_size
        && v > 0.0
    {
        config.font_size = v;
    }
    if let Some(v) = parsed.fast_text_metrics {
        config.fast_text_metrics = v;
    }
}
