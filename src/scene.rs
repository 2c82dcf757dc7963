// Scene files: a canvas plus a list of features, each bound to one
// symbolizer. Placing a scene is one rendering pass over a single detector.

use crate::collision::LabelCollisionDetector;
use crate::config::PlacementConfig;
use crate::geometry::{BoundingBox, Geometry};
use crate::layout::text::{TextFormat, measure_block};
use crate::layout::{BoxElement, GlyphPositions, PixelPosition, TextBlock};
use crate::marker::SymbolMap;
use crate::params::PlacementParams;
use crate::style::{PropertyKey, StyleMap};
use crate::symbolizer::{group_placements, process_collision, shield_placements, text_placements};
use crate::transform::ViewTransform;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to read scene: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid scene JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid scene JSON5: {0}")]
    Json5(#[from] json5::Error),

    #[error("feature {feature}: {reason}")]
    InvalidGeometry { feature: usize, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolizerKind {
    #[default]
    Text,
    Shield,
    Group,
    Collision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    #[serde(default)]
    pub id: Option<String>,
    pub geometry: Geometry,
    #[serde(default)]
    pub symbolizer: SymbolizerKind,
    #[serde(default)]
    pub style: StyleMap,
    #[serde(default)]
    pub text: Option<String>,
    /// Fallback text formats, each merged over `style`, tried after the
    /// primary one.
    #[serde(default)]
    pub alternatives: Vec<StyleMap>,
    /// Elements of a group symbolizer, relative to the anchor.
    #[serde(default)]
    pub boxes: Vec<BoxElement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    /// Map-space extent shown on the canvas. Without one, coordinates are
    /// already pixels.
    #[serde(default)]
    pub extent: Option<BoundingBox>,
    #[serde(default)]
    pub symbols: SymbolMap,
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// Read a scene file. `.json5` files go through the JSON5 parser.
pub fn load_scene(path: &Path) -> Result<Scene, SceneError> {
    let contents = std::fs::read_to_string(path)?;
    let json5 = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json5"));
    parse_scene(&contents, json5)
}

pub fn parse_scene(contents: &str, json5: bool) -> Result<Scene, SceneError> {
    let scene: Scene = if json5 {
        json5::from_str(contents)?
    } else {
        serde_json::from_str(contents)?
    };
    scene.validate()?;
    Ok(scene)
}

fn check_geometry(feature: usize, geometry: &Geometry) -> Result<(), SceneError> {
    let invalid = |reason: &str| SceneError::InvalidGeometry {
        feature,
        reason: reason.to_string(),
    };
    match geometry {
        Geometry::Polygon(poly) if poly.exterior.is_empty() => {
            Err(invalid("polygon has an empty exterior ring"))
        }
        Geometry::MultiPolygon(polys) if polys.iter().any(|p| p.exterior.is_empty()) => {
            Err(invalid("multi-polygon member has an empty exterior ring"))
        }
        Geometry::Collection(parts) => parts.iter().try_for_each(|g| check_geometry(feature, g)),
        _ => Ok(()),
    }
}

impl Scene {
    pub fn validate(&self) -> Result<(), SceneError> {
        self.features
            .iter()
            .enumerate()
            .try_for_each(|(idx, feature)| check_geometry(idx, &feature.geometry))
    }

    pub fn canvas(&self, config: &PlacementConfig) -> (f64, f64) {
        (
            self.width.unwrap_or(config.width),
            self.height.unwrap_or(config.height),
        )
    }

    /// Place every feature in order against one shared detector.
    pub fn place(&self, config: &PlacementConfig) -> PlacementReport {
        let (width, height) = self.canvas(config);
        let view = match self.extent {
            Some(extent) => ViewTransform::new(width, height, extent),
            None => ViewTransform::pixel(width, height),
        };
        let mut detector = LabelCollisionDetector::with_cell_size(
            BoundingBox::new(0.0, 0.0, width, height),
            config.cell_size,
        );
        let defaults = StyleMap::new()
            .with(PropertyKey::FaceName, config.font_family.as_str())
            .with(PropertyKey::TextSize, config.font_size);

        let mut features = Vec::with_capacity(self.features.len());
        for (index, feature) in self.features.iter().enumerate() {
            let style = defaults.merged(&feature.style);
            let params = PlacementParams::new(&view, &style)
                .with_scale_factor(config.scale_factor)
                .with_symbols(&self.symbols)
                .with_max_grid_candidates(config.max_grid_candidates);
            let result = match feature.symbolizer {
                SymbolizerKind::Text => {
                    let blocks = feature.text_blocks(&style, config, false);
                    FeatureResult::Text {
                        placements: text_placements(
                            &params,
                            &mut detector,
                            &feature.geometry,
                            &blocks,
                        ),
                    }
                }
                SymbolizerKind::Shield => {
                    let blocks = feature.text_blocks(&style, config, true);
                    FeatureResult::Shield {
                        placements: shield_placements(
                            &params,
                            &mut detector,
                            &feature.geometry,
                            &blocks,
                        ),
                    }
                }
                SymbolizerKind::Group => FeatureResult::Group {
                    positions: group_placements(
                        &params,
                        &mut detector,
                        &feature.geometry,
                        &feature.boxes,
                    ),
                },
                SymbolizerKind::Collision => FeatureResult::Collision {
                    boxes: process_collision(&params, &mut detector, &feature.geometry),
                },
            };
            tracing::debug!(
                index,
                id = feature.id.as_deref().unwrap_or(""),
                placed = result.count(),
                "feature placed"
            );
            features.push(FeatureReport {
                index,
                id: feature.id.clone(),
                result,
            });
        }

        PlacementReport {
            width,
            height,
            features,
            occupied: detector.boxes().copied().collect(),
        }
    }
}

impl Feature {
    /// Measured alternatives: the primary format first, then each fallback.
    /// Text symbolizers without text get none; shields still get an empty
    /// block so the marker alone can place.
    fn text_blocks(
        &self,
        style: &StyleMap,
        config: &PlacementConfig,
        allow_empty: bool,
    ) -> Vec<TextBlock> {
        let text = self.text.as_deref().unwrap_or("");
        if text.is_empty() && !allow_empty {
            return Vec::new();
        }
        let measure = |style: &StyleMap| {
            let format =
                TextFormat::from_style(style).with_fast_metrics(config.fast_text_metrics);
            measure_block(text, &format, config.scale_factor)
        };
        std::iter::once(measure(style))
            .chain(self.alternatives.iter().map(|alt| measure(&style.merged(alt))))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FeatureResult {
    Text { placements: Vec<GlyphPositions> },
    Shield { placements: Vec<GlyphPositions> },
    Group { positions: Vec<PixelPosition> },
    Collision { boxes: Vec<BoundingBox> },
}

impl FeatureResult {
    pub fn count(&self) -> usize {
        match self {
            FeatureResult::Text { placements } | FeatureResult::Shield { placements } => {
                placements.len()
            }
            FeatureResult::Group { positions } => positions.len(),
            FeatureResult::Collision { boxes } => boxes.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureReport {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub result: FeatureResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementReport {
    pub width: f64,
    pub height: f64,
    pub features: Vec<FeatureReport>,
    /// Detector contents after the pass.
    pub occupied: Vec<BoundingBox>,
}

impl PlacementReport {
    pub fn placed(&self) -> usize {
        self.features.iter().map(|f| f.result.count()).sum()
    }
}
