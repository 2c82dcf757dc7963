// Style property access. Expression evaluation happens upstream; this
// module only sees already-evaluated, typed values keyed by property.

use crate::transform::AffineTransform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyKey {
    // vertex pipeline
    Clip,
    SimplifyTolerance,
    Smooth,
    Extend,
    Offset,
    // placement
    LabelPlacement,
    AllowOverlap,
    AvoidEdges,
    Margin,
    MinimumDistance,
    MinimumPadding,
    RepeatDistance,
    Spacing,
    LabelPositionTolerance,
    MinimumPathLength,
    LargestBoxOnly,
    GridCellWidth,
    GridCellHeight,
    CollisionCacheInsert,
    CollisionCacheDetect,
    // shield marker
    File,
    ShieldDx,
    ShieldDy,
    UnlockImage,
    ImageTransform,
    // text format, consumed by the text measurement glue
    FaceName,
    TextSize,
    LineSpacing,
    CharacterSpacing,
    JustifyAlignment,
    Dx,
    Dy,
    Orientation,
}

impl PropertyKey {
    pub fn name(&self) -> &'static str {
        match self {
            PropertyKey::Clip => "clip",
            PropertyKey::SimplifyTolerance => "simplify-tolerance",
            PropertyKey::Smooth => "smooth",
            PropertyKey::Extend => "extend",
            PropertyKey::Offset => "offset",
            PropertyKey::LabelPlacement => "label-placement",
            PropertyKey::AllowOverlap => "allow-overlap",
            PropertyKey::AvoidEdges => "avoid-edges",
            PropertyKey::Margin => "margin",
            PropertyKey::MinimumDistance => "minimum-distance",
            PropertyKey::MinimumPadding => "minimum-padding",
            PropertyKey::RepeatDistance => "repeat-distance",
            PropertyKey::Spacing => "spacing",
            PropertyKey::LabelPositionTolerance => "label-position-tolerance",
            PropertyKey::MinimumPathLength => "minimum-path-length",
            PropertyKey::LargestBoxOnly => "largest-box-only",
            PropertyKey::GridCellWidth => "grid-cell-width",
            PropertyKey::GridCellHeight => "grid-cell-height",
            PropertyKey::CollisionCacheInsert => "collision-cache-insert",
            PropertyKey::CollisionCacheDetect => "collision-cache-detect",
            PropertyKey::File => "file",
            PropertyKey::ShieldDx => "shield-dx",
            PropertyKey::ShieldDy => "shield-dy",
            PropertyKey::UnlockImage => "unlock-image",
            PropertyKey::ImageTransform => "image-transform",
            PropertyKey::FaceName => "face-name",
            PropertyKey::TextSize => "text-size",
            PropertyKey::LineSpacing => "line-spacing",
            PropertyKey::CharacterSpacing => "character-spacing",
            PropertyKey::JustifyAlignment => "justify-alignment",
            PropertyKey::Dx => "dx",
            PropertyKey::Dy => "dy",
            PropertyKey::Orientation => "orientation",
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Double(f64),
    String(String),
    Transform(AffineTransform),
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            PropertyValue::Double(v) => Some(*v != 0.0),
            PropertyValue::String(v) => match v.trim() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            },
            PropertyValue::Transform(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            PropertyValue::Double(v) => Some(*v),
            PropertyValue::String(v) => v.trim().parse::<f64>().ok(),
            PropertyValue::Transform(_) => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            PropertyValue::Bool(v) => Some(v.to_string()),
            PropertyValue::Double(v) => Some(format!("{}", v)),
            PropertyValue::String(v) => Some(v.clone()),
            PropertyValue::Transform(_) => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Double(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<AffineTransform> for PropertyValue {
    fn from(v: AffineTransform) -> Self {
        PropertyValue::Transform(v)
    }
}

/// Typed accessor over evaluated style values. Missing or mistyped values
/// fall back to the property's default.
pub trait StyleProperties {
    fn get(&self, key: PropertyKey) -> Option<PropertyValue>;

    fn get_bool(&self, key: PropertyKey) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    fn get_f64(&self, key: PropertyKey) -> f64 {
        self.get(key)
            .and_then(|v| v.as_f64())
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    fn get_string(&self, key: PropertyKey) -> Option<String> {
        self.get(key).and_then(|v| v.as_string())
    }

    fn get_transform(&self, key: PropertyKey) -> Option<AffineTransform> {
        match self.get(key)? {
            PropertyValue::Transform(t) => Some(t),
            _ => None,
        }
    }
}

/// Plain map of evaluated values, as read from scene files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleMap(BTreeMap<PropertyKey, PropertyValue>);

impl StyleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: PropertyKey, value: impl Into<PropertyValue>) -> Self {
        self.0.insert(key, value.into());
        self
    }

    pub fn insert(&mut self, key: PropertyKey, value: impl Into<PropertyValue>) {
        self.0.insert(key, value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of `self` with every value of `overrides` replacing its own.
    pub fn merged(&self, overrides: &StyleMap) -> StyleMap {
        let mut out = self.clone();
        out.0.extend(overrides.0.iter().map(|(k, v)| (*k, v.clone())));
        out
    }
}

impl StyleProperties for StyleMap {
    fn get(&self, key: PropertyKey) -> Option<PropertyValue> {
        self.0.get(&key).cloned()
    }
}

/// Placement-type selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelPlacement {
    #[default]
    Point,
    Interior,
    Vertex,
    VertexFirst,
    VertexLast,
    Line,
    Grid,
    AlternatingGrid,
}

impl LabelPlacement {
    /// Policies that stop after the first constituent that places.
    pub fn is_single(&self) -> bool {
        matches!(
            self,
            LabelPlacement::Point
                | LabelPlacement::Interior
                | LabelPlacement::VertexFirst
                | LabelPlacement::VertexLast
        )
    }
}

impl FromStr for LabelPlacement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "point" => Ok(LabelPlacement::Point),
            "interior" => Ok(LabelPlacement::Interior),
            "vertex" => Ok(LabelPlacement::Vertex),
            "vertex-first" => Ok(LabelPlacement::VertexFirst),
            "vertex-last" => Ok(LabelPlacement::VertexLast),
            "line" => Ok(LabelPlacement::Line),
            "grid" => Ok(LabelPlacement::Grid),
            "alternating-grid" => Ok(LabelPlacement::AlternatingGrid),
            other => Err(format!("unknown label placement '{other}'")),
        }
    }
}

/// Per-feature snapshot of the values the placement core reads.
/// Distances are unscaled style units; layouts multiply by the scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EvaluatedTextProperties {
    pub label_placement: LabelPlacement,
    pub margin: f64,
    pub minimum_distance: f64,
    pub minimum_padding: f64,
    pub repeat_distance: f64,
    pub allow_overlap: bool,
    pub avoid_edges: bool,
    pub label_spacing: f64,
    pub label_position_tolerance: f64,
    pub minimum_path_length: f64,
    pub largest_box_only: bool,
}

impl EvaluatedTextProperties {
    pub fn evaluate(style: &dyn StyleProperties) -> Self {
        let label_placement = match style.get_string(PropertyKey::LabelPlacement) {
            Some(raw) => raw.parse().unwrap_or_else(|err: String| {
                tracing::warn!(%err, "falling back to point placement");
                LabelPlacement::Point
            }),
            None => LabelPlacement::Point,
        };
        Self {
            label_placement,
            margin: style.get_f64(PropertyKey::Margin),
            minimum_distance: style.get_f64(PropertyKey::MinimumDistance),
            minimum_padding: style.get_f64(PropertyKey::MinimumPadding),
            repeat_distance: style.get_f64(PropertyKey::RepeatDistance),
            allow_overlap: style.get_bool(PropertyKey::AllowOverlap),
            avoid_edges: style.get_bool(PropertyKey::AvoidEdges),
            label_spacing: style.get_f64(PropertyKey::Spacing),
            label_position_tolerance: style.get_f64(PropertyKey::LabelPositionTolerance),
            minimum_path_length: style.get_f64(PropertyKey::MinimumPathLength),
            largest_box_only: style.get_bool(PropertyKey::LargestBoxOnly),
        }
    }
}
