// Layout strategies. Inner layouts (`Layout`) decide whether a label fits at
// one candidate position; outer layouts (`GeometryLayout`) turn a geometry
// into candidates and hand each one to the inner layout they own.

mod anchor;
mod finder;
mod grid;
mod group;
mod line;
mod point;
pub mod text;
mod types;
mod vertex;

pub use anchor::{AnchorLayout, AnchorPolicy};
pub use finder::PlacementFinder;
pub use grid::{GridLayout, SpiralGridIterator};
pub use group::{BoxElement, GroupLayout};
pub use line::LineLayout;
pub use point::{PointLayout, ShieldLayout};
pub use text::{Glyph, Justify, TextBlock, TextFormat, TextLayout, TextLine};
pub use types::*;
pub use vertex::{VertexEnd, VertexEndLayout, VertexLayout};

use crate::collision::{CollisionDetector, CollisionKeys};
use crate::geometry::{BoundingBox, Geometry, Point};
use crate::params::PlacementParams;
use crate::style::{EvaluatedTextProperties, PropertyKey};

/// Accept/insert decision at a single candidate position.
///
/// Implementations test every box of an attempt before inserting any, so a
/// `false` return leaves the detector exactly as it was.
pub trait Layout {
    type Output;

    /// Number of payload alternatives (e.g. fallback text layouts).
    fn alternatives(&self) -> usize {
        1
    }

    fn select_alternative(&mut self, _index: usize) {}

    fn try_placement(
        &mut self,
        detector: &mut dyn CollisionDetector,
        pos: PointPosition,
        placements: &mut Vec<Self::Output>,
    ) -> bool;
}

/// Candidate generation over one single-part geometry.
pub trait GeometryLayout {
    type Inner: Layout;

    fn inner_mut(&mut self) -> &mut Self::Inner;

    fn try_geometry(
        &mut self,
        detector: &mut dyn CollisionDetector,
        geometry: &Geometry,
        placements: &mut Vec<<Self::Inner as Layout>::Output>,
    ) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejection {
    OutsideExtent,
    Edges,
    Padding,
    Overlap,
}

/// Per-box acceptance rules shared by the point, shield and group layouts.
/// All distances are already multiplied by the scale factor.
#[derive(Debug, Clone)]
pub(crate) struct CollisionCheck {
    dims: BoundingBox,
    margin: f64,
    repeat_distance: f64,
    padding: f64,
    allow_overlap: bool,
    avoid_edges: bool,
    insert_keys: CollisionKeys,
    detect_keys: CollisionKeys,
}

impl CollisionCheck {
    pub(crate) fn new(
        params: &PlacementParams<'_>,
        props: &EvaluatedTextProperties,
        margin: f64,
    ) -> Self {
        let scale = params.scale_factor;
        let style = params.style;
        Self {
            dims: params.dims,
            margin: margin * scale,
            repeat_distance: props.repeat_distance * scale,
            padding: props.minimum_padding * scale,
            allow_overlap: props.allow_overlap,
            avoid_edges: props.avoid_edges,
            insert_keys: CollisionKeys::parse(
                style.get_string(PropertyKey::CollisionCacheInsert).as_deref(),
            ),
            detect_keys: CollisionKeys::parse(
                style.get_string(PropertyKey::CollisionCacheDetect).as_deref(),
            ),
        }
    }

    pub(crate) fn rejection(
        &self,
        detector: &dyn CollisionDetector,
        bbox: &BoundingBox,
        repeat_key: Option<&str>,
    ) -> Option<Rejection> {
        if !detector.extent().intersects(bbox) {
            return Some(Rejection::OutsideExtent);
        }
        if self.avoid_edges && !self.dims.contains(bbox) {
            return Some(Rejection::Edges);
        }
        if self.padding > 0.0 && !self.dims.contains(&bbox.inflate(self.padding)) {
            return Some(Rejection::Padding);
        }
        if self.allow_overlap {
            return None;
        }
        let free = match repeat_key {
            Some(key) if !key.is_empty() => detector.has_placement_repeat(
                bbox,
                self.margin,
                key,
                self.repeat_distance,
                &self.detect_keys,
            ),
            _ => detector.has_placement(bbox, self.margin, &self.detect_keys),
        };
        (!free).then_some(Rejection::Overlap)
    }

    pub(crate) fn collides(
        &self,
        detector: &dyn CollisionDetector,
        bbox: &BoundingBox,
        repeat_key: Option<&str>,
    ) -> bool {
        match self.rejection(detector, bbox, repeat_key) {
            Some(reason) => {
                tracing::trace!(?reason, ?bbox, "candidate box rejected");
                true
            }
            None => false,
        }
    }

    pub(crate) fn insert(
        &self,
        detector: &mut dyn CollisionDetector,
        bbox: BoundingBox,
        repeat_key: Option<&str>,
    ) {
        let repeat_key = repeat_key.filter(|k| !k.is_empty());
        detector.insert(bbox, repeat_key, &self.insert_keys);
    }
}

/// Source coordinates to canvas pixels: projection, view, then affine.
pub(crate) fn to_pixel(params: &PlacementParams<'_>, p: Point) -> Option<PixelPosition> {
    let projected = params.proj_transform.forward(p)?;
    let on_canvas = params.view_transform.forward(projected);
    Some(params.affine_transform.transform(on_canvas).into())
}
