// Per-symbolizer entry points. Each call handles one feature/symbolizer pair
// and returns the accepted placements; the detector carries state across
// calls for the whole pass.

use crate::collision::{CollisionDetector, CollisionKeys};
use crate::converter::{ClipPolicy, VertexConverter};
use crate::geometry::{BoundingBox, Geometry, split_multi};
use crate::layout::{
    BoxElement, GlyphPositions, GroupLayout, PixelPosition, PlacementFinder, PointLayout,
    ShieldLayout, TextBlock,
};
use crate::params::PlacementParams;
use crate::style::{EvaluatedTextProperties, PropertyKey};

/// Text labels. `alternatives` are tried in order per constituent geometry.
pub fn text_placements(
    params: &PlacementParams<'_>,
    detector: &mut dyn CollisionDetector,
    geometry: &Geometry,
    alternatives: &[TextBlock],
) -> Vec<GlyphPositions> {
    let props = EvaluatedTextProperties::evaluate(params.style);
    let layout = PointLayout::new(params, &props, alternatives);
    PlacementFinder::new(params, props).find(layout, detector, geometry)
}

/// Text plus marker image.
pub fn shield_placements(
    params: &PlacementParams<'_>,
    detector: &mut dyn CollisionDetector,
    geometry: &Geometry,
    alternatives: &[TextBlock],
) -> Vec<GlyphPositions> {
    let props = EvaluatedTextProperties::evaluate(params.style);
    let layout = ShieldLayout::new(params, &props, alternatives);
    PlacementFinder::new(params, props).find(layout, detector, geometry)
}

/// Composite labels made of pre-measured boxes.
pub fn group_placements(
    params: &PlacementParams<'_>,
    detector: &mut dyn CollisionDetector,
    geometry: &Geometry,
    elements: &[BoxElement],
) -> Vec<PixelPosition> {
    let props = EvaluatedTextProperties::evaluate(params.style);
    let layout = GroupLayout::new(params, &props, elements);
    PlacementFinder::new(params, props).find(layout, detector, geometry)
}

/// Reserve the converted geometry's footprint without drawing a label: the
/// envelope of every converted path goes into the insert partitions.
/// Returns the boxes inserted.
pub fn process_collision(
    params: &PlacementParams<'_>,
    detector: &mut dyn CollisionDetector,
    geometry: &Geometry,
) -> Vec<BoundingBox> {
    let keys = CollisionKeys::parse(
        params
            .style
            .get_string(PropertyKey::CollisionCacheInsert)
            .as_deref(),
    );
    let converter = VertexConverter::new(params, ClipPolicy::ByGeometry);
    let mut inserted = Vec::new();
    for part in split_multi(geometry) {
        for path in converter.convert(&part) {
            let Some(bbox) = BoundingBox::from_points(path.points.iter().copied()) else {
                continue;
            };
            detector.insert(bbox, None, &keys);
            inserted.push(bbox);
        }
    }
    tracing::debug!(boxes = inserted.len(), "collision footprint reserved");
    inserted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::LabelCollisionDetector;
    use crate::geometry::{Point, Polygon};
    use crate::layout::{Glyph, TextLayout, TextLine};
    use crate::style::StyleMap;
    use crate::transform::ViewTransform;

    fn label(text: &str, width: f64) -> TextBlock {
        let advance = width / text.chars().count() as f64;
        let glyphs = text
            .chars()
            .map(|codepoint| Glyph {
                codepoint,
                advance,
                character_spacing: 0.0,
            })
            .collect();
        TextBlock::new(
            text,
            vec![TextLayout {
                lines: vec![TextLine::new(glyphs, 10.0, 1.0)],
                ..TextLayout::default()
            }],
        )
    }

    #[test]
    fn collision_footprint_blocks_later_text() {
        let view = ViewTransform::pixel(100.0, 100.0);
        let style = StyleMap::new();
        let params = PlacementParams::new(&view, &style);
        let mut detector = LabelCollisionDetector::new(BoundingBox::new(0.0, 0.0, 100.0, 100.0));
        let building = Geometry::Polygon(Polygon::new(vec![
            Point::new(40.0, 40.0),
            Point::new(60.0, 40.0),
            Point::new(60.0, 60.0),
            Point::new(40.0, 60.0),
        ]));
        let boxes = process_collision(&params, &mut detector, &building);
        assert_eq!(boxes, vec![BoundingBox::new(40.0, 40.0, 60.0, 60.0)]);

        let point = Geometry::Point(Point::new(50.0, 50.0));
        assert!(text_placements(&params, &mut detector, &point, &[label("Cafe", 20.0)]).is_empty());
        let elsewhere = Geometry::Point(Point::new(20.0, 20.0));
        assert_eq!(
            text_placements(&params, &mut detector, &elsewhere, &[label("Cafe", 20.0)]).len(),
            1
        );
    }

    #[test]
    fn fallback_alternative_places_when_first_is_too_wide() {
        let view = ViewTransform::pixel(100.0, 100.0);
        let style = StyleMap::new().with(PropertyKey::AvoidEdges, true);
        let params = PlacementParams::new(&view, &style);
        let mut detector = LabelCollisionDetector::new(BoundingBox::new(0.0, 0.0, 100.0, 100.0));
        let point = Geometry::Point(Point::new(10.0, 50.0));
        let placements = text_placements(
            &params,
            &mut detector,
            &point,
            &[label("Long Name", 60.0), label("LN", 10.0)],
        );
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].glyphs.len(), 2);
    }

    #[test]
    fn collision_keys_route_inserts() {
        let view = ViewTransform::pixel(100.0, 100.0);
        let style = StyleMap::new().with(PropertyKey::CollisionCacheInsert, "buildings");
        let params = PlacementParams::new(&view, &style);
        let mut detector = LabelCollisionDetector::new(BoundingBox::new(0.0, 0.0, 100.0, 100.0));
        let footprint = Geometry::Point(Point::new(50.0, 50.0));
        process_collision(&params, &mut detector, &footprint);

        // default-partition labels do not see the reserved box
        let plain = StyleMap::new();
        let params = PlacementParams::new(&view, &plain);
        let groups = group_placements(
            &params,
            &mut detector,
            &footprint,
            &[BoxElement::new(BoundingBox::new(-5.0, -5.0, 5.0, 5.0), None)],
        );
        assert_eq!(groups, vec![PixelPosition::new(50.0, 50.0)]);
    }
}
