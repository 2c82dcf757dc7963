use crate::collision::CollisionDetector;
use crate::geometry::{BoundingBox, Point};
use crate::marker::{Marker, MarkerInfo};
use crate::params::PlacementParams;
use crate::style::{EvaluatedTextProperties, PropertyKey};
use crate::transform::AffineTransform;

use super::text::TextBlock;
use super::{
    CollisionCheck, GlyphPosition, GlyphPositions, Layout, MarkerPlacement, PixelPosition,
    PointPosition,
};

/// Text block centered on the candidate. One box per text component is
/// tested; glyphs are only positioned, never tested individually.
pub struct PointLayout<'a> {
    dims: BoundingBox,
    scale_factor: f64,
    check: CollisionCheck,
    alternatives: &'a [TextBlock],
    current: usize,
}

impl<'a> PointLayout<'a> {
    pub fn new(
        params: &PlacementParams<'_>,
        props: &EvaluatedTextProperties,
        alternatives: &'a [TextBlock],
    ) -> Self {
        let margin = if props.margin != 0.0 {
            props.margin
        } else {
            props.minimum_distance
        };
        Self {
            dims: params.dims,
            scale_factor: params.scale_factor,
            check: CollisionCheck::new(params, props, margin),
            alternatives,
            current: 0,
        }
    }

    fn block(&self) -> Option<&'a TextBlock> {
        self.alternatives.get(self.current)
    }

    /// Query phase. Glyph offsets are relative to the base point with y
    /// growing upwards; the base point is the first component's center.
    fn place_glyphs(
        &self,
        detector: &dyn CollisionDetector,
        block: &TextBlock,
        pos: PixelPosition,
    ) -> Option<(GlyphPositions, Vec<BoundingBox>)> {
        let mut glyphs = GlyphPositions::default();
        let mut bboxes = Vec::with_capacity(block.layouts.len());
        let mut base_point: Option<PixelPosition> = None;

        for layout in &block.layouts {
            let orientation = layout.orientation;
            let layout_center = pos + layout.displacement;
            let base = *base_point.get_or_insert(layout_center);

            let mut bbox = layout.bounds();
            bbox.re_center(layout_center.x, layout_center.y);
            if self.check.collides(detector, &bbox, block.repeat_key()) {
                return None;
            }
            if layout.glyphs_count() > 0 {
                bboxes.push(bbox);
            }

            let mut layout_offset = layout_center - base;
            layout_offset.y = -layout_offset.y;

            // top of the first line
            let mut y = layout.height() / 2.0;
            for line in &layout.lines {
                y -= line.height;
                let mut x = layout.jalign_offset(line.width);
                for glyph in &line.glyphs {
                    glyphs.glyphs.push(GlyphPosition {
                        codepoint: glyph.codepoint,
                        pos: PixelPosition::new(x, y).rotate(orientation) + layout_offset,
                        rot: orientation,
                    });
                    if glyph.advance != 0.0 {
                        x += glyph.advance + glyph.character_spacing * self.scale_factor;
                    }
                }
            }
        }

        glyphs.base_point = base_point.unwrap_or(pos);
        Some((glyphs, bboxes))
    }

    /// Insert phase. The canvas veto runs before any insert, so a label that
    /// ends up entirely off the canvas occupies no detector space.
    fn commit(
        &self,
        detector: &mut dyn CollisionDetector,
        block: &TextBlock,
        mut glyphs: GlyphPositions,
        bboxes: Vec<BoundingBox>,
        placements: &mut Vec<GlyphPositions>,
    ) -> bool {
        glyphs.boxes = bboxes;
        let on_canvas = glyphs
            .label_box()
            .is_some_and(|label_box| self.dims.intersects(&label_box));
        if !on_canvas {
            tracing::trace!(text = %block.text, "label dropped off canvas");
            return false;
        }
        for bbox in &glyphs.boxes {
            self.check.insert(detector, *bbox, block.repeat_key());
        }
        placements.push(glyphs);
        true
    }
}

impl Layout for PointLayout<'_> {
    type Output = GlyphPositions;

    fn alternatives(&self) -> usize {
        self.alternatives.len()
    }

    fn select_alternative(&mut self, index: usize) {
        self.current = index;
    }

    fn try_placement(
        &mut self,
        detector: &mut dyn CollisionDetector,
        pos: PointPosition,
        placements: &mut Vec<GlyphPositions>,
    ) -> bool {
        let Some(block) = self.block() else {
            return false;
        };
        let Some((glyphs, bboxes)) = self.place_glyphs(&*detector, block, pos.coords) else {
            return false;
        };
        self.commit(detector, block, glyphs, bboxes, placements)
    }
}

/// Point layout plus a marker image. Text and marker boxes are tested as one
/// batch and inserted together.
pub struct ShieldLayout<'a> {
    point: PointLayout<'a>,
    marker: Option<(MarkerInfo, BoundingBox)>,
    unlocked: bool,
    displacement: PixelPosition,
}

impl<'a> ShieldLayout<'a> {
    pub fn new(
        params: &PlacementParams<'_>,
        props: &EvaluatedTextProperties,
        alternatives: &'a [TextBlock],
    ) -> Self {
        let style = params.style;
        let displacement = PixelPosition::new(
            style.get_f64(PropertyKey::ShieldDx),
            style.get_f64(PropertyKey::ShieldDy),
        ) * params.scale_factor;

        let marker = style
            .get_string(PropertyKey::File)
            .filter(|file| !file.is_empty())
            .and_then(|file| {
                let Some(marker) = params.symbols.find(&file) else {
                    tracing::debug!(%file, "shield marker not found, placing text only");
                    return None;
                };
                let transform = style
                    .get_transform(PropertyKey::ImageTransform)
                    .unwrap_or_default();
                let bbox = marker_box(&marker, &transform).scaled(params.scale_factor);
                Some((
                    MarkerInfo {
                        file,
                        marker,
                        transform,
                    },
                    bbox,
                ))
            });

        Self {
            point: PointLayout::new(params, props, alternatives),
            marker,
            unlocked: style.get_bool(PropertyKey::UnlockImage),
            displacement,
        }
    }

    pub fn has_marker(&self) -> bool {
        self.marker.is_some()
    }
}

/// Envelope of the transformed marker, centered on the origin.
fn marker_box(marker: &Marker, transform: &AffineTransform) -> BoundingBox {
    let hw = 0.5 * marker.width;
    let hh = 0.5 * marker.height;
    let corners = [(-hw, -hh), (hw, hh), (hw, -hh), (-hw, hh)]
        .map(|(x, y)| transform.transform(Point::new(x, y)));
    BoundingBox::from_points(corners).unwrap_or_default()
}

impl Layout for ShieldLayout<'_> {
    type Output = GlyphPositions;

    fn alternatives(&self) -> usize {
        self.point.alternatives()
    }

    fn select_alternative(&mut self, index: usize) {
        self.point.select_alternative(index);
    }

    fn try_placement(
        &mut self,
        detector: &mut dyn CollisionDetector,
        pos: PointPosition,
        placements: &mut Vec<GlyphPositions>,
    ) -> bool {
        let Some(block) = self.point.block() else {
            return false;
        };
        let Some((mut glyphs, mut bboxes)) = self.point.place_glyphs(&*detector, block, pos.coords)
        else {
            return false;
        };
        if let Some((info, marker_box)) = &self.marker {
            let anchor = if self.unlocked {
                pos.coords
            } else {
                glyphs.base_point
            };
            let real_pos = anchor + self.displacement;
            let mut bbox = *marker_box;
            bbox.move_by(real_pos.x, real_pos.y);
            if self.point.check.collides(&*detector, &bbox, block.repeat_key()) {
                return false;
            }
            bboxes.push(bbox);
            glyphs.marker = Some(MarkerPlacement {
                info: info.clone(),
                pos: real_pos,
            });
        }
        self.point.commit(detector, block, glyphs, bboxes, placements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CollisionKeys, LabelCollisionDetector};
    use crate::layout::Rotation;
    use crate::layout::text::{Glyph, Justify, TextLayout, TextLine};
    use crate::marker::SymbolMap;
    use crate::style::StyleMap;
    use crate::transform::ViewTransform;

    fn block(text: &str, width: f64, height: f64) -> TextBlock {
        let advance = width / text.chars().count().max(1) as f64;
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
                lines: vec![TextLine::new(glyphs, height, 1.0)],
                justify: Justify::Middle,
                ..TextLayout::default()
            }],
        )
    }

    fn line(text: &str, advance: f64, height: f64) -> TextLine {
        let glyphs = text
            .chars()
            .map(|codepoint| Glyph {
                codepoint,
                advance,
                character_spacing: 0.0,
            })
            .collect();
        TextLine::new(glyphs, height, 1.0)
    }

    fn place(blocks: &[TextBlock], x: f64, y: f64) -> GlyphPositions {
        let view = ViewTransform::pixel(100.0, 100.0);
        let style = StyleMap::new();
        let params = PlacementParams::new(&view, &style);
        let props = EvaluatedTextProperties::evaluate(&style);
        let mut layout = PointLayout::new(&params, &props, blocks);
        let mut placements = Vec::new();
        assert!(layout.try_placement(&mut detector(), at(x, y), &mut placements));
        placements.remove(0)
    }

    fn assert_near(actual: PixelPosition, x: f64, y: f64) {
        assert!(
            (actual.x - x).abs() < 1e-9 && (actual.y - y).abs() < 1e-9,
            "expected ({x}, {y}), got ({}, {})",
            actual.x,
            actual.y
        );
    }

    fn detector() -> LabelCollisionDetector {
        LabelCollisionDetector::new(BoundingBox::new(0.0, 0.0, 100.0, 100.0))
    }

    fn at(x: f64, y: f64) -> PointPosition {
        PixelPosition::new(x, y).into()
    }

    #[test]
    fn second_attempt_at_same_spot_fails() {
        let view = ViewTransform::pixel(100.0, 100.0);
        let style = StyleMap::new();
        let params = PlacementParams::new(&view, &style);
        let props = EvaluatedTextProperties::evaluate(&style);
        let blocks = [block("abcd", 20.0, 20.0)];
        let mut layout = PointLayout::new(&params, &props, &blocks);
        let mut detector = detector();
        let mut placements = Vec::new();

        assert!(layout.try_placement(&mut detector, at(50.0, 50.0), &mut placements));
        assert_eq!(placements[0].boxes, vec![BoundingBox::new(40.0, 40.0, 60.0, 60.0)]);
        assert!(!layout.try_placement(&mut detector, at(50.0, 50.0), &mut placements));
        assert_eq!(placements.len(), 1);
        assert_eq!(detector.len(), 1);
    }

    #[test]
    fn glyphs_advance_left_to_right_from_block_edge() {
        let view = ViewTransform::pixel(100.0, 100.0);
        let style = StyleMap::new();
        let params = PlacementParams::new(&view, &style);
        let props = EvaluatedTextProperties::evaluate(&style);
        let blocks = [block("ab", 20.0, 10.0)];
        let mut layout = PointLayout::new(&params, &props, &blocks);
        let mut placements = Vec::new();
        assert!(layout.try_placement(&mut detector(), at(50.0, 50.0), &mut placements));
        let glyphs = &placements[0].glyphs;
        assert_eq!(placements[0].base_point, PixelPosition::new(50.0, 50.0));
        assert_eq!(glyphs[0].pos, PixelPosition::new(-10.0, -5.0));
        assert_eq!(glyphs[1].pos, PixelPosition::new(0.0, -5.0));
    }

    #[test]
    fn lines_stack_downwards_and_justify_left() {
        let blocks = [TextBlock::new(
            "abcd ab",
            vec![TextLayout {
                lines: vec![line("abcd", 5.0, 10.0), line("ab", 5.0, 10.0)],
                justify: Justify::Left,
                ..TextLayout::default()
            }],
        )];
        let placed = place(&blocks, 50.0, 50.0);
        assert_eq!(placed.boxes, vec![BoundingBox::new(40.0, 40.0, 60.0, 60.0)]);
        let positions: Vec<(f64, f64)> = placed.glyphs.iter().map(|g| (g.pos.x, g.pos.y)).collect();
        assert_eq!(
            positions,
            vec![
                (-10.0, 0.0),
                (-5.0, 0.0),
                (0.0, 0.0),
                (5.0, 0.0),
                (-10.0, -10.0),
                (-5.0, -10.0),
            ]
        );
    }

    #[test]
    fn right_justified_short_line_ends_at_block_edge() {
        let blocks = [TextBlock::new(
            "abcd ab",
            vec![TextLayout {
                lines: vec![line("abcd", 5.0, 10.0), line("ab", 5.0, 10.0)],
                justify: Justify::Right,
                ..TextLayout::default()
            }],
        )];
        let placed = place(&blocks, 50.0, 50.0);
        assert_eq!(placed.glyphs[4].pos, PixelPosition::new(0.0, -10.0));
        assert_eq!(placed.glyphs[5].pos, PixelPosition::new(5.0, -10.0));
    }

    #[test]
    fn orientation_rotates_glyphs_and_box() {
        let quarter = Rotation::from_degrees(90.0);
        let blocks = [TextBlock::new(
            "ab",
            vec![TextLayout {
                lines: vec![line("ab", 10.0, 10.0)],
                orientation: quarter,
                ..TextLayout::default()
            }],
        )];
        let placed = place(&blocks, 50.0, 50.0);
        // unrotated (-10, -5) and (0, -5) turned a quarter counterclockwise
        assert_near(placed.glyphs[0].pos, 5.0, -10.0);
        assert_near(placed.glyphs[1].pos, 5.0, 0.0);
        assert!(placed.glyphs.iter().all(|g| g.rot == quarter));
        let bbox = placed.boxes[0];
        assert!((bbox.width() - 10.0).abs() < 1e-9);
        assert!((bbox.height() - 20.0).abs() < 1e-9);
        assert_near(PixelPosition::new(bbox.center().x, bbox.center().y), 50.0, 50.0);
    }

    #[test]
    fn later_components_are_offset_from_the_first() {
        let blocks = [TextBlock::new(
            "ab cd",
            vec![
                TextLayout {
                    lines: vec![line("ab", 10.0, 10.0)],
                    ..TextLayout::default()
                },
                TextLayout {
                    lines: vec![line("cd", 10.0, 10.0)],
                    displacement: PixelPosition::new(0.0, 20.0),
                    ..TextLayout::default()
                },
            ],
        )];
        let placed = place(&blocks, 50.0, 40.0);
        assert_eq!(placed.base_point, PixelPosition::new(50.0, 40.0));
        assert_eq!(
            placed.boxes,
            vec![
                BoundingBox::new(40.0, 35.0, 60.0, 45.0),
                BoundingBox::new(40.0, 55.0, 60.0, 65.0),
            ]
        );
        // pixel y grows downwards, glyph offsets grow upwards
        assert_eq!(placed.glyphs[2].pos, PixelPosition::new(-10.0, -25.0));
        assert_eq!(placed.glyphs[3].pos, PixelPosition::new(0.0, -25.0));
    }

    #[test]
    fn character_spacing_is_scaled() {
        let view = ViewTransform::pixel(100.0, 100.0);
        let style = StyleMap::new();
        let params = PlacementParams::new(&view, &style).with_scale_factor(2.0);
        let props = EvaluatedTextProperties::evaluate(&style);
        let glyphs = vec![
            Glyph {
                codepoint: 'a',
                advance: 4.0,
                character_spacing: 1.0,
            },
            Glyph {
                codepoint: 'b',
                advance: 4.0,
                character_spacing: 1.0,
            },
        ];
        let blocks = [TextBlock::new(
            "ab",
            vec![TextLayout {
                lines: vec![TextLine::new(glyphs, 10.0, 2.0)],
                ..TextLayout::default()
            }],
        )];
        let mut layout = PointLayout::new(&params, &props, &blocks);
        let mut placements = Vec::new();
        assert!(layout.try_placement(&mut detector(), at(50.0, 50.0), &mut placements));
        let g = &placements[0].glyphs;
        assert_eq!(g[1].pos.x - g[0].pos.x, 6.0);
    }

    #[test]
    fn off_canvas_label_is_vetoed_without_inserting() {
        let view = ViewTransform::pixel(100.0, 100.0);
        let style = StyleMap::new();
        let params = PlacementParams::new(&view, &style);
        let props = EvaluatedTextProperties::evaluate(&style);
        let blocks = [block("abcd", 20.0, 20.0)];
        let mut layout = PointLayout::new(&params, &props, &blocks);
        // detector reaches past the canvas, so collision alone would accept
        let mut detector = LabelCollisionDetector::new(BoundingBox::new(-200.0, -200.0, 300.0, 300.0));
        let mut placements = Vec::new();
        assert!(!layout.try_placement(&mut detector, at(150.0, 150.0), &mut placements));
        assert!(placements.is_empty());
        assert!(detector.is_empty());
    }

    #[test]
    fn margin_falls_back_to_minimum_distance() {
        let view = ViewTransform::pixel(100.0, 100.0);
        let style = StyleMap::new().with(PropertyKey::MinimumDistance, 5.0);
        let params = PlacementParams::new(&view, &style);
        let props = EvaluatedTextProperties::evaluate(&style);
        let blocks = [block("ab", 10.0, 10.0)];
        let mut layout = PointLayout::new(&params, &props, &blocks);
        let mut detector = detector();
        detector.insert(BoundingBox::new(0.0, 45.0, 10.0, 55.0), None, &CollisionKeys::default());
        let mut placements = Vec::new();
        // box spans 13..23, 3px from the obstacle
        assert!(!layout.try_placement(&mut detector, at(18.0, 50.0), &mut placements));
        assert!(layout.try_placement(&mut detector, at(30.0, 50.0), &mut placements));
    }

    #[test]
    fn shield_marker_collision_rejects_whole_label() {
        let view = ViewTransform::pixel(100.0, 100.0);
        let symbols = SymbolMap::new().with("shield.svg", 10.0, 10.0);
        let style = StyleMap::new()
            .with(PropertyKey::File, "shield.svg")
            .with(PropertyKey::ShieldDy, 20.0)
            .with(PropertyKey::UnlockImage, true);
        let params = PlacementParams::new(&view, &style).with_symbols(&symbols);
        let props = EvaluatedTextProperties::evaluate(&style);
        let blocks = [block("A1", 10.0, 10.0)];
        let mut layout = ShieldLayout::new(&params, &props, &blocks);
        assert!(layout.has_marker());

        let mut detector = detector();
        // obstacle under the marker only
        detector.insert(BoundingBox::new(45.0, 68.0, 55.0, 72.0), None, &CollisionKeys::default());
        let mut placements = Vec::new();
        assert!(!layout.try_placement(&mut detector, at(50.0, 50.0), &mut placements));
        assert!(placements.is_empty());
        assert_eq!(detector.len(), 1);

        assert!(layout.try_placement(&mut detector, at(50.0, 20.0), &mut placements));
        let marker = placements[0].marker.as_ref().expect("marker placed");
        assert_eq!(marker.pos, PixelPosition::new(50.0, 40.0));
        assert_eq!(placements[0].boxes.len(), 2);
        assert_eq!(detector.len(), 3);
    }

    #[test]
    fn missing_marker_places_text_only() {
        let view = ViewTransform::pixel(100.0, 100.0);
        let style = StyleMap::new().with(PropertyKey::File, "missing.png");
        let params = PlacementParams::new(&view, &style);
        let props = EvaluatedTextProperties::evaluate(&style);
        let blocks = [block("A1", 10.0, 10.0)];
        let mut layout = ShieldLayout::new(&params, &props, &blocks);
        assert!(!layout.has_marker());
        let mut placements = Vec::new();
        assert!(layout.try_placement(&mut detector(), at(50.0, 50.0), &mut placements));
        assert!(placements[0].marker.is_none());
    }

    #[test]
    fn marker_box_covers_transformed_corners() {
        let marker = Marker {
            width: 10.0,
            height: 4.0,
        };
        let rotated = marker_box(&marker, &AffineTransform::rotation(std::f64::consts::FRAC_PI_2));
        assert!((rotated.width() - 4.0).abs() < 1e-9);
        assert!((rotated.height() - 10.0).abs() < 1e-9);
    }
}
