use crate::collision::CollisionDetector;
use crate::converter::{ClipPolicy, VertexConverter};
use crate::geometry::{Geometry, Point, line_length};
use crate::params::PlacementParams;
use crate::style::EvaluatedTextProperties;

use super::{GeometryLayout, Layout, PixelPosition, PointPosition};

const TOLERANCE_STEPS: u32 = 4;
/// Anchors are never packed closer than one pixel.
const MIN_SPACING: f64 = 1.0;

/// Candidates along the stroke of lines and polygon outlines.
pub struct LineLayout<'a, L> {
    inner: L,
    converter: VertexConverter<'a>,
    spacing: f64,
    tolerance: f64,
    minimum_path_length: f64,
}

impl<'a, L: Layout> LineLayout<'a, L> {
    pub fn new(inner: L, params: &PlacementParams<'a>, props: &EvaluatedTextProperties) -> Self {
        let scale = params.scale_factor;
        Self {
            inner,
            converter: VertexConverter::new(params, ClipPolicy::AsLine),
            spacing: props.label_spacing * scale,
            tolerance: props.label_position_tolerance * scale,
            minimum_path_length: props.minimum_path_length * scale,
        }
    }
}

/// Distances of the evenly spaced anchors along a path of `length`.
fn anchors(length: f64, spacing: f64) -> Vec<f64> {
    if spacing <= 0.0 {
        return vec![length / 2.0];
    }
    let n = ((length / spacing.max(MIN_SPACING)).floor() as usize).max(1);
    (0..n)
        .map(|i| (i as f64 + 0.5) * length / n as f64)
        .collect()
}

/// 0, +step, -step, +2step, -2step, ...
fn tolerance_shifts(tolerance: f64) -> Vec<f64> {
    let mut shifts = vec![0.0];
    if tolerance > 0.0 {
        let step = tolerance / TOLERANCE_STEPS as f64;
        for k in 1..=TOLERANCE_STEPS {
            shifts.push(k as f64 * step);
            shifts.push(-(k as f64) * step);
        }
    }
    shifts
}

/// Position and direction at `distance` along a polyline.
fn point_along(line: &[Point], distance: f64) -> Option<PointPosition> {
    let mut walked = 0.0;
    let mut last = None;
    for w in line.windows(2) {
        let seg = w[0].distance(&w[1]);
        if seg <= 0.0 {
            continue;
        }
        let angle = (w[1].y - w[0].y).atan2(w[1].x - w[0].x);
        if walked + seg >= distance {
            let t = ((distance - walked) / seg).clamp(0.0, 1.0);
            let coords = PixelPosition::new(
                w[0].x + (w[1].x - w[0].x) * t,
                w[0].y + (w[1].y - w[0].y) * t,
            );
            return Some(PointPosition::new(coords, angle));
        }
        walked += seg;
        last = Some(PointPosition::new(w[1].into(), angle));
    }
    last
}

impl<L: Layout> GeometryLayout for LineLayout<'_, L> {
    type Inner = L;

    fn inner_mut(&mut self) -> &mut L {
        &mut self.inner
    }

    fn try_geometry(
        &mut self,
        detector: &mut dyn CollisionDetector,
        geometry: &Geometry,
        placements: &mut Vec<L::Output>,
    ) -> bool {
        if !matches!(geometry, Geometry::LineString(_) | Geometry::Polygon(_)) {
            return false;
        }
        let shifts = tolerance_shifts(self.tolerance);
        let mut placed = false;
        for path in self.converter.convert(geometry) {
            let line = path.polyline();
            let length = line_length(&line);
            if length <= 0.0 || length < self.minimum_path_length {
                tracing::trace!(length, "path too short for line placement");
                continue;
            }
            for anchor in anchors(length, self.spacing) {
                for shift in &shifts {
                    let distance = anchor + shift;
                    if !(0.0..=length).contains(&distance) {
                        continue;
                    }
                    let Some(pos) = point_along(&line, distance) else {
                        continue;
                    };
                    if self.inner.try_placement(detector, pos, placements) {
                        placed = true;
                        break;
                    }
                }
            }
        }
        placed
    }
}
