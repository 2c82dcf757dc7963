use std::ops::Range;

use crate::collision::CollisionDetector;
use crate::converter::{ClipPolicy, VertexConverter};
use crate::geometry::{BoundingBox, Geometry, Point, Polygon};
use crate::params::PlacementParams;
use crate::style::PropertyKey;

use super::{GeometryLayout, Layout, PixelPosition};

const DIRECTIONS: [(i64, i64); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

/// Cells of a `cols` x `rows` grid in spiral order from the center cell.
/// Yields every cell exactly once.
///
/// Each leg of the spiral is clipped to the grid up front, so elongated
/// grids cost one step per leg rather than one per cell of the bounding
/// square.
#[derive(Debug, Clone)]
pub struct SpiralGridIterator {
    cols: i64,
    rows: i64,
    /// Start of the current leg.
    x: i64,
    y: i64,
    dir: usize,
    leg_len: i64,
    turns: u8,
    /// In-grid steps of the current leg not yet emitted.
    run: Range<i64>,
    legs: usize,
    max_leg: i64,
    remaining: usize,
}

impl SpiralGridIterator {
    pub fn new(cols: usize, rows: usize) -> Self {
        let as_i64 = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);
        let mut iter = Self {
            cols: as_i64(cols),
            rows: as_i64(rows),
            x: as_i64(cols / 2),
            y: as_i64(rows / 2),
            dir: 0,
            leg_len: 1,
            turns: 0,
            run: 0..0,
            legs: 1,
            max_leg: as_i64(cols.max(rows)).saturating_mul(2).saturating_add(2),
            remaining: cols.saturating_mul(rows),
        };
        iter.run = iter.clip_leg();
        iter
    }

    /// Steps `t` of the current leg whose cell lies inside the grid.
    fn clip_leg(&self) -> Range<i64> {
        let (dx, dy) = DIRECTIONS[self.dir];
        let (xlo, xhi) = axis_span(self.x, dx, self.cols, self.leg_len);
        let (ylo, yhi) = axis_span(self.y, dy, self.rows, self.leg_len);
        xlo.max(ylo)..xhi.min(yhi)
    }

    fn next_leg(&mut self) {
        let (dx, dy) = DIRECTIONS[self.dir];
        self.x = self.x.saturating_add(dx * self.leg_len);
        self.y = self.y.saturating_add(dy * self.leg_len);
        self.dir = (self.dir + 1) % DIRECTIONS.len();
        self.turns += 1;
        if self.turns == 2 {
            self.turns = 0;
            self.leg_len = self.leg_len.saturating_add(1);
        }
        self.legs += 1;
        self.run = self.clip_leg();
    }
}

/// Range of steps `t` in `0..len` keeping `start + d * t` inside `0..limit`.
fn axis_span(start: i64, d: i64, limit: i64, len: i64) -> (i64, i64) {
    match d {
        0 if (0..limit).contains(&start) => (0, len),
        0 => (0, 0),
        1 => (
            start.saturating_neg().max(0),
            len.min(limit.saturating_sub(start)),
        ),
        _ => (
            start.saturating_sub(limit).saturating_add(1).max(0),
            len.min(start.saturating_add(1)),
        ),
    }
}

impl Iterator for SpiralGridIterator {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<(usize, usize)> {
        while self.remaining > 0 {
            if let Some(t) = self.run.next() {
                let (dx, dy) = DIRECTIONS[self.dir];
                self.remaining -= 1;
                return Some(((self.x + dx * t) as usize, (self.y + dy * t) as usize));
            }
            if self.leg_len > self.max_leg {
                self.remaining = 0;
                break;
            }
            self.next_leg();
        }
        None
    }
}

/// Spiral search over cell centers inside a polygon. Stops at the first
/// candidate the inner layout accepts.
pub struct GridLayout<'a, L> {
    inner: L,
    converter: VertexConverter<'a>,
    cell_width: f64,
    cell_height: f64,
    alternating: bool,
    max_candidates: Option<usize>,
}

impl<'a, L: Layout> GridLayout<'a, L> {
    pub fn new(inner: L, params: &PlacementParams<'a>, alternating: bool) -> Self {
        let scale = params.scale_factor;
        Self {
            inner,
            converter: VertexConverter::new(params, ClipPolicy::ByGeometry),
            cell_width: params.style.get_f64(PropertyKey::GridCellWidth) * scale,
            cell_height: params.style.get_f64(PropertyKey::GridCellHeight) * scale,
            alternating,
            max_candidates: params.max_grid_candidates,
        }
    }

    /// Cell counts and sizes covering `env`. A non-positive cell size puts
    /// a single cell across that axis.
    fn cells(&self, env: &BoundingBox) -> (usize, usize, f64, f64) {
        let axis = |extent: f64, cell: f64| {
            if cell > 0.0 {
                (((extent / cell).ceil() as usize).max(1), cell)
            } else {
                (1, extent)
            }
        };
        let (cols, dx) = axis(env.width(), self.cell_width);
        let (rows, dy) = axis(env.height(), self.cell_height);
        (cols, rows, dx, dy)
    }

    fn search(
        &mut self,
        detector: &mut dyn CollisionDetector,
        polygon: &Polygon,
        placements: &mut Vec<L::Output>,
    ) -> bool {
        let Some(env) = BoundingBox::from_points(polygon.exterior.iter().copied()) else {
            return false;
        };
        let (cols, rows, dx, dy) = self.cells(&env);
        let mut tried = 0usize;
        for (i, j) in SpiralGridIterator::new(cols, rows) {
            let shift = if self.alternating && j % 2 == 1 {
                dx / 2.0
            } else {
                0.0
            };
            let candidate = Point::new(
                env.minx + (i as f64 + 0.5) * dx + shift,
                env.miny + (j as f64 + 0.5) * dy,
            );
            if !polygon.contains(candidate) {
                continue;
            }
            if self.max_candidates.is_some_and(|limit| tried >= limit) {
                tracing::debug!(tried, "grid search hit candidate limit");
                return false;
            }
            tried += 1;
            if self
                .inner
                .try_placement(detector, PixelPosition::from(candidate).into(), placements)
            {
                return true;
            }
        }
        tracing::trace!(tried, cols, rows, "grid search exhausted");
        false
    }
}

impl<L: Layout> GeometryLayout for GridLayout<'_, L> {
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
        let paths = self.converter.convert(geometry);
        match geometry {
            Geometry::Point(_) => {
                let Some(p) = paths.first().and_then(|path| path.points.first()).copied() else {
                    return false;
                };
                self.inner
                    .try_placement(detector, PixelPosition::from(p).into(), placements)
            }
            Geometry::Polygon(_) => {
                let Some((exterior, holes)) = paths.split_first() else {
                    return false;
                };
                let polygon = Polygon::with_interiors(
                    exterior.points.clone(),
                    holes.iter().map(|h| h.points.clone()).collect(),
                );
                self.search(detector, &polygon, placements)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::LabelCollisionDetector;
    use crate::layout::PointPosition;
    use crate::style::StyleMap;
    use crate::transform::ViewTransform;
    use proptest::prelude::*;
    use std::collections::HashSet;

    /// Rejects everything, counting attempts.
    #[derive(Default)]
    struct Refuse {
        attempts: Vec<PixelPosition>,
    }

    impl Layout for Refuse {
        type Output = PixelPosition;

        fn try_placement(
            &mut self,
            _detector: &mut dyn CollisionDetector,
            pos: PointPosition,
            _placements: &mut Vec<PixelPosition>,
        ) -> bool {
            self.attempts.push(pos.coords);
            false
        }
    }

    fn square(size: f64) -> Geometry {
        Geometry::Polygon(Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(size, 0.0),
            Point::new(size, size),
            Point::new(0.0, size),
        ]))
    }

    fn attempts(
        style: &StyleMap,
        geometry: &Geometry,
        alternating: bool,
        cap: Option<usize>,
    ) -> Vec<PixelPosition> {
        let view = ViewTransform::pixel(200.0, 200.0);
        let params = PlacementParams::new(&view, style).with_max_grid_candidates(cap);
        let mut layout = GridLayout::new(Refuse::default(), &params, alternating);
        let mut detector = LabelCollisionDetector::new(BoundingBox::new(0.0, 0.0, 200.0, 200.0));
        let mut placements = Vec::new();
        assert!(!layout.try_geometry(&mut detector, geometry, &mut placements));
        std::mem::take(&mut layout.inner_mut().attempts)
    }

    #[test]
    fn spiral_visits_every_cell_once_starting_in_the_middle() {
        for (cols, rows) in [(1, 1), (3, 3), (4, 2), (1, 7), (6, 1)] {
            let cells: Vec<(usize, usize)> = SpiralGridIterator::new(cols, rows).collect();
            assert_eq!(cells.len(), cols * rows);
            assert_eq!(cells[0], (cols / 2, rows / 2));
            let unique: HashSet<_> = cells.iter().collect();
            assert_eq!(unique.len(), cells.len());
        }
        assert_eq!(SpiralGridIterator::new(0, 5).count(), 0);
    }

    #[test]
    fn spiral_order_matches_ring_walk() {
        let cells: Vec<(usize, usize)> = SpiralGridIterator::new(3, 3).collect();
        assert_eq!(
            cells,
            vec![
                (1, 1),
                (2, 1),
                (2, 2),
                (1, 2),
                (0, 2),
                (0, 1),
                (0, 0),
                (1, 0),
                (2, 0),
            ]
        );
    }

    #[test]
    fn thin_grid_walks_one_leg_per_ring_side() {
        let mut spiral = SpiralGridIterator::new(40_000, 1);
        assert_eq!(spiral.by_ref().count(), 40_000);
        assert!(spiral.legs <= 2 * 40_000 + 8, "legs walked: {}", spiral.legs);
    }

    #[test]
    fn oversized_grid_does_not_overflow() {
        let side = 1usize << 40;
        let mut spiral = SpiralGridIterator::new(side, side);
        assert_eq!(spiral.next(), Some((side / 2, side / 2)));
        assert_eq!(spiral.next(), Some((side / 2 + 1, side / 2)));
        assert_eq!(spiral.next(), Some((side / 2 + 1, side / 2 + 1)));
    }

    proptest! {
        #[test]
        fn spiral_legs_stay_linear_in_the_long_side(cols in 1usize..3_000, rows in 1usize..4) {
            let mut spiral = SpiralGridIterator::new(cols, rows);
            prop_assert_eq!(spiral.by_ref().count(), cols * rows);
            prop_assert!(spiral.legs <= 2 * cols.max(rows) + 8);
        }
    }

    #[test]
    fn grid_search_is_bounded_by_cell_count() {
        let style = StyleMap::new()
            .with(PropertyKey::GridCellWidth, 10.0)
            .with(PropertyKey::GridCellHeight, 10.0);
        let tried = attempts(&style, &square(40.0), false, None);
        assert_eq!(tried.len(), 16);
        assert_eq!(tried[0], PixelPosition::new(25.0, 25.0));
    }

    #[test]
    fn candidate_cap_limits_search() {
        let style = StyleMap::new()
            .with(PropertyKey::GridCellWidth, 10.0)
            .with(PropertyKey::GridCellHeight, 10.0);
        assert_eq!(attempts(&style, &square(40.0), false, Some(5)).len(), 5);
    }

    #[test]
    fn alternating_grid_shifts_odd_rows() {
        let style = StyleMap::new()
            .with(PropertyKey::GridCellWidth, 10.0)
            .with(PropertyKey::GridCellHeight, 10.0);
        let tried = attempts(&style, &square(40.0), true, None);
        // the shifted last column of odd rows falls outside the square
        assert_eq!(tried.len(), 14);
        assert!(tried.iter().any(|p| p.x == 10.0));
    }

    #[test]
    fn holes_are_skipped() {
        let style = StyleMap::new()
            .with(PropertyKey::GridCellWidth, 10.0)
            .with(PropertyKey::GridCellHeight, 10.0);
        let donut = Geometry::Polygon(Polygon::with_interiors(
            vec![
                Point::new(0.0, 0.0),
                Point::new(30.0, 0.0),
                Point::new(30.0, 30.0),
                Point::new(0.0, 30.0),
            ],
            vec![vec![
                Point::new(10.0, 10.0),
                Point::new(20.0, 10.0),
                Point::new(20.0, 20.0),
                Point::new(10.0, 20.0),
            ]],
        ));
        let tried = attempts(&style, &donut, false, None);
        assert_eq!(tried.len(), 8);
        assert!(!tried.contains(&PixelPosition::new(15.0, 15.0)));
    }

    #[test]
    fn zero_cell_size_tries_envelope_center() {
        let tried = attempts(&StyleMap::new(), &square(40.0), false, None);
        assert_eq!(tried, vec![PixelPosition::new(20.0, 20.0)]);
    }

    #[test]
    fn lines_yield_no_grid_candidates() {
        let line = Geometry::LineString(vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)]);
        assert!(attempts(&StyleMap::new(), &line, false, None).is_empty());
    }
}
