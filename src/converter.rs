// Vertex converter pipeline.
//
// Stages always run in `Stage::ORDER`; enablement is a runtime bitset so any
// combination can be exercised. Degenerate output is an empty path list,
// never an error.

use crate::geometry::{BoundingBox, Geometry, Point};
use crate::params::PlacementParams;
use crate::style::PropertyKey;

const MITER_LIMIT: f64 = 4.0;
const NORMAL_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ClipLine,
    ClipPolygon,
    /// Projection followed by the view transform onto the canvas.
    Projection,
    Affine,
    Extend,
    Simplify,
    Smooth,
    Offset,
}

impl Stage {
    pub const ORDER: [Stage; 8] = [
        Stage::ClipLine,
        Stage::ClipPolygon,
        Stage::Projection,
        Stage::Affine,
        Stage::Extend,
        Stage::Simplify,
        Stage::Smooth,
        Stage::Offset,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSet(u16);

impl StageSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn set(&mut self, stage: Stage) {
        self.0 |= stage.bit();
    }

    pub fn unset(&mut self, stage: Stage) {
        self.0 &= !stage.bit();
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.0 & stage.bit() != 0
    }

    /// Enabled stages in canonical order.
    pub fn iter(self) -> impl Iterator<Item = Stage> {
        Stage::ORDER.into_iter().filter(move |s| self.contains(*s))
    }
}

/// How the clip stage is chosen for a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClipPolicy {
    /// Lines clip as lines, polygons as polygons.
    #[default]
    ByGeometry,
    /// Everything clips as a line; rings are opened. Used by strategies that
    /// follow the stroke.
    AsLine,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VertexPath {
    pub points: Vec<Point>,
    /// Closed rings do not repeat their first vertex.
    pub closed: bool,
}

impl VertexPath {
    pub fn open(points: Vec<Point>) -> Self {
        Self {
            points,
            closed: false,
        }
    }

    pub fn closed(points: Vec<Point>) -> Self {
        Self {
            points,
            closed: true,
        }
    }

    pub fn length(&self) -> f64 {
        let mut len: f64 = self.points.windows(2).map(|w| w[0].distance(&w[1])).sum();
        if self.closed && self.points.len() > 2 {
            if let (Some(first), Some(last)) = (self.points.first(), self.points.last()) {
                len += last.distance(first);
            }
        }
        len
    }

    /// Vertices with the closing vertex repeated for rings.
    pub fn polyline(&self) -> Vec<Point> {
        let mut pts = self.points.clone();
        if self.closed && pts.len() > 1 {
            pts.push(pts[0]);
        }
        pts
    }
}

pub struct VertexConverter<'a> {
    params: PlacementParams<'a>,
    stages: StageSet,
    clip: bool,
    clip_policy: ClipPolicy,
    extend: f64,
    simplify_tolerance: f64,
    smooth: f64,
    offset: f64,
}

impl<'a> VertexConverter<'a> {
    pub fn new(params: &PlacementParams<'a>, clip_policy: ClipPolicy) -> Self {
        let style = params.style;
        let clip = style.get_bool(PropertyKey::Clip);
        let extend = style.get_f64(PropertyKey::Extend);
        let simplify_tolerance = style.get_f64(PropertyKey::SimplifyTolerance);
        let smooth = style.get_f64(PropertyKey::Smooth);
        let offset = style.get_f64(PropertyKey::Offset) * params.scale_factor;

        let mut stages = StageSet::empty();
        stages.set(Stage::Projection);
        stages.set(Stage::Affine);
        if extend > 0.0 {
            stages.set(Stage::Extend);
        }
        if simplify_tolerance > 0.0 {
            stages.set(Stage::Simplify);
        }
        if smooth > 0.0 {
            stages.set(Stage::Smooth);
        }
        if offset.abs() > 0.0 {
            stages.set(Stage::Offset);
        }

        Self {
            params: *params,
            stages,
            clip,
            clip_policy,
            extend,
            simplify_tolerance,
            smooth,
            offset,
        }
    }

    pub fn clip_policy(&self) -> ClipPolicy {
        self.clip_policy
    }

    /// Stages enabled for `geometry`, clip stage included.
    pub fn stages_for(&self, geometry: &Geometry) -> StageSet {
        let mut stages = self.stages;
        stages.unset(Stage::ClipLine);
        stages.unset(Stage::ClipPolygon);
        if self.clip {
            match (geometry, self.clip_policy) {
                (Geometry::LineString(_), _) | (Geometry::Polygon(_), ClipPolicy::AsLine) => {
                    stages.set(Stage::ClipLine)
                }
                (Geometry::Polygon(_), ClipPolicy::ByGeometry) => stages.set(Stage::ClipPolygon),
                _ => {}
            }
        }
        stages
    }

    /// Toggle a stage. The clip stages map onto the clip switch; which of
    /// the two runs still depends on the geometry.
    pub fn set_stage(&mut self, stage: Stage, enabled: bool) {
        match stage {
            Stage::ClipLine | Stage::ClipPolygon => self.clip = enabled,
            _ if enabled => self.stages.set(stage),
            _ => self.stages.unset(stage),
        }
    }

    /// Run a single-part geometry through the pipeline. Multi-part, empty and
    /// collection geometries produce nothing; callers split them first.
    pub fn convert(&self, geometry: &Geometry) -> Vec<VertexPath> {
        let mut paths = match geometry {
            Geometry::Point(p) => vec![VertexPath::open(vec![*p])],
            Geometry::LineString(line) if !line.is_empty() => vec![VertexPath::open(line.clone())],
            Geometry::Polygon(poly) if !poly.exterior.is_empty() => poly
                .rings()
                .filter(|ring| !ring.is_empty())
                .map(|ring| VertexPath::closed(strip_closing(ring)))
                .collect(),
            _ => return Vec::new(),
        };
        for stage in self.stages_for(geometry).iter() {
            paths = self.apply(stage, paths);
            if paths.is_empty() {
                tracing::trace!(?stage, "geometry vanished in vertex pipeline");
                break;
            }
        }
        paths
    }

    fn apply(&self, stage: Stage, paths: Vec<VertexPath>) -> Vec<VertexPath> {
        let extent = self.params.query_extent;
        match stage {
            Stage::ClipLine => paths.iter().flat_map(|p| clip_line(p, &extent)).collect(),
            Stage::ClipPolygon => {
                let mut out = Vec::with_capacity(paths.len());
                for (idx, path) in paths.into_iter().enumerate() {
                    let ring = clip_ring(&path.points, &extent);
                    if ring.len() < 3 {
                        if idx == 0 {
                            // exterior gone, holes are meaningless
                            return Vec::new();
                        }
                        continue;
                    }
                    out.push(VertexPath::closed(ring));
                }
                out
            }
            Stage::Projection => {
                let proj = self.params.proj_transform;
                let view = self.params.view_transform;
                paths
                    .into_iter()
                    .map(|path| VertexPath {
                        points: path
                            .points
                            .iter()
                            .filter_map(|p| proj.forward(*p))
                            .map(|p| view.forward(p))
                            .collect(),
                        closed: path.closed,
                    })
                    .filter(|path| !path.points.is_empty())
                    .collect()
            }
            Stage::Affine => {
                let affine = self.params.affine_transform;
                if affine.is_identity() {
                    return paths;
                }
                paths
                    .into_iter()
                    .map(|path| VertexPath {
                        points: path.points.iter().map(|p| affine.transform(*p)).collect(),
                        closed: path.closed,
                    })
                    .collect()
            }
            Stage::Extend => paths
                .into_iter()
                .map(|p| extend_path(p, self.extend))
                .collect(),
            Stage::Simplify => paths
                .into_iter()
                .map(|p| simplify_path(p, self.simplify_tolerance))
                .collect(),
            Stage::Smooth => paths
                .into_iter()
                .map(|p| smooth_path(p, self.smooth))
                .collect(),
            Stage::Offset => paths
                .into_iter()
                .map(|p| offset_path(p, self.offset))
                .collect(),
        }
    }
}

fn strip_closing(ring: &[Point]) -> Vec<Point> {
    let mut pts = ring.to_vec();
    if pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    pts
}

fn lerp(a: Point, b: Point, t: f64) -> Point {
    Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

// Liang-Barsky. Returns the clipped segment and whether each end was cut.
fn clip_segment(p0: Point, p1: Point, b: &BoundingBox) -> Option<(Point, Point, bool, bool)> {
    let dx = p1.x - p0.x;
    let dy = p1.y - p0.y;
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;
    for (p, q) in [
        (-dx, p0.x - b.minx),
        (dx, b.maxx - p0.x),
        (-dy, p0.y - b.miny),
        (dy, b.maxy - p0.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    Some((lerp(p0, p1, t0), lerp(p0, p1, t1), t0 > 0.0, t1 < 1.0))
}

fn clip_line(path: &VertexPath, bbox: &BoundingBox) -> Vec<VertexPath> {
    let pts = path.polyline();
    if pts.len() == 1 {
        return if bbox.contains_point(pts[0]) {
            vec![VertexPath::open(pts)]
        } else {
            Vec::new()
        };
    }
    let mut pieces = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    for w in pts.windows(2) {
        match clip_segment(w[0], w[1], bbox) {
            Some((a, b, entered, exited)) => {
                if entered || current.is_empty() {
                    if current.len() >= 2 {
                        pieces.push(VertexPath::open(std::mem::take(&mut current)));
                    }
                    current.clear();
                    current.push(a);
                }
                current.push(b);
                if exited {
                    pieces.push(VertexPath::open(std::mem::take(&mut current)));
                }
            }
            None => {
                if current.len() >= 2 {
                    pieces.push(VertexPath::open(std::mem::take(&mut current)));
                }
                current.clear();
            }
        }
    }
    if current.len() >= 2 {
        pieces.push(VertexPath::open(current));
    }
    pieces.retain(|p| p.points.len() >= 2);
    pieces
}

// Sutherland-Hodgman against the four box edges.
fn clip_ring(ring: &[Point], b: &BoundingBox) -> Vec<Point> {
    let mut out = ring.to_vec();
    for edge in 0..4 {
        if out.is_empty() {
            break;
        }
        let input = std::mem::take(&mut out);
        let inside = |p: Point| match edge {
            0 => p.x >= b.minx,
            1 => p.x <= b.maxx,
            2 => p.y >= b.miny,
            _ => p.y <= b.maxy,
        };
        let cross = |a: Point, c: Point| match edge {
            0 | 1 => {
                let x = if edge == 0 { b.minx } else { b.maxx };
                let t = (x - a.x) / (c.x - a.x);
                Point::new(x, a.y + t * (c.y - a.y))
            }
            _ => {
                let y = if edge == 2 { b.miny } else { b.maxy };
                let t = (y - a.y) / (c.y - a.y);
                Point::new(a.x + t * (c.x - a.x), y)
            }
        };
        let mut prev = input[input.len() - 1];
        for &cur in &input {
            match (inside(prev), inside(cur)) {
                (true, true) => out.push(cur),
                (true, false) => out.push(cross(prev, cur)),
                (false, true) => {
                    out.push(cross(prev, cur));
                    out.push(cur);
                }
                (false, false) => {}
            }
            prev = cur;
        }
    }
    out
}

fn unit(a: Point, b: Point) -> Option<(f64, f64)> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len = dx.hypot(dy);
    (len > NORMAL_EPS).then(|| (dx / len, dy / len))
}

fn extend_path(mut path: VertexPath, distance: f64) -> VertexPath {
    let n = path.points.len();
    if path.closed || n < 2 {
        return path;
    }
    // first non-degenerate direction at each end
    let head = (1..n).find_map(|i| unit(path.points[i], path.points[0]));
    let tail = (0..n - 1).rev().find_map(|i| unit(path.points[i], path.points[n - 1]));
    if let Some((ux, uy)) = head {
        path.points[0].x += ux * distance;
        path.points[0].y += uy * distance;
    }
    if let Some((ux, uy)) = tail {
        path.points[n - 1].x += ux * distance;
        path.points[n - 1].y += uy * distance;
    }
    path
}

fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    if len2 <= NORMAL_EPS {
        return p.distance(&a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    p.distance(&Point::new(a.x + t * dx, a.y + t * dy))
}

// Douglas-Peucker.
fn simplify_points(points: &[Point], tolerance: f64) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;
    let mut stack = vec![(0usize, n - 1)];
    while let Some((start, end)) = stack.pop() {
        let mut max_dist = 0.0;
        let mut index = start;
        for i in start + 1..end {
            let d = segment_distance(points[i], points[start], points[end]);
            if d > max_dist {
                max_dist = d;
                index = i;
            }
        }
        if max_dist > tolerance {
            keep[index] = true;
            stack.push((start, index));
            stack.push((index, end));
        }
    }
    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

fn simplify_path(path: VertexPath, tolerance: f64) -> VertexPath {
    if !path.closed {
        return VertexPath::open(simplify_points(&path.points, tolerance));
    }
    let mut pts = simplify_points(&path.polyline(), tolerance);
    pts.pop();
    if pts.len() < 3 {
        return path;
    }
    VertexPath::closed(pts)
}

// Chaikin corner cutting; `amount` in 0..=1 maps to a cut of up to a quarter
// of each segment. Open paths keep their end points.
fn smooth_path(path: VertexPath, amount: f64) -> VertexPath {
    let r = 0.25 * amount.clamp(0.0, 1.0);
    let pts = &path.points;
    let n = pts.len();
    if r <= 0.0 || n < 3 {
        return path;
    }
    let mut out = Vec::with_capacity(n * 2);
    if path.closed {
        for i in 0..n {
            let a = pts[i];
            let b = pts[(i + 1) % n];
            out.push(lerp(a, b, r));
            out.push(lerp(a, b, 1.0 - r));
        }
        return VertexPath::closed(out);
    }
    out.push(pts[0]);
    for i in 0..n - 1 {
        let a = pts[i];
        let b = pts[i + 1];
        if i > 0 {
            out.push(lerp(a, b, r));
        }
        if i < n - 2 {
            out.push(lerp(a, b, 1.0 - r));
        }
    }
    out.push(pts[n - 1]);
    VertexPath::open(out)
}

// Positive distances move to the left of the direction of travel on a y-down
// canvas. Joins are mitred, capped at MITER_LIMIT times the distance.
fn offset_path(path: VertexPath, distance: f64) -> VertexPath {
    let mut pts: Vec<Point> = Vec::with_capacity(path.points.len());
    for p in &path.points {
        if pts.last() != Some(p) {
            pts.push(*p);
        }
    }
    if path.closed && pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    let n = pts.len();
    if n < 2 {
        return VertexPath {
            points: pts,
            closed: path.closed,
        };
    }
    let seg_count = if path.closed { n } else { n - 1 };
    let normals: Vec<(f64, f64)> = (0..seg_count)
        .map(|i| {
            let (ux, uy) = unit(pts[i], pts[(i + 1) % n]).unwrap_or((1.0, 0.0));
            (uy, -ux)
        })
        .collect();
    let points = (0..n)
        .map(|i| {
            let (n_in, n_out) = if path.closed {
                (normals[(i + seg_count - 1) % seg_count], normals[i])
            } else if i == 0 {
                (normals[0], normals[0])
            } else if i == n - 1 {
                (normals[n - 2], normals[n - 2])
            } else {
                (normals[i - 1], normals[i])
            };
            let mx = n_in.0 + n_out.0;
            let my = n_in.1 + n_out.1;
            let len = mx.hypot(my);
            let (ox, oy) = if len < NORMAL_EPS {
                n_out
            } else if 2.0 / len > MITER_LIMIT {
                (mx / len * MITER_LIMIT, my / len * MITER_LIMIT)
            } else {
                (mx * 2.0 / (len * len), my * 2.0 / (len * len))
            };
            Point::new(pts[i].x + ox * distance, pts[i].y + oy * distance)
        })
        .collect();
    VertexPath {
        points,
        closed: path.closed,
    }
}
