// Feature geometry model and the planar helpers the placement strategies
// need (envelopes, centroids, interior points, multi splitting).

use serde::{Deserialize, Serialize};

const AREA_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<Point> for (f64, f64) {
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

pub type LineString = Vec<Point>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<Point>,
    #[serde(default)]
    pub interiors: Vec<Vec<Point>>,
}

impl Polygon {
    pub fn new(exterior: Vec<Point>) -> Self {
        Self {
            exterior,
            interiors: Vec::new(),
        }
    }

    pub fn with_interiors(exterior: Vec<Point>, interiors: Vec<Vec<Point>>) -> Self {
        Self {
            exterior,
            interiors,
        }
    }

    pub fn rings(&self) -> impl Iterator<Item = &[Point]> {
        std::iter::once(self.exterior.as_slice()).chain(self.interiors.iter().map(|r| r.as_slice()))
    }

    /// Even-odd containment over every ring.
    pub fn contains(&self, p: Point) -> bool {
        let mut inside = false;
        for ring in self.rings() {
            if ring_crossings(ring, p) {
                inside = !inside;
            }
        }
        inside
    }

    fn centroid(&self) -> Option<Point> {
        let (mut area, mut cx, mut cy) = ring_moments(&self.exterior);
        let outer_sign = area.signum();
        for ring in &self.interiors {
            let (a, x, y) = ring_moments(ring);
            // holes subtract regardless of their winding
            let s = if a.signum() == outer_sign { -1.0 } else { 1.0 };
            area += s * a;
            cx += s * x;
            cy += s * y;
        }
        if area.abs() > AREA_EPS {
            return Some(Point::new(cx / (3.0 * area), cy / (3.0 * area)));
        }
        // zero-area ring collapses to its line centroid
        line_centroid(&self.exterior)
    }

    /// Point guaranteed to lie inside the polygon when the polygon has area.
    pub fn interior_point(&self) -> Option<Point> {
        let centroid = self.centroid()?;
        if self.contains(centroid) {
            return Some(centroid);
        }
        let env = BoundingBox::from_points(self.exterior.iter().copied())?;
        // scan at the centroid's height first, then sweep the envelope
        let mut rows = vec![centroid.y];
        for i in 1..8 {
            rows.push(env.miny + env.height() * i as f64 / 8.0);
        }
        for y in rows {
            if let Some(p) = self.widest_scanline_midpoint(y) {
                return Some(p);
            }
        }
        Some(centroid)
    }

    fn widest_scanline_midpoint(&self, y: f64) -> Option<Point> {
        let mut xs: Vec<f64> = Vec::new();
        for ring in self.rings() {
            let n = ring.len();
            if n < 2 {
                continue;
            }
            for i in 0..n {
                let a = ring[i];
                let b = ring[(i + 1) % n];
                if (a.y > y) != (b.y > y) {
                    xs.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
                }
            }
        }
        xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        xs.chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .filter(|(x0, x1)| x1 - x0 > 0.0)
            .max_by(|a, b| {
                (a.1 - a.0)
                    .partial_cmp(&(b.1 - b.0))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(x0, x1)| Point::new((x0 + x1) / 2.0, y))
    }
}

/// Closed tagged union over the supported geometry kinds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates", rename_all = "camelCase")]
pub enum Geometry {
    #[default]
    Empty,
    Point(Point),
    LineString(LineString),
    Polygon(Polygon),
    MultiPoint(Vec<Point>),
    MultiLineString(Vec<LineString>),
    MultiPolygon(Vec<Polygon>),
    Collection(Vec<Geometry>),
}

impl Geometry {
    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Empty => true,
            Geometry::Point(_) => false,
            Geometry::LineString(line) => line.is_empty(),
            Geometry::Polygon(poly) => poly.exterior.is_empty(),
            Geometry::MultiPoint(points) => points.is_empty(),
            Geometry::MultiLineString(lines) => lines.iter().all(|l| l.is_empty()),
            Geometry::MultiPolygon(polys) => polys.iter().all(|p| p.exterior.is_empty()),
            Geometry::Collection(geoms) => geoms.iter().all(Geometry::is_empty),
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(
            self,
            Geometry::MultiPoint(_)
                | Geometry::MultiLineString(_)
                | Geometry::MultiPolygon(_)
                | Geometry::Collection(_)
        )
    }

    pub fn envelope(&self) -> Option<BoundingBox> {
        match self {
            Geometry::Empty => None,
            Geometry::Point(p) => Some(BoundingBox::new(p.x, p.y, p.x, p.y)),
            Geometry::LineString(line) => BoundingBox::from_points(line.iter().copied()),
            Geometry::Polygon(poly) => BoundingBox::from_points(poly.exterior.iter().copied()),
            Geometry::MultiPoint(points) => BoundingBox::from_points(points.iter().copied()),
            Geometry::MultiLineString(lines) => {
                BoundingBox::from_points(lines.iter().flatten().copied())
            }
            Geometry::MultiPolygon(polys) => {
                BoundingBox::from_points(polys.iter().flat_map(|p| p.exterior.iter().copied()))
            }
            Geometry::Collection(geoms) => {
                geoms
                    .iter()
                    .filter_map(Geometry::envelope)
                    .reduce(|mut acc, b| {
                        acc.expand_to_include(&b);
                        acc
                    })
            }
        }
    }

    /// Area/length weighted centroid. Empty geometries and collections have none.
    pub fn centroid(&self) -> Option<Point> {
        match self {
            Geometry::Empty | Geometry::Collection(_) => None,
            Geometry::Point(p) => Some(*p),
            Geometry::LineString(line) => line_centroid(line),
            Geometry::Polygon(poly) => poly.centroid(),
            Geometry::MultiPoint(points) => {
                if points.is_empty() {
                    return None;
                }
                let n = points.len() as f64;
                let (sx, sy) = points
                    .iter()
                    .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
                Some(Point::new(sx / n, sy / n))
            }
            Geometry::MultiLineString(lines) => {
                let mut total = 0.0;
                let (mut sx, mut sy) = (0.0, 0.0);
                for line in lines {
                    let len = line_length(line);
                    if let Some(c) = line_centroid(line) {
                        sx += c.x * len;
                        sy += c.y * len;
                        total += len;
                    }
                }
                if total > 0.0 {
                    Some(Point::new(sx / total, sy / total))
                } else {
                    lines.iter().find_map(|l| l.first().copied())
                }
            }
            Geometry::MultiPolygon(polys) => {
                let mut total = 0.0;
                let (mut sx, mut sy) = (0.0, 0.0);
                for poly in polys {
                    let area = ring_area(&poly.exterior).abs();
                    if let Some(c) = poly.centroid() {
                        sx += c.x * area;
                        sy += c.y * area;
                        total += area;
                    }
                }
                if total > AREA_EPS {
                    Some(Point::new(sx / total, sy / total))
                } else {
                    polys.iter().find_map(|p| p.centroid())
                }
            }
        }
    }
}

/// Split a geometry into its single-part constituents in original order.
/// Collections are flattened recursively; empty parts are skipped.
pub fn split_multi(geometry: &Geometry) -> Vec<Geometry> {
    let mut out = Vec::new();
    push_parts(geometry, &mut out);
    out
}

fn push_parts(geometry: &Geometry, out: &mut Vec<Geometry>) {
    match geometry {
        Geometry::Empty => {}
        Geometry::MultiPoint(points) => {
            out.extend(points.iter().map(|p| Geometry::Point(*p)));
        }
        Geometry::MultiLineString(lines) => {
            out.extend(
                lines
                    .iter()
                    .filter(|l| !l.is_empty())
                    .map(|l| Geometry::LineString(l.clone())),
            );
        }
        Geometry::MultiPolygon(polys) => {
            out.extend(
                polys
                    .iter()
                    .filter(|p| !p.exterior.is_empty())
                    .map(|p| Geometry::Polygon(p.clone())),
            );
        }
        Geometry::Collection(geoms) => {
            for g in geoms {
                push_parts(g, out);
            }
        }
        single => {
            if !single.is_empty() {
                out.push(single.clone());
            }
        }
    }
}

pub fn line_length(line: &[Point]) -> f64 {
    line.windows(2).map(|w| w[0].distance(&w[1])).sum()
}

/// Point at half the length of a polyline.
pub fn middle_point(line: &[Point]) -> Option<Point> {
    let first = *line.first()?;
    let half = line_length(line) / 2.0;
    let mut walked = 0.0;
    for w in line.windows(2) {
        let seg = w[0].distance(&w[1]);
        if walked + seg >= half && seg > 0.0 {
            let t = (half - walked) / seg;
            return Some(Point::new(
                w[0].x + (w[1].x - w[0].x) * t,
                w[0].y + (w[1].y - w[0].y) * t,
            ));
        }
        walked += seg;
    }
    Some(first)
}

fn line_centroid(line: &[Point]) -> Option<Point> {
    let first = *line.first()?;
    let mut total = 0.0;
    let (mut sx, mut sy) = (0.0, 0.0);
    for w in line.windows(2) {
        let len = w[0].distance(&w[1]);
        sx += (w[0].x + w[1].x) / 2.0 * len;
        sy += (w[0].y + w[1].y) / 2.0 * len;
        total += len;
    }
    if total > 0.0 {
        Some(Point::new(sx / total, sy / total))
    } else {
        Some(first)
    }
}

fn ring_area(ring: &[Point]) -> f64 {
    ring_moments(ring).0
}

// Returns (signed area, sum x term, sum y term) of the shoelace formula.
fn ring_moments(ring: &[Point]) -> (f64, f64, f64) {
    let n = ring.len();
    if n < 3 {
        return (0.0, 0.0, 0.0);
    }
    let (mut a, mut cx, mut cy) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let p = ring[i];
        let q = ring[(i + 1) % n];
        let cross = p.x * q.y - q.x * p.y;
        a += cross;
        cx += (p.x + q.x) * cross;
        cy += (p.y + q.y) * cross;
    }
    (a / 2.0, cx / 2.0, cy / 2.0)
}

fn ring_crossings(ring: &[Point], p: Point) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = ring[i];
        let b = ring[j];
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Axis-aligned rectangle. Constructors normalize so `minx <= maxx` and
/// `miny <= maxy` always hold.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        BoundingBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.minx, b.miny, b.maxx, b.maxy]
    }
}

impl BoundingBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            minx: x0.min(x1),
            miny: y0.min(y1),
            maxx: x0.max(x1),
            maxy: y0.max(y1),
        }
    }

    pub fn from_center(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        let hw = width.abs() / 2.0;
        let hh = height.abs() / 2.0;
        Self::new(cx - hw, cy - hh, cx + hw, cy + hh)
    }

    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = BoundingBox::new(first.x, first.y, first.x, first.y);
        for p in iter {
            bbox.expand_to_include_point(p);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        Point::new((self.minx + self.maxx) / 2.0, (self.miny + self.maxy) / 2.0)
    }

    /// Translate by an offset.
    pub fn move_by(&mut self, dx: f64, dy: f64) {
        self.minx += dx;
        self.maxx += dx;
        self.miny += dy;
        self.maxy += dy;
    }

    pub fn re_center(&mut self, cx: f64, cy: f64) {
        let c = self.center();
        self.move_by(cx - c.x, cy - c.y);
    }

    pub fn expand_to_include(&mut self, other: &BoundingBox) {
        self.minx = self.minx.min(other.minx);
        self.miny = self.miny.min(other.miny);
        self.maxx = self.maxx.max(other.maxx);
        self.maxy = self.maxy.max(other.maxy);
    }

    pub fn expand_to_include_point(&mut self, p: Point) {
        self.minx = self.minx.min(p.x);
        self.miny = self.miny.min(p.y);
        self.maxx = self.maxx.max(p.x);
        self.maxy = self.maxy.max(p.y);
    }

    /// Edges touching counts as intersecting.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(other.minx > self.maxx
            || other.maxx < self.minx
            || other.miny > self.maxy
            || other.maxy < self.miny)
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.minx >= self.minx
            && other.maxx <= self.maxx
            && other.miny >= self.miny
            && other.maxy <= self.maxy
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.minx && p.x <= self.maxx && p.y >= self.miny && p.y <= self.maxy
    }

    /// Grow (or shrink, for negative `pad`) on every side. Shrinking never
    /// inverts the box; it collapses to the center instead.
    pub fn inflate(&self, pad: f64) -> BoundingBox {
        let c = self.center();
        let hw = (self.width() / 2.0 + pad).max(0.0);
        let hh = (self.height() / 2.0 + pad).max(0.0);
        BoundingBox::new(c.x - hw, c.y - hh, c.x + hw, c.y + hh)
    }

    /// Scale width and height about the center.
    pub fn scaled(&self, factor: f64) -> BoundingBox {
        let c = self.center();
        BoundingBox::from_center(c.x, c.y, self.width() * factor, self.height() * factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x0 + size, y0),
            Point::new(x0 + size, y0 + size),
            Point::new(x0, y0 + size),
        ]
    }

    #[test]
    fn bbox_normalizes_corners() {
        let b = BoundingBox::new(10.0, 5.0, 0.0, -5.0);
        assert_eq!(b, BoundingBox::new(0.0, -5.0, 10.0, 5.0));
        assert!(b.minx <= b.maxx && b.miny <= b.maxy);
    }

    #[test]
    fn bbox_intersects_touching_edges() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(10.0, 0.0, 20.0, 10.0);
        let c = BoundingBox::new(10.5, 0.0, 20.0, 10.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn bbox_re_center_and_move() {
        let mut b = BoundingBox::from_center(0.0, 0.0, 20.0, 10.0);
        b.re_center(50.0, 50.0);
        assert_eq!(b, BoundingBox::new(40.0, 45.0, 60.0, 55.0));
        b.move_by(-40.0, -45.0);
        assert_eq!(b, BoundingBox::new(0.0, 0.0, 20.0, 10.0));
    }

    #[test]
    fn bbox_inflate_negative_collapses() {
        let b = BoundingBox::new(0.0, 0.0, 4.0, 4.0).inflate(-10.0);
        assert_eq!(b, BoundingBox::new(2.0, 2.0, 2.0, 2.0));
    }

    #[test]
    fn bbox_scaled_about_center() {
        let b = BoundingBox::new(-5.0, -5.0, 5.0, 5.0).scaled(2.0);
        assert_eq!(b, BoundingBox::new(-10.0, -10.0, 10.0, 10.0));
    }

    #[test]
    fn polygon_centroid_of_square() {
        let g = Geometry::Polygon(Polygon::new(square(0.0, 0.0, 10.0)));
        let c = g.centroid().expect("centroid");
        assert!((c.x - 5.0).abs() < 1e-9 && (c.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn polygon_with_hole_excludes_hole_area() {
        let poly = Polygon::with_interiors(square(0.0, 0.0, 10.0), vec![square(0.0, 0.0, 5.0)]);
        let c = Geometry::Polygon(poly.clone()).centroid().expect("centroid");
        assert!(c.x > 5.0 && c.y > 5.0);
        assert!(!poly.contains(Point::new(2.0, 2.0)));
        assert!(poly.contains(Point::new(8.0, 8.0)));
    }

    #[test]
    fn interior_point_of_u_shape_is_inside() {
        let u = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(30.0, 0.0),
            Point::new(30.0, 30.0),
            Point::new(20.0, 30.0),
            Point::new(20.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 30.0),
            Point::new(0.0, 30.0),
        ]);
        let c = Geometry::Polygon(u.clone()).centroid().expect("centroid");
        assert!(!u.contains(c), "centroid of the U falls in the notch");
        let p = u.interior_point().expect("interior");
        assert!(u.contains(p));
    }

    #[test]
    fn middle_point_of_polyline() {
        let line = vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)];
        assert_eq!(middle_point(&line), Some(Point::new(10.0, 0.0)));
    }

    #[test]
    fn empty_and_collection_have_no_centroid() {
        assert_eq!(Geometry::Empty.centroid(), None);
        assert_eq!(
            Geometry::Collection(vec![Geometry::Point(Point::new(1.0, 1.0))]).centroid(),
            None
        );
    }

    #[test]
    fn split_multi_flattens_collections_in_order() {
        let g = Geometry::Collection(vec![
            Geometry::MultiPoint(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]),
            Geometry::Empty,
            Geometry::LineString(vec![Point::new(2.0, 2.0), Point::new(3.0, 3.0)]),
        ]);
        let parts = split_multi(&g);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], Geometry::Point(Point::new(0.0, 0.0)));
        assert!(matches!(parts[2], Geometry::LineString(_)));
    }

    #[test]
    fn geometry_deserializes_from_tagged_json() {
        let g: Geometry = serde_json::from_str(
            r#"{"type":"lineString","coordinates":[[0,0],[10,5]]}"#,
        )
        .expect("parse");
        assert_eq!(
            g,
            Geometry::LineString(vec![Point::new(0.0, 0.0), Point::new(10.0, 5.0)])
        );
        let empty: Geometry = serde_json::from_str(r#"{"type":"empty"}"#).expect("parse");
        assert!(empty.is_empty());
    }
}
