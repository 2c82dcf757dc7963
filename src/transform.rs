// Pre-built coordinate transforms consumed by the vertex pipeline and the
// point strategies. Construction of real projections is left to callers;
// only the "transform a point" contract lives here.

use crate::geometry::{BoundingBox, Point};
use serde::{Deserialize, Serialize};

/// Source-to-map projection. Returning `None` drops the vertex.
pub trait ProjTransform {
    fn forward(&self, p: Point) -> Option<Point>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityProjection;

impl ProjTransform for IdentityProjection {
    fn forward(&self, p: Point) -> Option<Point> {
        Some(p)
    }
}

/// Maps a map-space extent onto a `width` x `height` pixel canvas with the
/// y axis pointing down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    width: f64,
    height: f64,
    extent: BoundingBox,
    sx: f64,
    sy: f64,
    flip_y: bool,
    offset_x: f64,
    offset_y: f64,
}

impl ViewTransform {
    pub fn new(width: f64, height: f64, extent: BoundingBox) -> Self {
        let sx = if extent.width() > 0.0 {
            width / extent.width()
        } else {
            1.0
        };
        let sy = if extent.height() > 0.0 {
            height / extent.height()
        } else {
            1.0
        };
        Self {
            width,
            height,
            extent,
            sx,
            sy,
            flip_y: true,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    /// Identity mapping for a canvas whose map units are already pixels.
    pub fn pixel(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            extent: BoundingBox::new(0.0, 0.0, width, height),
            sx: 1.0,
            sy: 1.0,
            flip_y: false,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    pub fn with_offset(mut self, offset_x: f64, offset_y: f64) -> Self {
        self.offset_x = offset_x;
        self.offset_y = offset_y;
        self
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn extent(&self) -> BoundingBox {
        self.extent
    }

    pub fn forward(&self, p: Point) -> Point {
        let y = if self.flip_y {
            (self.extent.maxy - p.y) * self.sy
        } else {
            (p.y - self.extent.miny) * self.sy
        };
        Point::new(
            (p.x - self.extent.minx) * self.sx - self.offset_x,
            y - self.offset_y,
        )
    }
}

/// 2x3 affine matrix in SVG order `[a, b, c, d, e, f]`:
/// `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 6]", into = "[f64; 6]")]
pub struct AffineTransform {
    pub sx: f64,
    pub shy: f64,
    pub shx: f64,
    pub sy: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<[f64; 6]> for AffineTransform {
    fn from(m: [f64; 6]) -> Self {
        Self {
            sx: m[0],
            shy: m[1],
            shx: m[2],
            sy: m[3],
            tx: m[4],
            ty: m[5],
        }
    }
}

impl From<AffineTransform> for [f64; 6] {
    fn from(t: AffineTransform) -> Self {
        [t.sx, t.shy, t.shx, t.sy, t.tx, t.ty]
    }
}

impl AffineTransform {
    pub const fn identity() -> Self {
        Self {
            sx: 1.0,
            shy: 0.0,
            shx: 0.0,
            sy: 1.0,
            tx: 0.0,
            ty: 0.0,
        }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            tx,
            ty,
            ..Self::identity()
        }
    }

    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self {
            sx,
            sy,
            ..Self::identity()
        }
    }

    /// Rotation by `angle` radians.
    pub fn rotation(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            sx: cos,
            shy: sin,
            shx: -sin,
            sy: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// `self` applied first, then `next`.
    pub fn then(&self, next: &AffineTransform) -> AffineTransform {
        AffineTransform {
            sx: self.sx * next.sx + self.shy * next.shx,
            shy: self.sx * next.shy + self.shy * next.sy,
            shx: self.shx * next.sx + self.sy * next.shx,
            sy: self.shx * next.shy + self.sy * next.sy,
            tx: self.tx * next.sx + self.ty * next.shx + next.tx,
            ty: self.tx * next.shy + self.ty * next.sy + next.ty,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn transform(&self, p: Point) -> Point {
        Point::new(
            p.x * self.sx + p.y * self.shx + self.tx,
            p.x * self.shy + p.y * self.sy + self.ty,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn view_transform_flips_y() {
        let vt = ViewTransform::new(100.0, 100.0, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        assert!(close(vt.forward(Point::new(0.0, 0.0)), Point::new(0.0, 100.0)));
        assert!(close(vt.forward(Point::new(10.0, 10.0)), Point::new(100.0, 0.0)));
    }

    #[test]
    fn pixel_view_is_identity() {
        let vt = ViewTransform::pixel(256.0, 256.0);
        assert_eq!(vt.forward(Point::new(12.0, 34.0)), Point::new(12.0, 34.0));
    }

    #[test]
    fn affine_then_composes_in_order() {
        let t = AffineTransform::scaling(2.0, 2.0).then(&AffineTransform::translation(5.0, 0.0));
        assert!(close(t.transform(Point::new(1.0, 1.0)), Point::new(7.0, 2.0)));
    }

    #[test]
    fn affine_rotation_quarter_turn() {
        let t = AffineTransform::rotation(std::f64::consts::FRAC_PI_2);
        assert!(close(t.transform(Point::new(1.0, 0.0)), Point::new(0.0, 1.0)));
    }
}
