use crate::geometry::{BoundingBox, Point};
use crate::marker::MarkerInfo;
use serde::Serialize;
use std::ops::{Add, AddAssign, Mul, Sub};

/// Screen position in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PixelPosition {
    pub x: f64,
    pub y: f64,
}

impl PixelPosition {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn rotate(&self, rot: Rotation) -> Self {
        Self {
            x: self.x * rot.cos - self.y * rot.sin,
            y: self.x * rot.sin + self.y * rot.cos,
        }
    }
}

impl From<Point> for PixelPosition {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

impl Add for PixelPosition {
    type Output = PixelPosition;

    fn add(self, rhs: PixelPosition) -> PixelPosition {
        PixelPosition::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for PixelPosition {
    fn add_assign(&mut self, rhs: PixelPosition) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for PixelPosition {
    type Output = PixelPosition;

    fn sub(self, rhs: PixelPosition) -> PixelPosition {
        PixelPosition::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for PixelPosition {
    type Output = PixelPosition;

    fn mul(self, rhs: f64) -> PixelPosition {
        PixelPosition::new(self.x * rhs, self.y * rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rotation {
    pub sin: f64,
    pub cos: f64,
}

impl Default for Rotation {
    fn default() -> Self {
        Self { sin: 0.0, cos: 1.0 }
    }
}

impl Rotation {
    pub fn from_angle(radians: f64) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self { sin, cos }
    }

    pub fn from_degrees(degrees: f64) -> Self {
        Self::from_angle(degrees.to_radians())
    }

    pub fn angle(&self) -> f64 {
        self.sin.atan2(self.cos)
    }

    pub fn is_identity(&self) -> bool {
        self.sin == 0.0 && self.cos == 1.0
    }
}

/// Candidate position. `angle` is the direction of the path at the anchor;
/// box collision ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PointPosition {
    pub coords: PixelPosition,
    pub angle: f64,
}

impl PointPosition {
    pub fn new(coords: PixelPosition, angle: f64) -> Self {
        Self { coords, angle }
    }
}

impl From<PixelPosition> for PointPosition {
    fn from(coords: PixelPosition) -> Self {
        Self { coords, angle: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GlyphPosition {
    pub codepoint: char,
    /// Offset from the base point, y growing upwards.
    pub pos: PixelPosition,
    pub rot: Rotation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerPlacement {
    #[serde(flatten)]
    pub info: MarkerInfo,
    pub pos: PixelPosition,
}

/// One accepted text or shield label.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct GlyphPositions {
    pub base_point: PixelPosition,
    pub glyphs: Vec<GlyphPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<MarkerPlacement>,
    /// Boxes that were inserted into the detector for this label.
    pub boxes: Vec<BoundingBox>,
}

impl GlyphPositions {
    pub fn label_box(&self) -> Option<BoundingBox> {
        let (first, rest) = self.boxes.split_first()?;
        let mut bbox = *first;
        for b in rest {
            bbox.expand_to_include(b);
        }
        Some(bbox)
    }
}
