use crate::collision::CollisionDetector;
use crate::converter::{ClipPolicy, VertexConverter};
use crate::geometry::Geometry;
use crate::params::PlacementParams;

use super::{GeometryLayout, Layout, PixelPosition};

/// Tries every converted vertex.
pub struct VertexLayout<'a, L> {
    inner: L,
    converter: VertexConverter<'a>,
}

impl<'a, L: Layout> VertexLayout<'a, L> {
    pub fn new(inner: L, params: &PlacementParams<'a>) -> Self {
        Self {
            inner,
            converter: VertexConverter::new(params, ClipPolicy::ByGeometry),
        }
    }
}

impl<L: Layout> GeometryLayout for VertexLayout<'_, L> {
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
        let mut placed = false;
        for path in self.converter.convert(geometry) {
            for p in path.points {
                if self
                    .inner
                    .try_placement(detector, PixelPosition::from(p).into(), placements)
                {
                    placed = true;
                }
            }
        }
        placed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexEnd {
    First,
    Last,
}

/// Exactly one candidate: the first or last converted vertex.
pub struct VertexEndLayout<'a, L> {
    inner: L,
    converter: VertexConverter<'a>,
    end: VertexEnd,
}

impl<'a, L: Layout> VertexEndLayout<'a, L> {
    pub fn new(inner: L, params: &PlacementParams<'a>, end: VertexEnd) -> Self {
        Self {
            inner,
            converter: VertexConverter::new(params, ClipPolicy::ByGeometry),
            end,
        }
    }
}

impl<L: Layout> GeometryLayout for VertexEndLayout<'_, L> {
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
        let vertex = match self.end {
            VertexEnd::First => paths.first().and_then(|p| p.points.first()),
            VertexEnd::Last => paths.last().and_then(|p| p.points.last()),
        };
        let Some(p) = vertex.copied() else {
            return false;
        };
        self.inner
            .try_placement(detector, PixelPosition::from(p).into(), placements)
    }
}
