use crate::collision::CollisionDetector;
use crate::geometry::{Geometry, middle_point};
use crate::params::PlacementParams;

use super::{GeometryLayout, Layout, to_pixel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorPolicy {
    /// Polygon centroid, which may fall outside concave shapes.
    Centroid,
    /// A point inside the polygon.
    Interior,
}

/// One candidate per geometry: the point itself, the middle of a line, or
/// the polygon's centroid or interior point.
pub struct AnchorLayout<'a, L> {
    inner: L,
    params: PlacementParams<'a>,
    policy: AnchorPolicy,
}

impl<'a, L: Layout> AnchorLayout<'a, L> {
    pub fn new(inner: L, params: &PlacementParams<'a>, policy: AnchorPolicy) -> Self {
        Self {
            inner,
            params: *params,
            policy,
        }
    }
}

impl<L: Layout> GeometryLayout for AnchorLayout<'_, L> {
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
        let anchor = match (geometry, self.policy) {
            (Geometry::Point(p), _) => Some(*p),
            (Geometry::LineString(line), _) => middle_point(line),
            (Geometry::Polygon(poly), AnchorPolicy::Interior) => poly.interior_point(),
            (other, _) => other.centroid(),
        };
        let Some(pos) = anchor.and_then(|p| to_pixel(&self.params, p)) else {
            return false;
        };
        self.inner.try_placement(detector, pos.into(), placements)
    }
}
