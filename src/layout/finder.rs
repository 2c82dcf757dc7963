use crate::collision::CollisionDetector;
use crate::geometry::{Geometry, split_multi};
use crate::params::PlacementParams;
use crate::style::{EvaluatedTextProperties, LabelPlacement};

use super::{
    AnchorLayout, AnchorPolicy, GeometryLayout, GridLayout, Layout, LineLayout, VertexEnd,
    VertexEndLayout, VertexLayout,
};

/// Drives one feature's placement: picks the outer strategy for the
/// configured placement type, splits multi-geometries and walks the inner
/// layout's alternatives.
pub struct PlacementFinder<'p, 'a> {
    params: &'p PlacementParams<'a>,
    props: EvaluatedTextProperties,
}

impl<'p, 'a> PlacementFinder<'p, 'a> {
    pub fn new(params: &'p PlacementParams<'a>, props: EvaluatedTextProperties) -> Self {
        Self { params, props }
    }

    pub fn placement(&self) -> LabelPlacement {
        self.props.label_placement
    }

    pub fn find<L: Layout>(
        &self,
        inner: L,
        detector: &mut dyn CollisionDetector,
        geometry: &Geometry,
    ) -> Vec<L::Output> {
        let params = self.params;
        let mut placements = Vec::new();
        let placed = match self.props.label_placement {
            LabelPlacement::Point => self.run(
                AnchorLayout::new(inner, params, AnchorPolicy::Centroid),
                detector,
                geometry,
                &mut placements,
            ),
            LabelPlacement::Interior => self.run(
                AnchorLayout::new(inner, params, AnchorPolicy::Interior),
                detector,
                geometry,
                &mut placements,
            ),
            LabelPlacement::Vertex => self.run(
                VertexLayout::new(inner, params),
                detector,
                geometry,
                &mut placements,
            ),
            LabelPlacement::VertexFirst => self.run(
                VertexEndLayout::new(inner, params, VertexEnd::First),
                detector,
                geometry,
                &mut placements,
            ),
            LabelPlacement::VertexLast => self.run(
                VertexEndLayout::new(inner, params, VertexEnd::Last),
                detector,
                geometry,
                &mut placements,
            ),
            LabelPlacement::Line => self.run(
                LineLayout::new(inner, params, &self.props),
                detector,
                geometry,
                &mut placements,
            ),
            LabelPlacement::Grid => self.run(
                GridLayout::new(inner, params, false),
                detector,
                geometry,
                &mut placements,
            ),
            LabelPlacement::AlternatingGrid => self.run(
                GridLayout::new(inner, params, true),
                detector,
                geometry,
                &mut placements,
            ),
        };
        tracing::debug!(
            placement = ?self.props.label_placement,
            placed,
            count = placements.len(),
            "placement finished"
        );
        placements
    }

    /// Constituents the layout will see, in order.
    fn constituents(&self, geometry: &Geometry) -> Vec<Geometry> {
        let mut parts = split_multi(geometry);
        if self.props.largest_box_only && self.props.label_placement.is_single() && parts.len() > 1
        {
            let area = |g: &Geometry| g.envelope().map_or(0.0, |b| b.area());
            let largest = parts
                .iter()
                .enumerate()
                .fold(None::<(usize, f64)>, |best, (idx, g)| {
                    let a = area(g);
                    match best {
                        Some((_, best_area)) if best_area >= a => best,
                        _ => Some((idx, a)),
                    }
                })
                .map(|(idx, _)| idx);
            if let Some(idx) = largest {
                parts = vec![parts.swap_remove(idx)];
            }
        }
        parts
    }

    fn run<G: GeometryLayout>(
        &self,
        mut layout: G,
        detector: &mut dyn CollisionDetector,
        geometry: &Geometry,
        placements: &mut Vec<<G::Inner as Layout>::Output>,
    ) -> bool {
        let single = self.props.label_placement.is_single();
        let alternatives = layout.inner_mut().alternatives();
        let mut success = false;
        for part in self.constituents(geometry) {
            let mut placed = false;
            for index in 0..alternatives {
                layout.inner_mut().select_alternative(index);
                if layout.try_geometry(detector, &part, placements) {
                    placed = true;
                    break;
                }
            }
            if placed {
                success = true;
                if single {
                    break;
                }
            }
        }
        success
    }
}
