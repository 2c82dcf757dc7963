use crate::geometry::BoundingBox;
use crate::marker::{NoSymbols, SymbolCache};
use crate::style::StyleProperties;
use crate::transform::{AffineTransform, IdentityProjection, ProjTransform, ViewTransform};

/// Per-feature inputs shared by every stage of one placement attempt.
///
/// Owned by the caller and only borrowed by the pipeline and layouts. The
/// collision detector is deliberately not part of it: it outlives any single
/// feature and is passed separately as `&mut`.
#[derive(Clone, Copy)]
pub struct PlacementParams<'a> {
    /// Output canvas, `(0, 0, width, height)` in pixels.
    pub dims: BoundingBox,
    /// Clip box for the vertex pipeline, in source coordinates.
    pub query_extent: BoundingBox,
    pub proj_transform: &'a dyn ProjTransform,
    pub view_transform: &'a ViewTransform,
    pub affine_transform: AffineTransform,
    pub scale_factor: f64,
    pub style: &'a dyn StyleProperties,
    pub symbols: &'a dyn SymbolCache,
    /// Upper bound on candidates a grid search may try.
    pub max_grid_candidates: Option<usize>,
}

impl<'a> PlacementParams<'a> {
    /// Parameters for a canvas whose source coordinates are already pixels.
    pub fn new(view_transform: &'a ViewTransform, style: &'a dyn StyleProperties) -> Self {
        let dims = BoundingBox::new(0.0, 0.0, view_transform.width(), view_transform.height());
        Self {
            dims,
            query_extent: view_transform.extent(),
            proj_transform: &IdentityProjection,
            view_transform,
            affine_transform: AffineTransform::identity(),
            scale_factor: 1.0,
            style,
            symbols: &NoSymbols,
            max_grid_candidates: None,
        }
    }

    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_query_extent(mut self, query_extent: BoundingBox) -> Self {
        self.query_extent = query_extent;
        self
    }

    pub fn with_projection(mut self, proj: &'a dyn ProjTransform) -> Self {
        self.proj_transform = proj;
        self
    }

    pub fn with_affine(mut self, affine: AffineTransform) -> Self {
        self.affine_transform = affine;
        self
    }

    pub fn with_symbols(mut self, symbols: &'a dyn SymbolCache) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn with_max_grid_candidates(mut self, limit: Option<usize>) -> Self {
        self.max_grid_candidates = limit;
        self
    }
}
