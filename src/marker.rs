// Marker metadata as handed over by the symbol cache. Image decoding and
// caching live elsewhere; shields only need the natural size.

use crate::transform::AffineTransform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub width: f64,
    pub height: f64,
}

/// Marker attached to an accepted shield placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerInfo {
    pub file: String,
    pub marker: Marker,
    pub transform: AffineTransform,
}

/// Lookup of decoded markers by file name. `None` covers both "not found"
/// and null markers; shields then place as text only.
pub trait SymbolCache {
    fn find(&self, file: &str) -> Option<Marker>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymbols;

impl SymbolCache for NoSymbols {
    fn find(&self, _file: &str) -> Option<Marker> {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolMap(BTreeMap<String, Marker>);

impl SymbolMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file: impl Into<String>, width: f64, height: f64) -> Self {
        self.0.insert(file.into(), Marker { width, height });
        self
    }
}

impl SymbolCache for SymbolMap {
    fn find(&self, file: &str) -> Option<Marker> {
        self.0
            .get(file)
            .copied()
            .filter(|m| m.width > 0.0 && m.height > 0.0)
    }
}
