// Shared collision detector. One instance lives for a whole rendering pass;
// boxes are only ever added.

use crate::geometry::BoundingBox;
use std::collections::{BTreeSet, HashMap, HashSet};

const DEFAULT_CELL_SIZE: f64 = 64.0;
const MIN_CELL_SIZE: f64 = 8.0;
const DEFAULT_PARTITION: &str = "";

/// Named detector partitions. An empty set addresses the default partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollisionKeys(BTreeSet<String>);

impl CollisionKeys {
    /// Parse a comma separated list (`"roads, pois"`). Blank names are dropped.
    pub fn parse(raw: Option<&str>) -> Self {
        let keys = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        Self(keys)
    }

    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }

    pub fn partitions(&self) -> Vec<&str> {
        if self.0.is_empty() {
            vec![DEFAULT_PARTITION]
        } else {
            self.0.iter().map(String::as_str).collect()
        }
    }
}

/// Contract the layouts rely on.
///
/// Queries never mutate. Callers test every box of an attempt first and only
/// then insert them, so a rejected attempt leaves no trace.
pub trait CollisionDetector {
    /// Area in which placements are considered. Boxes that miss it entirely
    /// are treated as colliding by the layouts.
    fn extent(&self) -> BoundingBox;

    /// True when `bbox` grown by `margin` hits nothing in the `detect`
    /// partitions.
    fn has_placement(&self, bbox: &BoundingBox, margin: f64, detect: &CollisionKeys) -> bool;

    /// Like [`has_placement`](Self::has_placement), except boxes tagged with
    /// `repeat_key` do not block by intersection; they block only while
    /// their centers are closer than `repeat_distance`. A repeat distance
    /// not larger than the margin disables the exemption.
    fn has_placement_repeat(
        &self,
        bbox: &BoundingBox,
        margin: f64,
        repeat_key: &str,
        repeat_distance: f64,
        detect: &CollisionKeys,
    ) -> bool;

    fn insert(&mut self, bbox: BoundingBox, repeat_key: Option<&str>, insert: &CollisionKeys);
}

#[derive(Debug, Clone)]
struct Entry {
    bbox: BoundingBox,
    repeat_key: Option<String>,
}

/// Spatial hash over the boxes of one partition.
///
/// Boxes spanning more than `MAX_INDEXED_CELLS` cells skip the grid and are
/// scanned on every query; queries only walk cells inside the occupied range
/// and fall back to a plain scan when that range outnumbers the entries.
#[derive(Debug, Clone)]
struct Partition {
    cell: f64,
    entries: Vec<Entry>,
    /// Maps grid cell (ix, iy) to indices into `entries`.
    cells: HashMap<(i64, i64), Vec<usize>>,
    wide: Vec<usize>,
    occupied: Option<CellRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellRange {
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
}

impl CellRange {
    fn count(&self) -> u128 {
        let w = (self.x1 as i128 - self.x0 as i128 + 1).max(0) as u128;
        let h = (self.y1 as i128 - self.y0 as i128 + 1).max(0) as u128;
        w * h
    }

    fn union(&self, other: &CellRange) -> CellRange {
        CellRange {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    fn intersection(&self, other: &CellRange) -> Option<CellRange> {
        let out = CellRange {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        (out.x0 <= out.x1 && out.y0 <= out.y1).then_some(out)
    }

    fn keys(self) -> impl Iterator<Item = (i64, i64)> {
        (self.x0..=self.x1).flat_map(move |ix| (self.y0..=self.y1).map(move |iy| (ix, iy)))
    }
}

const MAX_INDEXED_CELLS: u128 = 1024;

impl Partition {
    fn new(cell: f64) -> Self {
        Self {
            cell,
            entries: Vec::new(),
            cells: HashMap::new(),
            wide: Vec::new(),
            occupied: None,
        }
    }

    // `as` saturates, so huge or infinite coordinates stay in range.
    fn cell_range(&self, rect: &BoundingBox) -> CellRange {
        CellRange {
            x0: (rect.minx / self.cell).floor() as i64,
            y0: (rect.miny / self.cell).floor() as i64,
            x1: (rect.maxx / self.cell).floor() as i64,
            y1: (rect.maxy / self.cell).floor() as i64,
        }
    }

    fn insert(&mut self, entry: Entry) {
        let idx = self.entries.len();
        let range = self.cell_range(&entry.bbox);
        if range.count() > MAX_INDEXED_CELLS {
            self.wide.push(idx);
        } else {
            for key in range.keys() {
                self.cells.entry(key).or_default().push(idx);
            }
            self.occupied = Some(match self.occupied {
                Some(occupied) => occupied.union(&range),
                None => range,
            });
        }
        self.entries.push(entry);
    }

    /// Entries that could overlap with `rect`.
    fn query(&self, rect: &BoundingBox) -> Vec<&Entry> {
        let walk = self
            .occupied
            .and_then(|occupied| occupied.intersection(&self.cell_range(rect)));
        let Some(walk) = walk else {
            return self.wide.iter().map(|&idx| &self.entries[idx]).collect();
        };
        if walk.count() > self.entries.len() as u128 {
            return self.entries.iter().collect();
        }
        let mut seen = HashSet::new();
        self.wide
            .iter()
            .copied()
            .chain(walk.keys().flat_map(|key| {
                self.cells
                    .get(&key)
                    .map(|v| v.as_slice())
                    .unwrap_or(&[])
                    .iter()
                    .copied()
            }))
            .filter(|idx| seen.insert(*idx))
            .map(|idx| &self.entries[idx])
            .collect()
    }
}

/// Grid-hashed detector with named partitions and repeat-key bookkeeping.
#[derive(Debug, Clone)]
pub struct LabelCollisionDetector {
    extent: BoundingBox,
    cell: f64,
    partitions: HashMap<String, Partition>,
}

impl LabelCollisionDetector {
    pub fn new(extent: BoundingBox) -> Self {
        Self::with_cell_size(extent, DEFAULT_CELL_SIZE)
    }

    pub fn with_cell_size(extent: BoundingBox, cell: f64) -> Self {
        Self {
            extent,
            cell: cell.max(MIN_CELL_SIZE),
            partitions: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.partitions.values().map(|p| p.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored box, partition order unspecified.
    pub fn boxes(&self) -> impl Iterator<Item = &BoundingBox> + '_ {
        self.partitions
            .values()
            .flat_map(|p| p.entries.iter().map(|e| &e.bbox))
    }

    /// Start a new rendering pass.
    pub fn clear(&mut self) {
        self.partitions.clear();
    }
}

impl CollisionDetector for LabelCollisionDetector {
    fn extent(&self) -> BoundingBox {
        self.extent
    }

    fn has_placement(&self, bbox: &BoundingBox, margin: f64, detect: &CollisionKeys) -> bool {
        let margin_box = if margin > 0.0 { bbox.inflate(margin) } else { *bbox };
        detect.partitions().into_iter().all(|name| {
            self.partitions.get(name).is_none_or(|partition| {
                !partition
                    .query(&margin_box)
                    .into_iter()
                    .any(|entry| entry.bbox.intersects(&margin_box))
            })
        })
    }

    fn has_placement_repeat(
        &self,
        bbox: &BoundingBox,
        margin: f64,
        repeat_key: &str,
        repeat_distance: f64,
        detect: &CollisionKeys,
    ) -> bool {
        if repeat_distance <= margin.max(0.0) {
            return self.has_placement(bbox, margin, detect);
        }
        let margin_box = if margin > 0.0 { bbox.inflate(margin) } else { *bbox };
        let search = bbox.inflate(repeat_distance);
        let center = bbox.center();
        detect.partitions().into_iter().all(|name| {
            self.partitions.get(name).is_none_or(|partition| {
                !partition.query(&search).into_iter().any(|entry| {
                    if entry.repeat_key.as_deref() == Some(repeat_key) {
                        entry.bbox.center().distance(&center) < repeat_distance
                    } else {
                        entry.bbox.intersects(&margin_box)
                    }
                })
            })
        })
    }

    fn insert(&mut self, bbox: BoundingBox, repeat_key: Option<&str>, insert: &CollisionKeys) {
        for name in insert.partitions() {
            let cell = self.cell;
            self.partitions
                .entry(name.to_string())
                .or_insert_with(|| Partition::new(cell))
                .insert(Entry {
                    bbox,
                    repeat_key: repeat_key.map(str::to_string),
                });
        }
    }
}
