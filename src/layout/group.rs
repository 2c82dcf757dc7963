use crate::collision::CollisionDetector;
use crate::geometry::BoundingBox;
use crate::params::PlacementParams;
use crate::style::EvaluatedTextProperties;
use serde::{Deserialize, Serialize};

use super::{CollisionCheck, Layout, PixelPosition, PointPosition};

/// One box of a composite label, relative to the candidate position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxElement {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_key: Option<String>,
}

impl BoxElement {
    pub fn new(bbox: BoundingBox, repeat_key: Option<&str>) -> Self {
        Self {
            bbox,
            repeat_key: repeat_key.map(str::to_string),
        }
    }

    pub fn at(&self, pos: PixelPosition) -> BoundingBox {
        let mut bbox = self.bbox;
        bbox.move_by(pos.x, pos.y);
        bbox
    }
}

/// Places a fixed set of boxes around each candidate. Accepted candidates are
/// reported as raw positions.
pub struct GroupLayout<'a> {
    check: CollisionCheck,
    elements: &'a [BoxElement],
}

impl<'a> GroupLayout<'a> {
    pub fn new(
        params: &PlacementParams<'_>,
        props: &EvaluatedTextProperties,
        elements: &'a [BoxElement],
    ) -> Self {
        Self {
            check: CollisionCheck::new(params, props, props.margin),
            elements,
        }
    }
}

impl Layout for GroupLayout<'_> {
    type Output = PixelPosition;

    fn try_placement(
        &mut self,
        detector: &mut dyn CollisionDetector,
        pos: PointPosition,
        placements: &mut Vec<PixelPosition>,
    ) -> bool {
        if self.elements.is_empty() {
            return true;
        }
        let mut real_boxes = Vec::with_capacity(self.elements.len());
        for elem in self.elements {
            let bbox = elem.at(pos.coords);
            if self
                .check
                .collides(&*detector, &bbox, elem.repeat_key.as_deref())
            {
                return false;
            }
            real_boxes.push(bbox);
        }
        for (elem, bbox) in self.elements.iter().zip(real_boxes) {
            self.check.insert(detector, bbox, elem.repeat_key.as_deref());
        }
        placements.push(pos.coords);
        true
    }
}
