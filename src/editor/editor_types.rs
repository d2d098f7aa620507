use serde::{Deserialize, Serialize};

/// Active canvas tool. `Select` covers click-select and drag-move;
/// `BoundingBox` arms the draw gesture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tool {
    Select,
    BoundingBox,
}

impl Default for Tool {
    fn default() -> Self {
        Tool::Select
    }
}

/// User-drawn bounding box, in canvas coordinates.
///
/// Width/height may be negative while a draw gesture is in progress; they are
/// normalized to non-negative at commit time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rectangle {
    pub fn corners(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        let [x1, y1, x2, y2] = self.corners();
        let (x1, x2) = (x1.min(x2), x1.max(x2));
        let (y1, y2) = (y1.min(y2), y1.max(y2));
        px >= x1 && px <= x2 && py >= y1 && py <= y2
    }
}

/// Model-produced bounding box, in original-image coordinates.
///
/// Immutable apart from removal; the whole collection is replaced on every
/// inference run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub class: String,
    pub confidence: f32,
}

impl DetectionBox {
    /// `[x1, y1, x2, y2]` corner form, as shown in the result panel.
    pub fn corners(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }
}

/// Tagged view over both shape kinds, so the rendering layer can walk the
/// store once and discriminate by variant.
#[derive(Clone, Copy, Debug)]
pub enum Shape<'a> {
    Drawn(&'a Rectangle),
    Detection(&'a DetectionBox),
}
