use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use std::collections::HashSet;

use egui::Pos2;

use super::editor_types::{DetectionBox, Rectangle, Shape, Tool};

/// Minimum rectangle edge length. A draw gesture finishing under this on
/// either axis is treated as an accidental click and discarded; transform
/// resizes are floored here instead.
pub const MIN_RECT_SIZE: f32 = 20.0;

/// Single shared mutable store for the editor: user rectangles, detection
/// boxes, selection and the checked set. All mutations happen on the UI
/// thread.
#[derive(Default)]
pub struct GeometryStore {
    rectangles: Vec<Rectangle>,
    detections: Vec<DetectionBox>,
    selected: Option<String>,
    checked: HashSet<String>,
    drawing: bool,
    next_rect_id: u64,
    pub tool: Tool,
}

/// accessors
impl GeometryStore {
    pub fn rectangles(&self) -> &[Rectangle] {
        &self.rectangles
    }

    pub fn detections(&self) -> &[DetectionBox] {
        &self.detections
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn checked(&self) -> &HashSet<String> {
        &self.checked
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn rect(&self, id: &str) -> Option<&Rectangle> {
        self.rectangles.iter().find(|r| r.id == id)
    }

    /// Rectangles first, detections after, each tagged by variant.
    pub fn shapes(&self) -> impl Iterator<Item = Shape<'_>> {
        self.rectangles
            .iter()
            .map(Shape::Drawn)
            .chain(self.detections.iter().map(Shape::Detection))
    }
}

/// draw gesture
impl GeometryStore {
    /// Begins a new rectangle at `point` with zero size. No-op unless the
    /// bounding-box tool is active and no draw is already in progress.
    pub fn start_rectangle(&mut self, point: Pos2) -> Option<String> {
        if self.tool != Tool::BoundingBox || self.drawing {
            return None;
        }
        self.next_rect_id += 1;
        let id = format!("rect{}", self.next_rect_id);
        self.rectangles.push(Rectangle {
            id: id.clone(),
            x: point.x,
            y: point.y,
            width: 0.0,
            height: 0.0,
        });
        self.drawing = true;
        Some(id)
    }

    /// Live-resizes the mid-draw rectangle towards `point`. Width/height are
    /// signed and may go negative while dragging up/left.
    pub fn update_drawing(&mut self, point: Pos2) {
        if !self.drawing {
            return;
        }
        if let Some(rect) = self.rectangles.last_mut() {
            rect.width = point.x - rect.x;
            rect.height = point.y - rect.y;
        }
    }

    /// Finishes the draw gesture: flips a negative extent so width/height end
    /// up non-negative, and discards the rectangle entirely if either final
    /// dimension is under [`MIN_RECT_SIZE`].
    pub fn commit_rectangle(&mut self) -> Option<&Rectangle> {
        if !self.drawing {
            return None;
        }
        self.drawing = false;

        let too_small = match self.rectangles.last() {
            Some(r) => r.width.abs() < MIN_RECT_SIZE || r.height.abs() < MIN_RECT_SIZE,
            None => return None,
        };
        if too_small {
            trace!("discarding rectangle below minimum size");
            self.rectangles.pop();
            return None;
        }

        if let Some(rect) = self.rectangles.last_mut() {
            if rect.width < 0.0 {
                rect.x += rect.width;
                rect.width = -rect.width;
            }
            if rect.height < 0.0 {
                rect.y += rect.height;
                rect.height = -rect.height;
            }
        }
        self.rectangles.last()
    }
}

/// rectangle edits
impl GeometryStore {
    /// Repositions an existing rectangle. Dragging always selects the
    /// rectangle as a side effect.
    pub fn move_rectangle(&mut self, id: &str, pos: Pos2) {
        if let Some(rect) = self.rectangles.iter_mut().find(|r| r.id == id) {
            rect.x = pos.x;
            rect.y = pos.y;
            self.selected = Some(id.to_string());
        }
    }

    /// Applies a transform-handle resize. Dimensions are floored at
    /// [`MIN_RECT_SIZE`] rather than rejected.
    pub fn resize_rectangle(&mut self, id: &str, width: f32, height: f32, origin: Pos2) {
        if let Some(rect) = self.rectangles.iter_mut().find(|r| r.id == id) {
            rect.x = origin.x;
            rect.y = origin.y;
            rect.width = width.max(MIN_RECT_SIZE);
            rect.height = height.max(MIN_RECT_SIZE);
        }
    }

    pub fn delete_rectangle(&mut self, id: &str) {
        self.rectangles.retain(|r| r.id != id);
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
    }

    pub fn clear_rectangles(&mut self) {
        self.rectangles.clear();
        self.selected = None;
        self.drawing = false;
    }

    /// Deletes the selected rectangle, if any. Returns whether a rectangle
    /// was removed.
    pub fn delete_selected(&mut self) -> bool {
        let Some(id) = self.selected.clone() else {
            return false;
        };
        let before = self.rectangles.len();
        self.delete_rectangle(&id);
        before != self.rectangles.len()
    }

    /// Selects a user rectangle, or deselects with `None`. Ids that do not
    /// resolve to a live rectangle (including detection ids) clear the
    /// selection instead.
    pub fn select(&mut self, id: Option<&str>) {
        self.selected = match id {
            Some(id) if self.rectangles.iter().any(|r| r.id == id) => Some(id.to_string()),
            _ => None,
        };
    }
}

/// detection boxes
impl GeometryStore {
    /// Wholesale replacement after an inference run. The checked set never
    /// survives a replacement.
    pub fn replace_detections(&mut self, boxes: Vec<DetectionBox>) {
        self.detections = boxes;
        self.checked.clear();
    }

    /// Marks or unmarks a detection for bulk deletion. Ids not currently in
    /// the detection collection are ignored, keeping the checked set a subset
    /// of live detections.
    pub fn set_checked(&mut self, id: &str, checked: bool) {
        if checked {
            if self.detections.iter().any(|b| b.id == id) {
                self.checked.insert(id.to_string());
            }
        } else {
            self.checked.remove(id);
        }
    }

    /// Removes exactly the given detections, purging them from the checked
    /// set as well.
    pub fn remove_detections(&mut self, ids: &[String]) {
        self.detections.retain(|b| !ids.contains(&b.id));
        for id in ids {
            self.checked.remove(id);
        }
    }

    /// Bulk deletion of every checked detection. Returns how many were
    /// removed.
    pub fn delete_checked(&mut self) -> usize {
        let ids: Vec<String> = self.checked.iter().cloned().collect();
        if ids.is_empty() {
            return 0;
        }
        debug!("deleting {} checked detection boxes", ids.len());
        self.remove_detections(&ids);
        ids.len()
    }

    /// Full reset when a new image is selected: detections, checked set,
    /// rectangles and selection all go.
    pub fn reset(&mut self) {
        self.rectangles.clear();
        self.detections.clear();
        self.checked.clear();
        self.selected = None;
        self.drawing = false;
    }
}

#[cfg(test)]
mod tests {
    use egui::pos2;

    use super::*;

    fn bbox_store() -> GeometryStore {
        let mut store = GeometryStore::default();
        store.tool = Tool::BoundingBox;
        store
    }

    fn detection(id: &str) -> DetectionBox {
        DetectionBox {
            id: id.to_string(),
            x: 10.0,
            y: 20.0,
            width: 50.0,
            height: 70.0,
            class: "fracture".to_string(),
            confidence: 0.87,
        }
    }

    #[test]
    fn start_is_noop_without_bounding_box_tool() {
        let mut store = GeometryStore::default();
        assert_eq!(store.start_rectangle(pos2(10.0, 10.0)), None);
        assert!(store.rectangles().is_empty());
    }

    #[test]
    fn draw_below_minimum_is_discarded() {
        // Pointer down at (100,100), move to (90,80), up: 10x20 is under the
        // 20-unit floor on width, so nothing survives.
        let mut store = bbox_store();
        store.start_rectangle(pos2(100.0, 100.0));
        store.update_drawing(pos2(90.0, 80.0));
        let rect = store.rectangles().last().cloned();
        assert_eq!(rect.as_ref().map(|r| r.width), Some(-10.0));
        assert_eq!(rect.as_ref().map(|r| r.height), Some(-20.0));
        assert!(store.commit_rectangle().is_none());
        assert!(store.rectangles().is_empty());
    }

    #[test]
    fn draw_valid_commits_and_is_selectable() {
        let mut store = bbox_store();
        store.start_rectangle(pos2(100.0, 100.0));
        store.update_drawing(pos2(150.0, 180.0));
        let rect = store.commit_rectangle().cloned();
        let rect = rect.as_ref().map(|r| (r.x, r.y, r.width, r.height));
        assert_eq!(rect, Some((100.0, 100.0, 50.0, 80.0)));

        let id = store.rectangles()[0].id.clone();
        store.select(Some(&id));
        assert_eq!(store.selected(), Some(id.as_str()));
    }

    #[test]
    fn draw_up_left_normalizes_origin() {
        let mut store = bbox_store();
        store.start_rectangle(pos2(100.0, 100.0));
        store.update_drawing(pos2(60.0, 50.0));
        let rect = store.commit_rectangle().cloned();
        let rect = rect.as_ref().map(|r| (r.x, r.y, r.width, r.height));
        assert_eq!(rect, Some((60.0, 50.0, 40.0, 50.0)));
    }

    #[test]
    fn committed_rectangles_always_meet_minimum() {
        let gestures = [
            ((0.0, 0.0), (19.0, 19.0)),
            ((0.0, 0.0), (25.0, 19.9)),
            ((0.0, 0.0), (300.0, 1.0)),
            ((50.0, 50.0), (20.0, 90.0)),
            ((50.0, 50.0), (250.0, 250.0)),
        ];
        for (start, end) in gestures {
            let mut store = bbox_store();
            store.start_rectangle(pos2(start.0, start.1));
            store.update_drawing(pos2(end.0, end.1));
            store.commit_rectangle();
            for rect in store.rectangles() {
                assert!(rect.width >= MIN_RECT_SIZE);
                assert!(rect.height >= MIN_RECT_SIZE);
            }
        }
    }

    #[test]
    fn second_start_during_draw_is_ignored() {
        let mut store = bbox_store();
        assert!(store.start_rectangle(pos2(0.0, 0.0)).is_some());
        assert!(store.start_rectangle(pos2(50.0, 50.0)).is_none());
        assert_eq!(store.rectangles().len(), 1);
    }

    #[test]
    fn resize_never_goes_below_minimum() {
        let mut store = bbox_store();
        store.start_rectangle(pos2(0.0, 0.0));
        store.update_drawing(pos2(100.0, 100.0));
        store.commit_rectangle();
        let id = store.rectangles()[0].id.clone();

        store.resize_rectangle(&id, 5.0, -30.0, pos2(10.0, 10.0));
        let rect = store.rect(&id).cloned();
        assert_eq!(rect.as_ref().map(|r| r.width), Some(MIN_RECT_SIZE));
        assert_eq!(rect.as_ref().map(|r| r.height), Some(MIN_RECT_SIZE));

        store.resize_rectangle(&id, 40.0, 60.0, pos2(0.0, 0.0));
        let rect = store.rect(&id).cloned();
        assert_eq!(rect.as_ref().map(|r| (r.width, r.height)), Some((40.0, 60.0)));
    }

    #[test]
    fn move_selects_as_side_effect() {
        let mut store = bbox_store();
        store.start_rectangle(pos2(0.0, 0.0));
        store.update_drawing(pos2(100.0, 100.0));
        store.commit_rectangle();
        let id = store.rectangles()[0].id.clone();
        assert_eq!(store.selected(), None);

        store.move_rectangle(&id, pos2(30.0, 40.0));
        assert_eq!(store.selected(), Some(id.as_str()));
        let rect = store.rect(&id).cloned();
        assert_eq!(rect.as_ref().map(|r| (r.x, r.y)), Some((30.0, 40.0)));
        assert_eq!(rect.as_ref().map(|r| (r.width, r.height)), Some((100.0, 100.0)));
    }

    #[test]
    fn deleting_selected_clears_selection() {
        let mut store = bbox_store();
        store.start_rectangle(pos2(0.0, 0.0));
        store.update_drawing(pos2(100.0, 100.0));
        store.commit_rectangle();
        let id = store.rectangles()[0].id.clone();
        store.select(Some(&id));

        assert!(store.delete_selected());
        assert_eq!(store.selected(), None);
        assert!(store.rectangles().is_empty());
        assert!(!store.delete_selected());
    }

    #[test]
    fn detection_ids_are_not_selectable() {
        let mut store = GeometryStore::default();
        store.replace_detections(vec![detection("inference_0")]);
        store.select(Some("inference_0"));
        assert_eq!(store.selected(), None);
    }

    #[test]
    fn checked_set_stays_subset_of_detections() {
        let mut store = GeometryStore::default();
        store.replace_detections(vec![detection("a"), detection("b"), detection("c")]);
        store.set_checked("a", true);
        store.set_checked("b", true);
        store.set_checked("ghost", true);
        assert_eq!(store.checked().len(), 2);

        store.remove_detections(&["a".to_string()]);
        assert!(!store.checked().contains("a"));
        for id in store.checked() {
            assert!(store.detections().iter().any(|b| &b.id == id));
        }
    }

    #[test]
    fn bulk_delete_removes_exactly_checked() {
        let mut store = GeometryStore::default();
        store.replace_detections(vec![detection("a"), detection("b"), detection("c")]);
        store.set_checked("a", true);
        store.set_checked("c", true);

        assert_eq!(store.delete_checked(), 2);
        assert_eq!(store.detections().len(), 1);
        assert_eq!(store.detections()[0].id, "b");
        assert!(store.checked().is_empty());
    }

    #[test]
    fn replace_clears_checked_and_prior_boxes() {
        let mut store = GeometryStore::default();
        store.replace_detections(vec![detection("old_0"), detection("old_1")]);
        store.set_checked("old_0", true);

        store.replace_detections(vec![detection("new_0")]);
        assert!(store.checked().is_empty());
        assert!(store.detections().iter().all(|b| b.id == "new_0"));
    }

    #[test]
    fn reset_clears_everything() {
        let mut store = bbox_store();
        store.start_rectangle(pos2(0.0, 0.0));
        store.update_drawing(pos2(100.0, 100.0));
        store.commit_rectangle();
        store.replace_detections(vec![detection("a")]);
        store.set_checked("a", true);

        store.reset();
        assert!(store.rectangles().is_empty());
        assert!(store.detections().is_empty());
        assert!(store.checked().is_empty());
        assert_eq!(store.selected(), None);
        assert!(!store.is_drawing());
    }
}
