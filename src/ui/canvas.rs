use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use egui::{Align2, Color32, FontId, Pos2, Rect, RichText, Stroke, StrokeKind, Vec2};

use crate::{
    editor::{
        editor_types::{Rectangle, Shape},
        geometry::MIN_RECT_SIZE,
        session::SessionPhase,
    },
    ui::ui_types::{App, CanvasDrag},
};

const HANDLE_SIZE: f32 = 8.0;
const SELECT_COLOR: Color32 = Color32::from_rgb(50, 158, 244);
const DETECTION_COLOR: Color32 = Color32::from_rgb(255, 80, 80);

/// One of the eight resize handles around the selected rectangle, named by
/// compass direction.
#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeHandle {
    NW,
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::NW,
        ResizeHandle::N,
        ResizeHandle::NE,
        ResizeHandle::E,
        ResizeHandle::SE,
        ResizeHandle::S,
        ResizeHandle::SW,
        ResizeHandle::W,
    ];

    /// Handle position on the rectangle's edge, in canvas coordinates.
    pub fn pos(&self, rect: &Rectangle) -> Pos2 {
        let [x0, y0, x1, y1] = rect.corners();
        let (cx, cy) = ((x0 + x1) / 2.0, (y0 + y1) / 2.0);
        match self {
            ResizeHandle::NW => Pos2::new(x0, y0),
            ResizeHandle::N => Pos2::new(cx, y0),
            ResizeHandle::NE => Pos2::new(x1, y0),
            ResizeHandle::E => Pos2::new(x1, cy),
            ResizeHandle::SE => Pos2::new(x1, y1),
            ResizeHandle::S => Pos2::new(cx, y1),
            ResizeHandle::SW => Pos2::new(x0, y1),
            ResizeHandle::W => Pos2::new(x0, cy),
        }
    }

    /// The rectangle produced by dragging this handle to `p`, as
    /// `(x, y, width, height)`. The opposite corner stays fixed.
    pub fn resized(&self, start: &Rectangle, p: Pos2) -> (f32, f32, f32, f32) {
        let [x0, y0, x1, y1] = start.corners();
        let (nx0, ny0, nx1, ny1) = match self {
            ResizeHandle::NW => (p.x, p.y, x1, y1),
            ResizeHandle::N => (x0, p.y, x1, y1),
            ResizeHandle::NE => (x0, p.y, p.x, y1),
            ResizeHandle::E => (x0, y0, p.x, y1),
            ResizeHandle::SE => (x0, y0, p.x, p.y),
            ResizeHandle::S => (x0, y0, x1, p.y),
            ResizeHandle::SW => (p.x, y0, x1, p.y),
            ResizeHandle::W => (p.x, y0, x1, y1),
        };
        (nx0, ny0, nx1 - nx0, ny1 - ny0)
    }
}

/// canvas
impl App {
    pub fn canvas(&mut self, ui: &mut egui::Ui) {
        match self.session.phase() {
            SessionPhase::Idle => {
                ui.centered_and_justified(|ui| {
                    ui.label(RichText::new("Select an image to begin").size(16.));
                });
                return;
            }
            SessionPhase::ImageLoading => {
                ui.centered_and_justified(|ui| {
                    ui.vertical_centered(|ui| {
                        ui.spinner();
                        ui.label("Loading image...");
                    });
                });
                return;
            }
            SessionPhase::Ready | SessionPhase::InferenceRunning => {}
        }

        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let origin = response.rect.min;

        self.handle_pan_zoom(ui, &response, origin);
        if !self.is_panning {
            self.handle_pointer(ui, &response, origin);
        }
        self.paint(&painter, origin);
    }

    fn handle_pan_zoom(&mut self, ui: &mut egui::Ui, response: &egui::Response, origin: Pos2) {
        let (middle_down, pointer_delta) =
            ui.input(|i| (i.pointer.middle_down(), i.pointer.delta()));

        // Panning and drawing are mutually exclusive.
        if middle_down && (response.hovered() || self.is_panning) {
            self.view.pan_by(pointer_delta);
            self.is_panning = true;
        } else {
            self.is_panning = false;
        }

        if response.hovered() {
            let delta = ui.input(|i| {
                i.events.iter().find_map(|e| match e {
                    egui::Event::MouseWheel { delta, .. } => Some(*delta),
                    _ => None,
                })
            });
            if let (Some(delta), Some(pos)) = (delta, response.hover_pos()) {
                if delta.y != 0. {
                    let pointer = (pos - origin).to_pos2();
                    self.view.zoom_at(pointer, delta.y > 0.);
                }
            }
        }
    }

    fn handle_pointer(&mut self, ui: &mut egui::Ui, response: &egui::Response, origin: Pos2) {
        let Some(pos) = response
            .interact_pointer_pos()
            .or_else(|| response.hover_pos())
        else {
            return;
        };
        let canvas_pos = self.view.to_canvas(origin, pos);

        if response.drag_started_by(egui::PointerButton::Primary) {
            if let Some((id, handle)) = self.handle_at(origin, pos) {
                if let Some(start) = self.geometry.rect(&id).cloned() {
                    self.drag = CanvasDrag::Resizing { id, handle, start };
                }
            } else if self.geometry.start_rectangle(canvas_pos).is_some() {
                self.drag = CanvasDrag::Drawing;
            } else if let Some(rect) = self
                .geometry
                .rectangles()
                .iter()
                .rev()
                .find(|r| r.contains(canvas_pos.x, canvas_pos.y))
                .cloned()
            {
                self.geometry.select(Some(&rect.id));
                self.drag = CanvasDrag::Moving {
                    id: rect.id,
                    grab_offset: canvas_pos - Pos2::new(rect.x, rect.y),
                };
            } else {
                self.geometry.select(None);
            }
        }

        if response.dragged_by(egui::PointerButton::Primary) {
            match self.drag.clone() {
                CanvasDrag::None => {}
                CanvasDrag::Drawing => self.geometry.update_drawing(canvas_pos),
                CanvasDrag::Moving { id, grab_offset } => {
                    self.geometry
                        .move_rectangle(&id, canvas_pos - grab_offset);
                }
                CanvasDrag::Resizing { id, handle, start } => {
                    let (x, y, w, h) = handle.resized(&start, canvas_pos);
                    // Under-minimum candidates leave the prior box in place.
                    if w >= MIN_RECT_SIZE && h >= MIN_RECT_SIZE {
                        self.geometry
                            .resize_rectangle(&id, w, h, Pos2::new(x, y));
                    }
                }
            }
        }

        if response.drag_stopped_by(egui::PointerButton::Primary) {
            if self.drag == CanvasDrag::Drawing {
                self.geometry.commit_rectangle();
            }
            self.drag = CanvasDrag::None;
        }

        if response.clicked() {
            let hit = self
                .geometry
                .rectangles()
                .iter()
                .rev()
                .find(|r| r.contains(canvas_pos.x, canvas_pos.y))
                .map(|r| r.id.clone());
            self.geometry.select(hit.as_deref());
        }
    }

    /// Which resize handle of the selected rectangle, if any, is under the
    /// pointer. Hit testing happens in screen space so handles stay grabbable
    /// at any zoom.
    fn handle_at(&self, origin: Pos2, screen_pos: Pos2) -> Option<(String, ResizeHandle)> {
        let id = self.geometry.selected()?;
        let rect = self.geometry.rect(id)?;
        for handle in ResizeHandle::ALL {
            let center = self.view.to_screen(origin, handle.pos(rect));
            let hit = Rect::from_center_size(center, Vec2::splat(HANDLE_SIZE + 4.0));
            if hit.contains(screen_pos) {
                return Some((id.to_string(), handle));
            }
        }
        None
    }

    /// The background to draw: the selected model's rendered result image
    /// when one has been fetched, otherwise the plain selected image.
    fn display_texture(&self) -> Option<&egui::TextureHandle> {
        self.session
            .selected_run()
            .and_then(|run| self.result_textures.get(&run.model_name))
            .or(self.image_texture.as_ref())
    }

    /// Detection boxes arrive in original-image coordinates; everything else
    /// is already in canvas space.
    fn fit_scale(&self) -> f32 {
        match (self.display_texture(), self.session.image_size()) {
            (Some(tex), Some([w, _])) if w > 0 => tex.size()[0] as f32 / w as f32,
            _ => 1.0,
        }
    }

    fn paint(&self, painter: &egui::Painter, origin: Pos2) {
        painter.rect_filled(painter.clip_rect(), 0.0, Color32::from_gray(30));

        if let Some(texture) = self.display_texture() {
            let size = texture.size();
            let min = self.view.to_screen(origin, Pos2::ZERO);
            let max = self
                .view
                .to_screen(origin, Pos2::new(size[0] as f32, size[1] as f32));
            painter.image(
                texture.id(),
                Rect::from_min_max(min, max),
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        }

        let fit = self.fit_scale();
        for shape in self.geometry.shapes() {
            match shape {
                Shape::Drawn(rect) => {
                    let [x0, y0, x1, y1] = rect.corners();
                    let screen = Rect::from_two_pos(
                        self.view.to_screen(origin, Pos2::new(x0, y0)),
                        self.view.to_screen(origin, Pos2::new(x1, y1)),
                    );
                    let selected = self.geometry.selected() == Some(rect.id.as_str());
                    let color = if selected { SELECT_COLOR } else { Color32::WHITE };
                    painter.rect_stroke(
                        screen,
                        0.0,
                        Stroke::new(2.0, color),
                        StrokeKind::Middle,
                    );
                    if selected {
                        for handle in ResizeHandle::ALL {
                            let center = self.view.to_screen(origin, handle.pos(rect));
                            let hrect =
                                Rect::from_center_size(center, Vec2::splat(HANDLE_SIZE));
                            painter.rect_filled(hrect, 0.0, Color32::WHITE);
                            painter.rect_stroke(
                                hrect,
                                0.0,
                                Stroke::new(1.0, SELECT_COLOR),
                                StrokeKind::Middle,
                            );
                        }
                    }
                }
                Shape::Detection(b) => {
                    let min = self
                        .view
                        .to_screen(origin, Pos2::new(b.x * fit, b.y * fit));
                    let max = self.view.to_screen(
                        origin,
                        Pos2::new((b.x + b.width) * fit, (b.y + b.height) * fit),
                    );
                    let screen = Rect::from_min_max(min, max);
                    painter.rect_stroke(
                        screen,
                        0.0,
                        Stroke::new(2.0, DETECTION_COLOR),
                        StrokeKind::Middle,
                    );
                    let label = format!("{} ({:.2}%)", b.class, b.confidence * 100.0);
                    painter.text(
                        screen.min - Vec2::new(0.0, 2.0),
                        Align2::LEFT_BOTTOM,
                        label,
                        FontId::proportional(12.0),
                        DETECTION_COLOR,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use egui::pos2;

    use super::*;

    fn rect() -> Rectangle {
        Rectangle {
            id: "rect1".to_string(),
            x: 100.0,
            y: 100.0,
            width: 60.0,
            height: 40.0,
        }
    }

    #[test]
    fn handles_sit_on_edges_and_corners() {
        let r = rect();
        assert_eq!(ResizeHandle::NW.pos(&r), pos2(100.0, 100.0));
        assert_eq!(ResizeHandle::SE.pos(&r), pos2(160.0, 140.0));
        assert_eq!(ResizeHandle::N.pos(&r), pos2(130.0, 100.0));
        assert_eq!(ResizeHandle::W.pos(&r), pos2(100.0, 120.0));
    }

    #[test]
    fn corner_resize_keeps_opposite_corner_fixed() {
        let r = rect();
        let (x, y, w, h) = ResizeHandle::SE.resized(&r, pos2(200.0, 180.0));
        assert_eq!((x, y, w, h), (100.0, 100.0, 100.0, 80.0));

        let (x, y, w, h) = ResizeHandle::NW.resized(&r, pos2(90.0, 80.0));
        assert_eq!((x, y), (90.0, 80.0));
        assert_eq!((x + w, y + h), (160.0, 140.0));
    }

    #[test]
    fn edge_resize_moves_one_edge_only() {
        let r = rect();
        let (x, y, w, h) = ResizeHandle::E.resized(&r, pos2(180.0, 999.0));
        assert_eq!((x, y, w, h), (100.0, 100.0, 80.0, 40.0));

        let (x, y, w, h) = ResizeHandle::N.resized(&r, pos2(999.0, 90.0));
        assert_eq!((x, y, w, h), (100.0, 90.0, 60.0, 50.0));
    }

    #[test]
    fn under_minimum_candidate_is_detectable() {
        let r = rect();
        let (_, _, w, h) = ResizeHandle::SE.resized(&r, pos2(110.0, 105.0));
        assert!(w < MIN_RECT_SIZE || h < MIN_RECT_SIZE);
    }
}
