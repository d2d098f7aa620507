use egui::{Pos2, Vec2};

pub const ZOOM_STEP: f32 = 1.1;
pub const MIN_SCALE: f32 = 0.1;
pub const MAX_SCALE: f32 = 10.0;

/// Pan offset + uniform scale applied at render time. Stored geometry is
/// never mutated by viewing operations.
#[derive(Clone, Copy, Debug)]
pub struct ViewTransform {
    pub offset: Vec2,
    pub scale: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            scale: 1.0,
        }
    }
}

impl ViewTransform {
    /// Canvas point to screen, given the screen-space origin of the canvas
    /// widget.
    pub fn to_screen(&self, origin: Pos2, canvas: Pos2) -> Pos2 {
        origin + self.offset + canvas.to_vec2() * self.scale
    }

    /// Screen point back to canvas space.
    pub fn to_canvas(&self, origin: Pos2, screen: Pos2) -> Pos2 {
        ((screen - origin - self.offset) / self.scale).to_pos2()
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// One wheel notch of zoom, anchored so the canvas point under `pointer`
    /// (origin-relative screen position) stays put. Scale is clamped to
    /// [`MIN_SCALE`]..=[`MAX_SCALE`]; at the bounds this is a no-op.
    pub fn zoom_at(&mut self, pointer: Pos2, zoom_in: bool) {
        let new_scale = if zoom_in {
            self.scale * ZOOM_STEP
        } else {
            self.scale / ZOOM_STEP
        }
        .clamp(MIN_SCALE, MAX_SCALE);
        if new_scale == self.scale {
            return;
        }
        let anchor = (pointer.to_vec2() - self.offset) / self.scale;
        self.offset = pointer.to_vec2() - anchor * new_scale;
        self.scale = new_scale;
    }
}

#[cfg(test)]
mod tests {
    use egui::{pos2, vec2};

    use super::*;

    #[test]
    fn defaults_to_identity() {
        let view = ViewTransform::default();
        assert_eq!(view.scale, 1.0);
        assert_eq!(view.offset, Vec2::ZERO);
        let origin = pos2(100.0, 50.0);
        assert_eq!(view.to_screen(origin, pos2(10.0, 20.0)), pos2(110.0, 70.0));
    }

    #[test]
    fn screen_canvas_roundtrip() {
        let view = ViewTransform {
            offset: vec2(13.0, -7.0),
            scale: 2.5,
        };
        let origin = pos2(40.0, 40.0);
        let canvas = pos2(123.0, 456.0);
        let back = view.to_canvas(origin, view.to_screen(origin, canvas));
        assert!((back.x - canvas.x).abs() < 1e-3);
        assert!((back.y - canvas.y).abs() < 1e-3);
    }

    #[test]
    fn zoom_in_then_out_restores_view() {
        let mut view = ViewTransform::default();
        let pointer = pos2(300.0, 200.0);
        view.zoom_at(pointer, true);
        assert!(view.scale > 1.0);
        view.zoom_at(pointer, false);
        assert!((view.scale - 1.0).abs() < 1e-5);
        assert!(view.offset.x.abs() < 1e-2);
        assert!(view.offset.y.abs() < 1e-2);
    }

    #[test]
    fn zoom_keeps_anchor_point_fixed() {
        let mut view = ViewTransform {
            offset: vec2(25.0, -40.0),
            scale: 1.5,
        };
        let origin = pos2(0.0, 0.0);
        let pointer = pos2(200.0, 150.0);
        let anchor_before = view.to_canvas(origin, pointer);
        view.zoom_at(pointer, true);
        let anchor_after = view.to_canvas(origin, pointer);
        assert!((anchor_before.x - anchor_after.x).abs() < 1e-2);
        assert!((anchor_before.y - anchor_after.y).abs() < 1e-2);
    }

    #[test]
    fn scale_is_clamped_and_never_inverted() {
        let mut view = ViewTransform::default();
        let pointer = pos2(50.0, 50.0);
        for _ in 0..200 {
            view.zoom_at(pointer, false);
        }
        assert!(view.scale >= MIN_SCALE);
        for _ in 0..200 {
            view.zoom_at(pointer, true);
        }
        assert!(view.scale <= MAX_SCALE);
        assert!(view.scale > 0.0);
    }
}
