use eframe::egui::{Pos2, Rect, Vec2};

pub(crate) const MIN_ZOOM: f32 = 0.2;
pub(crate) const MAX_ZOOM: f32 = 5.0;
const BUTTON_ZOOM_FACTOR: f32 = 1.3;
pub(crate) const WHEEL_ZOOM_FACTOR: f32 = 1.1;
pub(crate) const SEARCH_ZOOM: f32 = 2.0;

/// Maps graph coordinates to the screen: `viewport center + pan + zoom * (graph - anchor)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Camera {
    pub(crate) zoom: f32,
    pub(crate) pan: Vec2,
    viewport: Rect,
    anchor: Vec2,
}

impl Camera {
    pub(crate) fn new(anchor: Vec2) -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
            viewport: Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0)),
            anchor,
        }
    }

    pub(crate) fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
    }

    pub(crate) fn viewport(&self) -> Rect {
        self.viewport
    }

    pub(crate) fn graph_to_screen(&self, graph: Vec2) -> Pos2 {
        self.viewport.center() + self.pan + (graph - self.anchor) * self.zoom
    }

    pub(crate) fn screen_to_graph(&self, screen: Pos2) -> Vec2 {
        (screen - self.viewport.center() - self.pan) / self.zoom + self.anchor
    }

    pub(crate) fn zoom_in(&mut self) {
        self.zoom = (self.zoom * BUTTON_ZOOM_FACTOR).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub(crate) fn zoom_out(&mut self) {
        self.zoom = (self.zoom / BUTTON_ZOOM_FACTOR).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub(crate) fn zoom_at(&mut self, pointer: Pos2, factor: f32) {
        let graph_before = self.screen_to_graph(pointer);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = pointer - self.viewport.center() - (graph_before - self.anchor) * self.zoom;
    }

    pub(crate) fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    pub(crate) fn reset(&mut self) {
        self.zoom = 1.0;
        self.pan = Vec2::ZERO;
    }

    pub(crate) fn center_on(&mut self, graph: Vec2, zoom: f32) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = -(graph - self.anchor) * self.zoom;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::{pos2, vec2};

    fn camera() -> Camera {
        let mut camera = Camera::new(vec2(400.0, 300.0));
        camera.set_viewport(Rect::from_min_size(pos2(30.0, 12.0), vec2(1024.0, 700.0)));
        camera
    }

    #[test]
    fn screen_to_graph_inverts_graph_to_screen() {
        let mut camera = camera();
        for (zoom, pan) in [
            (1.0, vec2(0.0, 0.0)),
            (0.2, vec2(-340.0, 91.5)),
            (3.7, vec2(12.25, -800.0)),
        ] {
            camera.zoom = zoom;
            camera.pan = pan;
            for graph in [vec2(0.0, 0.0), vec2(-812.5, 44.0), vec2(1234.0, -0.5)] {
                let back = camera.screen_to_graph(camera.graph_to_screen(graph));
                assert!((back - graph).length() < 1e-2, "{graph:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn button_zoom_is_clamped() {
        let mut camera = camera();
        for _ in 0..20 {
            camera.zoom_in();
        }
        assert_eq!(camera.zoom, MAX_ZOOM);
        for _ in 0..40 {
            camera.zoom_out();
        }
        assert_eq!(camera.zoom, MIN_ZOOM);

        camera.reset();
        assert_eq!(camera.zoom, 1.0);
        assert_eq!(camera.pan, Vec2::ZERO);
    }

    #[test]
    fn pointer_zoom_keeps_the_point_under_the_cursor() {
        let mut camera = camera();
        let pointer = pos2(200.0, 150.0);
        let under = camera.screen_to_graph(pointer);

        camera.zoom_at(pointer, WHEEL_ZOOM_FACTOR);

        assert!((camera.screen_to_graph(pointer) - under).length() < 1e-3);
        assert!((camera.zoom - WHEEL_ZOOM_FACTOR).abs() < 1e-6);
    }

    #[test]
    fn center_on_moves_the_point_to_the_viewport_center() {
        let mut camera = camera();
        camera.center_on(vec2(-120.0, 75.0), SEARCH_ZOOM);

        let screen = camera.graph_to_screen(vec2(-120.0, 75.0));
        assert!((screen - camera.viewport().center()).length() < 1e-3);
        assert_eq!(camera.zoom, SEARCH_ZOOM);
    }
}
