use eframe::egui::{Align2, FontId, Painter, Pos2, Rect, Stroke, vec2};

use super::theme::Palette;
use super::view::GraphView;

const EDGE_WIDTH: f32 = 1.0;
const HIGHLIGHTED_EDGE_WIDTH: f32 = 2.0;
const RING_WIDTH: f32 = 2.0;
const LABEL_GAP: f32 = 4.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct DrawStats {
    pub(crate) visible_nodes: usize,
    pub(crate) visible_edges: usize,
}

pub(crate) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

pub(crate) fn edge_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let min_x = start.x.min(end.x) - padding;
    let max_x = start.x.max(end.x) + padding;
    let min_y = start.y.min(end.y) - padding;
    let max_y = start.y.max(end.y) + padding;

    if max_x < rect.left() || min_x > rect.right() || max_y < rect.top() || min_y > rect.bottom() {
        return false;
    }

    if rect.contains(start) || rect.contains(end) {
        return true;
    }

    let corners = [
        rect.left_top(),
        rect.right_top(),
        rect.right_bottom(),
        rect.left_bottom(),
    ];
    (0..4).any(|side| segments_intersect(start, end, corners[side], corners[(side + 1) % 4]))
}

fn segments_intersect(a1: Pos2, a2: Pos2, b1: Pos2, b2: Pos2) -> bool {
    fn cross(o: Pos2, a: Pos2, b: Pos2) -> f32 {
        let oa = a - o;
        let ob = b - o;
        (oa.x * ob.y) - (oa.y * ob.x)
    }

    let c1 = cross(a1, a2, b1);
    let c2 = cross(a1, a2, b2);
    let c3 = cross(b1, b2, a1);
    let c4 = cross(b1, b2, a2);

    (c1 <= 0.0 && c2 >= 0.0 || c1 >= 0.0 && c2 <= 0.0)
        && (c3 <= 0.0 && c4 >= 0.0 || c3 >= 0.0 && c4 <= 0.0)
}

pub(crate) fn draw_graph(painter: &Painter, view: &GraphView, palette: &Palette) -> DrawStats {
    let rect = view.camera.viewport();
    painter.rect_filled(rect, 0.0, palette.background);

    let screen = (0..view.nodes().len())
        .map(|index| {
            view.position(index)
                .map(|position| view.camera.graph_to_screen(position))
        })
        .collect::<Vec<_>>();

    let mut stats = DrawStats::default();
    for (source, target) in view.edge_ends() {
        let (Some(start), Some(end)) = (screen[source], screen[target]) else {
            continue;
        };
        if !edge_visible(rect, start, end, HIGHLIGHTED_EDGE_WIDTH) {
            continue;
        }

        let stroke = if view.is_highlighted(source) && view.is_highlighted(target) {
            Stroke::new(HIGHLIGHTED_EDGE_WIDTH, palette.edge_highlighted)
        } else {
            Stroke::new(EDGE_WIDTH, palette.edge)
        };
        painter.line_segment([start, end], stroke);
        stats.visible_edges += 1;
    }

    for (index, node) in view.nodes().iter().enumerate() {
        let Some(position) = screen[index] else {
            continue;
        };
        let radius = view.node_radius(index);
        if !circle_visible(rect, position, radius + RING_WIDTH) {
            continue;
        }
        stats.visible_nodes += 1;

        let hovered = view.hovered() == Some(index);
        let fill = if hovered {
            palette.node_hovered
        } else {
            palette.node
        };
        painter.circle_filled(position, radius, fill);
        if hovered || view.is_highlighted(index) {
            painter.circle_stroke(
                position,
                radius + RING_WIDTH,
                Stroke::new(RING_WIDTH, palette.node_hovered),
            );
        }

        if view.should_label(index) {
            painter.text(
                position + vec2(0.0, radius + LABEL_GAP),
                Align2::CENTER_TOP,
                &node.label,
                FontId::proportional(12.0),
                if hovered {
                    palette.text_hovered
                } else {
                    palette.text
                },
            );
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::pos2;

    fn viewport() -> Rect {
        Rect::from_min_max(pos2(0.0, 0.0), pos2(100.0, 100.0))
    }

    #[test]
    fn circles_partially_inside_are_visible() {
        assert!(circle_visible(viewport(), pos2(-5.0, 50.0), 6.0));
        assert!(!circle_visible(viewport(), pos2(-5.0, 50.0), 4.0));
    }

    #[test]
    fn edges_crossing_the_viewport_are_kept_even_with_both_ends_outside() {
        assert!(edge_visible(viewport(), pos2(-50.0, 50.0), pos2(150.0, 50.0), 1.0));
        assert!(!edge_visible(viewport(), pos2(-50.0, -50.0), pos2(-10.0, 150.0), 1.0));
        assert!(!edge_visible(viewport(), pos2(-50.0, 120.0), pos2(120.0, 300.0), 1.0));
    }
}
