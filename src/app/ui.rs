use eframe::egui::{self, Align, Align2, FontId, Key, Layout, Painter, Ui, vec2};

use super::Explorer;
use super::theme::Palette;

const SUGGESTION_LIMIT: usize = 8;

impl Explorer {
    pub(super) fn draw_toolbar(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.heading("athanor");
            ui.separator();

            let search = ui.add(
                egui::TextEdit::singleline(&mut self.search)
                    .hint_text("Search nodes")
                    .desired_width(220.0),
            );
            let submitted = search.lost_focus() && ui.input(|input| input.key_pressed(Key::Enter));
            if search.changed() {
                self.search_missed = false;
            }
            let find_clicked = ui.button("Find").clicked();
            self.submit_search(submitted || find_clicked);
            if self.search_missed {
                ui.colored_label(ui.visuals().warn_fg_color, "no match");
            }

            ui.separator();
            if ui.button("+").on_hover_text("Zoom in").clicked() {
                self.view.camera.zoom_in();
            }
            if ui.button("-").on_hover_text("Zoom out").clicked() {
                self.view.camera.zoom_out();
            }
            if ui.button("Reset view").clicked() {
                self.view.camera.reset();
            }
            ui.checkbox(&mut self.night, "Night");
            if ui.button("Reload").clicked() {
                self.reload_requested = true;
            }

            if let Some(live) = &mut self.live {
                ui.separator();
                let running = live.simulation.is_running();
                if ui.button(if running { "Pause" } else { "Resume" }).clicked() {
                    if running {
                        live.simulation.stop();
                    } else {
                        live.simulation.restart();
                    }
                }
                if ui.button("Reheat").clicked() {
                    live.simulation.reheat();
                }
                let alpha = live.simulation.with_simulation(|simulation| simulation.alpha());
                ui.label(format!("alpha {alpha:.3}"));
            }

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                ui.label(format!(
                    "{}/{} nodes  {}/{} edges  zoom {:.2}",
                    self.stats.visible_nodes,
                    self.view.nodes().len(),
                    self.stats.visible_edges,
                    self.view.edge_count(),
                    self.view.camera.zoom,
                ));
                if let Some(metadata) = &self.metadata {
                    ui.label(format!("generated {}", metadata.generated_at));
                }
            });
        });

        let suggestions = self.view.suggestions(&self.search, SUGGESTION_LIMIT);
        if suggestions.is_empty() {
            return;
        }
        let mut picked = None;
        ui.horizontal_wrapped(|ui| {
            ui.weak("Suggestions:");
            for index in suggestions {
                if let Some(node) = self.view.node(index)
                    && ui.small_button(node.label.as_str()).clicked()
                {
                    picked = Some(index);
                }
            }
        });
        if let Some(index) = picked {
            self.view.focus(index);
            if let Some(node) = self.view.node(index) {
                self.search = node.label.clone();
            }
            self.search_missed = false;
        }
    }

    fn submit_search(&mut self, requested: bool) {
        if !requested {
            return;
        }
        let query = self.search.trim();
        self.search_missed = !query.is_empty() && self.view.search(query).is_none();
    }

    pub(super) fn draw_hover_card(&self, painter: &Painter, palette: &Palette) {
        let Some(node) = self.view.hovered().and_then(|index| self.view.node(index)) else {
            return;
        };

        let rect = self.view.camera.viewport();
        painter.text(
            rect.left_top() + vec2(10.0, 10.0),
            Align2::LEFT_TOP,
            format!("{}  |  {}  |  weight {:.1}", node.label, node.kind, node.weight),
            FontId::proportional(13.0),
            palette.text_hovered,
        );
    }
}
