use eframe::egui::{self, RichText, Ui};
use tracing::warn;

use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Runs");
        ui.separator();
        self.draw_history(ui);

        ui.separator();
        ui.label("Search test ids")
            .on_hover_text("Fuzzy-highlight matching nodes without changing the layout.");
        ui.text_edit_singleline(&mut self.search);

        ui.separator();
        ui.checkbox(&mut self.show_quadtree_overlay, "Show quadtree overlay")
            .on_hover_text("Draw the spatial index the many-body force is built on.");
        ui.checkbox(&mut self.show_fps_bar, "Show FPS");

        ui.collapsing("Layout tuning", |ui| self.draw_layout_tuning(ui));
    }

    fn draw_history(&mut self, ui: &mut Ui) {
        let mut clicked = None;
        let count = self.history.len();

        egui::ScrollArea::vertical()
            .id_salt("history_scroll")
            .max_height(260.0)
            .auto_shrink([false, false])
            .show_rows(ui, 36.0, count, |ui, row_range| {
                for row in row_range {
                    let index = count - 1 - row;
                    let Some(record) = self.history.get(index) else {
                        continue;
                    };

                    let is_selected = self.selected_run == Some(index);
                    let title = RichText::new(format!("#{}  {}", index + 1, record.commit)).strong();
                    let response = ui
                        .vertical(|ui| {
                            let clicked = ui.selectable_label(is_selected, title).clicked();
                            ui.small(record.message.as_str());
                            clicked
                        })
                        .inner;
                    if response {
                        clicked = Some(index);
                    }
                }
            });

        if let Some(index) = clicked
            && self.selected_run != Some(index)
        {
            self.select_run(index);
        }
    }

    fn draw_layout_tuning(&mut self, ui: &mut Ui) {
        let charge = ui
            .add(
                egui::Slider::new(&mut self.charge, -400.0..=0.0)
                    .text("Charge")
                    .clamping(egui::SliderClamping::Always),
            )
            .on_hover_text("Many-body strength; negative values repel.");
        if charge.changed()
            && let Err(error) = self.scene.set_charge(f64::from(self.charge))
        {
            warn!(error = %format!("{error:#}"), "charge not applied");
        }

        let link_scale = ui
            .add(
                egui::Slider::new(&mut self.link_scale, 0.2..=3.0)
                    .text("Link length")
                    .clamping(egui::SliderClamping::Always),
            )
            .on_hover_text("Scales every link's rest length.");
        if link_scale.changed()
            && let Err(error) = self.scene.set_link_scale(f64::from(self.link_scale))
        {
            warn!(error = %format!("{error:#}"), "link length not applied");
        }

        let velocity_decay = ui
            .add(
                egui::Slider::new(&mut self.velocity_decay, 0.05..=0.95)
                    .text("Velocity decay")
                    .clamping(egui::SliderClamping::Always),
            )
            .on_hover_text("Friction applied to every node each tick.");
        if velocity_decay.changed() {
            self.scene.set_velocity_decay(f64::from(self.velocity_decay));
        }

        ui.horizontal(|ui| {
            if ui.button("Reheat").clicked() {
                self.scene.reheat();
            }
            if ui.button("Stop").clicked() {
                self.scene.stop();
            }
        });

        let simulation = self.scene.simulation();
        ui.label(format!(
            "alpha {:.3}  ({})",
            simulation.alpha(),
            if simulation.is_running() { "running" } else { "stopped" }
        ));
    }
}
