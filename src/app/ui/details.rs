use eframe::egui::{RichText, Ui};

use runviz::Status;

use super::super::ViewModel;
use super::super::render_utils::color32;
use super::super::scene::FILL_TRANSITION;

fn status_label(status: Status) -> &'static str {
    match status {
        Status::Pass => "pass",
        Status::Fail => "fail",
        Status::Skip => "skip",
        Status::Unknown => "unknown",
    }
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        if let Some(record) = self.selected_run.and_then(|index| self.history.get(index)) {
            ui.heading("Run");
            ui.label(RichText::new(record.commit.as_str()).strong());
            ui.label(record.message.as_str());
            ui.horizontal_wrapped(|ui| {
                for (status, count) in self.scene.status_counts() {
                    let colour = color32(self.scene.config().palette.colour(status), 1.0);
                    ui.colored_label(colour, format!("{} {count}", status_label(status)));
                }
            });
            ui.separator();
        }

        ui.heading("Selection Details");
        ui.add_space(6.0);

        let Some(selected_id) = self.selected.clone() else {
            ui.label("Click a node to inspect it.");
            return;
        };

        let Some(index) = self.scene.index_of(&selected_id) else {
            ui.label("Selected node is not part of this run.");
            return;
        };

        let bound = &self.scene.nodes()[index];
        let element = bound.handle;
        let group = bound.datum.group;
        let Some(node) = self
            .scene
            .simulation()
            .with_nodes(|nodes| nodes.get(index).cloned())
        else {
            return;
        };

        ui.label(RichText::new(selected_id.as_str()).strong());
        ui.label(format!("Status: {}", status_label(node.payload)));
        ui.label(format!("Group: {group}"));
        ui.label(format!("Links: {}", self.scene.degree(index)));
        ui.label(format!("Position: ({:.1}, {:.1})", node.x, node.y));
        ui.label(format!("Velocity: ({:.2}, {:.2})", node.vx, node.vy));
        if node.is_pinned() {
            ui.label("Pinned while dragged");
        }
        if self
            .scene
            .transitions()
            .active(element, FILL_TRANSITION)
            .is_some()
        {
            ui.label("Fill is animating");
        }

        ui.separator();
        ui.label(RichText::new("Linked nodes").strong());
        let neighbours = self
            .scene
            .links()
            .iter()
            .filter_map(|edge| match index {
                i if i == edge.source => Some(edge.target),
                i if i == edge.target => Some(edge.source),
                _ => None,
            })
            .filter_map(|neighbour| self.scene.nodes().get(neighbour))
            .map(|bound| bound.datum.id.clone())
            .collect::<Vec<_>>();
        if neighbours.is_empty() {
            ui.label("No links.");
        }
        for id in neighbours {
            if ui.link(id.as_str()).clicked() {
                self.set_selected(Some(id));
            }
        }
    }
}
