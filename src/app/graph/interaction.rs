use eframe::egui::{self, Pos2, Rect, Ui};

use super::super::ViewModel;
use super::super::render_utils::screen_to_world;

/// Pointer slack, in screen pixels, when picking a node.
const PICK_RADIUS: f32 = 18.0;

impl ViewModel {
    pub(in crate::app) fn handle_graph_zoom(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
    ) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let before = pointer - rect.center() - self.pan;
        let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        let zoom = (self.zoom * zoom_factor).clamp(0.1, 6.0);
        self.pan += before - before * (zoom / self.zoom);
        self.zoom = zoom;
    }

    pub(in crate::app) fn handle_graph_pan(&mut self, response: &egui::Response) {
        if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.pan += response.drag_delta();
        }
    }

    /// Index of the simulation node under `pointer`, if any.
    pub(in crate::app) fn pick(&self, rect: Rect, pointer: Pos2) -> Option<usize> {
        let (x, y) = screen_to_world(rect, self.pan, self.zoom, pointer);
        let radius = f64::from(PICK_RADIUS / self.zoom);
        self.scene.simulation().find(x, y, Some(radius))
    }

    /// Primary-button drags move a node: it is pinned to the pointer while
    /// the button is held and the layout keeps warm around it.
    pub(in crate::app) fn handle_node_drag(&mut self, rect: Rect, response: &egui::Response) {
        let pointer = response.interact_pointer_pos();

        if response.drag_started_by(egui::PointerButton::Primary)
            && let Some(pointer) = pointer
            && let Some(index) = self.pick(rect, pointer)
        {
            let (x, y) = screen_to_world(rect, self.pan, self.zoom, pointer);
            self.scene.drag_start(index, x, y);
            self.drag = Some(index);
        }

        let Some(index) = self.drag else {
            return;
        };

        if response.dragged_by(egui::PointerButton::Primary)
            && let Some(pointer) = pointer
        {
            let (x, y) = screen_to_world(rect, self.pan, self.zoom, pointer);
            self.scene.drag_to(index, x, y);
        }

        if response.drag_stopped() {
            self.scene.drag_end(index);
            self.drag = None;
        }
    }
}
