use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use eframe::egui::{self, Align, Context, Layout, Vec2};
use tracing::warn;

use runviz::{FrameRequest, GraphRecord, LayoutConfig};

use super::super::ViewModel;
use super::super::scene::Scene;

impl ViewModel {
    pub(in crate::app) fn new(history: Vec<GraphRecord>, config: LayoutConfig) -> Self {
        let charge = config.charge as f32;
        let link_scale = config.link_scale as f32;
        let velocity_decay = config.simulation.velocity_decay as f32;

        let mut model = Self {
            history,
            selected_run: None,
            scene: Scene::new(config),
            scene_error: None,
            search: String::new(),
            selected: None,
            pan: Vec2::ZERO,
            zoom: 1.0,
            charge,
            link_scale,
            velocity_decay,
            show_quadtree_overlay: false,
            drag: None,
            search_match_cache: None,
            show_fps_bar: true,
            fps_current: 0.0,
            fps_samples: VecDeque::new(),
            visible_node_count: 0,
        };
        if let Some(latest) = model.history.len().checked_sub(1) {
            model.select_run(latest);
        }
        model
    }

    /// Swaps in a reloaded history, keeping the scene and showing the
    /// newest run.
    pub(in crate::app) fn replace_history(&mut self, history: Vec<GraphRecord>) {
        self.history = history;
        self.selected_run = None;
        if let Some(latest) = self.history.len().checked_sub(1) {
            self.select_run(latest);
        }
    }

    pub(in crate::app) fn select_run(&mut self, index: usize) {
        let Some(record) = self.history.get(index) else {
            return;
        };

        self.drag = None;
        self.search_match_cache = None;
        self.selected_run = Some(index);
        self.scene_error = match self.scene.show_run(record) {
            Ok(()) => None,
            Err(error) => {
                warn!(commit = %record.commit, error = %format!("{error:#}"), "run could not be laid out");
                Some(format!("{error:#}"))
            }
        };

        if let Some(selected) = &self.selected
            && self.scene.index_of(selected).is_none()
        {
            self.selected = None;
        }
    }

    pub(in crate::app) fn set_selected(&mut self, selected: Option<String>) {
        self.selected = selected;
    }

    /// Runs every due timer and asks egui for the next frame the scheduler
    /// needs.
    fn drive_scheduler(&self, ctx: &Context) {
        match self.scene.scheduler().wake() {
            FrameRequest::NextFrame => ctx.request_repaint(),
            FrameRequest::After(millis) => {
                ctx.request_repaint_after(Duration::from_secs_f64(millis.max(0.0) / 1000.0));
            }
            FrameRequest::Idle => {}
        }
    }

    pub(in crate::app) fn show(
        &mut self,
        ctx: &Context,
        history_path: &Path,
        reload_requested: &mut bool,
        is_loading: bool,
    ) {
        self.update_fps_counter(ctx);
        self.drive_scheduler(ctx);

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("runviz");
                    ui.separator();
                    ui.label(format!("history: {}", history_path.display()));
                    ui.label(format!("runs: {}", self.history.len()));
                    ui.label(format!("nodes: {}", self.scene.nodes().len()));
                    ui.label(format!("links: {}", self.scene.links().len()));
                    let reload_button =
                        ui.add_enabled(!is_loading, egui::Button::new("Reload history"));
                    if reload_button.clicked() {
                        *reload_requested = true;
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(self.visible_graph_text());
                        if let Some(fps_text) = self.fps_display_text() {
                            ui.label(fps_text);
                        }
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(error) = &self.scene_error {
                ui.colored_label(egui::Color32::from_rgb(235, 110, 100), error.as_str());
            }
            if self.history.is_empty() {
                ui.vertical_centered(|ui| {
                    ui.add_space(120.0);
                    ui.heading("The run history is empty.");
                });
            } else {
                self.draw_graph(ui);
            }
        });
    }
}
