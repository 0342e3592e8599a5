use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use eframe::egui::{self, Context, Vec2};
use tracing::warn;

use runviz::{GraphRecord, LayoutConfig};

use crate::history::load_history;

mod graph;
mod render_utils;
mod scene;
mod ui;

use scene::Scene;

type LoadResult = Result<Vec<GraphRecord>, String>;

pub struct RunvizApp {
    history_path: PathBuf,
    config: LayoutConfig,
    state: AppState,
    reload_rx: Option<Receiver<LoadResult>>,
}

enum AppState {
    Loading { rx: Receiver<LoadResult> },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    history: Vec<GraphRecord>,
    selected_run: Option<usize>,
    scene: Scene,
    scene_error: Option<String>,
    search: String,
    selected: Option<String>,
    pan: Vec2,
    zoom: f32,
    charge: f32,
    link_scale: f32,
    velocity_decay: f32,
    show_quadtree_overlay: bool,
    drag: Option<usize>,
    search_match_cache: Option<SearchMatchCache>,
    show_fps_bar: bool,
    fps_current: f32,
    fps_samples: VecDeque<f32>,
    visible_node_count: usize,
}

struct SearchMatchCache {
    query: String,
    scene_revision: u64,
    matches: Rc<HashSet<usize>>,
}

impl RunvizApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        history_path: PathBuf,
        config: LayoutConfig,
    ) -> Self {
        let state = Self::start_load(history_path.clone());
        Self {
            history_path,
            config,
            state,
            reload_rx: None,
        }
    }

    fn spawn_load(history_path: PathBuf) -> Receiver<LoadResult> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = load_history(&history_path).map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(history_path: PathBuf) -> AppState {
        AppState::Loading {
            rx: Self::spawn_load(history_path),
        }
    }
}

impl eframe::App for RunvizApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                match rx.try_recv() {
                    Ok(Ok(history)) => {
                        transition = Some(AppState::Ready(Box::new(ViewModel::new(
                            history,
                            self.config.clone(),
                        ))));
                    }
                    Ok(Err(error)) => transition = Some(AppState::Error(error)),
                    Err(TryRecvError::Empty) => ctx.request_repaint(),
                    Err(TryRecvError::Disconnected) => {
                        transition =
                            Some(AppState::Error("Background load worker disconnected".to_owned()));
                    }
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading run history...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load run history");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(self.history_path.clone()));
                    }
                });
            }
            AppState::Ready(model) => {
                let mut reload_requested = false;
                let is_reloading = self.reload_rx.is_some();
                model.show(ctx, &self.history_path, &mut reload_requested, is_reloading);

                if reload_requested && self.reload_rx.is_none() {
                    self.reload_rx = Some(Self::spawn_load(self.history_path.clone()));
                }

                if let Some(rx) = self.reload_rx.take() {
                    match rx.try_recv() {
                        Ok(Ok(history)) => model.replace_history(history),
                        Ok(Err(error)) => {
                            warn!(%error, "reload failed");
                            model.scene_error = Some(error);
                        }
                        Err(TryRecvError::Empty) => {
                            self.reload_rx = Some(rx);
                            ctx.request_repaint();
                        }
                        Err(TryRecvError::Disconnected) => {
                            transition =
                                Some(AppState::Error("Background load worker disconnected".to_owned()));
                        }
                    }
                }
            }
        }

        if let Some(next_state) = transition {
            self.reload_rx = None;
            self.state = next_state;
        }
    }
}
