use std::cell::Cell;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use eframe::egui::{self, Context};
use tracing::{error, info};

use crate::collab::{DataSource, Dataset, StatsCache, load_dataset};

mod compare;
mod debounce;
mod engine;
mod filter;
mod graph;
mod physics;
mod render_utils;
mod state;
mod ui;

use debounce::Debounced;
use engine::Engine;
use filter::FilterCriteria;
use ui::{AuthorSearch, CategoryPicker, TableSort};

type LoadResult = Result<Dataset, String>;

pub struct DashboardApp {
    source: DataSource,
    state: AppState,
    reload_rx: Option<Receiver<LoadResult>>,
    load_revision: u64,
}

enum AppState {
    Loading { rx: Receiver<LoadResult> },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    engine: Engine,
    stats: StatsCache,
    source_label: String,
    draft_filters: FilterCriteria,
    draft_compare_filters: FilterCriteria,
    filter_debounce: Debounced<FilterCriteria>,
    compare_debounce: Debounced<FilterCriteria>,
    picker: CategoryPicker,
    author_search: AuthorSearch,
    notice: Option<String>,
    table_sort: TableSort,
    map_hovered: Option<usize>,
    collaborator_rows_visible: usize,
    selection_changed: Rc<Cell<bool>>,
    visible_node_count: usize,
    visible_edge_count: usize,
}

impl DashboardApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, source: DataSource) -> Self {
        let state = Self::start_load(source.clone(), 1);
        Self {
            source,
            state,
            reload_rx: None,
            load_revision: 1,
        }
    }

    fn spawn_load(source: DataSource, revision: u64) -> Receiver<LoadResult> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = load_dataset(&source)
                .map(|dataset| dataset.with_revision(revision))
                .map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(source: DataSource, revision: u64) -> AppState {
        AppState::Loading {
            rx: Self::spawn_load(source, revision),
        }
    }

    fn next_revision(&mut self) -> u64 {
        self.load_revision += 1;
        self.load_revision
    }

    /// `stats` carries the previous cache across reloads; the new revision clears it.
    fn ready_or_error(result: LoadResult, stats: StatsCache) -> AppState {
        match result {
            Ok(dataset) => {
                info!(revision = dataset.revision, "dataset ready");
                AppState::Ready(Box::new(ViewModel::new(dataset, stats)))
            }
            Err(message) => {
                error!(%message, "failed to load dataset");
                AppState::Error(message)
            }
        }
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                match rx.try_recv() {
                    Ok(result) => {
                        transition = Some(Self::ready_or_error(result, StatsCache::default()));
                    }
                    Err(TryRecvError::Empty) => ctx.request_repaint(),
                    Err(TryRecvError::Disconnected) => {
                        transition =
                            Some(AppState::Error("Background load worker disconnected".to_owned()));
                    }
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading collaboration data...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(message) => {
                let mut retry = false;
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load collaboration data");
                    ui.add_space(6.0);
                    ui.label(message.as_str());
                    ui.add_space(10.0);
                    retry = ui.button("Retry").clicked();
                });
                if retry {
                    let revision = self.next_revision();
                    transition = Some(Self::start_load(self.source.clone(), revision));
                }
            }
            AppState::Ready(model) => {
                let mut reload_requested = false;
                let is_reloading = self.reload_rx.is_some();
                model.show(ctx, &mut reload_requested, is_reloading);

                if reload_requested && self.reload_rx.is_none() {
                    self.load_revision += 1;
                    self.reload_rx = Some(Self::spawn_load(self.source.clone(), self.load_revision));
                }

                if let Some(rx) = self.reload_rx.take() {
                    match rx.try_recv() {
                        Ok(result) => {
                            let stats = std::mem::take(&mut model.stats);
                            transition = Some(Self::ready_or_error(result, stats));
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
