use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use eframe::egui::{self, Align, Context, Key, Layout, RichText, vec2};
use tracing::{debug, trace};

use crate::collab::{Dataset, StatsCache};
use crate::util::format_count;

use super::super::debounce::{CONTROL_DEBOUNCE_SECS, Debounced};
use super::super::engine::Engine;
use super::super::state::{Action, ViewMode};
use super::super::ViewModel;
use super::{AuthorSearch, CategoryPicker, TableSort};

impl ViewModel {
    pub(in crate::app) const INITIAL_COLLABORATOR_ROWS: usize = 24;
    pub(in crate::app) const COLLABORATOR_PAGE_ROWS: usize = 24;
    pub(in crate::app) const COLLABORATOR_PREFETCH_MARGIN: usize = 4;

    pub(in crate::app) fn new(dataset: Dataset, stats: StatsCache) -> Self {
        let source_label = format!(
            "{} institutions, {} links, {} countries",
            format_count(dataset.node_count() as u64),
            format_count(dataset.edge_count() as u64),
            dataset.categories.len()
        );

        let mut engine = Engine::new(Arc::new(dataset), vec2(1000.0, 700.0));

        let selection_changed = Rc::new(Cell::new(false));
        let flag = Rc::clone(&selection_changed);
        engine.on_select(move |mode, node| {
            flag.set(true);
            debug!(
                mode = mode.label(),
                node = node.map(|node| node.id.as_str()),
                "selection changed"
            );
        });
        engine.on_hover(|node| {
            trace!(node = node.map(|node| node.id.as_str()), "hover changed");
        });

        let draft_filters = engine.state().filters.clone();
        let draft_compare_filters = engine.state().compare_filters.clone();

        Self {
            engine,
            stats,
            source_label,
            draft_filters,
            draft_compare_filters,
            filter_debounce: Debounced::new(CONTROL_DEBOUNCE_SECS),
            compare_debounce: Debounced::new(CONTROL_DEBOUNCE_SECS),
            picker: CategoryPicker::default(),
            author_search: AuthorSearch::default(),
            notice: None,
            table_sort: TableSort::default(),
            map_hovered: None,
            collaborator_rows_visible: Self::INITIAL_COLLABORATOR_ROWS,
            selection_changed,
            visible_node_count: 0,
            visible_edge_count: 0,
        }
    }

    pub(in crate::app) fn dispatch(&mut self, action: Action) {
        match self.engine.dispatch(action) {
            Ok(()) => self.notice = None,
            Err(error) => {
                debug!(%error, "action rejected");
                self.notice = Some(error.to_string());
            }
        }
    }

    pub(in crate::app) fn select(&mut self, id: Option<&str>) {
        let mode = self.engine.mode();
        if let Err(error) = self.engine.select_node(id, mode) {
            self.notice = Some(error.to_string());
        }
    }

    /// Applies filter edits once they settle. Enter applies them immediately.
    fn flush_debounced(&mut self, ctx: &Context) {
        let (now, commit) = ctx.input(|input| (input.time, input.key_pressed(Key::Enter)));
        let (filters, compare_filters) = if commit {
            (self.filter_debounce.flush(), self.compare_debounce.flush())
        } else {
            (self.filter_debounce.poll(now), self.compare_debounce.poll(now))
        };

        if let Some(criteria) = filters
            && let Err(error) = self.engine.apply_filters(criteria)
        {
            self.notice = Some(error.to_string());
        }
        if let Some(criteria) = compare_filters
            && let Err(error) = self.engine.apply_compare_filters(criteria)
        {
            self.notice = Some(error.to_string());
        }

        let due = [
            self.filter_debounce.remaining(now),
            self.compare_debounce.remaining(now),
        ]
        .into_iter()
        .flatten()
        .fold(None, |soonest: Option<f64>, secs| {
            Some(soonest.map_or(secs, |current| current.min(secs)))
        });
        if let Some(secs) = due {
            ctx.request_repaint_after(Duration::from_secs_f64(secs));
        }
    }

    fn status_text(&self) -> String {
        let layout = match self.engine.simulation() {
            Some(simulation) if simulation.is_active() => format!(
                "running (alpha {:.3}, tick {})",
                simulation.alpha(),
                simulation.ticks()
            ),
            Some(simulation) => simulation.state().label().to_owned(),
            None => "idle".to_owned(),
        };
        format!(
            "visible {} / {} nodes, {} edges  |  layout {layout}",
            format_count(self.visible_node_count as u64),
            format_count(self.engine.snapshot().nodes.len() as u64),
            format_count(self.visible_edge_count as u64),
        )
    }

    pub(in crate::app) fn show(&mut self, ctx: &Context, reload_requested: &mut bool, is_loading: bool) {
        self.flush_debounced(ctx);
        if self.selection_changed.replace(false) {
            self.collaborator_rows_visible = Self::INITIAL_COLLABORATOR_ROWS;
        }

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("collab-atlas");
                    ui.separator();

                    let current = self.engine.mode();
                    for mode in ViewMode::ALL {
                        if ui.selectable_label(current == mode, mode.label()).clicked() && mode != current {
                            self.dispatch(Action::SwitchView(mode));
                        }
                    }
                    ui.separator();

                    ui.label(self.source_label.as_str());
                    if ui.button("Reset view").clicked() {
                        self.dispatch(Action::ResetView);
                    }
                    let reload_button = ui.add_enabled(!is_loading, egui::Button::new("Reload data"));
                    if reload_button.clicked() {
                        *reload_requested = true;
                    }
                    if is_loading {
                        ui.spinner();
                    }

                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(self.status_text());
                    });
                });

                if let Some(notice) = &self.notice {
                    ui.label(RichText::new(notice.as_str()).color(ui.visuals().warn_fg_color));
                }
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .id_salt("controls_scroll")
                    .show(ui, |ui| self.draw_controls(ui));
            });

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(360.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .id_salt("details_scroll")
                    .show(ui, |ui| self.draw_details(ui));
            });

        egui::CentralPanel::default().show(ctx, |ui| match self.engine.mode() {
            ViewMode::Network | ViewMode::Compare => self.draw_graph(ui),
            ViewMode::Map => self.draw_map(ui),
        });

        let layout_running = self
            .engine
            .simulation()
            .is_some_and(|simulation| simulation.is_active());
        if self.engine.take_redraw() || layout_running {
            ctx.request_repaint();
        }
    }
}
