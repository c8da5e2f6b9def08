use std::sync::Arc;

use eframe::egui::Vec2;
use tracing::{debug, trace, warn};

use crate::collab::{Dataset, Node};

use super::compare::{Comparison, compare_graph, compare_stats};
use super::filter::{FilterCriteria, GraphSnapshot, filter_graph};
use super::graph::hit_test_by;
use super::physics::{LayoutConfig, Simulation};
use super::state::{Action, Effect, RedrawReason, StateError, ViewMode, ViewState};

const HIT_TOLERANCE: f32 = 4.0;

type HoverHook = Box<dyn FnMut(Option<&Node>)>;
type SelectHook = Box<dyn FnMut(ViewMode, Option<&Node>)>;

/// Coalesces redraw requests until the frame loop takes them.
#[derive(Debug, Default)]
pub(in crate::app) struct RedrawScheduler {
    pending: Vec<RedrawReason>,
}

impl RedrawScheduler {
    pub fn request(&mut self, reason: RedrawReason) {
        if !self.pending.contains(&reason) {
            self.pending.push(reason);
        }
    }

    pub fn take(&mut self) -> Vec<RedrawReason> {
        let mut reasons = std::mem::take(&mut self.pending);
        reasons.sort();
        reasons
    }
}

/// Owns the view state, the active snapshot and its simulation. All state
/// changes go through [`Engine::dispatch`].
pub(in crate::app) struct Engine {
    dataset: Arc<Dataset>,
    state: ViewState,
    snapshot: Arc<GraphSnapshot>,
    simulation: Option<Simulation>,
    generation: u64,
    canvas_size: Vec2,
    redraw: RedrawScheduler,
    comparison: Comparison,
    hover_hooks: Vec<HoverHook>,
    select_hooks: Vec<SelectHook>,
}

impl Engine {
    pub fn new(dataset: Arc<Dataset>, canvas_size: Vec2) -> Self {
        let mut engine = Self {
            dataset,
            state: ViewState::default(),
            snapshot: Arc::new(GraphSnapshot::empty(0)),
            simulation: None,
            generation: 0,
            canvas_size,
            redraw: RedrawScheduler::default(),
            comparison: Comparison::default(),
            hover_hooks: Vec::new(),
            select_hooks: Vec::new(),
        };
        engine.refilter(engine.state.mode);
        engine
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn mode(&self) -> ViewMode {
        self.state.mode
    }

    pub fn snapshot(&self) -> &Arc<GraphSnapshot> {
        &self.snapshot
    }

    pub fn simulation(&self) -> Option<&Simulation> {
        self.simulation.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn comparison(&self) -> &Comparison {
        &self.comparison
    }

    pub fn apply_filters(&mut self, criteria: FilterCriteria) -> Result<(), StateError> {
        self.dispatch(Action::SetFilters(criteria))
    }

    pub fn apply_compare_filters(&mut self, criteria: FilterCriteria) -> Result<(), StateError> {
        self.dispatch(Action::SetCompareFilters(criteria))
    }

    pub fn select_node(&mut self, id: Option<&str>, mode: ViewMode) -> Result<(), StateError> {
        self.dispatch(Action::Select {
            id: id.map(str::to_owned),
            mode,
        })
    }

    pub fn on_hover(&mut self, hook: impl FnMut(Option<&Node>) + 'static) {
        self.hover_hooks.push(Box::new(hook));
    }

    pub fn on_select(&mut self, hook: impl FnMut(ViewMode, Option<&Node>) + 'static) {
        self.select_hooks.push(Box::new(hook));
    }

    pub fn dispatch(&mut self, action: Action) -> Result<(), StateError> {
        let effects = self.state.reduce(action)?;
        for effect in effects {
            self.run_effect(effect);
        }
        Ok(())
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Refilter(mode) => {
                if mode == ViewMode::Compare {
                    self.comparison =
                        compare_stats(&self.dataset.nodes, &self.dataset.edges, &self.state.slots);
                }
                if mode == self.state.mode {
                    self.refilter(mode);
                }
            }
            Effect::StopLayout => {
                if let Some(simulation) = self.simulation.as_mut() {
                    simulation.stop();
                }
            }
            Effect::DragStart(index) => {
                if let Some(simulation) = self.simulation.as_mut() {
                    simulation.drag_start(index);
                }
            }
            Effect::DragMove(index, world) => {
                if let Some(simulation) = self.simulation.as_mut() {
                    simulation.drag_to(index, world);
                }
            }
            Effect::DragEnd(index) => {
                if let Some(simulation) = self.simulation.as_mut() {
                    simulation.drag_end(index);
                }
            }
            Effect::HoverChanged => {
                let node = self
                    .state
                    .hovered
                    .as_deref()
                    .and_then(|id| self.snapshot.index_of(id))
                    .and_then(|index| self.snapshot.nodes.get(index));
                for hook in &mut self.hover_hooks {
                    hook(node);
                }
            }
            Effect::SelectionChanged(mode) => {
                let node = self
                    .state
                    .selection
                    .get(mode)
                    .and_then(|id| self.dataset.node_by_id(id));
                for hook in &mut self.select_hooks {
                    hook(mode, node);
                }
            }
            Effect::Redraw(reason) => self.redraw.request(reason),
        }
    }

    /// Replaces the snapshot and simulation for `mode`. The previous simulation is
    /// stopped before the new one exists.
    fn refilter(&mut self, mode: ViewMode) {
        if let Some(mut previous) = self.simulation.take() {
            previous.stop();
        }
        self.generation += 1;

        let (nodes, edges, config) = match mode {
            ViewMode::Network => {
                let (nodes, edges) =
                    filter_graph(&self.dataset.nodes, &self.dataset.edges, &self.state.filters);
                (nodes, edges, LayoutConfig::network())
            }
            ViewMode::Compare => {
                let (nodes, edges) = compare_graph(
                    &self.dataset.nodes,
                    &self.dataset.edges,
                    &self.state.slots,
                    &self.state.compare_filters,
                );
                (nodes, edges, LayoutConfig::compare())
            }
            ViewMode::Map => {
                self.snapshot = Arc::new(GraphSnapshot::empty(self.generation));
                self.redraw.request(RedrawReason::Data);
                return;
            }
        };

        debug!(
            mode = mode.label(),
            generation = self.generation,
            nodes = nodes.len(),
            edges = edges.len(),
            "refiltered graph"
        );

        let snapshot = Arc::new(GraphSnapshot::new(self.generation, nodes, edges));
        self.simulation = Some(Simulation::new(
            self.generation,
            &snapshot,
            config,
            self.canvas_size * 0.5,
        ));
        self.snapshot = snapshot;
        self.redraw.request(RedrawReason::Data);
    }

    /// Advances the layout if `generation` still names the active snapshot.
    pub fn tick_for(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        let Some(simulation) = self.simulation.as_mut() else {
            return false;
        };
        if simulation.generation() != generation {
            return false;
        }

        let moved = simulation.tick();
        if moved {
            self.redraw.request(RedrawReason::Tick);
        }
        moved
    }

    pub fn resize(&mut self, canvas_size: Vec2) {
        if canvas_size == self.canvas_size || canvas_size.x <= 0.0 || canvas_size.y <= 0.0 {
            return;
        }
        self.canvas_size = canvas_size;
        if let Some(simulation) = self.simulation.as_mut() {
            simulation.set_center(canvas_size * 0.5);
            simulation.nudge();
        }
        self.redraw.request(RedrawReason::Data);
    }

    /// Topmost node under a canvas-local point, in snapshot indices.
    pub fn hit_test(&self, local: Vec2) -> Option<usize> {
        let simulation = self.simulation.as_ref()?;
        let world = self.state.transform(self.state.mode).invert(local);
        let nodes = simulation.nodes();
        hit_test_by(nodes.len(), world, HIT_TOLERANCE, |index| {
            (nodes[index].pos, nodes[index].radius)
        })
    }

    pub fn pointer_moved(&mut self, local: Option<Vec2>) {
        let hovered = local
            .and_then(|point| self.hit_test(point))
            .and_then(|index| self.snapshot.nodes.get(index))
            .map(|node| node.id.clone());
        if let Err(error) = self.dispatch(Action::Hover(hovered)) {
            warn!(%error, "hover rejected");
        }
    }

    pub fn click(&mut self, local: Vec2) {
        let mode = self.state.mode;
        let clicked = self
            .hit_test(local)
            .and_then(|index| self.snapshot.nodes.get(index))
            .map(|node| node.id.clone());
        if let Err(error) = self.dispatch(Action::Select { id: clicked, mode }) {
            warn!(%error, "click selection rejected");
        }
    }

    pub fn hovered_node(&self) -> Option<&Node> {
        let index = self.snapshot.index_of(self.state.hovered.as_deref()?)?;
        self.snapshot.nodes.get(index)
    }

    pub fn selected_node(&self) -> Option<&Node> {
        self.dataset.node_by_id(self.state.selected()?)
    }

    pub fn take_redraw(&mut self) -> bool {
        let reasons = self.redraw.take();
        if reasons.is_empty() {
            return false;
        }
        trace!(?reasons, "redraw requested");
        true
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use eframe::egui::vec2;

    use super::*;
    use crate::collab::CountryNames;
    use crate::collab::fixtures::sample_graph;

    fn engine() -> Engine {
        let (mut nodes, edges) = sample_graph();
        nodes[0].seed = vec2(-0.5, 0.0);
        nodes[1].seed = vec2(0.5, 0.0);
        nodes[2].seed = vec2(0.0, 0.5);
        let dataset = Dataset::from_parts(nodes, edges, CountryNames::default());
        Engine::new(Arc::new(dataset), vec2(800.0, 600.0))
    }

    #[test]
    fn starts_with_unfiltered_network() {
        let mut engine = engine();
        assert_eq!(engine.snapshot().nodes.len(), 3);
        assert_eq!(engine.generation(), 1);
        assert!(engine.take_redraw());
        assert!(!engine.take_redraw());
    }

    #[test]
    fn apply_filters_swaps_snapshot_and_simulation() {
        let mut engine = engine();
        engine
            .apply_filters(FilterCriteria {
                min_strength: 5,
                ..FilterCriteria::default()
            })
            .expect("filters apply");

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.edges.len(), 1);
        assert_eq!(snapshot.revision, engine.generation());
        assert_eq!(
            engine.simulation().map(|simulation| simulation.generation()),
            Some(engine.generation())
        );
    }

    #[test]
    fn stale_generation_ticks_are_ignored() {
        let mut engine = engine();
        let stale = engine.generation();
        engine
            .apply_filters(FilterCriteria {
                top_n: Some(2),
                ..FilterCriteria::default()
            })
            .expect("filters apply");

        assert!(!engine.tick_for(stale));
        assert_eq!(engine.simulation().map(|simulation| simulation.ticks()), Some(0));
        assert!(engine.tick_for(engine.generation()));
    }

    #[test]
    fn selection_is_isolated_per_mode() {
        let mut engine = engine();
        engine
            .select_node(Some("A"), ViewMode::Network)
            .expect("select");
        assert_eq!(engine.state().selection.get(ViewMode::Network), Some("A"));

        engine
            .select_node(Some("C"), ViewMode::Compare)
            .expect("select");
        assert_eq!(engine.state().selection.get(ViewMode::Network), None);
        assert_eq!(engine.state().selection.get(ViewMode::Compare), Some("C"));
    }

    #[test]
    fn hooks_observe_hover_and_selection() {
        let mut engine = engine();
        let hovered = Rc::new(RefCell::new(Vec::new()));
        let selected = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&hovered);
        engine.on_hover(move |node| sink.borrow_mut().push(node.map(|node| node.id.clone())));
        let sink = Rc::clone(&selected);
        engine.on_select(move |mode, node| {
            sink.borrow_mut().push((mode, node.map(|node| node.id.clone())));
        });

        let target = engine
            .simulation()
            .and_then(|simulation| simulation.nodes().get(1).map(|node| node.pos))
            .expect("node placed");
        engine.pointer_moved(Some(target));
        engine.click(target);
        engine.pointer_moved(None);

        assert_eq!(
            hovered.borrow().as_slice(),
            &[Some("B".to_owned()), None]
        );
        assert_eq!(
            selected.borrow().as_slice(),
            &[(ViewMode::Network, Some("B".to_owned()))]
        );
    }

    #[test]
    fn compare_mode_uses_slots() {
        let mut engine = engine();
        engine
            .dispatch(Action::SwitchView(ViewMode::Compare))
            .expect("switch");
        assert!(engine.snapshot().is_empty());

        engine.dispatch(Action::PushSlot("US".to_owned())).expect("slot");
        engine.dispatch(Action::PushSlot("FR".to_owned())).expect("slot");
        assert_eq!(engine.snapshot().nodes.len(), 3);
        assert_eq!(engine.comparison().cross_weight, 1);

        let error = engine
            .dispatch(Action::PushSlot("US".to_owned()))
            .expect_err("duplicate");
        assert!(matches!(error, StateError::Slot(_)));
    }

    #[test]
    fn compare_snapshot_colours_follow_country_slots() {
        use crate::app::graph::compare_fill;
        use crate::app::render_utils::SLOT_COLORS;

        let mut engine = engine();
        engine
            .dispatch(Action::SwitchView(ViewMode::Compare))
            .expect("switch");
        engine.dispatch(Action::PushSlot("US".to_owned())).expect("slot");
        engine.dispatch(Action::PushSlot("FR".to_owned())).expect("slot");

        let fills = engine
            .snapshot()
            .nodes
            .iter()
            .map(|node| (node.id.as_str(), compare_fill(&engine.state().slots, node)))
            .collect::<Vec<_>>();
        assert_eq!(
            fills,
            vec![
                ("A", SLOT_COLORS[0]),
                ("B", SLOT_COLORS[0]),
                ("C", SLOT_COLORS[1]),
            ]
        );
    }

    #[test]
    fn resizing_mid_layout_keeps_the_current_alpha() {
        let mut engine = engine();
        let generation = engine.generation();
        for _ in 0..3 {
            engine.tick_for(generation);
        }
        let alpha = engine.simulation().map(|simulation| simulation.alpha());

        engine.resize(vec2(1200.0, 900.0));
        assert_eq!(engine.simulation().map(|simulation| simulation.alpha()), alpha);
    }

    #[test]
    fn map_mode_drops_the_layout() {
        let mut engine = engine();
        engine
            .dispatch(Action::SwitchView(ViewMode::Map))
            .expect("switch");
        assert!(engine.simulation().is_none());
        assert!(engine.snapshot().is_empty());
        assert!(!engine.tick_for(engine.generation()));
    }

    #[test]
    fn redraw_requests_coalesce() {
        let mut scheduler = RedrawScheduler::default();
        scheduler.request(RedrawReason::Tick);
        scheduler.request(RedrawReason::Pointer);
        scheduler.request(RedrawReason::Tick);
        assert_eq!(
            scheduler.take(),
            vec![RedrawReason::Tick, RedrawReason::Pointer]
        );
        assert!(scheduler.take().is_empty());
    }
}
