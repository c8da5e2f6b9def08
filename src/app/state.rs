use eframe::egui::Vec2;
use thiserror::Error;

use super::compare::{CompareSlots, SlotError};
use super::filter::FilterCriteria;
use super::render_utils::Transform;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub(in crate::app) enum ViewMode {
    #[default]
    Network,
    Map,
    Compare,
}

impl ViewMode {
    pub const ALL: [Self; 3] = [Self::Network, Self::Map, Self::Compare];

    pub fn label(self) -> &'static str {
        match self {
            Self::Network => "Network",
            Self::Map => "Map",
            Self::Compare => "Compare",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Network => 0,
            Self::Map => 1,
            Self::Compare => 2,
        }
    }

    pub fn has_layout(self) -> bool {
        !matches!(self, Self::Map)
    }
}

/// Selections are tracked per canvas and never leak between them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(in crate::app) struct Selection {
    pub network: Option<String>,
    pub compare: Option<String>,
}

impl Selection {
    pub fn get(&self, mode: ViewMode) -> Option<&str> {
        match mode {
            ViewMode::Network => self.network.as_deref(),
            ViewMode::Compare => self.compare.as_deref(),
            ViewMode::Map => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::app) struct DragState {
    pub mode: ViewMode,
    pub index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(in crate::app) enum RedrawReason {
    Tick,
    Pointer,
    Transform,
    Data,
}

#[derive(Clone, Debug, PartialEq)]
pub(in crate::app) enum Action {
    SetFilters(FilterCriteria),
    SetCompareFilters(FilterCriteria),
    SwitchView(ViewMode),
    AssignSlot { slot: usize, category: String },
    PushSlot(String),
    ClearSlot(usize),
    Hover(Option<String>),
    Select { id: Option<String>, mode: ViewMode },
    Pan(Vec2),
    Zoom { anchor: Vec2, factor: f32 },
    ResetView,
    DragStart(usize),
    DragMove(Vec2),
    DragEnd,
}

#[derive(Clone, Debug, PartialEq)]
pub(in crate::app) enum Effect {
    Refilter(ViewMode),
    StopLayout,
    DragStart(usize),
    DragMove(usize, Vec2),
    DragEnd(usize),
    HoverChanged,
    SelectionChanged(ViewMode),
    Redraw(RedrawReason),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub(in crate::app) enum StateError {
    #[error(transparent)]
    Slot(#[from] SlotError),
}

#[derive(Clone, Debug, Default)]
pub(in crate::app) struct ViewState {
    pub mode: ViewMode,
    pub filters: FilterCriteria,
    pub compare_filters: FilterCriteria,
    pub slots: CompareSlots,
    pub transforms: [Transform; 3],
    pub hovered: Option<String>,
    pub selection: Selection,
    pub dragging: Option<DragState>,
}

impl ViewState {
    pub fn transform(&self, mode: ViewMode) -> Transform {
        self.transforms[mode.index()]
    }

    fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transforms[self.mode.index()]
    }

    pub fn selected(&self) -> Option<&str> {
        self.selection.get(self.mode)
    }

    fn clear_pointer_state(&mut self, effects: &mut Vec<Effect>) {
        if self.hovered.take().is_some() {
            effects.push(Effect::HoverChanged);
        }
        if let Some(drag) = self.dragging.take() {
            effects.push(Effect::DragEnd(drag.index));
        }
    }

    fn clear_selection(&mut self, mode: ViewMode, effects: &mut Vec<Effect>) {
        let slot = match mode {
            ViewMode::Network => &mut self.selection.network,
            ViewMode::Compare => &mut self.selection.compare,
            ViewMode::Map => return,
        };
        if slot.take().is_some() {
            effects.push(Effect::SelectionChanged(mode));
        }
    }

    fn slots_changed(&mut self, effects: &mut Vec<Effect>) {
        self.clear_selection(ViewMode::Compare, effects);
        if self.mode == ViewMode::Compare {
            self.clear_pointer_state(effects);
        }
        effects.push(Effect::Refilter(ViewMode::Compare));
        effects.push(Effect::Redraw(RedrawReason::Data));
    }

    /// Applies one action and returns the side effects the engine must run, in order.
    pub fn reduce(&mut self, action: Action) -> Result<Vec<Effect>, StateError> {
        let mut effects = Vec::new();

        match action {
            Action::SetFilters(criteria) => {
                if criteria != self.filters {
                    self.filters = criteria;
                    self.clear_selection(ViewMode::Network, &mut effects);
                    if self.mode == ViewMode::Network {
                        self.clear_pointer_state(&mut effects);
                    }
                    effects.push(Effect::Refilter(ViewMode::Network));
                    effects.push(Effect::Redraw(RedrawReason::Data));
                }
            }
            Action::SetCompareFilters(criteria) => {
                if criteria != self.compare_filters {
                    self.compare_filters = criteria;
                    self.clear_selection(ViewMode::Compare, &mut effects);
                    if self.mode == ViewMode::Compare {
                        self.clear_pointer_state(&mut effects);
                    }
                    effects.push(Effect::Refilter(ViewMode::Compare));
                    effects.push(Effect::Redraw(RedrawReason::Data));
                }
            }
            Action::SwitchView(mode) => {
                if mode != self.mode {
                    effects.push(Effect::StopLayout);
                    self.clear_pointer_state(&mut effects);
                    self.clear_selection(ViewMode::Network, &mut effects);
                    self.clear_selection(ViewMode::Compare, &mut effects);
                    self.mode = mode;
                    effects.push(Effect::Refilter(mode));
                    effects.push(Effect::Redraw(RedrawReason::Data));
                }
            }
            Action::AssignSlot { slot, category } => {
                if self.slots.assign(slot, &category)? {
                    self.slots_changed(&mut effects);
                }
            }
            Action::PushSlot(category) => {
                self.slots.push(&category)?;
                self.slots_changed(&mut effects);
            }
            Action::ClearSlot(slot) => {
                if self.slots.clear(slot)? {
                    self.slots_changed(&mut effects);
                }
            }
            Action::Hover(id) => {
                if id != self.hovered {
                    self.hovered = id;
                    effects.push(Effect::HoverChanged);
                    effects.push(Effect::Redraw(RedrawReason::Pointer));
                }
            }
            Action::Select { id, mode } => {
                let (target, other, other_mode) = match mode {
                    ViewMode::Network => (
                        &mut self.selection.network,
                        &mut self.selection.compare,
                        ViewMode::Compare,
                    ),
                    ViewMode::Compare => (
                        &mut self.selection.compare,
                        &mut self.selection.network,
                        ViewMode::Network,
                    ),
                    ViewMode::Map => return Ok(effects),
                };
                if *target != id {
                    *target = id;
                    effects.push(Effect::SelectionChanged(mode));
                }
                if other.take().is_some() {
                    effects.push(Effect::SelectionChanged(other_mode));
                }
                if !effects.is_empty() {
                    effects.push(Effect::Redraw(RedrawReason::Pointer));
                }
            }
            Action::Pan(delta) => {
                if delta != Vec2::ZERO {
                    self.transform_mut().pan(delta);
                    effects.push(Effect::Redraw(RedrawReason::Transform));
                }
            }
            Action::Zoom { anchor, factor } => {
                let before = self.transform(self.mode);
                self.transform_mut().zoom_at(anchor, factor);
                if self.transform(self.mode) != before {
                    effects.push(Effect::Redraw(RedrawReason::Transform));
                }
            }
            Action::ResetView => {
                *self.transform_mut() = Transform::default();
                effects.push(Effect::Redraw(RedrawReason::Transform));
            }
            Action::DragStart(index) => {
                if self.mode.has_layout() {
                    if let Some(previous) = self.dragging.take() {
                        effects.push(Effect::DragEnd(previous.index));
                    }
                    self.dragging = Some(DragState {
                        mode: self.mode,
                        index,
                    });
                    effects.push(Effect::DragStart(index));
                }
            }
            Action::DragMove(world) => {
                if let Some(drag) = self.dragging
                    && drag.mode == self.mode
                {
                    effects.push(Effect::DragMove(drag.index, world));
                    effects.push(Effect::Redraw(RedrawReason::Pointer));
                }
            }
            Action::DragEnd => {
                if let Some(drag) = self.dragging.take() {
                    effects.push(Effect::DragEnd(drag.index));
                }
            }
        }

        Ok(effects)
    }
}
