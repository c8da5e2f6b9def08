use std::sync::Arc;

use eframe::egui::{self, Key, Response, RichText, Ui};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::collab::CountryNames;

use super::super::compare::SLOT_COUNT;
use super::super::filter::FilterCriteria;
use super::super::render_utils::slot_color;
use super::super::state::{Action, ViewMode};
use super::super::ViewModel;

const SLIDER_KEY_BASE_RATE: f32 = 10.0;
const SLIDER_KEY_ACCEL_PER_SEC: f32 = 9.0;
const SLIDER_KEY_ACCEL_MAX: f32 = 40.0;
const PICKER_MAX_RESULTS: usize = 12;

#[derive(Clone, Copy, Default)]
struct SliderKeyHoldState {
    positive_secs: f32,
    negative_secs: f32,
    integer_carry: f32,
}

fn slider_key_accel_multiplier(hold_secs: f32) -> f32 {
    let ramp = hold_secs * SLIDER_KEY_ACCEL_PER_SEC;
    (1.0 + ramp + ramp * ramp * 0.15).min(SLIDER_KEY_ACCEL_MAX)
}

/// Holding an arrow key on a focused slider ramps the step rate up over time.
fn apply_slider_arrow_acceleration(
    ui: &Ui,
    response: &Response,
    value: &mut u64,
    min: u64,
    max: u64,
    step: u64,
) -> bool {
    let state_id = response.id.with("arrow_key_hold_state");
    let mut hold_state = ui.ctx().data(|data| {
        data.get_temp::<SliderKeyHoldState>(state_id)
            .unwrap_or_default()
    });

    if !response.has_focus() {
        ui.ctx()
            .data_mut(|data| data.insert_temp(state_id, SliderKeyHoldState::default()));
        return false;
    }

    let (delta_time, increase_down, decrease_down) = ui.input(|input| {
        (
            input.stable_dt.min(0.1),
            input.key_down(Key::ArrowRight) || input.key_down(Key::ArrowUp),
            input.key_down(Key::ArrowLeft) || input.key_down(Key::ArrowDown),
        )
    });

    hold_state.positive_secs = if increase_down {
        hold_state.positive_secs + delta_time
    } else {
        0.0
    };
    hold_state.negative_secs = if decrease_down {
        hold_state.negative_secs + delta_time
    } else {
        0.0
    };

    let direction = (increase_down as i8) - (decrease_down as i8);
    if direction == 0 {
        hold_state.integer_carry = 0.0;
        ui.ctx()
            .data_mut(|data| data.insert_temp(state_id, hold_state));
        return false;
    }

    let hold_secs = if direction > 0 {
        hold_state.positive_secs
    } else {
        hold_state.negative_secs
    };
    let speed = SLIDER_KEY_BASE_RATE * slider_key_accel_multiplier(hold_secs);
    hold_state.integer_carry += direction as f32 * step as f32 * speed * delta_time;

    let whole_delta = hold_state.integer_carry.trunc() as i64;
    hold_state.integer_carry -= whole_delta as f32;

    let old_value = *value;
    if whole_delta != 0 {
        let next = (*value as i64).saturating_add(whole_delta);
        *value = next.clamp(min as i64, max as i64) as u64;
    }

    ui.ctx().request_repaint();
    ui.ctx()
        .data_mut(|data| data.insert_temp(state_id, hold_state));
    *value != old_value
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

/// Categories matching `query` by code or display name, best first. An empty
/// query keeps the sorted category order.
pub(in crate::app) fn rank_categories<'a>(
    categories: &'a [String],
    names: &CountryNames,
    query: &str,
) -> Vec<&'a str> {
    let query = query.trim();
    if query.is_empty() {
        return categories.iter().map(String::as_str).collect();
    }

    let matcher = SkimMatcherV2::default();
    let mut scored = categories
        .iter()
        .filter_map(|code| {
            let by_code = fuzzy_match_score(&matcher, code, query);
            let by_name = fuzzy_match_score(&matcher, names.name(code), query);
            by_code.max(by_name).map(|score| (score, code.as_str()))
        })
        .collect::<Vec<_>>();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored.into_iter().map(|(_, code)| code).collect()
}

/// Fuzzy category search for filling a comparison slot.
#[derive(Clone, Debug, Default)]
pub(in crate::app) struct CategoryPicker {
    pub open_slot: Option<usize>,
    pub query: String,
}

impl CategoryPicker {
    fn toggle(&mut self, slot: usize) {
        if self.open_slot == Some(slot) {
            self.close();
        } else {
            self.open_slot = Some(slot);
            self.query.clear();
        }
    }

    fn close(&mut self) {
        self.open_slot = None;
        self.query.clear();
    }
}

/// Shared filter widgets. Returns whether any criterion changed.
fn filter_widgets(
    ui: &mut Ui,
    criteria: &mut FilterCriteria,
    max_strength: u64,
    max_degree: u32,
    node_count: usize,
) -> bool {
    let mut changed = false;

    ui.label("Search institutions");
    changed |= ui
        .add(egui::TextEdit::singleline(&mut criteria.search).hint_text("name"))
        .changed();
    ui.add_space(4.0);

    let strength_max = max_strength.max(1);
    let strength_slider = ui
        .add(
            egui::Slider::new(&mut criteria.min_strength, 0..=strength_max)
                .logarithmic(strength_max > 100)
                .text("min strength"),
        )
        .on_hover_text("Hide institutions with fewer total co-publications.");
    changed |= strength_slider.changed();
    changed |= apply_slider_arrow_acceleration(
        ui,
        &strength_slider,
        &mut criteria.min_strength,
        0,
        strength_max,
        1,
    );

    let degree_max = u64::from(max_degree.max(1));
    let mut min_degree = u64::from(criteria.min_degree);
    let degree_slider = ui
        .add(egui::Slider::new(&mut min_degree, 0..=degree_max).text("min partners"))
        .on_hover_text("Hide institutions with fewer distinct partners.");
    let mut degree_changed = degree_slider.changed();
    degree_changed |=
        apply_slider_arrow_acceleration(ui, &degree_slider, &mut min_degree, 0, degree_max, 1);
    if degree_changed {
        criteria.min_degree = u32::try_from(min_degree).unwrap_or(u32::MAX);
        changed = true;
    }

    let mut limited = criteria.top_n.is_some();
    if ui
        .checkbox(&mut limited, "Only the strongest institutions")
        .changed()
    {
        criteria.top_n = limited.then_some(node_count.clamp(1, 200));
        changed = true;
    }
    if let Some(limit) = criteria.top_n.as_mut() {
        let top_max = node_count.max(*limit).max(1) as u64;
        let mut top = *limit as u64;
        let top_slider = ui.add(
            egui::Slider::new(&mut top, 1..=top_max)
                .logarithmic(top_max > 100)
                .text("top N"),
        );
        let mut top_changed = top_slider.changed();
        top_changed |= apply_slider_arrow_acceleration(ui, &top_slider, &mut top, 1, top_max, 1);
        if top_changed {
            *limit = top as usize;
            changed = true;
        }
    }

    changed
}

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        let now = ui.input(|input| input.time);
        let dataset = Arc::clone(self.engine.dataset());

        ui.heading("Filters");
        ui.separator();
        ui.add_space(4.0);

        let mut changed = false;

        let selected_text = if self.draft_filters.category.is_empty() {
            "All countries".to_owned()
        } else {
            dataset.category_name(&self.draft_filters.category).to_owned()
        };
        egui::ComboBox::from_label("Country")
            .selected_text(selected_text)
            .show_ui(ui, |ui| {
                changed |= ui
                    .selectable_value(&mut self.draft_filters.category, String::new(), "All countries")
                    .changed();
                for code in &dataset.categories {
                    let label = format!("{} ({code})", dataset.category_name(code));
                    changed |= ui
                        .selectable_value(&mut self.draft_filters.category, code.clone(), label)
                        .changed();
                }
            });
        ui.add_space(4.0);

        changed |= filter_widgets(
            ui,
            &mut self.draft_filters,
            dataset.max_strength,
            dataset.max_degree,
            dataset.node_count(),
        );

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            if ui.button("Reset filters").clicked() {
                self.draft_filters = FilterCriteria::default();
                changed = true;
            }
            if self.filter_debounce.is_pending() {
                ui.spinner();
            }
        });

        if changed {
            self.filter_debounce.push(self.draft_filters.clone(), now);
        }

        ui.add_space(10.0);
        ui.separator();
        self.draw_compare_controls(ui, now);
    }

    fn draw_compare_controls(&mut self, ui: &mut Ui, now: f64) {
        let dataset = Arc::clone(self.engine.dataset());

        ui.heading("Compare countries");
        ui.add_space(4.0);

        let mut pending_action = None;
        for slot in 0..SLOT_COUNT {
            let current = self.engine.state().slots.get(slot).map(str::to_owned);
            ui.horizontal(|ui| {
                ui.label(RichText::new("●").color(slot_color(slot)));
                let label = current
                    .as_deref()
                    .map(|code| dataset.category_name(code).to_owned())
                    .unwrap_or_else(|| "empty".to_owned());
                let open = self.picker.open_slot == Some(slot);
                if ui.selectable_label(open, label).clicked() {
                    self.picker.toggle(slot);
                }
                if current.is_some() && ui.small_button("✕").on_hover_text("Clear slot").clicked() {
                    pending_action = Some(Action::ClearSlot(slot));
                }
            });

            if self.picker.open_slot != Some(slot) {
                continue;
            }

            ui.indent(("category_picker", slot), |ui| {
                ui.add(
                    egui::TextEdit::singleline(&mut self.picker.query).hint_text("country or code"),
                );
                let matches = rank_categories(&dataset.categories, &dataset.names, &self.picker.query);
                if matches.is_empty() {
                    ui.label("No matching countries.");
                }
                for code in matches.into_iter().take(PICKER_MAX_RESULTS) {
                    let taken = self
                        .engine
                        .state()
                        .slots
                        .slot_of(code)
                        .is_some_and(|existing| existing != slot);
                    let text = format!("{} ({code})", dataset.category_name(code));
                    if ui.add_enabled(!taken, egui::Button::new(text)).clicked() {
                        pending_action = Some(Action::AssignSlot {
                            slot,
                            category: code.to_owned(),
                        });
                    }
                }
                if ui.input(|input| input.key_pressed(Key::Escape)) {
                    self.picker.close();
                }
            });
        }

        if let Some(action) = pending_action {
            self.picker.close();
            self.dispatch(action);
            if self.engine.mode() != ViewMode::Compare && !self.engine.state().slots.is_empty() {
                self.dispatch(Action::SwitchView(ViewMode::Compare));
            }
        }

        if self.engine.mode() != ViewMode::Compare {
            return;
        }

        ui.add_space(8.0);
        ui.label(RichText::new("Compare filters").strong());
        let changed = filter_widgets(
            ui,
            &mut self.draft_compare_filters,
            dataset.max_strength,
            dataset.max_degree,
            dataset.node_count(),
        );
        if changed {
            self.compare_debounce
                .push(self.draft_compare_filters.clone(), now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<String> {
        ["DE", "FR", "US"].into_iter().map(str::to_owned).collect()
    }

    #[test]
    fn empty_query_keeps_sorted_order() {
        let categories = categories();
        let names = CountryNames::default();
        assert_eq!(rank_categories(&categories, &names, "  "), vec!["DE", "FR", "US"]);
    }

    #[test]
    fn query_matches_display_names() {
        let categories = categories();
        let names = CountryNames::parse(
            r#"{"DE": "Germany", "FR": "France", "US": "United States"}"#,
        )
        .expect("names parse");

        let ranked = rank_categories(&categories, &names, "fran");
        assert_eq!(ranked.first(), Some(&"FR"));
        assert!(!ranked.contains(&"DE"));
    }

    #[test]
    fn accel_multiplier_ramps_and_caps() {
        assert_eq!(slider_key_accel_multiplier(0.0), 1.0);
        assert!(slider_key_accel_multiplier(0.5) > slider_key_accel_multiplier(0.1));
        assert_eq!(slider_key_accel_multiplier(60.0), SLIDER_KEY_ACCEL_MAX);
    }
}
