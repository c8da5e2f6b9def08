use std::sync::Arc;

use eframe::egui::{Align2, Color32, FontId, Sense, Stroke, Ui, vec2};

use crate::collab::Node;
use crate::util::{format_count, truncate_label};

use super::super::compare::CompareSlots;
use super::super::render_utils::{
    EDGE_COLOR, category_color, circle_visible, dim_color, draw_background, edge_visible,
    slot_color, with_alpha,
};
use super::super::state::ViewMode;
use super::super::ViewModel;

const LABEL_MAX_CHARS: usize = 36;

struct EdgeStyle {
    width: f32,
    alpha: f32,
    outline_width: f32,
}

impl EdgeStyle {
    fn for_mode(mode: ViewMode) -> Self {
        match mode {
            ViewMode::Compare => Self {
                width: 0.8,
                alpha: 0.4,
                outline_width: 1.2,
            },
            _ => Self {
                width: 0.5,
                alpha: 0.3,
                outline_width: 1.0,
            },
        }
    }
}

/// Compare-mode fill: the colour of the slot holding the node's category.
pub(in crate::app) fn compare_fill(slots: &CompareSlots, node: &Node) -> Color32 {
    slots
        .slot_of(&node.category)
        .map(slot_color)
        .unwrap_or_else(|| category_color(node.category_rank))
}

impl ViewModel {
    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        self.handle_graph_input(ui, rect, &response);

        let generation = self.engine.generation();
        self.engine.tick_for(generation);

        let mode = self.engine.mode();
        let transform = self.engine.state().transform(mode);
        draw_background(&painter, rect, transform);

        let snapshot = Arc::clone(self.engine.snapshot());
        let Some(simulation) = self.engine.simulation() else {
            self.visible_node_count = 0;
            self.visible_edge_count = 0;
            return;
        };
        if snapshot.is_empty() {
            self.visible_node_count = 0;
            self.visible_edge_count = 0;
            let message = if mode == ViewMode::Compare && self.engine.state().slots.is_empty() {
                "Pick up to three countries to compare."
            } else {
                "No data matches the current filters."
            };
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                message,
                FontId::proportional(15.0),
                Color32::from_gray(200),
            );
            return;
        }

        let sim_nodes = simulation.nodes();
        let scale = transform.scale;
        let screen_positions: Vec<_> = sim_nodes
            .iter()
            .map(|node| transform.to_screen(rect, node.pos))
            .collect();
        let screen_radii: Vec<f32> = sim_nodes
            .iter()
            .map(|node| (node.radius * scale).max(1.0))
            .collect();

        let style = EdgeStyle::for_mode(mode);
        let edge_stroke = Stroke::new(
            (style.width * scale.sqrt()).max(0.3),
            with_alpha(EDGE_COLOR, style.alpha),
        );
        let mut visible_edge_count = 0usize;
        for edge in &snapshot.edges {
            let (Some(&start), Some(&end)) = (
                screen_positions.get(edge.source),
                screen_positions.get(edge.target),
            ) else {
                continue;
            };
            if !edge_visible(rect, start, end, 2.0) {
                continue;
            }
            painter.line_segment([start, end], edge_stroke);
            visible_edge_count += 1;
        }
        self.visible_edge_count = visible_edge_count;

        let selected = self.engine.state().selected();
        let hovered = self.engine.state().hovered.as_deref();
        let mut visible_node_count = 0usize;
        for (index, node) in snapshot.nodes.iter().enumerate().take(screen_positions.len()) {
            let position = screen_positions[index];
            let radius = screen_radii[index];
            if !circle_visible(rect, position, radius + 3.0) {
                continue;
            }
            visible_node_count += 1;

            let fill = match mode {
                ViewMode::Compare => compare_fill(&self.engine.state().slots, node),
                _ => category_color(node.category_rank),
            };
            let is_selected = selected == Some(node.id.as_str());
            let is_hovered = hovered == Some(node.id.as_str());
            let fill = if selected.is_some() && !is_selected && !is_hovered {
                dim_color(fill, 0.7)
            } else {
                fill
            };

            if is_selected || is_hovered {
                painter.circle_filled(
                    position + vec2(1.5, 2.0),
                    radius + 2.0,
                    Color32::from_black_alpha(90),
                );
                painter.circle_filled(position, radius, fill);
                painter.circle_stroke(position, radius, Stroke::new(2.5, Color32::BLACK));
            } else {
                painter.circle_filled(position, radius, fill);
                painter.circle_stroke(
                    position,
                    radius,
                    Stroke::new(style.outline_width, with_alpha(Color32::WHITE, 0.8)),
                );
            }

            if is_selected || is_hovered || radius > 14.0 {
                painter.text(
                    position + vec2(radius + 5.0, 0.0),
                    Align2::LEFT_CENTER,
                    truncate_label(&node.name, LABEL_MAX_CHARS),
                    FontId::proportional(12.0),
                    Color32::from_gray(238),
                );
            }
        }
        self.visible_node_count = visible_node_count;

        if let Some(node) = self.engine.hovered_node() {
            let country = self.engine.dataset().category_name(&node.category);
            let text = format!(
                "{}  |  {}  |  strength {}  |  {} partners",
                node.name,
                country,
                format_count(node.strength),
                node.degree
            );
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                text,
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );
        }

        if response.dragged() {
            ui.ctx().request_repaint();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::render_utils::SLOT_COLORS;
    use crate::collab::fixtures::sample_graph;

    #[test]
    fn compare_nodes_take_their_country_slot_colour() {
        let (nodes, _) = sample_graph();
        let mut slots = CompareSlots::default();
        slots.push("US").expect("first slot");
        slots.push("FR").expect("second slot");

        let fills = nodes
            .iter()
            .map(|node| compare_fill(&slots, node))
            .collect::<Vec<_>>();
        assert_eq!(fills, vec![SLOT_COLORS[0], SLOT_COLORS[0], SLOT_COLORS[1]]);
    }

    #[test]
    fn slot_colour_follows_the_slot_not_the_push_order() {
        let (nodes, _) = sample_graph();
        let mut slots = CompareSlots::default();
        slots.assign(2, "FR").expect("third slot");

        assert_eq!(compare_fill(&slots, &nodes[2]), SLOT_COLORS[2]);
        assert_eq!(
            compare_fill(&slots, &nodes[0]),
            category_color(nodes[0].category_rank)
        );
    }
}
