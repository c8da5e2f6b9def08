use std::sync::Arc;

use eframe::egui::{Align2, Color32, FontId, PointerButton, Pos2, Sense, Stroke, Ui, pos2, vec2};

use crate::collab::CountryGraph;
use crate::util::format_count;

use super::super::render_utils::{
    MAP_LINK_COLOR, category_color, circle_visible, edge_visible, project_lat_lon, with_alpha,
};
use super::super::state::Action;
use super::super::ViewModel;
use super::interaction::hit_test_by;

const MAP_LINK_OPACITY: f32 = 0.3;

pub(in crate::app) fn marker_radius(node_count: usize) -> f32 {
    4.0 + (node_count as f32).sqrt()
}

/// Link width scales with weight relative to the heaviest link, never below one pixel.
pub(in crate::app) fn link_width(weight: u64, max_weight: u64) -> f32 {
    if max_weight == 0 {
        return 1.0;
    }
    (3.0 * weight as f32 / max_weight as f32).max(1.0)
}

impl ViewModel {
    pub(in crate::app) fn draw_map(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        self.handle_zoom(ui, rect, &response);
        self.handle_pan(&response);
        if response.dragged_by(PointerButton::Primary) {
            self.dispatch(Action::Pan(response.drag_delta()));
        }

        let dataset = Arc::clone(self.engine.dataset());
        let countries: &CountryGraph = &dataset.countries;
        let transform = self.engine.state().transform(self.engine.mode());
        let map_size = rect.size();
        let project = |lat: f64, lon: f64| -> Pos2 {
            transform.to_screen(rect, project_lat_lon(lat, lon, map_size))
        };

        painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));
        let grid = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70));
        for lon in (-180..=180).step_by(30) {
            painter.line_segment(
                [project(90.0, f64::from(lon)), project(-90.0, f64::from(lon))],
                grid,
            );
        }
        for lat in (-90..=90).step_by(30) {
            painter.line_segment(
                [project(f64::from(lat), -180.0), project(f64::from(lat), 180.0)],
                grid,
            );
        }

        if countries.nodes.is_empty() {
            self.map_hovered = None;
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "No located institutions to map.",
                FontId::proportional(15.0),
                Color32::from_gray(200),
            );
            return;
        }

        let positions = countries
            .nodes
            .iter()
            .map(|country| project(country.lat, country.lon))
            .collect::<Vec<_>>();
        let radii = countries
            .nodes
            .iter()
            .map(|country| marker_radius(country.node_count))
            .collect::<Vec<_>>();

        let link_color = with_alpha(MAP_LINK_COLOR, MAP_LINK_OPACITY);
        for edge in &countries.edges {
            let (Some(&start), Some(&end)) = (positions.get(edge.source), positions.get(edge.target))
            else {
                continue;
            };
            if !edge_visible(rect, start, end, 2.0) {
                continue;
            }
            let width = link_width(edge.weight, countries.max_weight);
            painter.line_segment([start, end], Stroke::new(width, link_color));
        }

        let pointer = response.hover_pos();
        self.map_hovered = pointer.and_then(|pointer| {
            hit_test_by(positions.len(), pointer.to_vec2(), 0.0, |index| {
                (positions[index].to_vec2(), radii[index])
            })
        });

        for (index, country) in countries.nodes.iter().enumerate() {
            let (position, radius) = (positions[index], radii[index]);
            if !circle_visible(rect, position, radius + 2.0) {
                continue;
            }
            let hovered = self.map_hovered == Some(index);
            painter.circle_filled(position, radius, category_color(index));
            let outline = if hovered {
                Stroke::new(2.5, Color32::BLACK)
            } else {
                Stroke::new(1.0, with_alpha(Color32::WHITE, 0.8))
            };
            painter.circle_stroke(position, radius, outline);

            if hovered {
                let text = format!(
                    "{}\n{} institutions\n{} co-publications",
                    dataset.category_name(&country.code),
                    format_count(country.node_count as u64),
                    format_count(country.strength)
                );
                painter.text(
                    position + vec2(radius + 6.0, -radius),
                    Align2::LEFT_TOP,
                    text,
                    FontId::proportional(13.0),
                    Color32::from_gray(240),
                );
            }
        }

        painter.text(
            pos2(rect.left() + 10.0, rect.bottom() - 10.0),
            Align2::LEFT_BOTTOM,
            format!(
                "{} countries, {} international links",
                countries.nodes.len(),
                format_count(countries.edges.len() as u64)
            ),
            FontId::proportional(12.0),
            Color32::from_gray(180),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_grow_with_member_count() {
        assert_eq!(marker_radius(0), 4.0);
        assert_eq!(marker_radius(16), 8.0);
    }

    #[test]
    fn link_width_is_relative_with_floor() {
        assert_eq!(link_width(10, 10), 3.0);
        assert_eq!(link_width(1, 10), 1.0);
        assert_eq!(link_width(5, 0), 1.0);
    }
}
