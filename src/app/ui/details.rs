use std::cmp::Ordering;
use std::sync::Arc;

use eframe::egui::{self, RichText, Ui};

use crate::collab::{Dataset, Node, StatsKey, collaborators};
use crate::util::{format_count, truncate_label};

use super::super::render_utils::slot_color;
use super::super::state::{Action, ViewMode};
use super::super::ViewModel;

const TABLE_ROW_LIMIT: usize = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(in crate::app) enum SortColumn {
    Name,
    Country,
    #[default]
    Strength,
}

impl SortColumn {
    const ALL: [Self; 3] = [Self::Name, Self::Country, Self::Strength];

    fn label(self) -> &'static str {
        match self {
            Self::Name => "Institution",
            Self::Country => "Country",
            Self::Strength => "Strength",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::app) struct TableSort {
    pub column: SortColumn,
    pub descending: bool,
}

impl Default for TableSort {
    fn default() -> Self {
        Self {
            column: SortColumn::Strength,
            descending: true,
        }
    }
}

impl TableSort {
    /// Clicking the active column flips direction; another column starts descending.
    fn toggle(&mut self, column: SortColumn) {
        if self.column == column {
            self.descending = !self.descending;
        } else {
            self.column = column;
            self.descending = true;
        }
    }
}

/// Row order for the institution table, capped at `limit`. Ties fall back to id
/// so the order is stable between frames.
pub(in crate::app) fn sorted_rows(nodes: &[Node], sort: TableSort, limit: usize) -> Vec<usize> {
    let mut rows = (0..nodes.len()).collect::<Vec<_>>();
    rows.sort_by(|&a, &b| {
        let (left, right) = (&nodes[a], &nodes[b]);
        let primary = match sort.column {
            SortColumn::Name => left.name.cmp(&right.name),
            SortColumn::Country => left.category.cmp(&right.category),
            SortColumn::Strength => left.strength.cmp(&right.strength),
        };
        let primary = if sort.descending {
            primary.reverse()
        } else {
            primary
        };
        match primary {
            Ordering::Equal => left.id.cmp(&right.id),
            other => other,
        }
    });
    rows.truncate(limit);
    rows
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        let dataset = Arc::clone(self.engine.dataset());

        match self.engine.mode() {
            ViewMode::Map => {
                self.draw_map_details(ui, &dataset);
                return;
            }
            ViewMode::Compare => self.draw_comparison(ui, &dataset),
            ViewMode::Network => {}
        }

        if let Some(node) = self.engine.selected_node().cloned() {
            self.draw_selection(ui, &dataset, &node);
        } else {
            self.draw_overview(ui, &dataset);
        }

        if self.engine.mode() == ViewMode::Network {
            self.draw_authors(ui, &dataset);
        }

        ui.add_space(8.0);
        ui.separator();
        self.draw_table(ui, &dataset);
    }

    fn draw_selection(&mut self, ui: &mut Ui, dataset: &Dataset, node: &Node) {
        ui.heading("Selection");
        ui.add_space(6.0);

        ui.label(RichText::new(node.name.as_str()).strong());
        ui.small(node.id.as_str());
        ui.add_space(6.0);
        ui.label(format!(
            "Country: {} ({})",
            dataset.category_name(&node.category),
            node.category
        ));
        ui.label(format!("Total co-publications: {}", format_count(node.strength)));
        ui.label(format!("Distinct partners: {}", node.degree));
        ui.label(format!("Location: {:.3}, {:.3}", node.lat, node.lon));

        ui.horizontal(|ui| {
            if ui.button("Clear selection").clicked() {
                self.select(None);
            }
            let already_compared = self.engine.state().slots.slot_of(&node.category).is_some();
            if ui
                .add_enabled(!already_compared, egui::Button::new("Compare this country"))
                .clicked()
            {
                self.dispatch(Action::PushSlot(node.category.clone()));
            }
        });

        ui.separator();
        ui.label(RichText::new("Collaborators").strong());

        let Some(index) = dataset.index_by_id.get(&node.id).copied() else {
            return;
        };
        let partners = collaborators(dataset, index);
        if partners.is_empty() {
            ui.label("No recorded collaborations.");
            return;
        }

        let row_count = partners.len().min(self.collaborator_rows_visible);
        let mut should_load_more = false;
        let mut clicked = None;

        egui::ScrollArea::vertical()
            .id_salt("collaborators_scroll")
            .max_height(320.0)
            .auto_shrink([false, true])
            .show_rows(ui, 22.0, row_count, |ui, row_range| {
                if row_range.end + Self::COLLABORATOR_PREFETCH_MARGIN >= row_count {
                    should_load_more = true;
                }
                for row in row_range {
                    let Some(partner) = partners.get(row) else {
                        continue;
                    };
                    let Some(other) = dataset.nodes.get(partner.index) else {
                        continue;
                    };
                    let label = format!(
                        "{}  ({}, {})",
                        truncate_label(&other.name, 40),
                        other.category,
                        format_count(partner.weight)
                    );
                    if ui.link(label).on_hover_text(other.id.as_str()).clicked() {
                        clicked = Some(other.id.clone());
                    }
                }
            });

        if should_load_more && row_count < partners.len() {
            self.collaborator_rows_visible =
                (row_count + Self::COLLABORATOR_PAGE_ROWS).min(partners.len());
        }
        if let Some(id) = clicked {
            self.select(Some(&id));
        }
    }

    fn draw_overview(&mut self, ui: &mut Ui, dataset: &Dataset) {
        let filters = &self.engine.state().filters;
        let key = StatsKey::for_category(Some(filters.category.as_str()));
        let summary = self.stats.get_or_compute(dataset, &key);

        let title = match &summary.category {
            Some(code) => format!("Overview: {}", dataset.category_name(code)),
            None => "Overview".to_owned(),
        };
        ui.heading(title);
        ui.add_space(6.0);

        egui::Grid::new("overview_grid")
            .num_columns(2)
            .striped(true)
            .show(ui, |ui| {
                ui.label("Institutions");
                ui.label(format_count(summary.node_count as u64));
                ui.end_row();
                ui.label("Collaboration links");
                ui.label(format_count(summary.unique_connections as u64));
                ui.end_row();
                ui.label("Total co-publications");
                ui.label(format_count(summary.total_weight));
                ui.end_row();
                ui.label("Average per institution");
                ui.label(format!("{:.1}", summary.average_weight));
                ui.end_row();
            });

        if !summary.top_categories.is_empty() {
            ui.add_space(6.0);
            ui.label(RichText::new("Most represented countries").strong());
            for (code, count) in &summary.top_categories {
                ui.label(format!(
                    "{}  {}",
                    dataset.category_name(code),
                    format_count(*count as u64)
                ));
            }
        }

        let mut clicked = None;
        if !summary.top_nodes.is_empty() {
            ui.add_space(6.0);
            ui.label(RichText::new("Strongest institutions").strong());
            for &(index, weight) in &summary.top_nodes {
                let Some(node) = dataset.nodes.get(index) else {
                    continue;
                };
                let label = format!("{}  ({})", truncate_label(&node.name, 40), format_count(weight));
                if ui.link(label).clicked() {
                    clicked = Some(node.id.clone());
                }
            }
        }

        if let (Some(&(min_weight, _)), Some(&(max_weight, _))) = (
            summary.strength_distribution.first(),
            summary.strength_distribution.last(),
        ) {
            ui.add_space(6.0);
            ui.small(format!(
                "Link weights range from {} to {} across {} distinct values.",
                format_count(min_weight),
                format_count(max_weight),
                summary.strength_distribution.len()
            ));
        }

        if let Some(id) = clicked {
            self.select(Some(&id));
        }
    }

    fn draw_comparison(&mut self, ui: &mut Ui, dataset: &Dataset) {
        ui.heading("Comparison");
        ui.add_space(6.0);

        let comparison = self.engine.comparison();
        if comparison.summaries.is_empty() {
            ui.label("Assign countries to the comparison slots on the left.");
        }
        for summary in &comparison.summaries {
            ui.horizontal(|ui| {
                ui.label(RichText::new("●").color(slot_color(summary.slot)));
                ui.label(RichText::new(dataset.category_name(&summary.category)).strong());
            });
            ui.label(format!(
                "{} institutions, {} co-publications",
                format_count(summary.node_count as u64),
                format_count(summary.total_strength)
            ));
        }
        if comparison.summaries.len() > 1 {
            ui.add_space(4.0);
            ui.label(format!(
                "Cross-country co-publications: {}",
                format_count(comparison.cross_weight)
            ));
        }
        ui.separator();
    }

    fn draw_map_details(&mut self, ui: &mut Ui, dataset: &Dataset) {
        ui.heading("Countries");
        ui.add_space(6.0);

        let countries = &dataset.countries;
        ui.label(format!(
            "{} countries, {} international links",
            countries.nodes.len(),
            format_count(countries.edges.len() as u64)
        ));

        let Some(country) = self.map_hovered.and_then(|index| countries.nodes.get(index)) else {
            ui.label("Hover a country marker for details.");
            return;
        };

        ui.separator();
        ui.label(RichText::new(dataset.category_name(&country.code)).strong());
        ui.label(format!("Institutions: {}", format_count(country.node_count as u64)));
        ui.label(format!("Total co-publications: {}", format_count(country.strength)));

        let hovered = self.map_hovered;
        let mut partners = countries
            .edges
            .iter()
            .filter_map(|edge| {
                let other = if Some(edge.source) == hovered {
                    edge.target
                } else if Some(edge.target) == hovered {
                    edge.source
                } else {
                    return None;
                };
                countries.nodes.get(other).map(|node| (node, edge.weight))
            })
            .collect::<Vec<_>>();
        partners.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.code.cmp(&b.0.code)));

        ui.add_space(6.0);
        ui.label(RichText::new("Top partner countries").strong());
        for (partner, weight) in partners.into_iter().take(10) {
            ui.label(format!(
                "{}  {}",
                dataset.category_name(&partner.code),
                format_count(weight)
            ));
        }
    }

    fn draw_table(&mut self, ui: &mut Ui, dataset: &Dataset) {
        let snapshot = Arc::clone(self.engine.snapshot());
        ui.label(RichText::new("Institutions in view").strong());
        if snapshot.nodes.len() > TABLE_ROW_LIMIT {
            ui.small(format!(
                "Showing {TABLE_ROW_LIMIT} of {}",
                format_count(snapshot.nodes.len() as u64)
            ));
        }

        let rows = sorted_rows(&snapshot.nodes, self.table_sort, TABLE_ROW_LIMIT);
        let selected = self.engine.state().selected().map(str::to_owned);
        let mut clicked = None;
        let mut sort_by = None;

        egui::Grid::new("institution_table")
            .num_columns(3)
            .striped(true)
            .show(ui, |ui| {
                for column in SortColumn::ALL {
                    let arrow = match (self.table_sort.column == column, self.table_sort.descending) {
                        (true, true) => " ⏷",
                        (true, false) => " ⏶",
                        (false, _) => "",
                    };
                    if ui
                        .button(RichText::new(format!("{}{arrow}", column.label())).strong())
                        .clicked()
                    {
                        sort_by = Some(column);
                    }
                }
                ui.end_row();

                for index in rows {
                    let node = &snapshot.nodes[index];
                    let is_selected = selected.as_deref() == Some(node.id.as_str());
                    if ui
                        .selectable_label(is_selected, truncate_label(&node.name, 32))
                        .on_hover_text(node.id.as_str())
                        .clicked()
                    {
                        clicked = Some(node.id.clone());
                    }
                    ui.label(dataset.category_name(&node.category));
                    ui.label(format_count(node.strength));
                    ui.end_row();
                }
            });

        if let Some(column) = sort_by {
            self.table_sort.toggle(column);
        }
        if let Some(id) = clicked {
            self.select(Some(&id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::fixtures::node;

    fn nodes() -> Vec<Node> {
        let mut nodes = vec![
            node("b", "US", 5, 1),
            node("a", "FR", 10, 2),
            node("c", "DE", 5, 1),
        ];
        nodes[0].name = "Beta".to_owned();
        nodes[1].name = "Alpha".to_owned();
        nodes[2].name = "Gamma".to_owned();
        nodes
    }

    #[test]
    fn default_sort_is_strength_descending_with_id_ties() {
        let rows = sorted_rows(&nodes(), TableSort::default(), 100);
        assert_eq!(rows, vec![1, 0, 2]);
    }

    #[test]
    fn sort_by_name_and_country() {
        let nodes = nodes();
        let by_name = TableSort {
            column: SortColumn::Name,
            descending: false,
        };
        assert_eq!(sorted_rows(&nodes, by_name, 100), vec![1, 0, 2]);

        let by_country = TableSort {
            column: SortColumn::Country,
            descending: false,
        };
        assert_eq!(sorted_rows(&nodes, by_country, 100), vec![2, 1, 0]);
    }

    #[test]
    fn rows_are_capped() {
        assert_eq!(sorted_rows(&nodes(), TableSort::default(), 2).len(), 2);
    }

    #[test]
    fn toggling_flips_then_resets_direction() {
        let mut sort = TableSort::default();
        sort.toggle(SortColumn::Strength);
        assert!(!sort.descending);
        sort.toggle(SortColumn::Name);
        assert_eq!(sort.column, SortColumn::Name);
        assert!(sort.descending);
    }
}
