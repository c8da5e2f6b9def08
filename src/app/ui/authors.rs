use eframe::egui::{self, RichText, Ui};

use crate::collab::{AuthorDirectory, AuthorProfile, AuthorSummary, Dataset, StatsKey};
use crate::util::{format_count, truncate_label};

use super::super::ViewModel;

const RESULT_LIMIT: usize = 20;
const PARTNER_LIMIT: usize = 50;

/// Author lookup state for the details panel. Results are recomputed only when
/// the query text changes.
#[derive(Clone, Debug, Default)]
pub(in crate::app) struct AuthorSearch {
    pub query: String,
    pub results: Vec<AuthorProfile>,
    pub selected: Option<String>,
}

impl AuthorSearch {
    fn refresh(&mut self, directory: &AuthorDirectory) {
        self.results = directory.search(&self.query);
        self.selected = None;
    }
}

fn year_span(distribution: &[(i32, usize)]) -> Option<(i32, i32)> {
    Some((distribution.first()?.0, distribution.last()?.0))
}

fn draw_author_summary(
    ui: &mut Ui,
    dataset: &Dataset,
    directory: &AuthorDirectory,
    summary: &AuthorSummary,
) {
    egui::Grid::new("author_overview_grid")
        .num_columns(2)
        .striped(true)
        .show(ui, |ui| {
            ui.label("Authors");
            ui.label(format_count(summary.author_count as u64));
            ui.end_row();
            ui.label("Author collaborations");
            ui.label(format_count(summary.total_collaborations));
            ui.end_row();
            ui.label("Average per author");
            ui.label(format!("{:.1}", summary.average_collaborations));
            ui.end_row();
            ui.label("Author links");
            ui.label(format_count(summary.unique_connections as u64));
            ui.end_row();
        });

    if let Some((first, last)) = year_span(&summary.year_distribution) {
        ui.small(format!("First publications from {first} to {last}."));
        egui::CollapsingHeader::new("First publication years")
            .id_salt("author_years")
            .show(ui, |ui| {
                for (year, count) in &summary.year_distribution {
                    ui.label(format!("{year}  {}", format_count(*count as u64)));
                }
            });
    }

    if !summary.top_countries.is_empty() {
        egui::CollapsingHeader::new("Authors by country")
            .id_salt("author_countries")
            .show(ui, |ui| {
                for (code, count) in &summary.top_countries {
                    ui.label(format!(
                        "{}  {}",
                        dataset.category_name(code),
                        format_count(*count as u64)
                    ));
                }
            });
    }

    if !summary.top_authors.is_empty() {
        egui::CollapsingHeader::new("Most collaborative authors")
            .id_salt("author_top")
            .show(ui, |ui| {
                for &(index, count) in &summary.top_authors {
                    if let Some(author) = directory.author(index) {
                        ui.label(format!(
                            "{}  ({})",
                            truncate_label(&author.name, 40),
                            format_count(count)
                        ));
                    }
                }
            });
    }
}

impl ViewModel {
    pub(in crate::app) fn draw_authors(&mut self, ui: &mut Ui, dataset: &Dataset) {
        let Some(directory) = dataset.authors.as_ref() else {
            return;
        };

        ui.add_space(8.0);
        ui.separator();
        ui.heading("Authors");
        ui.add_space(4.0);

        let category = self.engine.state().filters.category.clone();
        let key = StatsKey::for_category(Some(category.as_str()));
        let summary = self.stats.get_or_compute(dataset, &key);
        if let Some(authors) = &summary.authors {
            draw_author_summary(ui, dataset, directory, authors);
        }

        ui.add_space(6.0);
        let response = ui.add(
            egui::TextEdit::singleline(&mut self.author_search.query).hint_text("author id or name"),
        );
        if response.changed() {
            self.author_search.refresh(directory);
        }

        if let Some(id) = self.author_search.selected.clone() {
            self.draw_author_profile(ui, dataset, directory, &id);
            return;
        }

        if self.author_search.query.trim().is_empty() {
            return;
        }
        if self.author_search.results.is_empty() {
            ui.label("No matching authors.");
            return;
        }

        ui.small(format!(
            "{} matching authors",
            format_count(self.author_search.results.len() as u64)
        ));
        let mut picked = None;
        for profile in self.author_search.results.iter().take(RESULT_LIMIT) {
            let Some(author) = directory.author(profile.index) else {
                continue;
            };
            let label = format!(
                "{}  ({} collaborations)",
                truncate_label(&author.name, 36),
                format_count(profile.total_collaborations)
            );
            let preview = profile
                .collaborators
                .iter()
                .filter_map(|partner| directory.author(partner.index))
                .map(|partner| partner.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let hover = if preview.is_empty() {
                author.id.clone()
            } else {
                format!("{}\nTop collaborators: {preview}", author.id)
            };
            if ui.link(label).on_hover_text(hover).clicked() {
                picked = Some(author.id.clone());
            }
        }
        if picked.is_some() {
            self.author_search.selected = picked;
        }
    }

    fn draw_author_profile(
        &mut self,
        ui: &mut Ui,
        dataset: &Dataset,
        directory: &AuthorDirectory,
        id: &str,
    ) {
        let Some((author, profile)) = directory
            .details(id)
            .and_then(|profile| Some((directory.author(profile.index)?, profile)))
        else {
            self.author_search.selected = None;
            return;
        };

        if ui.button("Back to results").clicked() {
            self.author_search.selected = None;
        }
        ui.label(RichText::new(author.name.as_str()).strong());
        ui.small(author.id.as_str());
        ui.label(format!(
            "Country: {} ({})",
            dataset.category_name(&author.country),
            author.country
        ));
        ui.label(format!("First publication: {}", author.first_pubyear));
        ui.label(format!(
            "Collaborations: {} with {} authors",
            format_count(profile.total_collaborations),
            format_count(profile.num_collaborators as u64)
        ));

        let mut picked = None;
        egui::ScrollArea::vertical()
            .id_salt("author_partners_scroll")
            .max_height(240.0)
            .auto_shrink([false, true])
            .show(ui, |ui| {
                for partner in profile.collaborators.iter().take(PARTNER_LIMIT) {
                    let Some(other) = directory.author(partner.index) else {
                        continue;
                    };
                    let label = format!(
                        "{}  ({}, {})",
                        truncate_label(&other.name, 36),
                        other.country,
                        format_count(partner.count)
                    );
                    if ui.link(label).clicked() {
                        picked = Some(other.id.clone());
                    }
                }
            });
        if picked.is_some() {
            self.author_search.selected = picked;
        }
    }
}
