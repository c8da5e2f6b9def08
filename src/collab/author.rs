use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::record::{UNKNOWN, count_value, float_value, text_value};

const SEARCH_PREVIEW: usize = 5;
const TOP_LIMIT: usize = 10;

#[derive(Clone, Debug, PartialEq)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub first_pubyear: i32,
    pub country: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthorLink {
    pub first: usize,
    pub second: usize,
    pub count: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthorPartner {
    pub index: usize,
    pub count: u64,
}

/// One author with their collaboration totals. `collaborators` is sorted by
/// count, heaviest first, and may be a truncated preview.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorProfile {
    pub index: usize,
    pub total_collaborations: u64,
    pub num_collaborators: usize,
    pub collaborators: Vec<AuthorPartner>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthorSummary {
    pub author_count: usize,
    pub total_collaborations: u64,
    pub average_collaborations: f64,
    pub unique_connections: usize,
    pub top_countries: Vec<(String, usize)>,
    pub top_authors: Vec<(usize, u64)>,
    pub year_distribution: Vec<(i32, usize)>,
    pub strength_distribution: Vec<(u64, usize)>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct RawAuthor {
    author_id: Value,
    author_name: Value,
    first_pubyear: Value,
    country_code: Value,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct RawLink {
    author1: Value,
    author2: Value,
    collaboration_count: Value,
}

#[derive(Debug, Deserialize)]
struct RawDirectory {
    authors: Vec<Value>,
    #[serde(default)]
    collaborations: Vec<Value>,
}

/// Author-level collaboration graph. Authors without a usable first publication
/// year are dropped, as are links naming unknown authors.
#[derive(Clone, Debug, Default)]
pub struct AuthorDirectory {
    pub authors: Vec<Author>,
    pub links: Vec<AuthorLink>,
    index_by_id: HashMap<String, usize>,
    adjacency: Vec<Vec<usize>>,
    pub skipped_authors: usize,
    pub skipped_links: usize,
}

impl RawAuthor {
    fn into_author(self) -> Option<Author> {
        let id = text_value(&self.author_id)?;
        let first_pubyear = float_value(&self.first_pubyear)?.trunc() as i32;
        Some(Author {
            id,
            name: text_value(&self.author_name).unwrap_or_else(|| UNKNOWN.to_owned()),
            first_pubyear,
            country: text_value(&self.country_code).unwrap_or_else(|| UNKNOWN.to_owned()),
        })
    }
}

impl AuthorDirectory {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read authors from {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid author data in {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let parsed: RawDirectory = serde_json::from_str(raw)?;

        let mut directory = Self::default();
        for row in parsed.authors {
            let author = RawAuthor::deserialize(row)
                .ok()
                .and_then(RawAuthor::into_author);
            let Some(author) = author else {
                directory.skipped_authors += 1;
                continue;
            };
            match directory.index_by_id.entry(author.id.clone()) {
                Entry::Occupied(_) => {
                    warn!(author = %author.id, "ignoring duplicate author row");
                }
                Entry::Vacant(entry) => {
                    entry.insert(directory.authors.len());
                    directory.authors.push(author);
                }
            }
        }

        if directory.authors.is_empty() {
            return Err(anyhow!(
                "no usable author rows found ({} skipped)",
                directory.skipped_authors
            ));
        }

        let mut pair_slots: HashMap<(usize, usize), usize> = HashMap::new();
        for row in parsed.collaborations {
            let Some((first, second, count)) = RawLink::deserialize(row)
                .ok()
                .and_then(|link| directory.resolve(&link))
            else {
                directory.skipped_links += 1;
                continue;
            };
            if first == second {
                directory.skipped_links += 1;
                continue;
            }

            match pair_slots.entry((first.min(second), first.max(second))) {
                Entry::Occupied(entry) => {
                    let link = &mut directory.links[*entry.get()];
                    link.count = link.count.saturating_add(count);
                }
                Entry::Vacant(entry) => {
                    entry.insert(directory.links.len());
                    directory.links.push(AuthorLink {
                        first,
                        second,
                        count,
                    });
                }
            }
        }

        directory.adjacency = vec![Vec::new(); directory.authors.len()];
        for (link_index, link) in directory.links.iter().enumerate() {
            directory.adjacency[link.first].push(link_index);
            directory.adjacency[link.second].push(link_index);
        }

        debug!(
            authors = directory.authors.len(),
            links = directory.links.len(),
            skipped_authors = directory.skipped_authors,
            skipped_links = directory.skipped_links,
            "parsed author directory"
        );
        Ok(directory)
    }

    fn resolve(&self, link: &RawLink) -> Option<(usize, usize, u64)> {
        let first = *self.index_by_id.get(&text_value(&link.author1)?)?;
        let second = *self.index_by_id.get(&text_value(&link.author2)?)?;
        Some((first, second, count_value(&link.collaboration_count).unwrap_or(0)))
    }

    pub fn author_count(&self) -> usize {
        self.authors.len()
    }

    pub fn author(&self, index: usize) -> Option<&Author> {
        self.authors.get(index)
    }

    fn profile(&self, index: usize) -> Option<AuthorProfile> {
        let incident = self.adjacency.get(index)?;
        let mut collaborators = incident
            .iter()
            .filter_map(|&link_index| self.links.get(link_index))
            .map(|link| AuthorPartner {
                index: if link.first == index {
                    link.second
                } else {
                    link.first
                },
                count: link.count,
            })
            .collect::<Vec<_>>();
        collaborators.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.index.cmp(&b.index)));

        Some(AuthorProfile {
            index,
            total_collaborations: collaborators
                .iter()
                .fold(0u64, |total, partner| total.saturating_add(partner.count)),
            num_collaborators: collaborators.len(),
            collaborators,
        })
    }

    pub fn details(&self, id: &str) -> Option<AuthorProfile> {
        self.profile(*self.index_by_id.get(id)?)
    }

    /// Authors whose id equals the trimmed query or whose name contains it,
    /// ignoring case. Each result previews its strongest collaborators.
    pub fn search(&self, query: &str) -> Vec<AuthorProfile> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let query_lower = query.to_lowercase();

        self.authors
            .iter()
            .enumerate()
            .filter(|(_, author)| {
                author.id == query || author.name.to_lowercase().contains(&query_lower)
            })
            .filter_map(|(index, _)| self.profile(index))
            .map(|mut profile| {
                profile.collaborators.truncate(SEARCH_PREVIEW);
                profile
            })
            .collect()
    }

    /// Statistics over all authors or one country. Links count only when both
    /// authors are inside the subset.
    pub fn summarize(&self, country: Option<&str>) -> AuthorSummary {
        let in_subset = |index: usize| {
            self.authors
                .get(index)
                .is_some_and(|author| country.is_none_or(|code| author.country == code))
        };

        let mut years: BTreeMap<i32, usize> = BTreeMap::new();
        let mut countries: HashMap<&str, usize> = HashMap::new();
        let mut author_count = 0usize;
        for (index, author) in self.authors.iter().enumerate() {
            if !in_subset(index) {
                continue;
            }
            author_count += 1;
            *years.entry(author.first_pubyear).or_insert(0) += 1;
            *countries.entry(author.country.as_str()).or_insert(0) += 1;
        }

        let mut total_collaborations = 0u64;
        let mut unique_connections = 0usize;
        let mut by_author: HashMap<usize, u64> = HashMap::new();
        let mut strengths: BTreeMap<u64, usize> = BTreeMap::new();
        for link in &self.links {
            if !in_subset(link.first) || !in_subset(link.second) {
                continue;
            }
            total_collaborations = total_collaborations.saturating_add(link.count);
            unique_connections += 1;
            *strengths.entry(link.count).or_insert(0) += 1;
            for endpoint in [link.first, link.second] {
                let entry = by_author.entry(endpoint).or_insert(0);
                *entry = entry.saturating_add(link.count);
            }
        }

        let average_collaborations = if author_count == 0 {
            0.0
        } else {
            (total_collaborations as f64 / author_count as f64 * 10.0).round() / 10.0
        };

        let top_countries = if country.is_some() {
            Vec::new()
        } else {
            let mut counts = countries
                .into_iter()
                .map(|(code, count)| (code.to_owned(), count))
                .collect::<Vec<_>>();
            counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            counts.truncate(TOP_LIMIT);
            counts
        };

        let mut top_authors = by_author.into_iter().collect::<Vec<_>>();
        top_authors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_authors.truncate(TOP_LIMIT);

        AuthorSummary {
            author_count,
            total_collaborations,
            average_collaborations,
            unique_connections,
            top_countries,
            top_authors,
            year_distribution: years.into_iter().collect(),
            strength_distribution: strengths.into_iter().collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::AuthorDirectory;

    pub(crate) const AUTHORS: &str = r#"{
        "authors": [
            {"author_id": 1, "author_name": "Ada Lovelace", "first_pubyear": 1990, "country_code": "GB"},
            {"author_id": "2", "author_name": "Alan Turing", "first_pubyear": "1990", "country_code": "GB"},
            {"author_id": 3, "author_name": "Marie Curie", "first_pubyear": 2001.0, "country_code": "FR"},
            {"author_id": 4, "author_name": "Nobody", "first_pubyear": "n/a", "country_code": "FR"}
        ],
        "collaborations": [
            {"author1": 1, "author2": 2, "collaboration_count": 4},
            {"author1": "2", "author2": 1, "collaboration_count": 1},
            {"author1": 1, "author2": 3, "collaboration_count": 2},
            {"author1": 3, "author2": 4, "collaboration_count": 9},
            {"author1": 3, "author2": 3, "collaboration_count": 1}
        ]
    }"#;

    pub(crate) fn sample_authors() -> AuthorDirectory {
        AuthorDirectory::parse(AUTHORS).expect("author fixture parses")
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::sample_authors;
    use super::*;

    fn ids(directory: &AuthorDirectory, profiles: &[AuthorProfile]) -> Vec<String> {
        profiles
            .iter()
            .filter_map(|profile| directory.author(profile.index))
            .map(|author| author.id.clone())
            .collect()
    }

    #[test]
    fn rows_without_a_year_or_known_endpoints_are_skipped() {
        let directory = sample_authors();
        assert_eq!(directory.author_count(), 3);
        assert_eq!(directory.skipped_authors, 1);
        assert_eq!(directory.skipped_links, 2);
        assert_eq!(
            directory.links,
            vec![
                AuthorLink {
                    first: 0,
                    second: 1,
                    count: 5
                },
                AuthorLink {
                    first: 0,
                    second: 2,
                    count: 2
                },
            ]
        );
        assert_eq!(directory.authors[2].first_pubyear, 2001);
    }

    #[test]
    fn search_matches_exact_id_or_name_substring() {
        let directory = sample_authors();
        assert_eq!(ids(&directory, &directory.search("2")), vec!["2"]);
        assert_eq!(ids(&directory, &directory.search(" a")), vec!["1", "2", "3"]);
        assert_eq!(ids(&directory, &directory.search("TURING")), vec!["2"]);
        assert!(directory.search("   ").is_empty());
        assert!(directory.search("zzz").is_empty());
    }

    #[test]
    fn details_list_collaborators_heaviest_first() {
        let directory = sample_authors();
        let profile = directory.details("1").expect("author 1 exists");
        assert_eq!(profile.total_collaborations, 7);
        assert_eq!(profile.num_collaborators, 2);
        assert_eq!(
            profile.collaborators,
            vec![
                AuthorPartner { index: 1, count: 5 },
                AuthorPartner { index: 2, count: 2 },
            ]
        );
        assert!(directory.details("4").is_none());
    }

    #[test]
    fn summary_includes_year_distribution() {
        let directory = sample_authors();
        let summary = directory.summarize(None);
        assert_eq!(summary.author_count, 3);
        assert_eq!(summary.total_collaborations, 7);
        assert_eq!(summary.average_collaborations, 2.3);
        assert_eq!(summary.unique_connections, 2);
        assert_eq!(summary.year_distribution, vec![(1990, 2), (2001, 1)]);
        assert_eq!(summary.strength_distribution, vec![(2, 1), (5, 1)]);
        assert_eq!(summary.top_authors[0], (0, 7));
        assert_eq!(
            summary.top_countries,
            vec![("GB".to_owned(), 2), ("FR".to_owned(), 1)]
        );
    }

    #[test]
    fn country_summary_keeps_internal_links_only() {
        let directory = sample_authors();
        let summary = directory.summarize(Some("GB"));
        assert_eq!(summary.author_count, 2);
        assert_eq!(summary.total_collaborations, 5);
        assert_eq!(summary.year_distribution, vec![(1990, 2)]);
        assert!(summary.top_countries.is_empty());
    }

    #[test]
    fn directory_without_usable_authors_is_an_error() {
        assert!(AuthorDirectory::parse(r#"{"authors": []}"#).is_err());
        assert!(AuthorDirectory::parse(r#"{"collaborations": []}"#).is_err());
        assert!(AuthorDirectory::parse("[]").is_err());
    }
}
