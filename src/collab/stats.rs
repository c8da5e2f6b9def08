use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use super::aggregate::Dataset;
use super::author::AuthorSummary;

const TOP_LIMIT: usize = 10;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Summary {
    pub category: Option<String>,
    pub node_count: usize,
    pub total_weight: u64,
    pub average_weight: f64,
    pub unique_connections: usize,
    pub top_categories: Vec<(String, usize)>,
    pub top_nodes: Vec<(usize, u64)>,
    pub strength_distribution: Vec<(u64, usize)>,
    pub authors: Option<AuthorSummary>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Collaborator {
    pub index: usize,
    pub weight: u64,
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Statistics over the whole dataset or one category. Only edges with both
/// endpoints inside the subset are counted. Author statistics ride along when
/// an author directory is loaded.
pub fn summarize(dataset: &Dataset, category: Option<&str>) -> Summary {
    let in_subset = |index: usize| match category {
        Some(code) => dataset
            .nodes
            .get(index)
            .is_some_and(|node| node.category == code),
        None => index < dataset.nodes.len(),
    };

    let node_count = (0..dataset.nodes.len())
        .filter(|&index| in_subset(index))
        .count();

    let mut total_weight = 0u64;
    let mut unique_connections = 0usize;
    let mut weight_by_node: HashMap<usize, u64> = HashMap::new();
    let mut distribution: BTreeMap<u64, usize> = BTreeMap::new();

    for edge in &dataset.edges {
        if !in_subset(edge.source) || !in_subset(edge.target) {
            continue;
        }
        total_weight = total_weight.saturating_add(edge.weight);
        unique_connections += 1;
        *distribution.entry(edge.weight).or_insert(0) += 1;
        for endpoint in [edge.source, edge.target] {
            let entry = weight_by_node.entry(endpoint).or_insert(0);
            *entry = entry.saturating_add(edge.weight);
        }
    }

    let average_weight = if node_count == 0 {
        0.0
    } else {
        round_one_decimal(total_weight as f64 / node_count as f64)
    };

    let top_categories = if category.is_some() {
        Vec::new()
    } else {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for node in &dataset.nodes {
            *counts.entry(node.category.as_str()).or_insert(0) += 1;
        }
        let mut counts = counts
            .into_iter()
            .map(|(code, count)| (code.to_owned(), count))
            .collect::<Vec<_>>();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts.truncate(TOP_LIMIT);
        counts
    };

    let mut top_nodes = weight_by_node.into_iter().collect::<Vec<_>>();
    top_nodes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_nodes.truncate(TOP_LIMIT);

    Summary {
        category: category.map(str::to_owned),
        node_count,
        total_weight,
        average_weight,
        unique_connections,
        top_categories,
        top_nodes,
        strength_distribution: distribution.into_iter().collect(),
        authors: dataset
            .authors
            .as_ref()
            .map(|authors| authors.summarize(category)),
    }
}

pub fn collaborators(dataset: &Dataset, index: usize) -> Vec<Collaborator> {
    let Some(incident) = dataset.adjacency.get(index) else {
        return Vec::new();
    };

    let mut out = incident
        .iter()
        .filter_map(|&edge_index| dataset.edges.get(edge_index))
        .map(|edge| Collaborator {
            index: if edge.source == index {
                edge.target
            } else {
                edge.source
            },
            weight: edge.weight,
        })
        .collect::<Vec<_>>();
    out.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.index.cmp(&b.index)));
    out
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StatsKey {
    All,
    Category(String),
}

impl StatsKey {
    pub fn for_category(category: Option<&str>) -> Self {
        match category {
            Some(code) if !code.is_empty() => Self::Category(code.to_owned()),
            _ => Self::All,
        }
    }

    fn category(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Category(code) => Some(code.as_str()),
        }
    }
}

/// Memoized summaries for one dataset revision.
#[derive(Debug, Default)]
pub struct StatsCache {
    revision: Option<u64>,
    entries: HashMap<StatsKey, Arc<Summary>>,
}

impl StatsCache {
    pub fn get_or_compute(&mut self, dataset: &Dataset, key: &StatsKey) -> Arc<Summary> {
        if self.revision != Some(dataset.revision) {
            if self.revision.is_some() {
                debug!(
                    old = ?self.revision,
                    new = dataset.revision,
                    "dataset revision changed; dropping cached statistics"
                );
            }
            self.invalidate();
            self.revision = Some(dataset.revision);
        }

        if let Some(summary) = self.entries.get(key) {
            return Arc::clone(summary);
        }

        let summary = Arc::new(summarize(dataset, key.category()));
        self.entries.insert(key.clone(), Arc::clone(&summary));
        summary
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.revision = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::aggregate::fixtures::sample_dataset;
    use crate::collab::author::fixtures::sample_authors;

    #[test]
    fn summary_over_whole_dataset() {
        let dataset = sample_dataset();
        let summary = summarize(&dataset, None);

        assert_eq!(summary.node_count, 3);
        assert_eq!(summary.total_weight, 6);
        assert_eq!(summary.average_weight, 2.0);
        assert_eq!(summary.unique_connections, 2);
        assert_eq!(
            summary.top_categories,
            vec![("US".to_owned(), 2), ("FR".to_owned(), 1)]
        );
        assert_eq!(summary.top_nodes[0], (0, 6));
        assert_eq!(summary.strength_distribution, vec![(1, 1), (5, 1)]);
    }

    #[test]
    fn category_summary_counts_internal_edges_only() {
        let dataset = sample_dataset();
        let summary = summarize(&dataset, Some("US"));

        assert_eq!(summary.node_count, 2);
        assert_eq!(summary.total_weight, 5);
        assert_eq!(summary.average_weight, 2.5);
        assert!(summary.top_categories.is_empty());
        assert_eq!(summary.top_nodes, vec![(0, 5), (1, 5)]);
    }

    #[test]
    fn author_statistics_follow_the_category() {
        assert!(summarize(&sample_dataset(), None).authors.is_none());

        let dataset = sample_dataset().with_authors(Some(sample_authors()));
        let all = summarize(&dataset, None);
        let authors = all.authors.expect("author summary");
        assert_eq!(authors.author_count, 3);
        assert_eq!(authors.year_distribution, vec![(1990, 2), (2001, 1)]);

        let french = summarize(&dataset, Some("FR"));
        let authors = french.authors.expect("author summary");
        assert_eq!(authors.author_count, 1);
        assert_eq!(authors.year_distribution, vec![(2001, 1)]);
        assert_eq!(authors.unique_connections, 0);
    }

    #[test]
    fn collaborators_sorted_by_weight() {
        let dataset = sample_dataset();
        let list = collaborators(&dataset, 0);
        assert_eq!(
            list,
            vec![
                Collaborator { index: 1, weight: 5 },
                Collaborator { index: 2, weight: 1 },
            ]
        );
        assert!(collaborators(&dataset, 99).is_empty());
    }

    #[test]
    fn cache_reuses_entries_until_revision_changes() {
        let dataset = sample_dataset();
        let mut cache = StatsCache::default();

        let first = cache.get_or_compute(&dataset, &StatsKey::All);
        let second = cache.get_or_compute(&dataset, &StatsKey::All);
        assert!(Arc::ptr_eq(&first, &second));

        cache.get_or_compute(&dataset, &StatsKey::for_category(Some("US")));
        assert_eq!(cache.entries.len(), 2);

        let reloaded = sample_dataset().with_revision(dataset.revision + 1);
        let third = cache.get_or_compute(&reloaded, &StatsKey::All);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(cache.entries.len(), 1);

        cache.invalidate();
        assert!(cache.entries.is_empty());
    }

    #[test]
    fn empty_category_key_means_all() {
        assert_eq!(StatsKey::for_category(Some("")), StatsKey::All);
        assert_eq!(StatsKey::for_category(None), StatsKey::All);
    }
}
