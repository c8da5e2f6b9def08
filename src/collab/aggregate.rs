use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

use eframe::egui::{Vec2, vec2};

use crate::util::stable_pair;

use super::author::AuthorDirectory;
use super::country::{CountryGraph, CountryNames, aggregate_countries};
use super::record::{CollabRecord, Endpoint, UNKNOWN};

const SEED_NOISE: f32 = 0.02;
const MIN_NODE_SIZE: f32 = 2.0;
const NODE_SIZE_RANGE: f32 = 15.0;

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub category: String,
    pub lat: f64,
    pub lon: f64,
    pub seed: Vec2,
    pub strength: u64,
    pub degree: u32,
    pub size: f32,
    pub category_rank: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub weight: u64,
    pub authors: u64,
}

#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub revision: u64,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub index_by_id: HashMap<String, usize>,
    pub adjacency: Vec<Vec<usize>>,
    pub categories: Vec<String>,
    pub countries: CountryGraph,
    pub names: CountryNames,
    pub max_strength: u64,
    pub max_degree: u32,
    pub authors: Option<AuthorDirectory>,
}

impl Dataset {
    pub fn from_records(records: &[CollabRecord], names: CountryNames) -> Self {
        let (nodes, edges) = aggregate(records);
        Self::from_parts(nodes, edges, names)
    }

    pub fn from_parts(mut nodes: Vec<Node>, edges: Vec<Edge>, names: CountryNames) -> Self {
        let categories = nodes
            .iter()
            .map(|node| node.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        let rank_by_category = categories
            .iter()
            .enumerate()
            .map(|(rank, category)| (category.as_str(), rank))
            .collect::<HashMap<_, _>>();
        for node in &mut nodes {
            node.category_rank = rank_by_category
                .get(node.category.as_str())
                .copied()
                .unwrap_or(0);
        }

        let index_by_id = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect::<HashMap<_, _>>();

        let mut adjacency = vec![Vec::new(); nodes.len()];
        for (edge_index, edge) in edges.iter().enumerate() {
            if edge.source < nodes.len() && edge.target < nodes.len() {
                adjacency[edge.source].push(edge_index);
                adjacency[edge.target].push(edge_index);
            }
        }

        let countries = aggregate_countries(&nodes, &edges);
        let max_strength = nodes.iter().map(|node| node.strength).max().unwrap_or(0);
        let max_degree = nodes.iter().map(|node| node.degree).max().unwrap_or(0);

        Self {
            revision: 0,
            nodes,
            edges,
            index_by_id,
            adjacency,
            categories,
            countries,
            names,
            max_strength,
            max_degree,
            authors: None,
        }
    }

    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    pub fn with_authors(mut self, authors: Option<AuthorDirectory>) -> Self {
        self.authors = authors;
        self
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.index_by_id.get(id).map(|&index| &self.nodes[index])
    }

    pub fn category_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.names.name(code)
    }
}

fn intern(
    slots: &mut HashMap<String, usize>,
    nodes: &mut Vec<Node>,
    endpoint: &Endpoint,
) -> usize {
    if let Some(&slot) = slots.get(&endpoint.id) {
        return slot;
    }

    let category = if endpoint.category.trim().is_empty() {
        UNKNOWN.to_owned()
    } else {
        endpoint.category.clone()
    };

    let slot = nodes.len();
    slots.insert(endpoint.id.clone(), slot);
    nodes.push(Node {
        id: endpoint.id.clone(),
        name: endpoint.name.clone(),
        category,
        lat: endpoint.lat,
        lon: endpoint.lon,
        seed: Vec2::ZERO,
        strength: 0,
        degree: 0,
        size: MIN_NODE_SIZE,
        category_rank: 0,
    });
    slot
}

/// Collapses raw rows into unique nodes and unordered-pair edges, then derives
/// degree, strength, geographic seeds and render sizes in linear passes.
pub fn aggregate(records: &[CollabRecord]) -> (Vec<Node>, Vec<Edge>) {
    let mut slots = HashMap::with_capacity(records.len());
    let mut nodes = Vec::new();
    let mut pair_slots: HashMap<(usize, usize), usize> = HashMap::with_capacity(records.len());
    let mut edges: Vec<Edge> = Vec::new();

    for record in records {
        let first = intern(&mut slots, &mut nodes, &record.first);
        let second = intern(&mut slots, &mut nodes, &record.second);
        if first == second {
            continue;
        }

        let key = (first.min(second), first.max(second));
        match pair_slots.entry(key) {
            Entry::Occupied(entry) => {
                let edge = &mut edges[*entry.get()];
                edge.weight = edge.weight.saturating_add(record.count);
                edge.authors = edge.authors.saturating_add(record.authors);
            }
            Entry::Vacant(entry) => {
                entry.insert(edges.len());
                edges.push(Edge {
                    source: first,
                    target: second,
                    weight: record.count,
                    authors: record.authors,
                });
            }
        }
    }

    for edge in &edges {
        for endpoint in [edge.source, edge.target] {
            let node = &mut nodes[endpoint];
            node.strength = node.strength.saturating_add(edge.weight);
            node.degree = node.degree.saturating_add(1);
        }
    }

    assign_seeds(&mut nodes);
    assign_sizes(&mut nodes);

    (nodes, edges)
}

fn assign_seeds(nodes: &mut [Node]) {
    if nodes.is_empty() {
        return;
    }

    let (mut lat_min, mut lat_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut lon_min, mut lon_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for node in nodes.iter() {
        lat_min = lat_min.min(node.lat);
        lat_max = lat_max.max(node.lat);
        lon_min = lon_min.min(node.lon);
        lon_max = lon_max.max(node.lon);
    }

    let lat_range = (lat_max - lat_min).max(1.0);
    let lon_range = (lon_max - lon_min).max(1.0);

    for node in nodes.iter_mut() {
        let (jx, jy) = stable_pair(&node.id);
        let x = ((node.lon - lon_min) / lon_range * 2.0 - 1.0) as f32;
        let y = ((node.lat - lat_min) / lat_range * 2.0 - 1.0) as f32;
        node.seed = vec2(x + jx * SEED_NOISE, y + jy * SEED_NOISE);
    }
}

fn assign_sizes(nodes: &mut [Node]) {
    let max_strength = nodes.iter().map(|node| node.strength).max().unwrap_or(0).max(1);
    for node in nodes.iter_mut() {
        node.size = MIN_NODE_SIZE + NODE_SIZE_RANGE * (node.strength as f32 / max_strength as f32);
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn endpoint(id: &str, category: &str) -> Endpoint {
        Endpoint {
            id: id.to_owned(),
            name: format!("Institute {id}"),
            category: category.to_owned(),
            lat: 0.0,
            lon: 0.0,
        }
    }

    pub(crate) fn record(a: (&str, &str), b: (&str, &str), count: u64) -> CollabRecord {
        CollabRecord {
            first: endpoint(a.0, a.1),
            second: endpoint(b.0, b.1),
            count,
            authors: 1,
        }
    }

    pub(crate) fn node(id: &str, category: &str, strength: u64, degree: u32) -> Node {
        Node {
            id: id.to_owned(),
            name: format!("Institute {id}"),
            category: category.to_owned(),
            lat: 0.0,
            lon: 0.0,
            seed: Vec2::ZERO,
            strength,
            degree,
            size: 2.0 + strength as f32,
            category_rank: 0,
        }
    }

    pub(crate) fn edge(source: usize, target: usize, weight: u64) -> Edge {
        Edge {
            source,
            target,
            weight,
            authors: 0,
        }
    }

    /// A(US, 10, 2), B(US, 5, 1), C(FR, 1, 1) with edges A-B (5) and A-C (1).
    pub(crate) fn sample_graph() -> (Vec<Node>, Vec<Edge>) {
        (
            vec![
                node("A", "US", 10, 2),
                node("B", "US", 5, 1),
                node("C", "FR", 1, 1),
            ],
            vec![edge(0, 1, 5), edge(0, 2, 1)],
        )
    }

    pub(crate) fn sample_dataset() -> Dataset {
        let (nodes, edges) = sample_graph();
        Dataset::from_parts(nodes, edges, CountryNames::default())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::fixtures::*;
    use super::*;

    #[test]
    fn repeated_pairs_are_summed_regardless_of_order() {
        let records = vec![
            record(("A", "US"), ("B", "US"), 3),
            record(("B", "US"), ("A", "US"), 2),
            record(("A", "US"), ("C", "FR"), 1),
        ];

        let (nodes, edges) = aggregate(&records);
        assert_eq!(nodes.len(), 3);
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].weight, 5);
        assert_eq!(edges[0].authors, 2);

        assert_eq!(nodes[0].strength, 6);
        assert_eq!(nodes[0].degree, 2);
        assert_eq!(nodes[1].strength, 5);
        assert_eq!(nodes[1].degree, 1);
        assert_eq!(nodes[2].strength, 1);
    }

    #[test]
    fn self_pair_still_yields_a_node() {
        let records = vec![record(("S", ""), ("S", ""), 9)];
        let (nodes, edges) = aggregate(&records);

        assert_eq!(nodes.len(), 1);
        assert!(edges.is_empty());
        assert_eq!(nodes[0].category, UNKNOWN);
        assert_eq!(nodes[0].degree, 0);
        assert_eq!(nodes[0].strength, 0);
    }

    #[test]
    fn sizes_scale_against_the_strongest_node() {
        let records = vec![
            record(("A", "US"), ("B", "US"), 10),
            record(("A", "US"), ("C", "FR"), 10),
        ];
        let (nodes, _) = aggregate(&records);

        assert!((nodes[0].size - 17.0).abs() < 1e-5);
        assert!((nodes[1].size - 9.5).abs() < 1e-5);
    }

    #[test]
    fn seeds_are_normalised_geography() {
        let mut west = record(("W", "US"), ("E", "CN"), 1);
        west.first.lat = -10.0;
        west.first.lon = -100.0;
        west.second.lat = 50.0;
        west.second.lon = 120.0;

        let (nodes, _) = aggregate(&[west]);
        assert!((nodes[0].seed.x + 1.0).abs() <= SEED_NOISE + 1e-6);
        assert!((nodes[0].seed.y + 1.0).abs() <= SEED_NOISE + 1e-6);
        assert!((nodes[1].seed.x - 1.0).abs() <= SEED_NOISE + 1e-6);
        assert!((nodes[1].seed.y - 1.0).abs() <= SEED_NOISE + 1e-6);
    }

    #[test]
    fn dataset_ranks_categories_alphabetically() {
        let dataset = sample_dataset();
        assert_eq!(dataset.categories, vec!["FR".to_owned(), "US".to_owned()]);
        assert_eq!(dataset.nodes[0].category_rank, 1);
        assert_eq!(dataset.nodes[2].category_rank, 0);
        assert_eq!(dataset.max_strength, 10);
        assert_eq!(dataset.adjacency[0], vec![0, 1]);
        assert_eq!(dataset.node_by_id("C").map(|node| node.strength), Some(1));
    }

    proptest! {
        #[test]
        fn degree_counts_distinct_neighbours(
            pairs in proptest::collection::vec((0u8..12, 0u8..12, 0u64..20), 0..80)
        ) {
            let records = pairs
                .iter()
                .map(|(a, b, count)| {
                    record((&format!("n{a}"), "US"), (&format!("n{b}"), "FR"), *count)
                })
                .collect::<Vec<_>>();

            let (nodes, edges) = aggregate(&records);

            for (index, node) in nodes.iter().enumerate() {
                let neighbours = edges
                    .iter()
                    .filter_map(|edge| {
                        if edge.source == index {
                            Some(edge.target)
                        } else if edge.target == index {
                            Some(edge.source)
                        } else {
                            None
                        }
                    })
                    .collect::<HashSet<_>>();
                prop_assert_eq!(node.degree as usize, neighbours.len());

                let strength = edges
                    .iter()
                    .filter(|edge| edge.source == index || edge.target == index)
                    .map(|edge| edge.weight)
                    .sum::<u64>();
                prop_assert_eq!(node.strength, strength);
            }
        }
    }
}
