use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use super::aggregate::{Edge, Node};

/// Country code to display name lookup. Unknown codes render as themselves.
#[derive(Clone, Debug, Default)]
pub struct CountryNames {
    names: HashMap<String, String>,
}

impl CountryNames {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read country names from {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid country names in {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let names: HashMap<String, String> = serde_json::from_str(raw)?;
        Ok(Self { names })
    }

    pub fn name<'a>(&'a self, code: &'a str) -> &'a str {
        self.names.get(code).map(String::as_str).unwrap_or(code)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CountryNode {
    pub code: String,
    pub lat: f64,
    pub lon: f64,
    pub node_count: usize,
    pub strength: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountryEdge {
    pub source: usize,
    pub target: usize,
    pub weight: u64,
}

#[derive(Clone, Debug, Default)]
pub struct CountryGraph {
    pub nodes: Vec<CountryNode>,
    pub edges: Vec<CountryEdge>,
    pub max_weight: u64,
}

#[derive(Default)]
struct CountryAccumulator {
    lat_sum: f64,
    lon_sum: f64,
    node_count: usize,
    strength: u64,
}

pub(super) fn aggregate_countries(nodes: &[Node], edges: &[Edge]) -> CountryGraph {
    let mut by_code: BTreeMap<&str, CountryAccumulator> = BTreeMap::new();
    for node in nodes {
        let entry = by_code.entry(node.category.as_str()).or_default();
        entry.lat_sum += node.lat;
        entry.lon_sum += node.lon;
        entry.node_count += 1;
        entry.strength = entry.strength.saturating_add(node.strength);
    }

    let slot_by_code = by_code
        .keys()
        .enumerate()
        .map(|(slot, code)| (*code, slot))
        .collect::<HashMap<_, _>>();

    let country_nodes = by_code
        .iter()
        .map(|(code, acc)| {
            let count = acc.node_count.max(1) as f64;
            CountryNode {
                code: (*code).to_owned(),
                lat: acc.lat_sum / count,
                lon: acc.lon_sum / count,
                node_count: acc.node_count,
                strength: acc.strength,
            }
        })
        .collect::<Vec<_>>();

    let mut pair_weights: BTreeMap<(usize, usize), u64> = BTreeMap::new();
    for edge in edges {
        let (Some(source), Some(target)) = (nodes.get(edge.source), nodes.get(edge.target)) else {
            continue;
        };
        if source.category == target.category {
            continue;
        }
        let (Some(&a), Some(&b)) = (
            slot_by_code.get(source.category.as_str()),
            slot_by_code.get(target.category.as_str()),
        ) else {
            continue;
        };
        let weight = pair_weights.entry((a.min(b), a.max(b))).or_insert(0);
        *weight = weight.saturating_add(edge.weight);
    }

    let country_edges = pair_weights
        .into_iter()
        .map(|((source, target), weight)| CountryEdge {
            source,
            target,
            weight,
        })
        .collect::<Vec<_>>();
    let max_weight = country_edges.iter().map(|edge| edge.weight).max().unwrap_or(0);

    CountryGraph {
        nodes: country_nodes,
        edges: country_edges,
        max_weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::aggregate::fixtures::{edge, node, sample_graph};

    #[test]
    fn names_fall_back_to_code() {
        let names = CountryNames::parse(r#"{"US": "United States"}"#).expect("names parse");
        assert_eq!(names.name("US"), "United States");
        assert_eq!(names.name("XX"), "XX");
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn only_international_pairs_become_country_edges() {
        let (nodes, edges) = sample_graph();
        let graph = aggregate_countries(&nodes, &edges);

        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].code, "FR");
        assert_eq!(graph.nodes[1].code, "US");
        assert_eq!(graph.nodes[1].node_count, 2);

        assert_eq!(graph.edges, vec![CountryEdge { source: 0, target: 1, weight: 1 }]);
        assert_eq!(graph.max_weight, 1);
    }

    #[test]
    fn centroid_is_mean_of_members() {
        let mut first = node("A", "DE", 1, 1);
        first.lat = 50.0;
        first.lon = 10.0;
        let mut second = node("B", "DE", 1, 1);
        second.lat = 52.0;
        second.lon = 14.0;

        let graph = aggregate_countries(&[first, second], &[edge(0, 1, 1)]);
        assert_eq!(graph.nodes[0].lat, 51.0);
        assert_eq!(graph.nodes[0].lon, 12.0);
        assert!(graph.edges.is_empty());
    }
}
