use std::collections::HashMap;

use crate::collab::{Edge, Node};

pub(crate) const DEFAULT_TOP_N: usize = 5000;

/// Cascading node predicates. An empty `category` or `search` is inactive and
/// `top_n: None` leaves the result uncapped.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct FilterCriteria {
    pub min_strength: u64,
    pub min_degree: u32,
    pub category: String,
    pub search: String,
    pub top_n: Option<usize>,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            min_strength: 0,
            min_degree: 0,
            category: String::new(),
            search: String::new(),
            top_n: Some(DEFAULT_TOP_N),
        }
    }
}

pub(crate) fn filter_graph(
    nodes: &[Node],
    edges: &[Edge],
    criteria: &FilterCriteria,
) -> (Vec<Node>, Vec<Edge>) {
    filter_graph_where(nodes, edges, criteria, |_| true)
}

/// Same as [`filter_graph`] with an extra node predicate evaluated after the
/// category check and before the search check.
pub(crate) fn filter_graph_where(
    nodes: &[Node],
    edges: &[Edge],
    criteria: &FilterCriteria,
    keep: impl Fn(&Node) -> bool,
) -> (Vec<Node>, Vec<Edge>) {
    let search_lower = criteria.search.to_lowercase();

    let mut kept = nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| {
            node.strength >= criteria.min_strength
                && node.degree >= criteria.min_degree
                && (criteria.category.is_empty() || node.category == criteria.category)
                && keep(node)
                && (search_lower.is_empty() || node.name.to_lowercase().contains(&search_lower))
        })
        .map(|(index, _)| index)
        .collect::<Vec<_>>();

    kept.sort_by(|&a, &b| nodes[b].strength.cmp(&nodes[a].strength));
    if let Some(limit) = criteria.top_n {
        kept.truncate(limit);
    }

    let mut remap: Vec<Option<usize>> = vec![None; nodes.len()];
    for (new_index, &old_index) in kept.iter().enumerate() {
        remap[old_index] = Some(new_index);
    }

    let filtered_edges = edges
        .iter()
        .filter_map(|edge| {
            let source = remap.get(edge.source).copied().flatten()?;
            let target = remap.get(edge.target).copied().flatten()?;
            Some(Edge {
                source,
                target,
                ..*edge
            })
        })
        .collect::<Vec<_>>();

    let filtered_nodes = kept
        .into_iter()
        .map(|index| nodes[index].clone())
        .collect::<Vec<_>>();

    (filtered_nodes, filtered_edges)
}

/// One filter pass. Nodes, edges and the id index are only ever replaced together.
#[derive(Clone, Debug, Default)]
pub(crate) struct GraphSnapshot {
    pub revision: u64,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub index_by_id: HashMap<String, usize>,
}

impl GraphSnapshot {
    pub fn new(revision: u64, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let index_by_id = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect();
        Self {
            revision,
            nodes,
            edges,
            index_by_id,
        }
    }

    pub fn empty(revision: u64) -> Self {
        Self {
            revision,
            ..Self::default()
        }
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
