use thiserror::Error;

use crate::collab::{Edge, Node};

use super::filter::{FilterCriteria, filter_graph_where};

pub(in crate::app) const SLOT_COUNT: usize = 3;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub(in crate::app) enum SlotError {
    #[error("comparison slot {0} does not exist")]
    NoSuchSlot(usize),
    #[error("{0} is already being compared")]
    Duplicate(String),
    #[error("all comparison slots are in use")]
    Full,
}

/// Up to three distinct categories, each bound to a fixed slot colour.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(in crate::app) struct CompareSlots {
    slots: [Option<String>; SLOT_COUNT],
}

impl CompareSlots {
    pub fn get(&self, slot: usize) -> Option<&str> {
        self.slots.get(slot).and_then(|entry| entry.as_deref())
    }

    pub fn slot_of(&self, category: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|entry| entry.as_deref() == Some(category))
    }

    pub fn active(&self) -> impl Iterator<Item = (usize, &str)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_deref().map(|category| (slot, category)))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Returns whether the slot contents changed. An empty category clears the slot.
    pub fn assign(&mut self, slot: usize, category: &str) -> Result<bool, SlotError> {
        if slot >= SLOT_COUNT {
            return Err(SlotError::NoSuchSlot(slot));
        }
        if category.is_empty() {
            return self.clear(slot);
        }

        match self.slot_of(category) {
            Some(existing) if existing == slot => Ok(false),
            Some(_) => Err(SlotError::Duplicate(category.to_owned())),
            None => {
                self.slots[slot] = Some(category.to_owned());
                Ok(true)
            }
        }
    }

    pub fn push(&mut self, category: &str) -> Result<usize, SlotError> {
        if self.slot_of(category).is_some() {
            return Err(SlotError::Duplicate(category.to_owned()));
        }
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(SlotError::Full)?;
        self.slots[slot] = Some(category.to_owned());
        Ok(slot)
    }

    pub fn clear(&mut self, slot: usize) -> Result<bool, SlotError> {
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(SlotError::NoSuchSlot(slot))?;
        Ok(entry.take().is_some())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(in crate::app) struct CategorySummary {
    pub slot: usize,
    pub category: String,
    pub node_count: usize,
    pub total_strength: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(in crate::app) struct Comparison {
    pub summaries: Vec<CategorySummary>,
    pub cross_weight: u64,
}

/// Per-slot totals over the unfiltered dataset plus the weight of every edge
/// joining two different compared categories.
pub(in crate::app) fn compare_stats(nodes: &[Node], edges: &[Edge], slots: &CompareSlots) -> Comparison {
    let mut summaries = slots
        .active()
        .map(|(slot, category)| CategorySummary {
            slot,
            category: category.to_owned(),
            node_count: 0,
            total_strength: 0,
        })
        .collect::<Vec<_>>();

    let slot_by_node = nodes
        .iter()
        .map(|node| slots.slot_of(&node.category))
        .collect::<Vec<_>>();

    for (node, slot) in nodes.iter().zip(&slot_by_node) {
        let Some(slot) = slot else {
            continue;
        };
        if let Some(summary) = summaries.iter_mut().find(|summary| summary.slot == *slot) {
            summary.node_count += 1;
            summary.total_strength = summary.total_strength.saturating_add(node.strength);
        }
    }

    let mut cross_weight = 0u64;
    for edge in edges {
        let source = slot_by_node.get(edge.source).copied().flatten();
        let target = slot_by_node.get(edge.target).copied().flatten();
        if let (Some(source), Some(target)) = (source, target)
            && source != target
        {
            cross_weight = cross_weight.saturating_add(edge.weight);
        }
    }

    Comparison {
        summaries,
        cross_weight,
    }
}

pub(in crate::app) fn compare_graph(
    nodes: &[Node],
    edges: &[Edge],
    slots: &CompareSlots,
    criteria: &FilterCriteria,
) -> (Vec<Node>, Vec<Edge>) {
    filter_graph_where(nodes, edges, criteria, |node| {
        slots.slot_of(&node.category).is_some()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::fixtures::sample_graph;

    fn us_fr() -> CompareSlots {
        let mut slots = CompareSlots::default();
        slots.push("US").expect("first slot");
        slots.push("FR").expect("second slot");
        slots
    }

    #[test]
    fn cross_weight_sums_edges_between_compared_categories() {
        let (nodes, edges) = sample_graph();
        let comparison = compare_stats(&nodes, &edges, &us_fr());

        assert_eq!(comparison.cross_weight, 1);
        assert_eq!(
            comparison.summaries,
            vec![
                CategorySummary {
                    slot: 0,
                    category: "US".to_owned(),
                    node_count: 2,
                    total_strength: 15,
                },
                CategorySummary {
                    slot: 1,
                    category: "FR".to_owned(),
                    node_count: 1,
                    total_strength: 1,
                },
            ]
        );
    }

    #[test]
    fn compare_graph_keeps_only_slotted_categories() {
        let (nodes, edges) = sample_graph();
        let mut slots = CompareSlots::default();
        slots.push("FR").expect("slot");

        let (kept, kept_edges) = compare_graph(&nodes, &edges, &slots, &FilterCriteria::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "C");
        assert!(kept_edges.is_empty());
    }

    #[test]
    fn duplicate_and_overflow_are_rejected() {
        let mut slots = us_fr();
        assert_eq!(slots.push("US"), Err(SlotError::Duplicate("US".to_owned())));
        assert_eq!(slots.assign(2, "FR"), Err(SlotError::Duplicate("FR".to_owned())));
        assert_eq!(slots.assign(5, "DE"), Err(SlotError::NoSuchSlot(5)));

        assert_eq!(slots.push("DE"), Ok(2));
        assert_eq!(slots.push("JP"), Err(SlotError::Full));
    }

    #[test]
    fn reassigning_same_slot_is_a_no_op() {
        let mut slots = us_fr();
        assert_eq!(slots.assign(0, "US"), Ok(false));
        assert_eq!(slots.assign(0, "JP"), Ok(true));
        assert_eq!(slots.get(0), Some("JP"));
        assert_eq!(slots.assign(0, ""), Ok(true));
        assert_eq!(slots.get(0), None);
        assert_eq!(slots.clear(0), Ok(false));
    }

    #[test]
    fn cleared_slot_is_reused_by_push() {
        let mut slots = us_fr();
        slots.clear(0).expect("slot exists");
        assert_eq!(slots.push("DE"), Ok(0));
        assert_eq!(slots.active().collect::<Vec<_>>(), vec![(0, "DE"), (1, "FR")]);
    }
}
