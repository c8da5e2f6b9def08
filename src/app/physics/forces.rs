use eframe::egui::{Vec2, vec2};

use super::SimNode;
use super::quadtree::QuadNode;

const DISTANCE_MIN_SQ: f32 = 1.0;
const COINCIDENT_EPSILON: f32 = 1e-6;

#[derive(Clone, Copy, Debug)]
pub(super) struct Link {
    pub(super) source: usize,
    pub(super) target: usize,
    pub(super) bias: f32,
}

#[derive(Clone, Copy)]
pub(super) struct ChargeParams {
    pub(super) strength: f32,
    pub(super) distance_max_sq: f32,
    pub(super) theta_sq: f32,
}

/// Small deterministic offset for coincident points, so that identical inputs
/// produce identical layouts.
fn separation(from: usize, to: usize) -> Vec2 {
    let angle = ((from as f32) * 0.618_034 + (to as f32) * 0.414_214) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin()) * COINCIDENT_EPSILON
}

pub(super) fn apply_links(
    nodes: &mut [SimNode],
    links: &[Link],
    distance: f32,
    strength: f32,
    alpha: f32,
) {
    for link in links {
        let source = &nodes[link.source];
        let target = &nodes[link.target];
        let mut delta =
            (target.pos + target.velocity) - (source.pos + source.velocity);
        if delta.length_sq() == 0.0 {
            delta = separation(link.source, link.target);
        }

        let length = delta.length();
        let pull = delta * ((length - distance) / length * alpha * strength);

        nodes[link.target].velocity -= pull * link.bias;
        nodes[link.source].velocity += pull * (1.0 - link.bias);
    }
}

fn charge_between(point: Vec2, other: Vec2, mass: f32, params: ChargeParams, alpha: f32) -> Vec2 {
    let delta = other - point;
    let mut distance_sq = delta.length_sq();
    if distance_sq >= params.distance_max_sq || distance_sq == 0.0 {
        return Vec2::ZERO;
    }
    if distance_sq < DISTANCE_MIN_SQ {
        distance_sq = (DISTANCE_MIN_SQ * distance_sq).sqrt();
    }
    delta * (params.strength * alpha * mass / distance_sq)
}

pub(super) fn accumulate_repulsion_for_node(
    node: &QuadNode,
    index: usize,
    positions: &[Vec2],
    params: ChargeParams,
    alpha: f32,
    velocity: &mut Vec2,
) {
    if node.mass <= 0.0 {
        return;
    }

    let point = positions[index];
    if node.bounds.distance_sq_to_point(point) >= params.distance_max_sq {
        return;
    }

    if node.is_leaf() {
        for &other_index in &node.indices {
            if other_index == index {
                continue;
            }
            let other = positions[other_index];
            if other == point {
                let nudge = separation(index, other_index);
                *velocity -= nudge * (params.strength * alpha / DISTANCE_MIN_SQ);
                continue;
            }
            *velocity += charge_between(point, other, 1.0, params, alpha);
        }
        return;
    }

    let width = node.bounds.side_length();
    let distance_sq = (node.center_of_mass - point).length_sq();
    let can_approximate =
        !node.bounds.contains(point) && (width * width) / params.theta_sq < distance_sq;

    if can_approximate {
        *velocity += charge_between(point, node.center_of_mass, node.mass, params, alpha);
        return;
    }

    for child in node.children.iter().flatten() {
        accumulate_repulsion_for_node(child, index, positions, params, alpha, velocity);
    }
}

/// Collects index pairs `(a, b)` with `a < b` whose cells are close enough for
/// their members to overlap.
pub(super) fn collect_collision_pairs(
    node_a: &QuadNode,
    node_b: &QuadNode,
    same_node: bool,
    pairs: &mut Vec<(usize, usize)>,
) {
    let reach = node_a.max_radius + node_b.max_radius;
    if node_a.bounds.distance_sq_to(node_b.bounds) > reach * reach {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for (offset, &from) in node_a.indices.iter().enumerate() {
                for &to in &node_a.indices[offset + 1..] {
                    pairs.push((from.min(to), from.max(to)));
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    pairs.push((from.min(to), from.max(to)));
                }
            }
        }
        return;
    }

    if same_node {
        for first in 0..4 {
            let Some(child_a) = node_a.children[first].as_ref() else {
                continue;
            };

            collect_collision_pairs(child_a, child_a, true, pairs);

            for second in (first + 1)..4 {
                let Some(child_b) = node_a.children[second].as_ref() else {
                    continue;
                };
                collect_collision_pairs(child_a, child_b, false, pairs);
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children.iter().flatten() {
            collect_collision_pairs(child, node_b, false, pairs);
        }
    } else {
        for child in node_b.children.iter().flatten() {
            collect_collision_pairs(node_a, child, false, pairs);
        }
    }
}

/// Pushes overlapping pairs apart through their velocities, splitting the
/// correction by squared radius so small nodes yield to large ones.
pub(super) fn resolve_collisions(nodes: &mut [SimNode], radii: &[f32], pairs: &[(usize, usize)]) {
    for &(first, second) in pairs {
        let reach = radii[first] + radii[second];
        let a = &nodes[first];
        let b = &nodes[second];
        let mut delta = (a.pos + a.velocity) - (b.pos + b.velocity);
        let mut distance_sq = delta.length_sq();
        if distance_sq >= reach * reach {
            continue;
        }
        if distance_sq == 0.0 {
            delta = separation(first, second);
            distance_sq = delta.length_sq();
        }

        let distance = distance_sq.sqrt();
        let push = delta * ((reach - distance) / distance);
        let first_sq = radii[first] * radii[first];
        let second_sq = radii[second] * radii[second];
        let share = second_sq / (first_sq + second_sq).max(f32::EPSILON);

        nodes[first].velocity += push * share;
        nodes[second].velocity -= push * (1.0 - share);
    }
}

pub(super) fn apply_centering(nodes: &mut [SimNode], center: Vec2) {
    if nodes.is_empty() {
        return;
    }

    let mut centroid = Vec2::ZERO;
    for node in nodes.iter() {
        centroid += node.pos;
    }
    centroid /= nodes.len() as f32;

    let shift = center - centroid;
    if shift.length_sq() > 0.000_001 {
        for node in nodes.iter_mut() {
            node.pos += shift;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim_node(x: f32, y: f32, radius: f32) -> SimNode {
        SimNode::at(vec2(x, y), radius)
    }

    #[test]
    fn link_pulls_distant_pair_together() {
        let mut nodes = vec![sim_node(0.0, 0.0, 2.0), sim_node(200.0, 0.0, 2.0)];
        let links = [Link {
            source: 0,
            target: 1,
            bias: 0.5,
        }];
        apply_links(&mut nodes, &links, 50.0, 0.2, 1.0);

        assert!(nodes[0].velocity.x > 0.0);
        assert!(nodes[1].velocity.x < 0.0);
    }

    #[test]
    fn charge_is_capped_by_distance() {
        let params = ChargeParams {
            strength: -20.0,
            distance_max_sq: 150.0 * 150.0,
            theta_sq: 0.81,
        };
        let near = charge_between(Vec2::ZERO, vec2(10.0, 0.0), 1.0, params, 1.0);
        let far = charge_between(Vec2::ZERO, vec2(400.0, 0.0), 1.0, params, 1.0);

        assert!(near.x < 0.0);
        assert_eq!(far, Vec2::ZERO);
    }

    #[test]
    fn barnes_hut_repels_from_cluster() {
        let mut positions = vec![vec2(0.0, 0.0)];
        for index in 0..40 {
            positions.push(vec2(60.0 + (index % 7) as f32, (index / 7) as f32));
        }
        let tree = QuadNode::build(&positions, &[]).expect("tree builds");
        let params = ChargeParams {
            strength: -20.0,
            distance_max_sq: 150.0 * 150.0,
            theta_sq: 0.81,
        };

        let mut velocity = Vec2::ZERO;
        accumulate_repulsion_for_node(&tree, 0, &positions, params, 1.0, &mut velocity);
        assert!(velocity.x < 0.0);
    }

    #[test]
    fn overlapping_pair_is_found_and_separated() {
        let mut nodes = vec![
            sim_node(0.0, 0.0, 5.0),
            sim_node(3.0, 0.0, 5.0),
            sim_node(500.0, 0.0, 5.0),
        ];
        let positions = nodes.iter().map(|node| node.pos).collect::<Vec<_>>();
        let radii = vec![5.0; 3];
        let tree = QuadNode::build(&positions, &radii).expect("tree builds");

        let mut pairs = Vec::new();
        collect_collision_pairs(&tree, &tree, true, &mut pairs);
        assert!(pairs.contains(&(0, 1)));

        resolve_collisions(&mut nodes, &radii, &pairs);
        assert!(nodes[0].velocity.x < 0.0);
        assert!(nodes[1].velocity.x > 0.0);
        assert_eq!(nodes[2].velocity, Vec2::ZERO);
    }

    #[test]
    fn centering_moves_centroid_onto_center() {
        let mut nodes = vec![sim_node(0.0, 0.0, 1.0), sim_node(10.0, 0.0, 1.0)];
        apply_centering(&mut nodes, vec2(100.0, 50.0));
        let centroid = (nodes[0].pos + nodes[1].pos) / 2.0;
        assert!((centroid - vec2(100.0, 50.0)).length() < 1e-4);
    }
}
