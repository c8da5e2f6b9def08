mod forces;
mod quadtree;

use eframe::egui::{Vec2, vec2};
use tracing::debug;

use super::filter::GraphSnapshot;
use forces::{
    ChargeParams, Link, accumulate_repulsion_for_node, apply_centering, apply_links,
    collect_collision_pairs, resolve_collisions,
};
use quadtree::QuadNode;

const BARNES_HUT_THETA: f32 = 0.9;
const SEED_SCALE: f32 = 350.0;

/// Tunables for one force layout. The presets mirror the two canvases.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(in crate::app) struct LayoutConfig {
    pub link_distance: f32,
    pub link_strength: f32,
    pub charge_strength: f32,
    pub charge_distance_max: f32,
    pub collide_padding: f32,
    pub collide_iterations: usize,
    pub initial_alpha: f32,
    pub alpha_decay: f32,
    pub alpha_min: f32,
    pub velocity_decay: f32,
    pub drag_alpha_target: f32,
    pub static_threshold: usize,
}

impl LayoutConfig {
    pub fn network() -> Self {
        Self {
            link_distance: 50.0,
            link_strength: 0.2,
            charge_strength: -20.0,
            charge_distance_max: 150.0,
            collide_padding: 1.0,
            collide_iterations: 2,
            initial_alpha: 0.6,
            alpha_decay: 0.03,
            alpha_min: 0.001,
            velocity_decay: 0.4,
            drag_alpha_target: 0.3,
            static_threshold: 4000,
        }
    }

    pub fn compare() -> Self {
        Self {
            link_distance: 60.0,
            link_strength: 0.3,
            charge_strength: -30.0,
            charge_distance_max: 200.0,
            collide_padding: 2.0,
            initial_alpha: 0.7,
            ..Self::network()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(in crate::app) struct SimNode {
    pub pos: Vec2,
    pub velocity: Vec2,
    pub fx: Option<f32>,
    pub fy: Option<f32>,
    pub radius: f32,
    pub seed: Vec2,
}

impl SimNode {
    pub fn at(pos: Vec2, radius: f32) -> Self {
        Self {
            pos,
            velocity: Vec2::ZERO,
            fx: None,
            fy: None,
            radius,
            seed: pos,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::app) enum SimState {
    Running,
    Settled,
    Stopped,
    Static,
}

impl SimState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Settled => "settled",
            Self::Stopped => "stopped",
            Self::Static => "static",
        }
    }
}

#[derive(Default)]
struct Scratch {
    positions: Vec<Vec2>,
    radii: Vec<f32>,
    pairs: Vec<(usize, usize)>,
}

/// Alpha-decaying force layout over one snapshot's nodes. A new snapshot always
/// gets a new simulation; positions are only read by the renderer.
pub(in crate::app) struct Simulation {
    generation: u64,
    nodes: Vec<SimNode>,
    links: Vec<Link>,
    config: LayoutConfig,
    center: Vec2,
    alpha: f32,
    alpha_target: f32,
    state: SimState,
    ticks: u64,
    scratch: Scratch,
}

impl Simulation {
    pub fn new(generation: u64, snapshot: &GraphSnapshot, config: LayoutConfig, center: Vec2) -> Self {
        let nodes = snapshot
            .nodes
            .iter()
            .map(|node| {
                SimNode::at(
                    center + vec2(node.seed.x * SEED_SCALE, -node.seed.y * SEED_SCALE),
                    node.size,
                )
            })
            .collect::<Vec<_>>();

        let mut link_count = vec![0usize; nodes.len()];
        let valid_edges = snapshot
            .edges
            .iter()
            .filter(|edge| {
                edge.source != edge.target
                    && edge.source < nodes.len()
                    && edge.target < nodes.len()
            })
            .collect::<Vec<_>>();
        for edge in &valid_edges {
            link_count[edge.source] += 1;
            link_count[edge.target] += 1;
        }
        let links = valid_edges
            .into_iter()
            .map(|edge| {
                let source = link_count[edge.source] as f32;
                let target = link_count[edge.target] as f32;
                Link {
                    source: edge.source,
                    target: edge.target,
                    bias: source / (source + target),
                }
            })
            .collect::<Vec<_>>();

        let state = if nodes.is_empty() {
            SimState::Settled
        } else if nodes.len() >= config.static_threshold {
            SimState::Static
        } else {
            SimState::Running
        };

        debug!(
            generation,
            nodes = nodes.len(),
            links = links.len(),
            state = state.label(),
            "starting layout"
        );

        Self {
            generation,
            nodes,
            links,
            config,
            center,
            alpha: config.initial_alpha,
            alpha_target: 0.0,
            state,
            ticks: 0,
            scratch: Scratch::default(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_active(&self) -> bool {
        self.state == SimState::Running
    }

    /// Advances one step. Returns whether node positions changed.
    pub fn tick(&mut self) -> bool {
        if self.state != SimState::Running {
            return false;
        }

        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;
        let alpha = self.alpha;

        apply_links(
            &mut self.nodes,
            &self.links,
            self.config.link_distance,
            self.config.link_strength,
            alpha,
        );
        self.apply_charge(alpha);
        apply_centering(&mut self.nodes, self.center);
        for _ in 0..self.config.collide_iterations {
            self.apply_collision();
        }
        self.integrate();

        self.ticks += 1;
        if self.alpha < self.config.alpha_min && self.alpha_target < self.config.alpha_min {
            self.state = SimState::Settled;
            debug!(generation = self.generation, ticks = self.ticks, "layout settled");
        }
        true
    }

    fn load_positions(&mut self, predicted: bool) {
        let scratch = &mut self.scratch;
        scratch.positions.clear();
        scratch.radii.clear();
        for node in &self.nodes {
            let pos = if predicted {
                node.pos + node.velocity
            } else {
                node.pos
            };
            scratch.positions.push(pos);
            scratch.radii.push(node.radius + self.config.collide_padding);
        }
    }

    fn apply_charge(&mut self, alpha: f32) {
        self.load_positions(false);
        let Some(tree) = QuadNode::build(&self.scratch.positions, &[]) else {
            return;
        };

        let params = ChargeParams {
            strength: self.config.charge_strength,
            distance_max_sq: self.config.charge_distance_max * self.config.charge_distance_max,
            theta_sq: BARNES_HUT_THETA * BARNES_HUT_THETA,
        };
        for (index, node) in self.nodes.iter_mut().enumerate() {
            accumulate_repulsion_for_node(
                &tree,
                index,
                &self.scratch.positions,
                params,
                alpha,
                &mut node.velocity,
            );
        }
    }

    fn apply_collision(&mut self) {
        self.load_positions(true);
        let Some(tree) = QuadNode::build(&self.scratch.positions, &self.scratch.radii) else {
            return;
        };

        self.scratch.pairs.clear();
        collect_collision_pairs(&tree, &tree, true, &mut self.scratch.pairs);
        resolve_collisions(&mut self.nodes, &self.scratch.radii, &self.scratch.pairs);
    }

    fn integrate(&mut self) {
        let keep = 1.0 - self.config.velocity_decay;
        for node in &mut self.nodes {
            match node.fx {
                Some(x) => {
                    node.pos.x = x;
                    node.velocity.x = 0.0;
                }
                None => {
                    node.velocity.x *= keep;
                    node.pos.x += node.velocity.x;
                }
            }
            match node.fy {
                Some(y) => {
                    node.pos.y = y;
                    node.velocity.y = 0.0;
                }
                None => {
                    node.velocity.y *= keep;
                    node.pos.y += node.velocity.y;
                }
            }

            if !node.pos.is_finite() || !node.velocity.is_finite() {
                node.pos = node.seed;
                node.velocity = Vec2::ZERO;
            }
        }
    }

    /// Wakes a settled layout at the drag temperature so it drifts to a moved centre.
    /// A running layout keeps its alpha.
    pub fn nudge(&mut self) {
        if self.state != SimState::Settled || self.nodes.is_empty() {
            return;
        }
        self.alpha = self.alpha.max(self.config.drag_alpha_target);
        self.state = SimState::Running;
        debug!(generation = self.generation, ticks = self.ticks, "layout nudged");
    }

    pub fn stop(&mut self) {
        if self.state != SimState::Stopped {
            debug!(generation = self.generation, ticks = self.ticks, "layout stopped");
        }
        self.state = SimState::Stopped;
    }

    pub fn set_center(&mut self, center: Vec2) {
        let shift = center - self.center;
        if shift == Vec2::ZERO {
            return;
        }
        self.center = center;
        if self.state != SimState::Running {
            for node in &mut self.nodes {
                node.pos += shift;
                node.seed += shift;
                if let Some(x) = node.fx.as_mut() {
                    *x += shift.x;
                }
                if let Some(y) = node.fy.as_mut() {
                    *y += shift.y;
                }
            }
        }
    }

    pub fn drag_start(&mut self, index: usize) {
        let Some(node) = self.nodes.get_mut(index) else {
            return;
        };
        node.fx = Some(node.pos.x);
        node.fy = Some(node.pos.y);

        self.alpha_target = self.config.drag_alpha_target;
        if self.state == SimState::Settled {
            self.state = SimState::Running;
        }
    }

    pub fn drag_to(&mut self, index: usize, pos: Vec2) {
        let is_static = self.state == SimState::Static;
        let Some(node) = self.nodes.get_mut(index) else {
            return;
        };
        node.fx = Some(pos.x);
        node.fy = Some(pos.y);
        if is_static || self.state == SimState::Stopped {
            node.pos = pos;
        }
    }

    pub fn drag_end(&mut self, index: usize) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.fx = None;
            node.fy = None;
        }
        self.alpha_target = 0.0;
    }
}
