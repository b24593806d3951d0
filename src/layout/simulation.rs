use std::collections::{HashMap, HashSet};
use std::f32::consts::PI;

use eframe::egui::{Vec2, vec2};
use tracing::{debug, trace};

use crate::model::{Edge, Node};

use super::config::{LayoutConfig, LayoutError};
use super::forces::{
    CollisionParams, Link, accumulate_charge, accumulate_collisions, apply_centering,
    apply_links,
};
use super::quadtree::QuadNode;

const INITIAL_RADIUS: f32 = 10.0;

pub struct Simulation {
    nodes: Vec<Node>,
    index_by_id: HashMap<String, usize>,
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    weights: Vec<f32>,
    pinned: Vec<bool>,
    links: Vec<Link>,
    config: LayoutConfig,
    alpha: f32,
    scratch: Vec<Vec2>,
}

fn phyllotaxis(center: Vec2, index: usize) -> Vec2 {
    let angle = index as f32 * PI * (3.0 - 5.0_f32.sqrt());
    let radius = INITIAL_RADIUS * (0.5 + index as f32).sqrt();
    center + vec2(radius * angle.cos(), radius * angle.sin())
}

fn initial_position(node: &Node, center: Vec2, index: usize) -> Vec2 {
    match node.position() {
        Some(position) if (position.x as f32).is_finite() && (position.y as f32).is_finite() => {
            vec2(position.x as f32, position.y as f32)
        }
        _ => phyllotaxis(center, index),
    }
}

fn initial_velocity(node: &Node) -> Vec2 {
    match (node.vx, node.vy) {
        (Some(vx), Some(vy)) if vx.is_finite() && vy.is_finite() => vec2(vx as f32, vy as f32),
        _ => Vec2::ZERO,
    }
}

fn resolve_links(index_by_id: &HashMap<String, usize>, edges: &[Edge]) -> Vec<Link> {
    let mut seen = HashSet::new();
    let mut pairs = Vec::new();
    for edge in edges {
        let (Some(&source), Some(&target)) = (
            index_by_id.get(edge.source.as_str()),
            index_by_id.get(edge.target.as_str()),
        ) else {
            debug!(source = %edge.source, target = %edge.target, "edge endpoint missing, not simulated");
            continue;
        };
        if source == target {
            continue;
        }
        if seen.insert(edge.undirected_key()) {
            pairs.push((source, target));
        }
    }

    let mut count = vec![0usize; index_by_id.len()];
    for &(source, target) in &pairs {
        count[source] += 1;
        count[target] += 1;
    }

    pairs
        .into_iter()
        .map(|(source, target)| {
            let source_count = count[source] as f32;
            let target_count = count[target] as f32;
            Link {
                source,
                target,
                strength: 1.0 / source_count.min(target_count),
                bias: source_count / (source_count + target_count),
            }
        })
        .collect()
}

impl Simulation {
    pub fn new(nodes: Vec<Node>, edges: &[Edge], config: LayoutConfig) -> Result<Self, LayoutError> {
        config.validate()?;

        let center = config.center();
        let index_by_id = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect::<HashMap<_, _>>();
        let positions = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| initial_position(node, center, index))
            .collect::<Vec<_>>();
        let velocities = nodes.iter().map(initial_velocity).collect::<Vec<_>>();
        let weights = nodes.iter().map(|node| node.weight as f32).collect::<Vec<_>>();
        let links = resolve_links(&index_by_id, edges);

        Ok(Self {
            pinned: vec![false; nodes.len()],
            scratch: vec![Vec2::ZERO; nodes.len()],
            nodes,
            index_by_id,
            positions,
            velocities,
            weights,
            links,
            config,
            alpha: 1.0,
        })
    }

    pub fn pin(&mut self, id: &str) -> bool {
        match self.index_by_id.get(id) {
            Some(&index) => {
                self.pinned[index] = true;
                self.velocities[index] = Vec2::ZERO;
                true
            }
            None => false,
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    pub fn is_settled(&self) -> bool {
        self.alpha < self.config.alpha_min
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    #[cfg(test)]
    pub fn position_of(&self, id: &str) -> Option<Vec2> {
        self.index_by_id.get(id).map(|&index| self.positions[index])
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.nodes
            .iter()
            .zip(self.positions.iter().zip(&self.velocities))
            .map(|(node, (position, velocity))| {
                let mut node = node.clone();
                node.x = Some(f64::from(position.x));
                node.y = Some(f64::from(position.y));
                node.vx = Some(f64::from(velocity.x));
                node.vy = Some(f64::from(velocity.y));
                node
            })
            .collect()
    }

    pub fn tick(&mut self) {
        self.alpha += (0.0 - self.alpha) * self.config.decay_rate();
        if self.nodes.is_empty() {
            return;
        }
        let alpha = self.alpha;
        let config = self.config;

        apply_links(
            &self.links,
            &self.positions,
            &mut self.velocities,
            config.link_distance,
            alpha,
        );

        let charges = self
            .weights
            .iter()
            .map(|&weight| config.charge_for(weight))
            .collect::<Vec<_>>();
        if config.charge_strength != 0.0
            && let Some(tree) = QuadNode::build(&self.positions, &charges)
        {
            for index in 0..self.positions.len() {
                let mut delta = Vec2::ZERO;
                accumulate_charge(&tree, index, &self.positions, &charges, alpha, &mut delta);
                self.velocities[index] += delta;
            }
        }

        apply_centering(
            &self.positions,
            &mut self.velocities,
            config.center(),
            config.center_strength,
            alpha,
        );

        if config.collision_strength > 0.0 && config.collision_multiplier > 0.0 {
            self.collide();
        }

        let retain = 1.0 - config.velocity_decay;
        let mut reverted = 0usize;
        for index in 0..self.positions.len() {
            if self.pinned[index] {
                self.velocities[index] = Vec2::ZERO;
                continue;
            }
            let velocity = self.velocities[index] * retain;
            let next = self.positions[index] + velocity;
            if next.is_finite() && velocity.is_finite() {
                self.velocities[index] = velocity;
                self.positions[index] = next;
            } else {
                self.velocities[index] = Vec2::ZERO;
                reverted += 1;
            }
        }
        if reverted > 0 {
            debug!(reverted, "discarded non-finite steps");
        }
        trace!(alpha, "tick");
    }

    fn collide(&mut self) {
        let radii = self
            .weights
            .iter()
            .map(|&weight| self.config.collision_radius(weight))
            .collect::<Vec<_>>();
        let predicted = self
            .positions
            .iter()
            .zip(&self.velocities)
            .map(|(position, velocity)| *position + *velocity)
            .collect::<Vec<_>>();
        let Some(tree) = QuadNode::build(&predicted, &[]) else {
            return;
        };

        let max_radius = radii.iter().copied().fold(0.0_f32, f32::max);
        let reach = max_radius * 2.0;
        self.scratch.clear();
        self.scratch.resize(predicted.len(), Vec2::ZERO);
        accumulate_collisions(
            &tree,
            &tree,
            true,
            &predicted,
            &radii,
            CollisionParams {
                strength: self.config.collision_strength,
                max_distance_sq: reach * reach,
            },
            &mut self.scratch,
        );
        for (velocity, delta) in self.velocities.iter_mut().zip(&self.scratch) {
            *velocity += *delta;
        }
    }

    pub fn replace_graph(&mut self, nodes: Vec<Node>, edges: &[Edge]) {
        let center = self.config.center();
        let mut positions = Vec::with_capacity(nodes.len());
        let mut velocities = Vec::with_capacity(nodes.len());
        let mut pinned = Vec::with_capacity(nodes.len());

        for (index, node) in nodes.iter().enumerate() {
            match self.index_by_id.get(node.id.as_str()) {
                Some(&previous) => {
                    positions.push(self.positions[previous]);
                    velocities.push(self.velocities[previous]);
                    pinned.push(self.pinned[previous]);
                }
                None => {
                    positions.push(initial_position(node, center, index));
                    velocities.push(initial_velocity(node));
                    pinned.push(false);
                }
            }
        }

        self.index_by_id = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect();
        self.weights = nodes.iter().map(|node| node.weight as f32).collect();
        self.links = resolve_links(&self.index_by_id, edges);
        self.scratch = vec![Vec2::ZERO; nodes.len()];
        self.positions = positions;
        self.velocities = velocities;
        self.pinned = pinned;
        self.nodes = nodes;
        debug!(nodes = self.nodes.len(), links = self.links.len(), "graph replaced");
    }
}
