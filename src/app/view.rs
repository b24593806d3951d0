use std::collections::{HashMap, HashSet};

use eframe::egui::{Vec2, vec2};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use tracing::debug;

use crate::model::{Edge, Node};

use super::camera::{Camera, SEARCH_ZOOM};

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct RenderConfig {
    pub(crate) base_node_radius: f32,
    pub(crate) label_zoom_threshold: f32,
    pub(crate) always_label_weight: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            base_node_radius: 10.0,
            label_zoom_threshold: 0.8,
            always_label_weight: 5.0,
        }
    }
}

pub(crate) struct GraphView {
    nodes: Vec<Node>,
    positions: Vec<Vec2>,
    edge_ends: Vec<Option<(usize, usize)>>,
    pub(crate) camera: Camera,
    pub(crate) render: RenderConfig,
    hovered: Option<usize>,
    highlighted: HashSet<usize>,
}

fn fuzzy_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_lowercase(), &query.to_lowercase()))
}

pub(crate) fn bounds_center(positions: &[Vec2]) -> Vec2 {
    let mut iter = positions.iter().copied();
    let Some(first) = iter.next() else {
        return Vec2::ZERO;
    };
    let (min, max) = iter.fold((first, first), |(min, max), point| {
        (min.min(point), max.max(point))
    });
    (min + max) * 0.5
}

impl GraphView {
    pub(crate) fn new(nodes: Vec<Node>, edges: &[Edge], positions: Vec<Vec2>, anchor: Vec2) -> Self {
        let edge_ends = {
            let index_by_id = nodes
                .iter()
                .enumerate()
                .map(|(index, node)| (node.id.as_str(), index))
                .collect::<HashMap<_, _>>();

            edges
                .iter()
                .map(|edge| {
                    let ends = index_by_id
                        .get(edge.source.as_str())
                        .zip(index_by_id.get(edge.target.as_str()))
                        .map(|(&source, &target)| (source, target));
                    if ends.is_none() {
                        debug!(source = %edge.source, target = %edge.target, "edge has a missing endpoint");
                    }
                    ends
                })
                .collect()
        };

        Self {
            nodes,
            positions,
            edge_ends,
            camera: Camera::new(anchor),
            render: RenderConfig::default(),
            hovered: None,
            highlighted: HashSet::new(),
        }
    }

    pub(crate) fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub(crate) fn position(&self, index: usize) -> Option<Vec2> {
        self.positions.get(index).copied()
    }

    pub(crate) fn edge_ends(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.edge_ends.iter().flatten().copied()
    }

    pub(crate) fn edge_count(&self) -> usize {
        self.edge_ends.len()
    }

    pub(crate) fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub(crate) fn is_highlighted(&self, index: usize) -> bool {
        self.highlighted.contains(&index)
    }

    pub(crate) fn node_radius(&self, index: usize) -> f32 {
        let weight = self.nodes.get(index).map_or(0.0, |node| node.weight as f32);
        self.render.base_node_radius + weight
    }

    pub(crate) fn set_positions(&mut self, positions: &[Vec2]) {
        if positions.len() == self.positions.len() {
            self.positions.copy_from_slice(positions);
        }
    }

    /// Topmost node whose generous hit circle, twice the node radius, contains `point`.
    pub(crate) fn find_node_at(&self, point: Vec2) -> Option<usize> {
        (0..self.nodes.len()).rev().find(|&index| {
            let reach = self.node_radius(index) * 2.0;
            (self.positions[index] - point).length_sq() <= reach * reach
        })
    }

    pub(crate) fn neighbor_set(&self, index: usize) -> HashSet<usize> {
        let mut neighbors = HashSet::from([index]);
        for (source, target) in self.edge_ends() {
            if source == index {
                neighbors.insert(target);
            } else if target == index {
                neighbors.insert(source);
            }
        }
        neighbors
    }

    pub(crate) fn set_hovered(&mut self, hovered: Option<usize>) {
        if hovered == self.hovered {
            return;
        }
        self.hovered = hovered.filter(|&index| index < self.nodes.len());
        self.highlighted = match self.hovered {
            Some(index) => self.neighbor_set(index),
            None => HashSet::new(),
        };
    }

    pub(crate) fn search(&mut self, query: &str) -> Option<usize> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }

        let found = self
            .nodes
            .iter()
            .position(|node| node.label.to_lowercase().contains(&query))?;
        self.focus(found);
        Some(found)
    }

    pub(crate) fn focus(&mut self, index: usize) {
        let Some(position) = self.position(index) else {
            return;
        };
        self.camera.center_on(position, SEARCH_ZOOM);
        self.set_hovered(Some(index));
    }

    pub(crate) fn suggestions(&self, query: &str, limit: usize) -> Vec<usize> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let matcher = SkimMatcherV2::default();
        let mut scored = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| {
                fuzzy_score(&matcher, &node.label, query).map(|score| (index, score))
            })
            .collect::<Vec<_>>();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(limit);
        scored.into_iter().map(|(index, _)| index).collect()
    }

    pub(crate) fn should_label(&self, index: usize) -> bool {
        let weight = self.nodes.get(index).map_or(0.0, |node| node.weight as f32);
        self.camera.zoom > self.render.label_zoom_threshold
            || self.hovered == Some(index)
            || weight > self.render.always_label_weight
    }
}

pub(crate) fn node_positions(nodes: &[Node]) -> Vec<Vec2> {
    nodes
        .iter()
        .map(|node| {
            node.position()
                .map_or(Vec2::ZERO, |position| vec2(position.x as f32, position.y as f32))
        })
        .collect()
}
