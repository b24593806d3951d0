use std::f32::consts::TAU;

use eframe::egui::{Vec2, vec2};

use super::quadtree::QuadNode;

const BARNES_HUT_THETA_SQ: f32 = 0.81;
const DISTANCE_MIN_SQ: f32 = 1.0;
const COINCIDENT_SQ: f32 = 1e-12;

pub(super) fn jiggle(first: usize, second: usize) -> Vec2 {
    let angle = ((first as f32) * 0.618_034 + (second as f32) * 0.414_214) * TAU;
    vec2(angle.cos(), angle.sin()) * 1e-6
}

#[derive(Clone, Copy)]
pub(super) struct Link {
    pub(super) source: usize,
    pub(super) target: usize,
    pub(super) strength: f32,
    pub(super) bias: f32,
}

pub(super) fn apply_links(
    links: &[Link],
    positions: &[Vec2],
    velocities: &mut [Vec2],
    distance: f32,
    alpha: f32,
) {
    for link in links {
        let (source, target) = (link.source, link.target);
        let mut offset =
            (positions[target] + velocities[target]) - (positions[source] + velocities[source]);
        if offset.length_sq() < COINCIDENT_SQ {
            offset = jiggle(source, target);
        }

        let length = offset.length();
        let correction = offset * ((length - distance) / length * alpha * link.strength);
        velocities[target] -= correction * link.bias;
        velocities[source] += correction * (1.0 - link.bias);
    }
}

fn charge_pull(offset: Vec2, charge: f32, alpha: f32, first: usize, second: usize) -> Vec2 {
    let offset = if offset.length_sq() < COINCIDENT_SQ {
        jiggle(first, second)
    } else {
        offset
    };

    let mut distance_sq = offset.length_sq();
    if distance_sq < DISTANCE_MIN_SQ {
        distance_sq = (DISTANCE_MIN_SQ * distance_sq).sqrt();
    }
    offset * (charge * alpha / distance_sq)
}

pub(super) fn accumulate_charge(
    node: &QuadNode,
    index: usize,
    positions: &[Vec2],
    charges: &[f32],
    alpha: f32,
    delta: &mut Vec2,
) {
    let point = positions[index];

    if node.is_leaf() {
        for &other in &node.indices {
            if other == index {
                continue;
            }
            *delta += charge_pull(positions[other] - point, charges[other], alpha, index, other);
        }
        return;
    }

    let offset = node.center - point;
    let width = node.bounds.side_length();
    let far_enough = !node.bounds.contains(point)
        && (width * width / BARNES_HUT_THETA_SQ) < offset.length_sq();

    if far_enough {
        *delta += charge_pull(offset, node.charge, alpha, index, usize::MAX);
        return;
    }

    for child in node.children() {
        accumulate_charge(child, index, positions, charges, alpha, delta);
    }
}

pub(super) fn apply_centering(
    positions: &[Vec2],
    velocities: &mut [Vec2],
    center: Vec2,
    strength: f32,
    alpha: f32,
) {
    for (position, velocity) in positions.iter().zip(velocities.iter_mut()) {
        *velocity += (center - *position) * (strength * alpha);
    }
}

#[derive(Clone, Copy)]
pub(super) struct CollisionParams {
    pub(super) strength: f32,
    pub(super) max_distance_sq: f32,
}

fn collide_pair(
    first: usize,
    second: usize,
    predicted: &[Vec2],
    radii: &[f32],
    strength: f32,
    deltas: &mut [Vec2],
) {
    let reach = radii[first] + radii[second];
    let mut offset = predicted[first] - predicted[second];
    let mut distance_sq = offset.length_sq();
    if distance_sq >= reach * reach {
        return;
    }
    if distance_sq < COINCIDENT_SQ {
        offset = jiggle(first, second);
        distance_sq = offset.length_sq();
    }

    let distance = distance_sq.sqrt();
    let push = offset * ((reach - distance) / distance * strength);
    let first_sq = radii[first] * radii[first];
    let second_sq = radii[second] * radii[second];
    let share = second_sq / (first_sq + second_sq);
    deltas[first] += push * share;
    deltas[second] -= push * (1.0 - share);
}

pub(super) fn accumulate_collisions(
    node_a: &QuadNode,
    node_b: &QuadNode,
    same_node: bool,
    predicted: &[Vec2],
    radii: &[f32],
    params: CollisionParams,
    deltas: &mut [Vec2],
) {
    if node_a.bounds.distance_sq_to(node_b.bounds) > params.max_distance_sq {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for (offset, &first) in node_a.indices.iter().enumerate() {
                for &second in &node_a.indices[offset + 1..] {
                    collide_pair(first, second, predicted, radii, params.strength, deltas);
                }
            }
        } else {
            for &first in &node_a.indices {
                for &second in &node_b.indices {
                    collide_pair(first, second, predicted, radii, params.strength, deltas);
                }
            }
        }
        return;
    }

    if same_node {
        let children = node_a.children().collect::<Vec<_>>();
        for (offset, child_a) in children.iter().enumerate() {
            accumulate_collisions(child_a, child_a, true, predicted, radii, params, deltas);
            for child_b in &children[offset + 1..] {
                accumulate_collisions(child_a, child_b, false, predicted, radii, params, deltas);
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
        for child in node_a.children() {
            accumulate_collisions(child, node_b, false, predicted, radii, params, deltas);
        }
    } else {
        for child in node_b.children() {
            accumulate_collisions(node_a, child, false, predicted, radii, params, deltas);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stretched_link_pulls_both_ends_together() {
        let positions = vec![vec2(0.0, 0.0), vec2(200.0, 0.0)];
        let mut velocities = vec![Vec2::ZERO; 2];
        let links = [Link {
            source: 0,
            target: 1,
            strength: 1.0,
            bias: 0.5,
        }];

        apply_links(&links, &positions, &mut velocities, 60.0, 1.0);

        assert!(velocities[0].x > 0.0);
        assert!(velocities[1].x < 0.0);
    }

    #[test]
    fn negative_charge_pushes_bodies_apart() {
        let positions = vec![vec2(0.0, 0.0), vec2(10.0, 0.0)];
        let charges = vec![-150.0, -150.0];
        let tree = QuadNode::build(&positions, &charges).expect("finite");

        let mut delta = Vec2::ZERO;
        accumulate_charge(&tree, 0, &positions, &charges, 1.0, &mut delta);
        assert!(delta.x < 0.0);
    }

    #[test]
    fn coincident_bodies_get_a_finite_push() {
        let positions = vec![vec2(5.0, 5.0), vec2(5.0, 5.0)];
        let charges = vec![-150.0, -150.0];
        let tree = QuadNode::build(&positions, &charges).expect("finite");

        let mut delta = Vec2::ZERO;
        accumulate_charge(&tree, 0, &positions, &charges, 1.0, &mut delta);
        assert!(delta.is_finite());
        assert!(delta.length() > 0.0);
    }

    #[test]
    fn overlapping_circles_separate_and_distant_ones_do_not() {
        let predicted = vec![vec2(0.0, 0.0), vec2(4.0, 0.0), vec2(500.0, 0.0)];
        let radii = vec![5.0, 5.0, 5.0];
        let tree = QuadNode::build(&predicted, &[0.0; 3]).expect("finite");
        let mut deltas = vec![Vec2::ZERO; 3];

        accumulate_collisions(
            &tree,
            &tree,
            true,
            &predicted,
            &radii,
            CollisionParams {
                strength: 1.0,
                max_distance_sq: 100.0,
            },
            &mut deltas,
        );

        assert!(deltas[0].x < 0.0);
        assert!(deltas[1].x > 0.0);
        assert_eq!(deltas[2], Vec2::ZERO);
    }
}
