mod config;
mod forces;
mod live;
mod quadtree;
mod simulation;

use std::collections::HashSet;

use tracing::info;

use crate::model::{Edge, Node};

pub use config::{LayoutConfig, LayoutError};
pub use live::{FrameLoop, LiveSimulation, create_live_simulation};
pub use simulation::Simulation;

pub fn settle(
    nodes: &[Node],
    edges: &[Edge],
    config: &LayoutConfig,
    iterations: usize,
) -> Result<Vec<Node>, LayoutError> {
    settle_pinned(nodes, edges, config, iterations, &HashSet::new())
}

pub fn settle_pinned(
    nodes: &[Node],
    edges: &[Edge],
    config: &LayoutConfig,
    iterations: usize,
    pinned: &HashSet<String>,
) -> Result<Vec<Node>, LayoutError> {
    let mut simulation = Simulation::new(nodes.to_vec(), edges, *config)?;
    let mut held = 0usize;
    for node in nodes {
        if pinned.contains(&node.id) && node.position().is_some() && simulation.pin(&node.id) {
            held += 1;
        }
    }

    for _ in 0..iterations {
        simulation.tick();
    }

    info!(
        nodes = nodes.len(),
        pinned = held,
        iterations,
        alpha = simulation.alpha(),
        "layout settled"
    );
    // Held nodes come back with their exact incoming coordinates, not an f32 round trip.
    let mut settled = simulation.nodes();
    for (node, original) in settled.iter_mut().zip(nodes) {
        if pinned.contains(&node.id)
            && let Some(position) = original.position()
        {
            node.set_position(position);
        }
    }
    Ok(settled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeType, NodeType, Position};

    fn graph() -> (Vec<Node>, Vec<Edge>) {
        let nodes = ["a", "b", "c", "d"]
            .into_iter()
            .map(|id| Node::new(id, id, NodeType::Primary))
            .collect::<Vec<_>>();
        let edges = vec![Edge::new("a", "b", EdgeType::Link)];
        (nodes, edges)
    }

    fn distance(nodes: &[Node], first: &str, second: &str) -> f64 {
        let find = |id: &str| {
            nodes
                .iter()
                .find(|node| node.id == id)
                .and_then(Node::position)
                .expect("positioned")
        };
        find(first).distance(find(second))
    }

    #[test]
    fn settle_leaves_its_input_alone() {
        let (nodes, edges) = graph();
        let before = nodes.clone();
        let settled = settle(&nodes, &edges, &LayoutConfig::default(), 50).expect("valid");

        assert_eq!(nodes, before);
        assert_eq!(settled.len(), nodes.len());
        assert!(settled.iter().all(|node| node.position().is_some()));
    }

    #[test]
    fn linked_nodes_end_up_closer_than_unlinked_ones() {
        let (nodes, edges) = graph();
        let settled = settle(&nodes, &edges, &LayoutConfig::default(), 300).expect("valid");

        assert!(distance(&settled, "a", "b") < distance(&settled, "c", "d"));
    }

    #[test]
    fn pinned_nodes_keep_their_coordinates() {
        let (mut nodes, edges) = graph();
        nodes[0].set_position(Position::new(-250.123_456_789, 125.0));
        let pinned = ["a".to_string()].into_iter().collect::<HashSet<_>>();

        let settled = settle_pinned(
            &nodes,
            &edges,
            &LayoutConfig::default().centered_on_origin(),
            200,
            &pinned,
        )
        .expect("valid");

        assert_eq!(
            settled[0].position(),
            Some(Position::new(-250.123_456_789, 125.0))
        );
        assert_ne!(settled[1].position(), nodes[1].position());
    }

    #[test]
    fn empty_graph_settles_to_nothing() {
        let settled = settle(&[], &[], &LayoutConfig::default(), 10).expect("valid");
        assert!(settled.is_empty());
    }
}
