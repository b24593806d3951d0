mod pivots;
mod seed;
mod store;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::Node;

pub use pivots::PivotSet;
pub use seed::seeded_position;
pub use store::{PositionStore, write_atomically};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilityStats {
    pub pivots_locked: usize,
    pub new_nodes: usize,
    pub avg_movement: f64,
}

#[derive(Clone, Debug)]
pub struct Stabilized {
    pub nodes: Vec<Node>,
    pub store: PositionStore,
    pub stats: StabilityStats,
}

pub fn stabilize(fresh: &[Node], store: &PositionStore, pivots: &PivotSet) -> Stabilized {
    let mut updated = store.clone();
    let mut stats = StabilityStats::default();
    let mut total_movement = 0.0;
    let mut carried = 0usize;

    let nodes = fresh
        .iter()
        .map(|node| {
            let mut node = node.clone();
            let stored = store.get(&node.id);

            let position = match stored {
                Some(stored) if pivots.contains(&node.id) => {
                    stats.pivots_locked += 1;
                    stored
                }
                Some(stored) => {
                    let assigned = stored;
                    total_movement += assigned.distance(stored);
                    carried += 1;
                    assigned
                }
                None => {
                    stats.new_nodes += 1;
                    seeded_position(&node.id)
                }
            };

            node.set_position(position);
            node.vx = None;
            node.vy = None;
            updated.insert(node.id.clone(), position);
            node
        })
        .collect::<Vec<_>>();

    stats.avg_movement = total_movement / carried.max(1) as f64;

    info!(
        nodes = nodes.len(),
        pivots_locked = stats.pivots_locked,
        new_nodes = stats.new_nodes,
        avg_movement = stats.avg_movement,
        "positions stabilized"
    );

    Stabilized {
        nodes,
        store: updated,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeType, Position};

    fn nodes(ids: &[&str]) -> Vec<Node> {
        ids.iter()
            .map(|id| Node::new(*id, *id, NodeType::Primary))
            .collect()
    }

    #[test]
    fn single_new_node_on_empty_store() {
        let result = stabilize(&nodes(&["x"]), &PositionStore::default(), &PivotSet::default());

        assert_eq!(
            result.stats,
            StabilityStats {
                pivots_locked: 0,
                new_nodes: 1,
                avg_movement: 0.0,
            }
        );
        let position = result.nodes[0].position().expect("positioned");
        assert_eq!(position, seeded_position("x"));
        assert_eq!(result.store.get("x"), Some(position));
    }

    #[test]
    fn rerun_on_unchanged_inputs_does_not_move_anything() {
        let fresh = nodes(&["a", "b", "c"]);
        let pivots = ["b".to_string()].into_iter().collect::<PivotSet>();

        let first = stabilize(&fresh, &PositionStore::default(), &pivots);
        let second = stabilize(&fresh, &first.store, &pivots);

        assert_eq!(second.stats.new_nodes, 0);
        assert_eq!(second.stats.avg_movement, 0.0);
        assert_eq!(second.stats.pivots_locked, 1);
        assert_eq!(first.nodes, second.nodes);
        assert_eq!(first.store, second.store);
    }

    #[test]
    fn pivots_hold_their_stored_position_whatever_the_corpus_does() {
        let mut store = PositionStore::default();
        store.insert("landmark", Position::new(42.0, -7.5));
        let pivots = ["landmark".to_string()].into_iter().collect::<PivotSet>();

        for corpus in [
            nodes(&["landmark"]),
            nodes(&["new-1", "landmark", "new-2"]),
            nodes(&["z", "y", "x", "landmark"]),
        ] {
            let result = stabilize(&corpus, &store, &pivots);
            let landmark = result
                .nodes
                .iter()
                .find(|node| node.id == "landmark")
                .expect("present");
            assert_eq!(landmark.position(), Some(Position::new(42.0, -7.5)));
            assert_eq!(result.store.get("landmark"), Some(Position::new(42.0, -7.5)));
            assert_eq!(result.stats.pivots_locked, 1);
        }
    }

    #[test]
    fn pivot_without_stored_position_is_seeded_then_locked() {
        let pivots = ["p".to_string()].into_iter().collect::<PivotSet>();
        let first = stabilize(&nodes(&["p"]), &PositionStore::default(), &pivots);
        assert_eq!(first.stats.new_nodes, 1);
        assert_eq!(first.stats.pivots_locked, 0);

        let second = stabilize(&nodes(&["p"]), &first.store, &pivots);
        assert_eq!(second.stats.pivots_locked, 1);
        assert_eq!(second.nodes[0].position(), first.nodes[0].position());
    }

    #[test]
    fn store_never_shrinks_during_stabilization() {
        let mut store = PositionStore::default();
        store.insert("deleted", Position::new(1.0, 1.0));

        let result = stabilize(&nodes(&["kept"]), &store, &PivotSet::default());
        assert_eq!(result.store.get("deleted"), Some(Position::new(1.0, 1.0)));
        assert!(result.store.get("kept").is_some());
    }

    #[test]
    fn caller_nodes_are_not_mutated() {
        let fresh = nodes(&["a"]);
        let _ = stabilize(&fresh, &PositionStore::default(), &PivotSet::default());
        assert_eq!(fresh[0].x, None);
    }
}
