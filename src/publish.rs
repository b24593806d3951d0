use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::{Edge, GraphData, Node};
use crate::stability::{StabilityStats, write_atomically};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub generated_at: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub stability: StabilityStats,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublishedGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub metadata: Metadata,
}

impl PublishedGraph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>, stability: StabilityStats) -> Result<Self> {
        if let Some(node) = nodes.iter().find(|node| node.position().is_none()) {
            bail!("node {} has no coordinates and cannot be published", node.id);
        }

        Ok(Self {
            metadata: Metadata {
                generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                node_count: nodes.len(),
                edge_count: edges.len(),
                stability,
            },
            nodes,
            edges,
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize graph")?;
        write_atomically(path, json.as_bytes())
            .with_context(|| format!("failed to publish graph to {}", path.display()))?;
        info!(
            path = %path.display(),
            nodes = self.metadata.node_count,
            edges = self.metadata.edge_count,
            "graph published"
        );
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoadedGraph {
    #[serde(flatten)]
    pub graph: GraphData,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl LoadedGraph {
    pub fn needs_layout(&self) -> bool {
        self.graph.nodes.iter().any(|node| node.position().is_none())
    }
}

pub fn read_graph_document(path: &Path) -> Result<LoadedGraph> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read graph document {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid graph document {}", path.display()))
}

pub fn fetch_graph_document(primary: &Path, fallback: Option<&Path>) -> Result<LoadedGraph> {
    let error = match read_graph_document(primary) {
        Ok(loaded) => return Ok(loaded),
        Err(error) => error,
    };

    let Some(fallback) = fallback else {
        return Err(error);
    };
    warn!(
        primary = %primary.display(),
        fallback = %fallback.display(),
        error = %format!("{error:#}"),
        "primary graph document unavailable, using fallback"
    );
    read_graph_document(fallback).with_context(|| {
        format!(
            "primary {} failed ({error:#}) and so did the fallback",
            primary.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeType, NodeType, Position};

    fn positioned(id: &str, x: f64, y: f64) -> Node {
        let mut node = Node::new(id, id, NodeType::Primary);
        node.set_position(Position::new(x, y));
        node
    }

    fn sample() -> PublishedGraph {
        PublishedGraph::new(
            vec![positioned("a", 1.0, 2.0), positioned("b", -3.0, 4.5)],
            vec![Edge::new("a", "b", EdgeType::Link)],
            StabilityStats {
                pivots_locked: 1,
                new_nodes: 1,
                avg_movement: 0.0,
            },
        )
        .expect("all positioned")
    }

    #[test]
    fn document_uses_camel_case_metadata() {
        let json = serde_json::to_value(sample()).expect("serializes");
        assert_eq!(json["metadata"]["nodeCount"], 2);
        assert_eq!(json["metadata"]["edgeCount"], 1);
        assert_eq!(json["metadata"]["stability"]["pivotsLocked"], 1);
        assert!(
            chrono::DateTime::parse_from_rfc3339(
                json["metadata"]["generatedAt"].as_str().expect("string")
            )
            .is_ok()
        );
        assert_eq!(json["nodes"][1]["x"], -3.0);
    }

    #[test]
    fn unpositioned_nodes_cannot_be_published() {
        let result = PublishedGraph::new(
            vec![Node::new("a", "a", NodeType::Primary)],
            Vec::new(),
            StabilityStats::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn written_document_reads_back_without_needing_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("graph.json");
        sample().write(&path).expect("writes");

        let loaded = fetch_graph_document(&path, None).expect("reads");
        assert_eq!(loaded.graph.node_count(), 2);
        assert!(!loaded.needs_layout());
        assert_eq!(
            loaded.metadata.map(|metadata| metadata.stability.new_nodes),
            Some(1)
        );
    }

    #[test]
    fn bare_graph_without_coordinates_needs_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("adhoc.json");
        fs::write(
            &path,
            r#"{"nodes":[{"id":"a","label":"A","type":"PRIMARY"}],"edges":[]}"#,
        )
        .expect("write");

        let loaded = read_graph_document(&path).expect("reads");
        assert!(loaded.metadata.is_none());
        assert!(loaded.needs_layout());
    }

    #[test]
    fn exactly_one_fallback_is_tried() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fallback = dir.path().join("static.json");
        sample().write(&fallback).expect("writes");
        let missing = dir.path().join("missing.json");

        let loaded = fetch_graph_document(&missing, Some(&fallback)).expect("falls back");
        assert_eq!(loaded.graph.edge_count(), 1);

        let also_missing = dir.path().join("also-missing.json");
        assert!(fetch_graph_document(&missing, Some(&also_missing)).is_err());
        assert!(fetch_graph_document(&missing, None).is_err());
    }
}
