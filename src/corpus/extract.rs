use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::model::{Edge, EdgeType, GraphData, Node, NodeType};

use super::document::Document;
use super::markers::MarkerScanner;

const MAX_WEIGHT: f64 = 10.0;
const MIN_WEIGHT: f64 = 1.0;

pub struct GraphExtractor {
    scanner: MarkerScanner,
}

pub struct Extraction {
    pub graph: GraphData,
    pub skipped: usize,
}

struct Builder {
    nodes: IndexMap<String, Node>,
    edge_keys: HashSet<String>,
    edges: Vec<Edge>,
}

impl Builder {
    fn ensure_node(&mut self, id: &str, label: &str, kind: NodeType) {
        if !self.nodes.contains_key(id) {
            self.nodes
                .insert(id.to_string(), Node::new(id, label, kind));
        }
    }

    fn push_edge(&mut self, source: &str, target: &str, kind: EdgeType) {
        if source == target {
            return;
        }
        if self.edge_keys.insert(format!("{source}→{target}")) {
            self.edges.push(Edge::new(source, target, kind));
        }
    }
}

impl GraphExtractor {
    pub fn new(link_prefix: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            scanner: MarkerScanner::new(link_prefix)?,
        })
    }

    pub fn extract(&self, corpus: &[Document]) -> GraphData {
        self.extract_reporting(corpus).graph
    }

    pub fn extract_reporting(&self, corpus: &[Document]) -> Extraction {
        let mut builder = Builder {
            nodes: IndexMap::new(),
            edge_keys: HashSet::new(),
            edges: Vec::new(),
        };
        let mut skipped = 0usize;

        for document in corpus {
            if document.sealed {
                debug!(slug = %document.slug, "sealed document left out of the graph");
                continue;
            }

            let markers = match self.scanner.scan(&document.body) {
                Ok(markers) => markers,
                Err(error) => {
                    warn!(slug = %document.slug, error = %error, "skipping document with malformed markers");
                    skipped += 1;
                    continue;
                }
            };

            let me = document.slug.as_str();
            match builder.nodes.get_mut(me) {
                // A stub created by an earlier forward reference becomes the real document.
                Some(node) => node.label = document.label().to_string(),
                None => builder.ensure_node(me, document.label(), NodeType::Primary),
            }

            for marker in &markers {
                builder.ensure_node(&marker.target, &marker.target, NodeType::Primary);
                builder.push_edge(me, &marker.target, EdgeType::Link);
            }

            for author in &document.authors {
                let author_id = format!("author:{author}");
                builder.ensure_node(&author_id, author, NodeType::Author);
                builder.push_edge(&author_id, me, EdgeType::Author);
            }

            for tag in &document.tags {
                let tag_id = format!("tag:{tag}");
                builder.ensure_node(&tag_id, &format!("#{tag}"), NodeType::Tag);
                builder.push_edge(me, &tag_id, EdgeType::Tag);
            }
        }

        let mut graph = GraphData {
            nodes: builder.nodes.into_values().collect(),
            edges: builder.edges,
        };
        assign_weights(&mut graph);

        info!(
            documents = corpus.len(),
            skipped,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "graph extracted"
        );
        Extraction { graph, skipped }
    }
}

pub fn degrees(graph: &GraphData) -> HashMap<&str, usize> {
    let mut degree = HashMap::with_capacity(graph.nodes.len());
    for edge in &graph.edges {
        *degree.entry(edge.source.as_str()).or_insert(0) += 1;
        *degree.entry(edge.target.as_str()).or_insert(0) += 1;
    }
    degree
}

fn assign_weights(graph: &mut GraphData) {
    let weights = {
        let degree = degrees(graph);
        let max_degree = degree.values().copied().max().unwrap_or(0);
        graph
            .nodes
            .iter()
            .map(|node| {
                let node_degree = degree.get(node.id.as_str()).copied().unwrap_or(0);
                if max_degree == 0 {
                    MIN_WEIGHT
                } else {
                    (node_degree as f64 / max_degree as f64 * MAX_WEIGHT).max(MIN_WEIGHT)
                }
            })
            .collect::<Vec<_>>()
    };

    for (node, weight) in graph.nodes.iter_mut().zip(weights) {
        node.weight = weight;
    }
}
