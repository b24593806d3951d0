use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    Primary,
    Tag,
    Author,
}

impl NodeType {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Primary => "PRIMARY",
            Self::Tag => "TAG",
            Self::Author => "AUTHOR",
        }
    }

    pub fn from_tag(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PRIMARY" | "BILLET" => Some(Self::Primary),
            "TAG" => Some(Self::Tag),
            "AUTHOR" => Some(Self::Author),
            _ => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Serialize for NodeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for NodeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&raw).unwrap_or_else(|| {
            warn!(tag = %raw, "unrecognized node type, treating as PRIMARY");
            Self::Primary
        }))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeType {
    Link,
    Tag,
    Author,
}

impl EdgeType {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Link => "LINK",
            Self::Tag => "TAG",
            Self::Author => "AUTHOR",
        }
    }

    pub fn from_tag(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LINK" | "REFERENCES" | "BACKLINK" => Some(Self::Link),
            "TAG" | "TAGGED" => Some(Self::Tag),
            "AUTHOR" | "WROTE" => Some(Self::Author),
            _ => None,
        }
    }
}

impl Serialize for EdgeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for EdgeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&raw).unwrap_or_else(|| {
            warn!(tag = %raw, "unrecognized edge type, treating as LINK");
            Self::Link
        }))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeType,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing)]
    pub vx: Option<f64>,
    #[serde(default, skip_serializing)]
    pub vy: Option<f64>,
}

fn default_weight() -> f64 {
    1.0
}

impl Node {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: NodeType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            weight: default_weight(),
            x: None,
            y: None,
            vx: None,
            vy: None,
        }
    }

    pub fn position(&self) -> Option<Position> {
        match (self.x, self.y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some(Position { x, y }),
            _ => None,
        }
    }

    pub fn set_position(&mut self, position: Position) {
        self.x = Some(position.x);
        self.y = Some(position.y);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeType,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeType) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }

    pub fn undirected_key(&self) -> (&str, &str) {
        if self.source <= self.target {
            (&self.source, &self.target)
        } else {
            (&self.target, &self.source)
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphData {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
