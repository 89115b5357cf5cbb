//! The architecture canvas the model draws on in IT architecture mode.

use crate::tools::{AddEdgeArgs, AddNodeArgs, UpdateNodeArgs};
use serde::Serialize;
use tracing::{debug, info};

/// Nodes closer than this on both axes count as overlapping.
const COLLISION_DISTANCE: f64 = 50.0;
/// How far an overlapping node is pushed right and down.
const NUDGE: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub kind: String,
    pub label: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagram {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn clear(&mut self) {
        info!("Clearing diagram");
        self.nodes.clear();
        self.edges.clear();
    }

    /// Adds a node, replacing any node with the same id. Returns `false` when the
    /// id or label is blank.
    pub fn add_node(&mut self, args: &AddNodeArgs) -> bool {
        let id = args.id.trim();
        let label = args.label.trim();
        if id.is_empty() || label.is_empty() {
            return false;
        }
        let kind = match args.kind.trim() {
            "" => "server",
            kind => kind,
        };

        let (mut x, mut y) = (args.x, args.y);
        let collides = self.nodes.iter().any(|n| {
            n.id != id && (n.x - x).abs() < COLLISION_DISTANCE && (n.y - y).abs() < COLLISION_DISTANCE
        });
        if collides {
            debug!(node = %id, "Nudging overlapping node");
            x += NUDGE;
            y += NUDGE;
        }

        self.nodes.retain(|n| n.id != id);
        info!(node = %id, "Adding node");
        self.nodes.push(Node {
            id: id.to_string(),
            kind: kind.to_string(),
            label: label.to_string(),
            x,
            y,
        });
        true
    }

    /// Adds an edge, replacing any edge with the same id.
    pub fn add_edge(&mut self, args: &AddEdgeArgs) -> bool {
        let id = args.id.trim();
        let source = args.source.trim();
        let target = args.target.trim();
        if id.is_empty() || source.is_empty() || target.is_empty() {
            return false;
        }
        self.edges.retain(|e| e.id != id);
        info!(edge = %id, "Adding edge");
        self.edges.push(Edge {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            label: args
                .label
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        });
        true
    }

    /// Removes a node together with every edge touching it.
    pub fn delete_node(&mut self, id: &str) -> bool {
        let id = id.trim();
        let before = self.nodes.len();
        self.nodes.retain(|n| n.id != id);
        if self.nodes.len() == before {
            return false;
        }
        self.edges.retain(|e| e.source != id && e.target != id);
        true
    }

    pub fn update_node(&mut self, args: &UpdateNodeArgs) -> bool {
        let Some(node) = self.nodes.iter_mut().find(|n| n.id == args.id.trim()) else {
            return false;
        };
        if let Some(label) = args.label.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            node.label = label.to_string();
        }
        if let Some(x) = args.x {
            node.x = x;
        }
        if let Some(y) = args.y {
            node.y = y;
        }
        true
    }

    pub fn remove_edge(&mut self, id: &str) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| e.id != id.trim());
        self.edges.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, x: f64, y: f64) -> AddNodeArgs {
        AddNodeArgs {
            id: id.into(),
            kind: "server".into(),
            label: format!("{id} label"),
            x,
            y,
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> AddEdgeArgs {
        AddEdgeArgs {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            label: Some(" HTTPS ".into()),
        }
    }

    #[test]
    fn test_same_id_replaces_node() {
        let mut diagram = Diagram::new();
        assert!(diagram.add_node(&node("web", 0.0, 300.0)));
        assert!(diagram.add_node(&node("web", 600.0, 300.0)));
        assert_eq!(diagram.nodes().len(), 1);
        assert_eq!(diagram.node("web").map(|n| n.x), Some(600.0));
    }

    #[test]
    fn test_overlapping_node_is_nudged() {
        let mut diagram = Diagram::new();
        diagram.add_node(&node("a", 300.0, 150.0));
        diagram.add_node(&node("b", 320.0, 170.0));
        diagram.add_node(&node("c", 400.0, 150.0));

        let b = diagram.node("b").unwrap();
        assert_eq!((b.x, b.y), (370.0, 220.0));
        let c = diagram.node("c").unwrap();
        assert_eq!((c.x, c.y), (400.0, 150.0));
    }

    #[test]
    fn test_blank_fields_are_rejected() {
        let mut diagram = Diagram::new();
        assert!(!diagram.add_node(&node("  ", 0.0, 0.0)));
        assert!(!diagram.add_edge(&edge("e", "", "b")));
        assert!(diagram.nodes().is_empty());
        assert!(diagram.edges().is_empty());
    }

    #[test]
    fn test_delete_node_removes_its_edges() {
        let mut diagram = Diagram::new();
        diagram.add_node(&node("lb", 0.0, 150.0));
        diagram.add_node(&node("app", 0.0, 300.0));
        diagram.add_node(&node("db", 0.0, 450.0));
        diagram.add_edge(&edge("lb-app", "lb", "app"));
        diagram.add_edge(&edge("app-db", "app", "db"));
        diagram.add_edge(&edge("lb-db", "lb", "db"));

        assert!(diagram.delete_node("app"));
        let ids: Vec<_> = diagram.edges().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["lb-db"]);
        assert!(!diagram.delete_node("app"));
    }

    #[test]
    fn test_update_keeps_unspecified_fields() {
        let mut diagram = Diagram::new();
        diagram.add_node(&node("db", 0.0, 450.0));
        assert!(diagram.update_node(&UpdateNodeArgs {
            id: "db".into(),
            label: Some("Primary DB".into()),
            x: None,
            y: Some(500.0),
        }));
        let db = diagram.node("db").unwrap();
        assert_eq!(db.label, "Primary DB");
        assert_eq!((db.x, db.y), (0.0, 500.0));
        assert!(!diagram.update_node(&UpdateNodeArgs {
            id: "ghost".into(),
            label: None,
            x: None,
            y: None,
        }));
    }

    #[test]
    fn test_edges_trim_labels_and_clear() {
        let mut diagram = Diagram::new();
        diagram.add_edge(&edge("e1", "a", "b"));
        assert_eq!(diagram.edges()[0].label.as_deref(), Some("HTTPS"));
        assert!(diagram.remove_edge("e1"));
        assert!(!diagram.remove_edge("e1"));

        diagram.add_node(&node("a", 0.0, 0.0));
        diagram.add_edge(&edge("e2", "a", "b"));
        diagram.clear();
        assert_eq!(diagram, Diagram::new());
    }
}
