// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph.

use crate::graph::GraphError;
use crate::terminal::{Terminal, TerminalDirection, TerminalSpec};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Construction request for a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Identity to reuse, e.g. when reloading a saved graph; `None`
    /// allocates a fresh ID
    #[serde(default)]
    pub id: Option<NodeId>,
    /// Display name
    pub name: String,
    /// Optional type tag (catalog entry the spec came from)
    pub node_type: Option<String>,
    /// Position in scene space
    pub position: [f32; 2],
    /// Terminals in declaration order
    pub terminals: Vec<TerminalSpec>,
    /// Whether the node starts enabled
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl NodeSpec {
    /// Create a spec with no terminals at the origin
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            node_type: None,
            position: [0.0, 0.0],
            terminals: Vec::new(),
            enabled: true,
        }
    }

    /// Spec that recreates `node` with its ID, attributes and terminals.
    ///
    /// Attached edges are not part of the spec; re-add them afterwards with
    /// [`Graph::restore_edge`](crate::graph::Graph::restore_edge).
    pub fn from_node(node: &Node) -> Self {
        Self {
            id: Some(node.id),
            name: node.name.clone(),
            node_type: node.node_type.clone(),
            position: node.position,
            terminals: node
                .terminals()
                .map(|t| TerminalSpec {
                    name: t.name().to_string(),
                    direction: t.direction(),
                    connectable: t.connectable,
                })
                .collect(),
            enabled: node.enabled,
        }
    }

    /// Reuse an existing ID
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Add a terminal
    pub fn with_terminal(mut self, terminal: TerminalSpec) -> Self {
        self.terminals.push(terminal);
        self
    }

    /// Add an input terminal
    pub fn with_input(self, name: impl Into<String>) -> Self {
        self.with_terminal(TerminalSpec::input(name))
    }

    /// Add an output terminal
    pub fn with_output(self, name: impl Into<String>) -> Self {
        self.with_terminal(TerminalSpec::output(name))
    }

    /// Check that the spec can be turned into a node
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.name.trim().is_empty() {
            return Err(GraphError::InvalidSpec("node name is empty".into()));
        }
        if !self.position.iter().all(|v| v.is_finite()) {
            return Err(GraphError::InvalidSpec(format!(
                "node '{}' has a non-finite position",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for terminal in &self.terminals {
            if terminal.name.trim().is_empty() {
                return Err(GraphError::InvalidSpec(format!(
                    "node '{}' has a terminal with an empty name",
                    self.name
                )));
            }
            if !seen.insert(terminal.name.as_str()) {
                return Err(GraphError::InvalidSpec(format!(
                    "node '{}' declares terminal '{}' twice",
                    self.name, terminal.name
                )));
            }
        }
        Ok(())
    }
}

/// A node instance in the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Display name
    pub name: String,
    /// Type tag, if created from a catalog entry
    pub node_type: Option<String>,
    /// Position in scene space
    pub position: [f32; 2],
    /// Disabled nodes stay in the graph but are skipped by consumers
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    terminals: Vec<Terminal>,
}

impl Node {
    /// Build a node from a spec, allocating a fresh ID unless the spec
    /// carries one
    pub fn from_spec(spec: &NodeSpec) -> Result<Self, GraphError> {
        spec.validate()?;
        Ok(Self {
            id: spec.id.unwrap_or_default(),
            name: spec.name.clone(),
            node_type: spec.node_type.clone(),
            position: spec.position,
            enabled: spec.enabled,
            terminals: spec.terminals.iter().map(Terminal::new).collect(),
        })
    }

    /// Get a terminal by name
    pub fn terminal(&self, name: &str) -> Option<&Terminal> {
        self.terminals.iter().find(|t| t.name() == name)
    }

    pub(crate) fn terminal_mut(&mut self, name: &str) -> Option<&mut Terminal> {
        self.terminals.iter_mut().find(|t| t.name() == name)
    }

    /// All terminals in declaration order
    pub fn terminals(&self) -> impl Iterator<Item = &Terminal> {
        self.terminals.iter()
    }

    /// Input terminals in declaration order
    pub fn inputs(&self) -> impl Iterator<Item = &Terminal> {
        self.terminals_in(TerminalDirection::Input)
    }

    /// Output terminals in declaration order
    pub fn outputs(&self) -> impl Iterator<Item = &Terminal> {
        self.terminals_in(TerminalDirection::Output)
    }

    fn terminals_in(&self, direction: TerminalDirection) -> impl Iterator<Item = &Terminal> {
        self.terminals.iter().filter(move |t| t.direction() == direction)
    }
}

/// Catalog of reusable node templates, keyed by type tag
pub struct NodeCatalog {
    templates: IndexMap<String, NodeSpec>,
}

impl NodeCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self {
            templates: IndexMap::new(),
        }
    }

    /// Register a template under a type tag
    pub fn register(&mut self, node_type: impl Into<String>, template: NodeSpec) {
        let node_type = node_type.into();
        let template = NodeSpec {
            id: None,
            node_type: Some(node_type.clone()),
            ..template
        };
        self.templates.insert(node_type, template);
    }

    /// Get a template by type tag
    pub fn get(&self, node_type: &str) -> Option<&NodeSpec> {
        self.templates.get(node_type)
    }

    /// Registered type tags in registration order
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Instantiate a spec for a type tag at a position
    pub fn spec_for(&self, node_type: &str, x: f32, y: f32) -> Option<NodeSpec> {
        self.get(node_type).map(|t| t.clone().with_position(x, y))
    }
}

impl Default for NodeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_spec_keeps_declaration_order() {
        let spec = NodeSpec::new("mix")
            .with_input("a")
            .with_output("out")
            .with_input("b");
        let node = Node::from_spec(&spec).unwrap();

        let names: Vec<_> = node.terminals().map(Terminal::name).collect();
        assert_eq!(names, ["a", "out", "b"]);
        let inputs: Vec<_> = node.inputs().map(Terminal::name).collect();
        assert_eq!(inputs, ["a", "b"]);
        assert_eq!(node.outputs().count(), 1);
    }

    #[test]
    fn test_invalid_specs() {
        let duplicate = NodeSpec::new("n").with_input("x").with_output("x");
        assert!(matches!(
            Node::from_spec(&duplicate),
            Err(GraphError::InvalidSpec(_))
        ));

        let blank = NodeSpec::new("  ");
        assert!(matches!(Node::from_spec(&blank), Err(GraphError::InvalidSpec(_))));

        let unnamed_terminal = NodeSpec::new("n").with_input("");
        assert!(unnamed_terminal.validate().is_err());

        let nan = NodeSpec::new("n").with_position(f32::NAN, 0.0);
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_catalog() {
        let mut catalog = NodeCatalog::new();
        catalog.register("blur", NodeSpec::new("Blur").with_input("image").with_output("image_out"));

        let spec = catalog.spec_for("blur", 10.0, 20.0).unwrap();
        assert_eq!(spec.node_type.as_deref(), Some("blur"));
        assert_eq!(spec.position, [10.0, 20.0]);
        assert!(catalog.spec_for("sharpen", 0.0, 0.0).is_none());
        assert_eq!(catalog.types().collect::<Vec<_>>(), ["blur"]);
    }

    #[test]
    fn test_from_node_keeps_identity() {
        let spec = NodeSpec::new("gate")
            .with_position(4.0, 8.0)
            .with_terminal(TerminalSpec::input("in").exclusive())
            .with_output("out");
        let mut node = Node::from_spec(&spec).unwrap();
        node.enabled = false;

        let respec = NodeSpec::from_node(&node);
        assert_eq!(respec.id, Some(node.id));
        assert!(!respec.enabled);
        assert_eq!(respec.terminals, spec.terminals);

        let rebuilt = Node::from_spec(&respec).unwrap();
        assert_eq!(rebuilt.id, node.id);
        assert_eq!(rebuilt.position, [4.0, 8.0]);
        assert!(!rebuilt.enabled);
    }

    #[test]
    fn test_spec_without_id_or_enabled_deserializes() {
        let spec: NodeSpec =
            ron::from_str(r#"(name: "n", node_type: None, position: (0.0, 0.0), terminals: [])"#)
                .unwrap();
        assert_eq!(spec.id, None);
        assert!(spec.enabled);
    }
}
