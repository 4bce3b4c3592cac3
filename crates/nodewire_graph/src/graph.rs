// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and edges.

use crate::context::EditorContext;
use crate::edge::{Edge, EdgeId};
use crate::events::{EventBus, GraphEvent, SubscriptionId};
use crate::node::{Node, NodeId, NodeSpec};
use crate::terminal::{Terminal, TerminalDirection, TerminalRef};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc;
use tracing::Span;

/// Identity of anything the graph owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityId {
    /// A node
    Node(NodeId),
    /// An edge
    Edge(EdgeId),
}

impl From<NodeId> for EntityId {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl From<EdgeId> for EntityId {
    fn from(id: EdgeId) -> Self {
        Self::Edge(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(id) => write!(f, "node {id}"),
            Self::Edge(id) => write!(f, "edge {id}"),
        }
    }
}

/// Borrowed view of an entity returned by [`Graph::get`]
#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    /// A node
    Node(&'a Node),
    /// An edge
    Edge(&'a Edge),
}

/// What a lookup failed to find
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    /// Node ID
    Node(NodeId),
    /// Edge ID
    Edge(EdgeId),
    /// Terminal reference
    Terminal(TerminalRef),
}

impl From<EntityId> for Missing {
    fn from(id: EntityId) -> Self {
        match id {
            EntityId::Node(id) => Self::Node(id),
            EntityId::Edge(id) => Self::Edge(id),
        }
    }
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(id) => write!(f, "node {id}"),
            Self::Edge(id) => write!(f, "edge {id}"),
            Self::Terminal(terminal) => write!(f, "terminal {terminal}"),
        }
    }
}

/// Errors raised by graph and registry operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(Missing),

    /// Malformed node or terminal construction request
    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    /// Source is not an output or destination is not an input
    #[error("Edges must run from an output terminal to an input terminal")]
    InvalidDirection,

    /// Both terminals belong to the same node
    #[error("Cannot connect a node to itself")]
    SameNode,

    /// Destination already has an edge and eviction was not forced
    #[error("Terminal does not accept another connection")]
    NotConnectable,

    /// An edge was presented before the widgets of its endpoints
    #[error("Edge {0} references a terminal with no widget")]
    DanglingReference(EdgeId),
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// A node removed by [`Graph::remove_node`], with the edges that went with it
#[derive(Debug, Clone)]
pub struct RemovedNode {
    /// The removed node
    pub node: Node,
    /// Incident edges, in the order they were removed
    pub edges: Vec<Edge>,
}

/// The canonical node graph
#[derive(Debug)]
pub struct Graph {
    /// Graph name
    pub name: String,
    nodes: IndexMap<NodeId, Node>,
    edges: IndexMap<EdgeId, Edge>,
    events: EventBus,
    span: Span,
}

impl Graph {
    /// Create a new empty graph with default settings
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let ctx = EditorContext::new(&name, Default::default());
        Self::with_context(name, &ctx)
    }

    /// Create a new empty graph logging under `ctx`
    pub fn with_context(name: impl Into<String>, ctx: &EditorContext) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            events: EventBus::new(),
            span: ctx.span().clone(),
        }
    }

    /// Add a node built from `spec`
    pub fn add_node(&mut self, spec: &NodeSpec) -> Result<NodeId> {
        let _enter = self.span.enter();
        let node = Node::from_spec(spec)?;
        let id = node.id;
        if self.nodes.contains_key(&id) {
            return Err(GraphError::InvalidSpec(format!("node {id} already exists")));
        }
        tracing::debug!(node = %id, name = %node.name, "added node");
        self.nodes.insert(id, node);
        self.events.emit(GraphEvent::NodeAdded(id));
        Ok(id)
    }

    /// Remove a node and every edge touching one of its terminals.
    ///
    /// Incident edges are removed in ascending ID order before the node.
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<RemovedNode> {
        let node = self
            .nodes
            .get(&node_id)
            .ok_or(GraphError::NotFound(Missing::Node(node_id)))?;

        let mut incident: Vec<EdgeId> = node.terminals().flat_map(Terminal::edges).collect();
        incident.sort_unstable();
        incident.dedup();

        let mut edges = Vec::with_capacity(incident.len());
        for edge_id in incident {
            edges.push(self.remove_edge(edge_id)?);
        }

        let _enter = self.span.enter();
        let node = self
            .nodes
            .shift_remove(&node_id)
            .ok_or(GraphError::NotFound(Missing::Node(node_id)))?;
        tracing::debug!(node = %node_id, cascaded = edges.len(), "removed node");
        self.events.emit(GraphEvent::NodeDeleted(node_id));
        Ok(RemovedNode { node, edges })
    }

    /// Connect an output terminal to an input terminal on another node
    pub fn add_edge(&mut self, source: &TerminalRef, dest: &TerminalRef) -> Result<EdgeId> {
        self.check_edge(source, dest)?;
        self.insert_edge(Edge::new(source.clone(), dest.clone()))
    }

    /// Re-add a saved edge under its original ID.
    ///
    /// Applies the same checks as [`Graph::add_edge`]; an ID already in the
    /// graph fails with [`GraphError::InvalidSpec`].
    pub fn restore_edge(&mut self, edge: Edge) -> Result<EdgeId> {
        if self.edges.contains_key(&edge.id) {
            return Err(GraphError::InvalidSpec(format!("edge {} already exists", edge.id)));
        }
        self.check_edge(&edge.source, &edge.dest)?;
        self.insert_edge(edge)
    }

    fn check_edge(&self, source: &TerminalRef, dest: &TerminalRef) -> Result<()> {
        let source_terminal = self.require_terminal(source)?;
        let dest_terminal = self.require_terminal(dest)?;

        if source_terminal.direction() != TerminalDirection::Output
            || dest_terminal.direction() != TerminalDirection::Input
        {
            return Err(GraphError::InvalidDirection);
        }
        if source.node == dest.node {
            return Err(GraphError::SameNode);
        }
        Ok(())
    }

    fn insert_edge(&mut self, edge: Edge) -> Result<EdgeId> {
        let id = edge.id;
        self.terminal_mut(&edge.source)?.attach(id);
        self.terminal_mut(&edge.dest)?.attach(id);

        let _enter = self.span.enter();
        tracing::debug!(edge = %id, "connected {}", edge);
        self.edges.insert(id, edge);
        self.events.emit(GraphEvent::EdgeAdded(id));
        Ok(id)
    }

    /// Remove an edge.
    ///
    /// Removing an edge that is already gone fails with
    /// [`GraphError::NotFound`]; it is not a silent no-op.
    pub fn remove_edge(&mut self, edge_id: EdgeId) -> Result<Edge> {
        let edge = self
            .edges
            .shift_remove(&edge_id)
            .ok_or(GraphError::NotFound(Missing::Edge(edge_id)))?;

        for endpoint in [&edge.source, &edge.dest] {
            if let Ok(terminal) = self.terminal_mut(endpoint) {
                terminal.detach(edge_id);
            }
        }

        let _enter = self.span.enter();
        tracing::debug!(edge = %edge_id, "disconnected {}", edge);
        self.events.emit(GraphEvent::EdgeDeleted(edge_id));
        Ok(edge)
    }

    /// Move a node
    pub fn set_node_position(&mut self, node_id: NodeId, x: f32, y: f32) -> Result<()> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(GraphError::InvalidSpec(format!("non-finite position ({x}, {y})")));
        }
        self.update_node(node_id, |node| node.position = [x, y])
    }

    /// Change a node's display name
    pub fn rename_node(&mut self, node_id: NodeId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(GraphError::InvalidSpec("node name is empty".into()));
        }
        self.update_node(node_id, |node| node.name = name)
    }

    /// Enable or disable a node
    pub fn set_node_enabled(&mut self, node_id: NodeId, enabled: bool) -> Result<()> {
        self.update_node(node_id, |node| node.enabled = enabled)
    }

    fn update_node(&mut self, node_id: NodeId, apply: impl FnOnce(&mut Node)) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NotFound(Missing::Node(node_id)))?;
        apply(node);
        let snapshot = node.clone();
        self.events.emit(GraphEvent::NodeChanged(snapshot));
        Ok(())
    }

    /// Look up a node or edge
    pub fn get(&self, id: EntityId) -> Option<Entity<'_>> {
        match id {
            EntityId::Node(id) => self.node(id).map(Entity::Node),
            EntityId::Edge(id) => self.edge(id).map(Entity::Edge),
        }
    }

    /// Whether the graph holds `id`
    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// First node with the given display name
    pub fn get_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.values().find(|n| n.name == name)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get an edge by ID
    pub fn edge(&self, edge_id: EdgeId) -> Option<&Edge> {
        self.edges.get(&edge_id)
    }

    /// Resolve a terminal reference
    pub fn terminal(&self, terminal: &TerminalRef) -> Option<&Terminal> {
        self.nodes.get(&terminal.node)?.terminal(&terminal.name)
    }

    fn require_terminal(&self, terminal: &TerminalRef) -> Result<&Terminal> {
        self.terminal(terminal)
            .ok_or_else(|| GraphError::NotFound(Missing::Terminal(terminal.clone())))
    }

    fn terminal_mut(&mut self, terminal: &TerminalRef) -> Result<&mut Terminal> {
        self.nodes
            .get_mut(&terminal.node)
            .and_then(|node| node.terminal_mut(&terminal.name))
            .ok_or_else(|| GraphError::NotFound(Missing::Terminal(terminal.clone())))
    }

    /// All nodes in insertion order
    pub fn all_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All edges in insertion order
    pub fn all_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges attached to a terminal
    pub fn edges_at<'a>(&'a self, terminal: &TerminalRef) -> impl Iterator<Item = &'a Edge> + 'a {
        self.terminal(terminal)
            .into_iter()
            .flat_map(Terminal::edges)
            .filter_map(move |id| self.edges.get(&id))
    }

    /// Edges touching any terminal of a node
    pub fn edges_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.values().filter(move |e| e.involves_node(node_id))
    }

    /// Register a callback for change notifications
    pub fn subscribe(&mut self, callback: impl FnMut(&GraphEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(callback)
    }

    /// Receive change notifications over a channel
    pub fn subscribe_channel(&mut self) -> mpsc::Receiver<GraphEvent> {
        self.events.subscribe_channel()
    }

    /// Remove a callback registered with [`Graph::subscribe`]
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub(crate) fn emit(&mut self, event: GraphEvent) {
        self.events.emit(event);
    }

    /// Check the structural invariants: edge directions, distinct endpoint
    /// nodes and two-way registration between edges and terminals.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        for edge in self.edges.values() {
            let source = self.terminal(&edge.source).expect("source terminal exists");
            let dest = self.terminal(&edge.dest).expect("dest terminal exists");
            assert!(source.is_output(), "edge {} leaves an input", edge.id);
            assert!(dest.is_input(), "edge {} arrives at an output", edge.id);
            assert_ne!(edge.source.node, edge.dest.node);
            assert!(source.has_edge(edge.id));
            assert!(dest.has_edge(edge.id));
        }
        for node in self.nodes.values() {
            for terminal in node.terminals() {
                for edge_id in terminal.edges() {
                    let edge = self.edges.get(&edge_id).expect("attached edge exists");
                    assert!(edge.involves_terminal(&TerminalRef::new(node.id, terminal.name())));
                }
            }
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::TerminalSpec;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn source_and_sink(graph: &mut Graph) -> (TerminalRef, TerminalRef) {
        let a = graph.add_node(&NodeSpec::new("A").with_output("out")).unwrap();
        let b = graph.add_node(&NodeSpec::new("B").with_input("in")).unwrap();
        (TerminalRef::new(a, "out"), TerminalRef::new(b, "in"))
    }

    #[test]
    fn test_connect_two_nodes() {
        let mut graph = Graph::new("test");
        let (out, input) = source_and_sink(&mut graph);

        let edge = graph.add_edge(&out, &input).unwrap();

        assert_eq!(graph.edge_count(), 1);
        assert!(graph.terminal(&out).unwrap().has_edge(edge));
        assert!(graph.terminal(&input).unwrap().has_edge(edge));
        graph.assert_consistent();
    }

    #[test]
    fn test_same_node_rejected() {
        let mut graph = Graph::new("test");
        let a = graph
            .add_node(&NodeSpec::new("A").with_input("in").with_output("out"))
            .unwrap();

        let result = graph.add_edge(&TerminalRef::new(a, "out"), &TerminalRef::new(a, "in"));
        assert_eq!(result, Err(GraphError::SameNode));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_direction_rejected() {
        let mut graph = Graph::new("test");
        let (out, input) = source_and_sink(&mut graph);

        assert_eq!(graph.add_edge(&input, &out), Err(GraphError::InvalidDirection));
        assert_eq!(graph.add_edge(&out, &out), Err(GraphError::InvalidDirection));
        graph.assert_consistent();
    }

    #[test]
    fn test_missing_terminal() {
        let mut graph = Graph::new("test");
        let (out, input) = source_and_sink(&mut graph);
        let bogus = TerminalRef::new(input.node, "nope");

        assert_eq!(
            graph.add_edge(&out, &bogus),
            Err(GraphError::NotFound(Missing::Terminal(bogus.clone())))
        );
        let ghost = TerminalRef::new(NodeId::new(), "in");
        assert!(matches!(graph.add_edge(&out, &ghost), Err(GraphError::NotFound(_))));
    }

    #[test]
    fn test_remove_edge_twice_fails() {
        let mut graph = Graph::new("test");
        let (out, input) = source_and_sink(&mut graph);
        let edge = graph.add_edge(&out, &input).unwrap();

        assert!(graph.remove_edge(edge).is_ok());
        assert_eq!(
            graph.remove_edge(edge),
            Err(GraphError::NotFound(Missing::Edge(edge)))
        );
        assert_eq!(graph.terminal(&out).unwrap().edge_count(), 0);
        assert_eq!(graph.terminal(&input).unwrap().edge_count(), 0);
    }

    #[test]
    fn test_remove_node_cascades() {
        let mut graph = Graph::new("test");
        let (out, input) = source_and_sink(&mut graph);
        let c = graph.add_node(&NodeSpec::new("C").with_input("in")).unwrap();
        let to_c = TerminalRef::new(c, "in");
        let e1 = graph.add_edge(&out, &input).unwrap();
        let e2 = graph.add_edge(&out, &to_c).unwrap();

        let removed = graph.remove_node(out.node).unwrap();

        let mut expected = vec![e1, e2];
        expected.sort();
        let cascaded: Vec<_> = removed.edges.iter().map(|e| e.id).collect();
        assert_eq!(cascaded, expected);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.all_edges().all(|e| !e.involves_node(out.node)));
        assert_eq!(graph.terminal(&to_c).unwrap().edge_count(), 0);
        assert!(matches!(graph.remove_node(out.node), Err(GraphError::NotFound(_))));
        graph.assert_consistent();
    }

    #[test]
    fn test_fan_out_from_output() {
        let mut graph = Graph::new("test");
        let (out, input) = source_and_sink(&mut graph);
        let c = graph
            .add_node(&NodeSpec::new("C").with_terminal(TerminalSpec::input("in").exclusive()))
            .unwrap();
        graph.add_edge(&out, &input).unwrap();
        graph.add_edge(&out, &TerminalRef::new(c, "in")).unwrap();

        assert_eq!(graph.terminal(&out).unwrap().edge_count(), 2);
        assert_eq!(graph.edges_at(&out).count(), 2);
        graph.assert_consistent();
    }

    #[test]
    fn test_lookup() {
        let mut graph = Graph::new("test");
        let (out, _) = source_and_sink(&mut graph);

        assert_eq!(graph.get_by_name("A").map(|n| n.id), Some(out.node));
        assert!(graph.get_by_name("Z").is_none());
        assert!(matches!(graph.get(EntityId::Node(out.node)), Some(Entity::Node(_))));
        assert!(graph.get(EntityId::Edge(EdgeId::new())).is_none());
    }

    #[test]
    fn test_events() {
        let mut graph = Graph::new("test");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        graph.subscribe(move |event| {
            let tag = match event {
                GraphEvent::NodeAdded(_) => "node+",
                GraphEvent::NodeChanged(_) => "node~",
                GraphEvent::NodeDeleted(_) => "node-",
                GraphEvent::EdgeAdded(_) => "edge+",
                GraphEvent::EdgeDeleted(_) => "edge-",
                GraphEvent::SelectionChanged => "selection",
            };
            sink.borrow_mut().push(tag);
        });

        let (out, input) = source_and_sink(&mut graph);
        graph.add_edge(&out, &input).unwrap();
        graph.set_node_position(out.node, 5.0, 5.0).unwrap();
        graph.remove_node(input.node).unwrap();

        assert_eq!(
            *seen.borrow(),
            ["node+", "node+", "edge+", "node~", "edge-", "node-"]
        );
    }

    #[test]
    fn test_node_changed_carries_update() {
        let mut graph = Graph::new("test");
        let receiver = graph.subscribe_channel();
        let (out, _) = source_and_sink(&mut graph);
        graph.rename_node(out.node, "Renamed").unwrap();

        let renamed = receiver.try_iter().find_map(|event| match event {
            GraphEvent::NodeChanged(node) => Some(node.name),
            _ => None,
        });
        assert_eq!(renamed.as_deref(), Some("Renamed"));
        assert!(graph.rename_node(out.node, "").is_err());
        assert!(graph.set_node_position(NodeId::new(), 0.0, 0.0).is_err());
    }

    #[test]
    fn test_set_node_enabled() {
        let mut graph = Graph::new("test");
        let receiver = graph.subscribe_channel();
        let (out, _) = source_and_sink(&mut graph);
        assert!(graph.node(out.node).unwrap().enabled);

        graph.set_node_enabled(out.node, false).unwrap();
        assert!(!graph.node(out.node).unwrap().enabled);
        let changed = receiver.try_iter().find_map(|event| match event {
            GraphEvent::NodeChanged(node) => Some(node.enabled),
            _ => None,
        });
        assert_eq!(changed, Some(false));
    }

    #[test]
    fn test_restore_with_saved_ids() {
        let mut graph = Graph::new("saved");
        let (out, input) = source_and_sink(&mut graph);
        let edge = graph.add_edge(&out, &input).unwrap();

        let nodes: Vec<Node> = graph.all_nodes().cloned().collect();
        let edges: Vec<Edge> = graph.all_edges().cloned().collect();
        let saved = ron::to_string(&(nodes, edges)).unwrap();
        let (nodes, edges): (Vec<Node>, Vec<Edge>) = ron::from_str(&saved).unwrap();

        let mut loaded = Graph::new("loaded");
        for node in &nodes {
            loaded.add_node(&NodeSpec::from_node(node)).unwrap();
        }
        for edge in edges {
            loaded.restore_edge(edge).unwrap();
        }

        assert_eq!(loaded.get_by_name("A").map(|n| n.id), Some(out.node));
        let restored = loaded.edge(edge).unwrap();
        assert_eq!((&restored.source, &restored.dest), (&out, &input));
        assert!(loaded.terminal(&input).unwrap().has_edge(edge));
        loaded.assert_consistent();

        // Identities are unique within a graph
        let again = loaded.add_node(&NodeSpec::from_node(&nodes[0]));
        assert!(matches!(again, Err(GraphError::InvalidSpec(_))));
        let duplicate = loaded.edge(edge).cloned().unwrap();
        assert!(matches!(
            loaded.restore_edge(duplicate),
            Err(GraphError::InvalidSpec(_))
        ));
        assert_eq!(loaded.node_count(), 2);
    }
}
