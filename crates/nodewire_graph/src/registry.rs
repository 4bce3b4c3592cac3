// SPDX-License-Identifier: MIT OR Apache-2.0
//! Live widget projection of the graph.
//!
//! The registry holds one widget per node and per edge in the [`Graph`].
//! Callers keep the two in lock-step: every path that mutates the graph also
//! presents or withdraws the matching widgets before returning.

use crate::context::EditorContext;
use crate::edge::{Edge, EdgeId};
use crate::graph::{Entity, EntityId, Graph, GraphError, Missing, Result};
use crate::node::{Node, NodeId};
use crate::terminal::{TerminalDirection, TerminalRef};
use egui::{Pos2, Rect, Vec2};
use indexmap::IndexMap;
use tracing::Span;
use uuid::Uuid;

/// Node visual dimensions
const NODE_WIDTH: f32 = 180.0;
const NODE_HEADER_HEIGHT: f32 = 24.0;
const NODE_FOOTER_HEIGHT: f32 = 8.0;
const TERMINAL_HEIGHT: f32 = 22.0;

/// Widget for a terminal, nested in its node widget
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalWidget {
    /// Terminal this widget shows
    pub terminal: TerminalRef,
    /// Terminal direction
    pub direction: TerminalDirection,
    /// Center in scene space
    pub center: Pos2,
    /// Pointer distance from `center` that counts as a hit
    pub hit_radius: f32,
}

impl TerminalWidget {
    /// Whether `point` hits this terminal
    pub fn contains(&self, point: Pos2) -> bool {
        self.center.distance(point) <= self.hit_radius
    }

    /// Square enclosing the hit circle
    pub fn bounds(&self) -> Rect {
        Rect::from_center_size(self.center, Vec2::splat(self.hit_radius * 2.0))
    }
}

/// Widget for a node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeWidget {
    /// Node this widget shows
    pub node: NodeId,
    /// Display name
    pub name: String,
    /// Body rectangle in scene space
    pub rect: Rect,
    /// Terminal widgets in declaration order
    pub terminals: Vec<TerminalWidget>,
}

impl NodeWidget {
    fn build(node: &Node, hit_radius: f32) -> Self {
        let [x, y] = node.position;
        let rows = node.inputs().count().max(node.outputs().count());
        let height = NODE_HEADER_HEIGHT + rows as f32 * TERMINAL_HEIGHT + NODE_FOOTER_HEIGHT;
        let rect = Rect::from_min_size(Pos2::new(x, y), Vec2::new(NODE_WIDTH, height));

        // Inputs sit on the left edge, outputs on the right, each column
        // stacked in declaration order.
        let (mut input_row, mut output_row) = (0usize, 0usize);
        let terminals = node
            .terminals()
            .map(|terminal| {
                let (column_x, row) = match terminal.direction() {
                    TerminalDirection::Input => (rect.left(), &mut input_row),
                    TerminalDirection::Output => (rect.right(), &mut output_row),
                };
                let center_y =
                    y + NODE_HEADER_HEIGHT + *row as f32 * TERMINAL_HEIGHT + TERMINAL_HEIGHT / 2.0;
                *row += 1;
                TerminalWidget {
                    terminal: TerminalRef::new(node.id, terminal.name()),
                    direction: terminal.direction(),
                    center: Pos2::new(column_x, center_y),
                    hit_radius,
                }
            })
            .collect();

        Self {
            node: node.id,
            name: node.name.clone(),
            rect,
            terminals,
        }
    }

    /// Get a terminal widget by terminal name
    pub fn terminal(&self, name: &str) -> Option<&TerminalWidget> {
        self.terminals.iter().find(|t| t.terminal.name == name)
    }
}

/// Widget for an edge, bound to its two terminal widgets by reference
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeWidget {
    /// Edge this widget shows
    pub edge: EdgeId,
    /// Display name, `source_node.terminal >> dest_node.terminal`
    pub name: String,
    /// Output terminal
    pub source: TerminalRef,
    /// Input terminal
    pub dest: TerminalRef,
}

impl EdgeWidget {
    fn build(edge: &Edge, graph: &Graph) -> Self {
        Self {
            edge: edge.id,
            name: edge_name(edge, graph),
            source: edge.source.clone(),
            dest: edge.dest.clone(),
        }
    }
}

fn edge_name(edge: &Edge, graph: &Graph) -> String {
    let label = |terminal: &TerminalRef| match graph.node(terminal.node) {
        Some(node) => format!("{}.{}", node.name, terminal.name),
        None => terminal.to_string(),
    };
    format!("{} >> {}", label(&edge.source), label(&edge.dest))
}

/// A registered widget
#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    /// Node widget
    Node(NodeWidget),
    /// Edge widget
    Edge(EdgeWidget),
}

impl Widget {
    /// Identity of the entity this widget shows
    pub fn id(&self) -> EntityId {
        match self {
            Self::Node(w) => EntityId::Node(w.node),
            Self::Edge(w) => EntityId::Edge(w.edge),
        }
    }

    /// Display name
    pub fn name(&self) -> &str {
        match self {
            Self::Node(w) => &w.name,
            Self::Edge(w) => &w.name,
        }
    }

    /// The node widget, if this is one
    pub fn as_node(&self) -> Option<&NodeWidget> {
        match self {
            Self::Node(w) => Some(w),
            Self::Edge(_) => None,
        }
    }

    /// The edge widget, if this is one
    pub fn as_edge(&self) -> Option<&EdgeWidget> {
        match self {
            Self::Edge(w) => Some(w),
            Self::Node(_) => None,
        }
    }
}

/// Result of hit-testing a scene point
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Hit<'a> {
    /// A terminal
    Terminal(&'a TerminalWidget),
    /// A node body
    Node(&'a NodeWidget),
    /// An edge line
    Edge(&'a EdgeWidget),
}

/// Source of the current selection, owned by the rendering side
pub trait SelectionSource {
    /// IDs currently selected, in selection order
    fn selected_ids(&self) -> Vec<EntityId>;
}

/// Maps entity identity to the widget currently shown for it
#[derive(Debug)]
pub struct SceneRegistry {
    widgets: IndexMap<EntityId, Widget>,
    terminal_hit_radius: f32,
    edge_hit_tolerance: f32,
    span: Span,
}

impl SceneRegistry {
    /// Create an empty registry
    pub fn new(ctx: &EditorContext) -> Self {
        Self {
            widgets: IndexMap::new(),
            terminal_hit_radius: ctx.settings.terminal_hit_radius,
            edge_hit_tolerance: ctx.settings.edge_hit_tolerance,
            span: ctx.span().clone(),
        }
    }

    /// Build widgets for graph entities that have none yet.
    ///
    /// Nodes are presented before edges, so a node and its edges can be
    /// presented in one call. An edge whose endpoint node has no widget
    /// fails with [`GraphError::DanglingReference`]. Returns the IDs that
    /// got a new widget.
    pub fn present(&mut self, graph: &Graph, ids: &[EntityId]) -> Result<Vec<EntityId>> {
        let _enter = self.span.enter();
        let mut presented = Vec::new();

        let (nodes, edges): (Vec<EntityId>, Vec<EntityId>) = ids
            .iter()
            .copied()
            .partition(|id| matches!(id, EntityId::Node(_)));

        for id in nodes.into_iter().chain(edges) {
            if self.widgets.contains_key(&id) {
                continue;
            }
            let widget = match graph.get(id) {
                None => return Err(GraphError::NotFound(Missing::from(id))),
                Some(Entity::Node(node)) => {
                    Widget::Node(NodeWidget::build(node, self.terminal_hit_radius))
                }
                Some(Entity::Edge(edge)) => {
                    if self.terminal_widget(&edge.source).is_none()
                        || self.terminal_widget(&edge.dest).is_none()
                    {
                        return Err(GraphError::DanglingReference(edge.id));
                    }
                    Widget::Edge(EdgeWidget::build(edge, graph))
                }
            };
            tracing::debug!(%id, name = widget.name(), "presented widget");
            self.widgets.insert(id, widget);
            presented.push(id);
        }
        Ok(presented)
    }

    /// Remove entities through the graph, then drop their widgets.
    ///
    /// Node removal also drops the widgets of the cascaded edges. IDs with
    /// no widget (for instance an edge already cascaded earlier in the same
    /// call) are skipped. A model error stops the call; widgets of entities
    /// the model did not remove stay registered.
    pub fn withdraw(&mut self, graph: &mut Graph, ids: &[EntityId]) -> Result<Vec<EntityId>> {
        let mut withdrawn = Vec::new();
        for &id in ids {
            if !self.widgets.contains_key(&id) {
                continue;
            }
            match id {
                EntityId::Node(node_id) => {
                    let removed = graph.remove_node(node_id)?;
                    for edge in removed.edges {
                        let edge_id = EntityId::Edge(edge.id);
                        if self.widgets.shift_remove(&edge_id).is_some() {
                            withdrawn.push(edge_id);
                        }
                    }
                }
                EntityId::Edge(edge_id) => {
                    graph.remove_edge(edge_id)?;
                }
            }
            self.widgets.shift_remove(&id);
            withdrawn.push(id);
        }

        let _enter = self.span.enter();
        tracing::debug!(count = withdrawn.len(), "withdrew widgets");
        Ok(withdrawn)
    }

    /// Drop an edge widget whose edge the graph has already removed
    pub fn forget_edge(&mut self, edge_id: EdgeId) -> bool {
        self.widgets.shift_remove(&EntityId::Edge(edge_id)).is_some()
    }

    /// Rebuild a node widget after the node moved or was renamed.
    ///
    /// Names of the node's edge widgets are refreshed too.
    pub fn relayout(&mut self, graph: &Graph, node_id: NodeId) -> Result<()> {
        let node = graph
            .node(node_id)
            .ok_or(GraphError::NotFound(Missing::Node(node_id)))?;
        let key = EntityId::Node(node_id);
        if !self.widgets.contains_key(&key) {
            return Ok(());
        }
        let widget = NodeWidget::build(node, self.terminal_hit_radius);
        self.widgets.insert(key, Widget::Node(widget));

        for edge in graph.edges_for_node(node_id) {
            if let Some(Widget::Edge(widget)) = self.widgets.get_mut(&EntityId::Edge(edge.id)) {
                widget.name = edge_name(edge, graph);
            }
        }
        Ok(())
    }

    /// Find a widget by exact ID string, falling back to a linear scan by
    /// display name.
    pub fn find(&self, id_or_name: &str) -> Option<&Widget> {
        if let Ok(uuid) = Uuid::parse_str(id_or_name) {
            let by_id = self
                .widgets
                .get(&EntityId::Node(NodeId(uuid)))
                .or_else(|| self.widgets.get(&EntityId::Edge(EdgeId(uuid))));
            if by_id.is_some() {
                return by_id;
            }
        }
        self.widgets.values().find(|w| w.name() == id_or_name)
    }

    /// Get a widget by ID
    pub fn get(&self, id: EntityId) -> Option<&Widget> {
        self.widgets.get(&id)
    }

    /// Whether a widget exists for `id`
    pub fn contains(&self, id: EntityId) -> bool {
        self.widgets.contains_key(&id)
    }

    /// Number of registered widgets
    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    /// Get a node widget
    pub fn node_widget(&self, node_id: NodeId) -> Option<&NodeWidget> {
        self.widgets.get(&EntityId::Node(node_id)).and_then(Widget::as_node)
    }

    /// Get the widget of a terminal
    pub fn terminal_widget(&self, terminal: &TerminalRef) -> Option<&TerminalWidget> {
        self.node_widget(terminal.node)?.terminal(&terminal.name)
    }

    /// All node widgets
    pub fn all_node_widgets(&self) -> impl Iterator<Item = &NodeWidget> {
        self.widgets.values().filter_map(Widget::as_node)
    }

    /// All edge widgets
    pub fn all_edge_widgets(&self) -> impl Iterator<Item = &EdgeWidget> {
        self.widgets.values().filter_map(Widget::as_edge)
    }

    /// Edge widgets connecting two terminals, in either order
    pub fn edges_between(&self, a: &TerminalRef, b: &TerminalRef) -> Vec<&EdgeWidget> {
        self.all_edge_widgets()
            .filter(|w| (w.source == *a && w.dest == *b) || (w.source == *b && w.dest == *a))
            .collect()
    }

    /// The selection reported by `source`, filtered to registered widgets
    pub fn selected(&self, source: &impl SelectionSource, nodes_only: bool) -> Vec<&Widget> {
        source
            .selected_ids()
            .into_iter()
            .filter_map(|id| self.widgets.get(&id))
            .filter(|w| !nodes_only || matches!(w, Widget::Node(_)))
            .collect()
    }

    /// Line endpoints of an edge widget (source center, dest center)
    pub fn edge_line(&self, edge_id: EdgeId) -> Option<(Pos2, Pos2)> {
        let widget = self.widgets.get(&EntityId::Edge(edge_id))?.as_edge()?;
        let from = self.terminal_widget(&widget.source)?.center;
        let to = self.terminal_widget(&widget.dest)?.center;
        Some((from, to))
    }

    /// Topmost terminal widget within hit radius of `point`
    pub fn terminal_at(&self, point: Pos2) -> Option<&TerminalWidget> {
        self.all_node_widgets()
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .flat_map(|w| w.terminals.iter())
            .find(|t| t.contains(point))
    }

    /// Hit-test a scene point: terminals first, then node bodies (topmost
    /// first), then edge lines.
    pub fn hit_test(&self, point: Pos2) -> Option<Hit<'_>> {
        if let Some(terminal) = self.terminal_at(point) {
            return Some(Hit::Terminal(terminal));
        }
        let nodes: Vec<_> = self.all_node_widgets().collect();
        if let Some(node) = nodes.into_iter().rev().find(|w| w.rect.contains(point)) {
            return Some(Hit::Node(node));
        }
        self.all_edge_widgets()
            .find(|w| {
                self.edge_line(w.edge).is_some_and(|(from, to)| {
                    distance_to_segment(point, from, to) <= self.edge_hit_tolerance
                })
            })
            .map(Hit::Edge)
    }
}

fn distance_to_segment(point: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let length_sq = ab.length_sq();
    if length_sq <= f32::EPSILON {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / length_sq).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}
