// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor command layer: selection, node/edge commands and pointer routing.
//!
//! The rendering side owns the window and maps pointer positions into scene
//! space; it forwards them to [`GraphEditor::press`], [`GraphEditor::drag`]
//! and [`GraphEditor::release`], and routes menu or key-binding commands to
//! the other methods.

use crate::context::EditorContext;
use crate::edge::{Edge, EdgeId};
use crate::events::GraphEvent;
use crate::graph::{EntityId, Graph, GraphError, Missing, Result};
use crate::node::{Node, NodeCatalog, NodeId, NodeSpec};
use crate::registry::{SceneRegistry, SelectionSource, Widget};
use crate::scene::Scene;
use crate::session::{ConnectionSession, GestureOutcome, PressOutcome};
use crate::settings::GraphSettings;
use crate::terminal::TerminalRef;
use crate::validation::{ValidationEngine, Verdict};
use egui::Pos2;
use indexmap::IndexSet;

/// Selected nodes and edges, in selection order
#[derive(Debug, Clone, Default)]
pub struct Selection {
    nodes: IndexSet<NodeId>,
    edges: IndexSet<EdgeId>,
}

impl Selection {
    /// Whether nothing is selected
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Whether `id` is selected
    pub fn contains(&self, id: EntityId) -> bool {
        match id {
            EntityId::Node(id) => self.nodes.contains(&id),
            EntityId::Edge(id) => self.edges.contains(&id),
        }
    }

    /// Selected node IDs
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Selected edge IDs
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().copied()
    }

    fn insert(&mut self, id: EntityId) -> bool {
        match id {
            EntityId::Node(id) => self.nodes.insert(id),
            EntityId::Edge(id) => self.edges.insert(id),
        }
    }

    fn remove(&mut self, id: EntityId) -> bool {
        match id {
            EntityId::Node(id) => self.nodes.shift_remove(&id),
            EntityId::Edge(id) => self.edges.shift_remove(&id),
        }
    }

    fn clear(&mut self) -> bool {
        let changed = !self.is_empty();
        self.nodes.clear();
        self.edges.clear();
        changed
    }
}

impl SelectionSource for Selection {
    fn selected_ids(&self) -> Vec<EntityId> {
        self.nodes
            .iter()
            .map(|&id| EntityId::Node(id))
            .chain(self.edges.iter().map(|&id| EntityId::Edge(id)))
            .collect()
    }
}

/// A node-graph editor: scene, connection gesture and selection
#[derive(Debug)]
pub struct GraphEditor {
    ctx: EditorContext,
    scene: Scene,
    session: ConnectionSession,
    validator: ValidationEngine,
    selection: Selection,
}

impl GraphEditor {
    /// Create an editor for an empty graph
    pub fn new(name: &str, settings: GraphSettings) -> Self {
        Self::with_context(name, EditorContext::new(name, settings))
    }

    /// Create an editor whose components log under `ctx`
    pub fn with_context(name: &str, ctx: EditorContext) -> Self {
        Self {
            scene: Scene::new(name, &ctx),
            session: ConnectionSession::new(&ctx),
            validator: ValidationEngine::new(&ctx),
            selection: Selection::default(),
            ctx,
        }
    }

    /// Active settings
    pub fn settings(&self) -> &GraphSettings {
        &self.ctx.settings
    }

    /// The scene (graph plus widgets)
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Mutable scene access for collaborators that subscribe to events
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// The graph
    pub fn graph(&self) -> &Graph {
        self.scene.graph()
    }

    /// The widget registry
    pub fn registry(&self) -> &SceneRegistry {
        self.scene.registry()
    }

    /// The connection gesture
    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }

    /// The current selection
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Add a node
    pub fn add_node(&mut self, spec: &NodeSpec) -> Result<NodeId> {
        let id = self.scene.add_node(spec)?;
        let _enter = self.ctx.span().enter();
        tracing::info!(node = %id, name = %spec.name, "created node");
        Ok(id)
    }

    /// Add a node from a catalog template
    pub fn add_node_of_type(
        &mut self,
        catalog: &NodeCatalog,
        node_type: &str,
        x: f32,
        y: f32,
    ) -> Result<NodeId> {
        let spec = catalog
            .spec_for(node_type, x, y)
            .ok_or_else(|| GraphError::InvalidSpec(format!("unknown node type '{node_type}'")))?;
        self.add_node(&spec)
    }

    /// Connect two terminals through the validation rules, as a release
    /// would, evicting according to the settings
    pub fn connect(&mut self, source: &TerminalRef, dest: &TerminalRef) -> Result<EdgeId> {
        let force = self.ctx.settings.force_eviction;
        match self.validator.validate(&mut self.scene, source, dest, force) {
            Verdict::Approved { evicted } => {
                let edge = self.scene.connect(source, dest);
                self.deselect_removed(evicted.into_iter().map(EntityId::Edge));
                edge
            }
            Verdict::Rejected(reason) => Err(reason.into()),
        }
    }

    /// Recreate a saved graph's nodes and edges under their original IDs
    pub fn restore(&mut self, nodes: &[Node], edges: &[Edge]) -> Result<()> {
        self.scene.restore(nodes, edges)?;
        let _enter = self.ctx.span().enter();
        tracing::info!(nodes = nodes.len(), edges = edges.len(), "restored graph");
        Ok(())
    }

    /// Move a node
    pub fn move_node(&mut self, node_id: NodeId, x: f32, y: f32) -> Result<()> {
        self.scene.move_node(node_id, x, y)
    }

    /// Rename a node
    pub fn rename_node(&mut self, node_id: NodeId, name: &str) -> Result<()> {
        self.scene.rename_node(node_id, name)
    }

    /// Remove nodes and edges; removed IDs also leave the selection
    pub fn delete(&mut self, ids: &[EntityId]) -> Result<Vec<EntityId>> {
        let removed = self.scene.remove(ids)?;
        self.deselect_removed(removed.iter().copied());

        let _enter = self.ctx.span().enter();
        tracing::info!(count = removed.len(), "deleted entities");
        Ok(removed)
    }

    /// Remove everything selected
    pub fn delete_selected(&mut self) -> Result<Vec<EntityId>> {
        let ids = self.selection.selected_ids();
        self.delete(&ids)
    }

    /// Flip the enabled flag of every selected node
    pub fn toggle_enabled_selected(&mut self) -> Result<Vec<NodeId>> {
        let nodes: Vec<NodeId> = self.selection.nodes().collect();
        for &node_id in &nodes {
            let enabled = self
                .graph()
                .node(node_id)
                .map(|node| node.enabled)
                .ok_or(GraphError::NotFound(Missing::Node(node_id)))?;
            self.scene.set_node_enabled(node_id, !enabled)?;
        }
        Ok(nodes)
    }

    /// Select a node or edge, optionally adding to the selection.
    ///
    /// Returns false if `id` has no widget.
    pub fn select(&mut self, id: EntityId, add_to_selection: bool) -> bool {
        if !self.scene.registry().contains(id) {
            return false;
        }
        let before = self.selection.selected_ids();
        if !add_to_selection {
            self.selection.clear();
        }
        self.selection.insert(id);
        if self.selection.selected_ids() != before {
            self.scene.notify(GraphEvent::SelectionChanged);
        }
        true
    }

    /// Toggle selection of a node or edge
    pub fn toggle_selection(&mut self, id: EntityId) {
        if self.selection.contains(id) {
            self.selection.remove(id);
        } else if self.scene.registry().contains(id) {
            self.selection.insert(id);
        } else {
            return;
        }
        self.scene.notify(GraphEvent::SelectionChanged);
    }

    /// Clear the selection
    pub fn clear_selection(&mut self) {
        if self.selection.clear() {
            self.scene.notify(GraphEvent::SelectionChanged);
        }
    }

    /// Selected widgets, optionally nodes only
    pub fn selected_widgets(&self, nodes_only: bool) -> Vec<&Widget> {
        self.scene.registry().selected(&self.selection, nodes_only)
    }

    /// Pointer pressed at a scene position
    pub fn press(&mut self, point: Pos2) -> PressOutcome {
        let outcome = self.session.press(&mut self.scene, point);
        if let PressOutcome::PickedUp(edge) = &outcome {
            self.deselect_removed([EntityId::Edge(edge.id)]);
        }
        outcome
    }

    /// Pointer moved to a scene position
    pub fn drag(&mut self, point: Pos2) {
        self.session.drag(point);
    }

    /// Pointer released at a scene position
    pub fn release(&mut self, point: Pos2) -> GestureOutcome {
        let outcome = self.session.release(&mut self.scene, &self.validator, point);
        self.settle_gesture(&outcome);
        outcome
    }

    /// Abort the connection gesture in progress
    pub fn cancel_gesture(&mut self) -> GestureOutcome {
        let outcome = self.session.cancel(&mut self.scene);
        self.settle_gesture(&outcome);
        outcome
    }

    fn settle_gesture(&mut self, outcome: &GestureOutcome) {
        match outcome {
            GestureOutcome::Connected { evicted, .. } => {
                self.deselect_removed(evicted.iter().map(|&id| EntityId::Edge(id)));
            }
            GestureOutcome::Abandoned { lost: Some(edge), .. } => {
                self.deselect_removed([EntityId::Edge(edge.id)]);
            }
            _ => {}
        }
    }

    /// Drop entities that left the graph from the selection
    fn deselect_removed(&mut self, ids: impl IntoIterator<Item = EntityId>) {
        let mut deselected = false;
        for id in ids {
            deselected |= self.selection.remove(id);
        }
        if deselected {
            self.scene.notify(GraphEvent::SelectionChanged);
        }
    }
}
