// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph plus registry, mutated together.

use crate::context::EditorContext;
use crate::edge::{Edge, EdgeId};
use crate::events::{GraphEvent, SubscriptionId};
use crate::graph::{EntityId, Graph, Result};
use crate::node::{Node, NodeId, NodeSpec};
use crate::registry::SceneRegistry;
use crate::terminal::{Terminal, TerminalRef};
use crate::validation::EdgeStore;
use std::sync::mpsc;

/// A graph and its live widgets.
///
/// Every mutation goes through both halves in the same call, so a widget
/// exists for an ID exactly when the graph holds that ID.
#[derive(Debug)]
pub struct Scene {
    graph: Graph,
    registry: SceneRegistry,
}

impl Scene {
    /// Create an empty scene
    pub fn new(name: impl Into<String>, ctx: &EditorContext) -> Self {
        Self {
            graph: Graph::with_context(name, ctx),
            registry: SceneRegistry::new(ctx),
        }
    }

    /// The underlying graph
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The widget registry
    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    /// Add a node and present its widget
    pub fn add_node(&mut self, spec: &NodeSpec) -> Result<NodeId> {
        let id = self.graph.add_node(spec)?;
        self.registry.present(&self.graph, &[EntityId::Node(id)])?;
        Ok(id)
    }

    /// Add an edge and present its widget.
    ///
    /// No connection rules beyond the graph's own checks are applied here;
    /// see [`ValidationEngine`](crate::validation::ValidationEngine).
    pub fn connect(&mut self, source: &TerminalRef, dest: &TerminalRef) -> Result<EdgeId> {
        let id = self.graph.add_edge(source, dest)?;
        self.registry.present(&self.graph, &[EntityId::Edge(id)])?;
        Ok(id)
    }

    /// Recreate saved nodes and edges under their original IDs and present
    /// their widgets. Stops at the first entity the graph refuses.
    pub fn restore(&mut self, nodes: &[Node], edges: &[Edge]) -> Result<()> {
        for node in nodes {
            self.add_node(&NodeSpec::from_node(node))?;
        }
        for edge in edges {
            let id = self.graph.restore_edge(edge.clone())?;
            self.registry.present(&self.graph, &[EntityId::Edge(id)])?;
        }
        Ok(())
    }

    /// Remove nodes and edges together with their widgets
    pub fn remove(&mut self, ids: &[EntityId]) -> Result<Vec<EntityId>> {
        self.registry.withdraw(&mut self.graph, ids)
    }

    /// Remove one edge and its widget
    pub fn detach_edge(&mut self, edge_id: EdgeId) -> Result<Edge> {
        let edge = self.graph.remove_edge(edge_id)?;
        self.registry.forget_edge(edge_id);
        Ok(edge)
    }

    /// Move a node and lay its widget out again
    pub fn move_node(&mut self, node_id: NodeId, x: f32, y: f32) -> Result<()> {
        self.graph.set_node_position(node_id, x, y)?;
        self.registry.relayout(&self.graph, node_id)
    }

    /// Rename a node and refresh its widget
    pub fn rename_node(&mut self, node_id: NodeId, name: impl Into<String>) -> Result<()> {
        self.graph.rename_node(node_id, name)?;
        self.registry.relayout(&self.graph, node_id)
    }

    /// Enable or disable a node
    pub fn set_node_enabled(&mut self, node_id: NodeId, enabled: bool) -> Result<()> {
        self.graph.set_node_enabled(node_id, enabled)
    }

    /// Register a change callback
    pub fn subscribe(&mut self, callback: impl FnMut(&GraphEvent) + 'static) -> SubscriptionId {
        self.graph.subscribe(callback)
    }

    /// Receive change notifications over a channel
    pub fn subscribe_channel(&mut self) -> mpsc::Receiver<GraphEvent> {
        self.graph.subscribe_channel()
    }

    /// Remove a change callback
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.graph.unsubscribe(id)
    }

    pub(crate) fn notify(&mut self, event: GraphEvent) {
        self.graph.emit(event);
    }

    /// Whether every graph entity has a widget and every widget an entity
    pub fn is_synchronized(&self) -> bool {
        let graph_ids = self
            .graph
            .all_nodes()
            .map(|n| EntityId::Node(n.id))
            .chain(self.graph.all_edges().map(|e| EntityId::Edge(e.id)));
        let mut count = 0;
        for id in graph_ids {
            if !self.registry.contains(id) {
                return false;
            }
            count += 1;
        }
        count == self.registry.len()
    }
}

impl EdgeStore for Scene {
    fn terminal(&self, terminal: &TerminalRef) -> Option<&Terminal> {
        self.graph.terminal(terminal)
    }

    fn evict_edge(&mut self, edge_id: EdgeId) -> Result<Edge> {
        self.detach_edge(edge_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::TerminalSpec;
    use crate::validation::{ValidationEngine, Verdict};

    #[test]
    fn test_lock_step() {
        let ctx = EditorContext::default();
        let mut scene = Scene::new("test", &ctx);
        let a = scene.add_node(&NodeSpec::new("A").with_output("out")).unwrap();
        let b = scene.add_node(&NodeSpec::new("B").with_input("in")).unwrap();
        let edge = scene
            .connect(&TerminalRef::new(a, "out"), &TerminalRef::new(b, "in"))
            .unwrap();
        assert!(scene.is_synchronized());
        assert!(scene.registry().contains(EntityId::Edge(edge)));

        scene.move_node(a, 50.0, 50.0).unwrap();
        assert_eq!(scene.registry().node_widget(a).unwrap().rect.min.x, 50.0);

        scene.remove(&[EntityId::Node(a)]).unwrap();
        assert!(scene.is_synchronized());
        assert_eq!(scene.registry().len(), 1);
    }

    #[test]
    fn test_eviction_through_scene_drops_widget() {
        let ctx = EditorContext::default();
        let mut scene = Scene::new("test", &ctx);
        let c = scene
            .add_node(&NodeSpec::new("C").with_terminal(TerminalSpec::input("in").exclusive()))
            .unwrap();
        let d = scene.add_node(&NodeSpec::new("D").with_output("out")).unwrap();
        let e = scene.add_node(&NodeSpec::new("E").with_output("out")).unwrap();
        let c_in = TerminalRef::new(c, "in");
        let old = scene.connect(&TerminalRef::new(d, "out"), &c_in).unwrap();

        let validator = ValidationEngine::new(&ctx);
        let verdict = validator.validate(&mut scene, &TerminalRef::new(e, "out"), &c_in, true);

        assert_eq!(verdict, Verdict::Approved { evicted: vec![old] });
        assert!(!scene.registry().contains(EntityId::Edge(old)));
        assert!(scene.is_synchronized());
    }

    #[test]
    fn test_restore_presents_saved_entities() {
        let ctx = EditorContext::default();
        let mut scene = Scene::new("saved", &ctx);
        let a = scene.add_node(&NodeSpec::new("A").with_output("out")).unwrap();
        let b = scene
            .add_node(&NodeSpec::new("B").with_position(400.0, 0.0).with_input("in"))
            .unwrap();
        let edge = scene
            .connect(&TerminalRef::new(a, "out"), &TerminalRef::new(b, "in"))
            .unwrap();
        let nodes: Vec<Node> = scene.graph().all_nodes().cloned().collect();
        let edges: Vec<Edge> = scene.graph().all_edges().cloned().collect();

        let mut loaded = Scene::new("loaded", &ctx);
        loaded.restore(&nodes, &edges).unwrap();

        assert!(loaded.is_synchronized());
        assert_eq!(loaded.registry().len(), 3);
        assert!(loaded.registry().contains(EntityId::Edge(edge)));
        assert_eq!(
            loaded.registry().edge_line(edge),
            scene.registry().edge_line(edge)
        );
    }
}
