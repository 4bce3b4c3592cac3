// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection validation rules.

use crate::context::EditorContext;
use crate::edge::{Edge, EdgeId};
use crate::graph::{Graph, GraphError, Missing, Result};
use crate::terminal::{Terminal, TerminalDirection, TerminalRef};
use std::fmt;
use tracing::Span;

/// Storage the validator reads terminals from and evicts edges through.
///
/// Implemented by [`Graph`] for model-only use and by
/// [`Scene`](crate::scene::Scene), which also drops the evicted edge widgets.
pub trait EdgeStore {
    /// Resolve a terminal reference
    fn terminal(&self, terminal: &TerminalRef) -> Option<&Terminal>;

    /// Remove an edge to make room for a new connection
    fn evict_edge(&mut self, edge_id: EdgeId) -> Result<Edge>;
}

impl EdgeStore for Graph {
    fn terminal(&self, terminal: &TerminalRef) -> Option<&Terminal> {
        Graph::terminal(self, terminal)
    }

    fn evict_edge(&mut self, edge_id: EdgeId) -> Result<Edge> {
        self.remove_edge(edge_id)
    }
}

/// Why a candidate connection was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// One of the terminals does not exist
    MissingTerminal(TerminalRef),
    /// Source is not an output or destination is not an input
    InvalidDirection,
    /// Both terminals are on the same node
    SameNode,
    /// Destination is taken and eviction was not forced
    NotConnectable,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTerminal(terminal) => write!(f, "terminal {terminal} does not exist"),
            Self::InvalidDirection => f.write_str("invalid direction"),
            Self::SameNode => f.write_str("same node"),
            Self::NotConnectable => f.write_str("not connectable"),
        }
    }
}

impl From<RejectReason> for GraphError {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::MissingTerminal(terminal) => Self::NotFound(Missing::Terminal(terminal)),
            RejectReason::InvalidDirection => Self::InvalidDirection,
            RejectReason::SameNode => Self::SameNode,
            RejectReason::NotConnectable => Self::NotConnectable,
        }
    }
}

/// Outcome of [`ValidationEngine::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The pair may be connected; `evicted` lists edges removed to make room
    Approved {
        /// Edges removed from the destination
        evicted: Vec<EdgeId>,
    },
    /// The pair may not be connected
    Rejected(RejectReason),
}

impl Verdict {
    /// Whether the connection was approved
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }
}

/// Decides whether two terminals may be connected
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    span: Span,
}

impl ValidationEngine {
    /// Create a validator logging under `ctx`
    pub fn new(ctx: &EditorContext) -> Self {
        Self {
            span: ctx.span().clone(),
        }
    }

    /// Check whether `source` may be connected to `dest`.
    ///
    /// Rules run in order: both terminals exist, source is an output and
    /// dest an input, the two are on different nodes, and finally the
    /// destination's connectable limit. Only the last rule has a side
    /// effect: with `force`, every edge already on a non-connectable
    /// destination is evicted. Eviction failures are logged and do not
    /// change the verdict.
    pub fn validate(
        &self,
        store: &mut impl EdgeStore,
        source: &TerminalRef,
        dest: &TerminalRef,
        force: bool,
    ) -> Verdict {
        let _enter = self.span.enter();

        let Some(source_terminal) = store.terminal(source) else {
            return Verdict::Rejected(RejectReason::MissingTerminal(source.clone()));
        };
        let source_direction = source_terminal.direction();
        let Some(dest_terminal) = store.terminal(dest) else {
            return Verdict::Rejected(RejectReason::MissingTerminal(dest.clone()));
        };

        if source_direction != TerminalDirection::Output
            || dest_terminal.direction() != TerminalDirection::Input
        {
            tracing::debug!(%source, %dest, "rejected: invalid connection order");
            return Verdict::Rejected(RejectReason::InvalidDirection);
        }
        if source.node == dest.node {
            tracing::debug!(%source, %dest, "rejected: same node connection");
            return Verdict::Rejected(RejectReason::SameNode);
        }

        if dest_terminal.connectable || dest_terminal.edge_count() == 0 {
            return Verdict::Approved { evicted: Vec::new() };
        }
        if !force {
            tracing::warn!(%dest, "terminal is not connectable");
            return Verdict::Rejected(RejectReason::NotConnectable);
        }

        let occupying: Vec<EdgeId> = dest_terminal.edges().collect();
        let mut evicted = Vec::with_capacity(occupying.len());
        for edge_id in occupying {
            tracing::warn!(edge = %edge_id, %dest, "forcing edge removal");
            match store.evict_edge(edge_id) {
                Ok(_) => evicted.push(edge_id),
                Err(e) => tracing::warn!(edge = %edge_id, "edge removal failed: {e}"),
            }
        }
        Verdict::Approved { evicted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeSpec;
    use crate::terminal::TerminalSpec;

    struct Fixture {
        graph: Graph,
        validator: ValidationEngine,
        d_out: TerminalRef,
        e_out: TerminalRef,
        c_in: TerminalRef,
        existing: EdgeId,
    }

    /// C.in is exclusive and already fed by D.out; E.out is a second source.
    fn fixture() -> Fixture {
        let ctx = EditorContext::default();
        let mut graph = Graph::with_context("test", &ctx);
        let c = graph
            .add_node(&NodeSpec::new("C").with_terminal(TerminalSpec::input("in").exclusive()))
            .unwrap();
        let d = graph.add_node(&NodeSpec::new("D").with_output("out")).unwrap();
        let e = graph.add_node(&NodeSpec::new("E").with_output("out")).unwrap();
        let c_in = TerminalRef::new(c, "in");
        let d_out = TerminalRef::new(d, "out");
        let existing = graph.add_edge(&d_out, &c_in).unwrap();
        Fixture {
            graph,
            validator: ValidationEngine::new(&ctx),
            d_out,
            e_out: TerminalRef::new(e, "out"),
            c_in,
            existing,
        }
    }

    #[test]
    fn test_forced_eviction() {
        let mut f = fixture();
        let verdict = f.validator.validate(&mut f.graph, &f.e_out, &f.c_in, true);

        assert_eq!(verdict, Verdict::Approved { evicted: vec![f.existing] });
        assert!(f.graph.edge(f.existing).is_none());
        assert_eq!(f.graph.terminal(&f.d_out).unwrap().edge_count(), 0);
        f.graph.assert_consistent();
    }

    #[test]
    fn test_unforced_rejects_and_keeps_edge() {
        let mut f = fixture();
        let verdict = f.validator.validate(&mut f.graph, &f.e_out, &f.c_in, false);

        assert_eq!(verdict, Verdict::Rejected(RejectReason::NotConnectable));
        assert!(f.graph.edge(f.existing).is_some());
    }

    #[test]
    fn test_doomed_connection_never_evicts() {
        let mut f = fixture();

        // Wrong direction: input as source
        let verdict = f.validator.validate(&mut f.graph, &f.c_in, &f.c_in, true);
        assert_eq!(verdict, Verdict::Rejected(RejectReason::InvalidDirection));

        // Same node: give C an output and aim it at its own exclusive input
        let c = f.c_in.node;
        let mut graph = Graph::new("same");
        let node = graph
            .add_node(
                &NodeSpec::new("C")
                    .with_terminal(TerminalSpec::input("in").exclusive())
                    .with_output("out"),
            )
            .unwrap();
        let feeder = graph.add_node(&NodeSpec::new("F").with_output("out")).unwrap();
        let fed = graph
            .add_edge(&TerminalRef::new(feeder, "out"), &TerminalRef::new(node, "in"))
            .unwrap();
        let verdict = f.validator.validate(
            &mut graph,
            &TerminalRef::new(node, "out"),
            &TerminalRef::new(node, "in"),
            true,
        );
        assert_eq!(verdict, Verdict::Rejected(RejectReason::SameNode));
        assert!(graph.edge(fed).is_some());

        assert!(f.graph.edge(f.existing).is_some());
        assert_eq!(f.graph.node(c).map(|n| n.name.as_str()), Some("C"));
    }

    #[test]
    fn test_missing_terminal() {
        let mut f = fixture();
        let ghost = TerminalRef::new(f.c_in.node, "ghost");
        let verdict = f.validator.validate(&mut f.graph, &f.e_out, &ghost, true);
        assert_eq!(verdict, Verdict::Rejected(RejectReason::MissingTerminal(ghost.clone())));
        assert_eq!(
            GraphError::from(RejectReason::MissingTerminal(ghost.clone())),
            GraphError::NotFound(Missing::Terminal(ghost))
        );
    }

    #[test]
    fn test_connectable_input_approves_without_eviction() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(&NodeSpec::new("A").with_output("out")).unwrap();
        let b = graph.add_node(&NodeSpec::new("B").with_output("out")).unwrap();
        let sink = graph.add_node(&NodeSpec::new("S").with_input("in")).unwrap();
        let sink_in = TerminalRef::new(sink, "in");
        graph.add_edge(&TerminalRef::new(a, "out"), &sink_in).unwrap();

        let validator = ValidationEngine::new(&EditorContext::default());
        let verdict = validator.validate(&mut graph, &TerminalRef::new(b, "out"), &sink_in, false);
        assert_eq!(verdict, Verdict::Approved { evicted: Vec::new() });
        assert_eq!(graph.edge_count(), 1);
    }

    /// Store whose evictions always fail
    struct StubbornStore(Graph);

    impl EdgeStore for StubbornStore {
        fn terminal(&self, terminal: &TerminalRef) -> Option<&Terminal> {
            self.0.terminal(terminal)
        }

        fn evict_edge(&mut self, edge_id: EdgeId) -> Result<Edge> {
            Err(GraphError::NotFound(Missing::Edge(edge_id)))
        }
    }

    #[test]
    fn test_eviction_failure_is_not_fatal() {
        let f = fixture();
        let mut store = StubbornStore(f.graph);
        let verdict = f.validator.validate(&mut store, &f.e_out, &f.c_in, true);

        assert_eq!(verdict, Verdict::Approved { evicted: Vec::new() });
        assert!(store.0.edge(f.existing).is_some());
    }
}
