// SPDX-License-Identifier: MIT OR Apache-2.0
//! Terminal definitions for node inputs/outputs.

use crate::edge::EdgeId;
use crate::node::NodeId;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminalDirection {
    /// Accepts edges
    Input,
    /// Emits edges
    Output,
}

impl TerminalDirection {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

/// Stable reference to a terminal: owning node plus terminal name.
///
/// Terminals never hold a pointer back to their node; everything that needs
/// to cross from a terminal to its node goes through this reference and a
/// lookup in the [`Graph`](crate::graph::Graph).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TerminalRef {
    /// Owning node
    pub node: NodeId,
    /// Terminal name, unique within the node
    pub name: String,
}

impl TerminalRef {
    /// Create a new terminal reference
    pub fn new(node: NodeId, name: impl Into<String>) -> Self {
        Self {
            node,
            name: name.into(),
        }
    }
}

impl fmt::Display for TerminalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.name)
    }
}

/// Construction request for a terminal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalSpec {
    /// Terminal name
    pub name: String,
    /// Terminal direction
    pub direction: TerminalDirection,
    /// Whether more than one edge may attach
    pub connectable: bool,
}

impl TerminalSpec {
    /// Create a new input terminal spec
    pub fn input(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: TerminalDirection::Input,
            connectable: true,
        }
    }

    /// Create a new output terminal spec
    pub fn output(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: TerminalDirection::Output,
            connectable: true,
        }
    }

    /// Mark as non-connectable: a new edge evicts the existing one
    pub fn exclusive(mut self) -> Self {
        self.connectable = false;
        self
    }
}

/// A connection point on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Terminal {
    name: String,
    direction: TerminalDirection,
    /// When false, accepting a new edge evicts the existing ones
    pub connectable: bool,
    edges: IndexSet<EdgeId>,
}

impl Terminal {
    /// Create a terminal from its spec
    pub fn new(spec: &TerminalSpec) -> Self {
        Self {
            name: spec.name.clone(),
            direction: spec.direction,
            connectable: spec.connectable,
            edges: IndexSet::new(),
        }
    }

    /// Terminal name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Terminal direction; fixed for the lifetime of the terminal
    pub fn direction(&self) -> TerminalDirection {
        self.direction
    }

    /// Is this an input terminal
    pub fn is_input(&self) -> bool {
        self.direction == TerminalDirection::Input
    }

    /// Is this an output terminal
    pub fn is_output(&self) -> bool {
        self.direction == TerminalDirection::Output
    }

    /// Edges currently attached
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().copied()
    }

    /// Number of attached edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Check whether an edge is attached
    pub fn has_edge(&self, edge: EdgeId) -> bool {
        self.edges.contains(&edge)
    }

    /// Whether a new edge can attach without evicting anything.
    ///
    /// Outputs always fan out.
    pub fn accepts_more(&self) -> bool {
        self.is_output() || self.connectable || self.edges.is_empty()
    }

    pub(crate) fn attach(&mut self, edge: EdgeId) {
        self.edges.insert(edge);
    }

    pub(crate) fn detach(&mut self, edge: EdgeId) -> bool {
        self.edges.shift_remove(&edge)
    }
}
