// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edge definitions for the graph.

use crate::node::NodeId;
use crate::terminal::TerminalRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub Uuid);

impl EdgeId {
    /// Create a new random edge ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A directed edge from an output terminal to an input terminal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique edge ID
    pub id: EdgeId,
    /// Output terminal the edge leaves from
    pub source: TerminalRef,
    /// Input terminal the edge arrives at
    pub dest: TerminalRef,
}

impl Edge {
    pub(crate) fn new(source: TerminalRef, dest: TerminalRef) -> Self {
        Self {
            id: EdgeId::new(),
            source,
            dest,
        }
    }

    /// Check if this edge touches a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.source.node == node_id || self.dest.node == node_id
    }

    /// Check if this edge touches a specific terminal
    pub fn involves_terminal(&self, terminal: &TerminalRef) -> bool {
        self.source == *terminal || self.dest == *terminal
    }

    /// The endpoint that is not `terminal`, if `terminal` is one of the two
    pub fn opposite(&self, terminal: &TerminalRef) -> Option<&TerminalRef> {
        if self.source == *terminal {
            Some(&self.dest)
        } else if self.dest == *terminal {
            Some(&self.source)
        } else {
            None
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} >> {}", self.source, self.dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite() {
        let a = NodeId::new();
        let b = NodeId::new();
        let edge = Edge::new(TerminalRef::new(a, "out"), TerminalRef::new(b, "in"));

        assert_eq!(edge.opposite(&TerminalRef::new(b, "in")), Some(&edge.source));
        assert_eq!(edge.opposite(&TerminalRef::new(a, "out")), Some(&edge.dest));
        assert_eq!(edge.opposite(&TerminalRef::new(b, "other")), None);
        assert!(edge.involves_node(a));
        assert!(!edge.involves_node(NodeId::new()));
    }
}
