// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection core for the `nodewire` node-graph editor.
//!
//! Users create nodes, expose input/output terminals on them and draw
//! directed edges between terminals. This crate provides:
//! - The graph model (nodes, terminals, edges) and its mutation API
//! - A registry keeping live widgets in sync with the graph
//! - Connection validation with forced eviction
//! - The press/drag/release state machine that turns a gesture into an edge
//!
//! ## Architecture
//!
//! Entities refer to each other by ID only; terminals are addressed by
//! [`TerminalRef`] (node ID plus terminal name) and resolved through the
//! [`Graph`]. Rendering, viewport navigation and persistence live outside
//! this crate and talk to it through [`GraphEditor`], the enumeration API of
//! [`Graph`] and [`GraphEvent`] notifications.

pub mod context;
pub mod edge;
pub mod editor;
pub mod events;
pub mod graph;
pub mod node;
pub mod registry;
pub mod scene;
pub mod session;
pub mod settings;
pub mod terminal;
pub mod validation;

pub use context::EditorContext;
pub use edge::{Edge, EdgeId};
pub use editor::{GraphEditor, Selection};
pub use events::{GraphEvent, SubscriptionId};
pub use graph::{Entity, EntityId, Graph, GraphError, Missing, RemovedNode};
pub use node::{Node, NodeCatalog, NodeId, NodeSpec};
pub use registry::{Hit, SceneRegistry, SelectionSource, Widget};
pub use scene::Scene;
pub use session::{ConnectionSession, GestureOutcome, PressOutcome, SessionState};
pub use settings::{GraphSettings, SettingsError};
pub use terminal::{Terminal, TerminalDirection, TerminalRef, TerminalSpec};
pub use validation::{EdgeStore, RejectReason, ValidationEngine, Verdict};

/// Geometry types used for scene-space positions
pub use egui::{Pos2, Rect};
