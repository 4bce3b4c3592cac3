// SPDX-License-Identifier: MIT OR Apache-2.0
//! Press/drag/release state machine for drawing connections.
//!
//! A press on an output terminal starts a provisional line. A press on an
//! input carrying exactly one edge picks that edge up: it is removed at once
//! and the line restarts from its surviving (output) end, so the user can
//! drop it somewhere else. On release the two ends are hit-tested and, if
//! validation approves, the edge is created.
//!
//! A picked-up edge that is dropped on nothing valid is gone. Set
//! [`GraphSettings::restore_detached_edge`](crate::settings::GraphSettings)
//! to re-create it instead.

use crate::context::EditorContext;
use crate::edge::{Edge, EdgeId};
use crate::graph::GraphError;
use crate::scene::Scene;
use crate::terminal::{TerminalDirection, TerminalRef};
use crate::validation::{ValidationEngine, Verdict};
use egui::Pos2;
use tracing::Span;

/// An uncommitted line being drawn
#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    /// Fixed end: center of the terminal the line starts from
    pub origin: Pos2,
    /// Free end: last pointer position
    pub endpoint: Pos2,
    /// Edge that was picked up from an input to start this line
    pub detached: Option<Edge>,
}

/// Session state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// No gesture in progress
    #[default]
    Idle,
    /// A provisional line is being drawn
    Drawing(Drawing),
}

/// What a press did
#[derive(Debug, Clone, PartialEq)]
pub enum PressOutcome {
    /// Nothing: not a terminal, an input with zero or several edges, or a
    /// line is already being drawn
    Ignored,
    /// Started a new line from an output
    Started,
    /// Picked up the only edge of an input; it is no longer in the graph
    PickedUp(Edge),
}

/// What a release did
#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    /// No line was being drawn
    Ignored,
    /// A new edge was created
    Connected {
        /// The new edge
        edge: EdgeId,
        /// Edges evicted from a non-connectable destination
        evicted: Vec<EdgeId>,
    },
    /// The line was discarded without creating an edge
    Abandoned {
        /// Why, if the line ended on two terminals that could not connect
        reason: Option<GraphError>,
        /// Picked-up edge that is now lost
        lost: Option<Edge>,
    },
    /// The line was discarded and the picked-up edge re-created
    Restored {
        /// The re-created edge
        edge: EdgeId,
    },
}

/// Drives one connection gesture at a time
#[derive(Debug)]
pub struct ConnectionSession {
    state: SessionState,
    force_eviction: bool,
    restore_detached_edge: bool,
    span: Span,
}

impl ConnectionSession {
    /// Create an idle session configured from `ctx`
    pub fn new(ctx: &EditorContext) -> Self {
        Self {
            state: SessionState::Idle,
            force_eviction: ctx.settings.force_eviction,
            restore_detached_edge: ctx.settings.restore_detached_edge,
            span: ctx.span().clone(),
        }
    }

    /// Current state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Whether a line is being drawn
    pub fn is_drawing(&self) -> bool {
        matches!(self.state, SessionState::Drawing(_))
    }

    /// The provisional line (origin, endpoint) for the renderer
    pub fn provisional_line(&self) -> Option<(Pos2, Pos2)> {
        match &self.state {
            SessionState::Drawing(d) => Some((d.origin, d.endpoint)),
            SessionState::Idle => None,
        }
    }

    /// Pointer pressed at `point` (scene space)
    pub fn press(&mut self, scene: &mut Scene, point: Pos2) -> PressOutcome {
        if self.is_drawing() {
            return PressOutcome::Ignored;
        }
        let Some(widget) = scene.registry().terminal_at(point) else {
            return PressOutcome::Ignored;
        };
        let terminal = widget.terminal.clone();
        let (direction, center) = (widget.direction, widget.center);

        match direction {
            TerminalDirection::Output => {
                self.state = SessionState::Drawing(Drawing {
                    origin: center,
                    endpoint: point,
                    detached: None,
                });
                PressOutcome::Started
            }
            TerminalDirection::Input => self.pick_up(scene, &terminal, point),
        }
    }

    fn pick_up(&mut self, scene: &mut Scene, input: &TerminalRef, point: Pos2) -> PressOutcome {
        let attached: Vec<EdgeId> = scene
            .graph()
            .terminal(input)
            .map(|t| t.edges().collect())
            .unwrap_or_default();
        let &[edge_id] = attached.as_slice() else {
            return PressOutcome::Ignored;
        };

        let _enter = self.span.enter();
        let origin = scene
            .graph()
            .edge(edge_id)
            .and_then(|edge| edge.opposite(input))
            .and_then(|surviving| scene.registry().terminal_widget(surviving))
            .map(|w| w.center);
        let Some(origin) = origin else {
            tracing::warn!(edge = %edge_id, "surviving end of edge has no widget");
            return PressOutcome::Ignored;
        };

        match scene.detach_edge(edge_id) {
            Ok(edge) => {
                tracing::debug!(edge = %edge_id, "picked up {}", edge);
                self.state = SessionState::Drawing(Drawing {
                    origin,
                    endpoint: point,
                    detached: Some(edge.clone()),
                });
                PressOutcome::PickedUp(edge)
            }
            Err(e) => {
                tracing::warn!(edge = %edge_id, "could not detach edge: {e}");
                PressOutcome::Ignored
            }
        }
    }

    /// Pointer moved to `point`; only the provisional line changes
    pub fn drag(&mut self, point: Pos2) {
        if let SessionState::Drawing(drawing) = &mut self.state {
            drawing.endpoint = point;
        }
    }

    /// Pointer released at `point`; always ends in [`SessionState::Idle`].
    ///
    /// Both ends are resolved by hit-testing at release time: the source is
    /// the topmost terminal at the line's origin, which is not necessarily
    /// the terminal the line started from when terminals overlap there.
    pub fn release(
        &mut self,
        scene: &mut Scene,
        validator: &ValidationEngine,
        point: Pos2,
    ) -> GestureOutcome {
        let SessionState::Drawing(drawing) = std::mem::take(&mut self.state) else {
            return GestureOutcome::Ignored;
        };

        let source = scene.registry().terminal_at(drawing.origin).map(|w| w.terminal.clone());
        let dest = scene.registry().terminal_at(point).map(|w| w.terminal.clone());

        let reason = match (source, dest) {
            (Some(source), Some(dest)) if source != dest => {
                match validator.validate(scene, &source, &dest, self.force_eviction) {
                    Verdict::Approved { evicted } => match scene.connect(&source, &dest) {
                        Ok(edge) => return GestureOutcome::Connected { edge, evicted },
                        Err(e) => Some(e),
                    },
                    Verdict::Rejected(reason) => Some(reason.into()),
                }
            }
            _ => None,
        };
        self.abandon(scene, drawing.detached, reason)
    }

    /// Abort the gesture as if released over empty space
    pub fn cancel(&mut self, scene: &mut Scene) -> GestureOutcome {
        match std::mem::take(&mut self.state) {
            SessionState::Drawing(drawing) => self.abandon(scene, drawing.detached, None),
            SessionState::Idle => GestureOutcome::Ignored,
        }
    }

    fn abandon(
        &self,
        scene: &mut Scene,
        detached: Option<Edge>,
        reason: Option<GraphError>,
    ) -> GestureOutcome {
        let _enter = self.span.enter();
        if let Some(reason) = &reason {
            tracing::debug!("discarding provisional line: {reason}");
        }
        let Some(edge) = detached else {
            return GestureOutcome::Abandoned { reason, lost: None };
        };

        if self.restore_detached_edge {
            match scene.connect(&edge.source, &edge.dest) {
                Ok(restored) => {
                    tracing::debug!(edge = %restored, "restored {}", edge);
                    return GestureOutcome::Restored { edge: restored };
                }
                Err(e) => tracing::warn!("could not restore {}: {e}", edge),
            }
        }
        tracing::warn!(edge = %edge.id, "connection lost: {}", edge);
        GestureOutcome::Abandoned {
            reason,
            lost: Some(edge),
        }
    }
}
