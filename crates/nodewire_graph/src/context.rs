// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-editor context handed to every component at construction.

use crate::settings::GraphSettings;
use tracing::Span;

/// Settings plus the logging span all components of one editor log under
#[derive(Debug, Clone)]
pub struct EditorContext {
    /// Behavior settings
    pub settings: GraphSettings,
    span: Span,
}

impl EditorContext {
    /// Create a context for the graph called `graph_name`
    pub fn new(graph_name: &str, settings: GraphSettings) -> Self {
        Self {
            settings,
            span: tracing::info_span!("graph_editor", graph = %graph_name),
        }
    }

    /// The span components enter before logging
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Default for EditorContext {
    fn default() -> Self {
        Self::new("Untitled", GraphSettings::default())
    }
}
