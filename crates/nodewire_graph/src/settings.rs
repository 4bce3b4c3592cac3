// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor settings, stored as RON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Settings errors
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading or writing the file failed
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid RON for [`GraphSettings`]
    #[error("Invalid settings file: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serializing the settings failed
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] ron::Error),
}

/// Behavior knobs for the connection core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Evict existing edges on a non-connectable input instead of rejecting
    pub force_eviction: bool,
    /// Re-create an edge picked up from an input when the re-target fails.
    ///
    /// Off by default: a failed re-target loses the edge.
    pub restore_detached_edge: bool,
    /// Pointer distance (scene units) within which a terminal is hit
    pub terminal_hit_radius: f32,
    /// Pointer distance (scene units) within which an edge line is hit
    pub edge_hit_tolerance: f32,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            force_eviction: true,
            restore_detached_edge: false,
            terminal_hit_radius: 8.0,
            edge_hit_tolerance: 4.0,
        }
    }
}

impl GraphSettings {
    /// Load settings from a RON file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&content)?)
    }

    /// Save settings to a RON file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
