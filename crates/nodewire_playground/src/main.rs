// SPDX-License-Identifier: MIT OR Apache-2.0
//! `nodewire` playground.
//!
//! Builds a small graph, replays a pick-up-and-retarget gesture through the
//! editor, prints the resulting graph as RON and loads that text back into a
//! fresh editor. Pass a settings file path
//! to override the defaults, e.g. `nodewire_playground settings.ron`.
//! Logging honours `RUST_LOG`.

use nodewire_graph::{
    Edge, GraphEditor, GraphError, GraphEvent, GraphSettings, Missing, Node, NodeSpec, Pos2,
    SettingsError, TerminalRef, TerminalSpec,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Error)]
enum PlaygroundError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Failed to export graph: {0}")]
    Export(#[from] ron::Error),

    #[error("Failed to import graph: {0}")]
    Import(#[from] ron::error::SpannedError),
}

/// Snapshot written by the stand-in persistence layer
#[derive(Serialize, Deserialize)]
struct GraphDump {
    name: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

fn main() {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "nodewire_graph=debug".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting nodewire playground v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(std::env::args_os().nth(1).map(PathBuf::from)) {
        tracing::error!("Playground failed: {e}");
        std::process::exit(1);
    }
}

fn run(settings_path: Option<PathBuf>) -> Result<(), PlaygroundError> {
    let settings = match settings_path {
        Some(path) => {
            tracing::info!("Loading settings from {:?}", path);
            GraphSettings::load(&path)?
        }
        None => GraphSettings::default(),
    };

    let mut editor = GraphEditor::new("playground", settings);
    let events = editor.scene_mut().subscribe_channel();

    let noise = editor.add_node(&NodeSpec::new("Noise").with_output("value"))?;
    let blur = editor.add_node(
        &NodeSpec::new("Blur")
            .with_position(300.0, 0.0)
            .with_input("image")
            .with_output("result"),
    )?;
    let preview = editor.add_node(
        &NodeSpec::new("Preview")
            .with_position(300.0, 200.0)
            .with_terminal(TerminalSpec::input("image").exclusive()),
    )?;
    editor.connect(&TerminalRef::new(noise, "value"), &TerminalRef::new(blur, "image"))?;

    // Pick the edge up from Blur.image and drop it on Preview.image
    let pick = terminal_center(&editor, &TerminalRef::new(blur, "image"))?;
    let drop = terminal_center(&editor, &TerminalRef::new(preview, "image"))?;
    let pressed = editor.press(pick);
    editor.drag(Pos2::new((pick.x + drop.x) / 2.0, (pick.y + drop.y) / 2.0));
    let released = editor.release(drop);
    tracing::info!("press: {pressed:?}");
    tracing::info!("release: {released:?}");

    for event in events.try_iter() {
        match event {
            GraphEvent::NodeChanged(node) => tracing::info!("event: node changed {}", node.name),
            other => tracing::info!("event: {other:?}"),
        }
    }

    let graph = editor.graph();
    let dump = GraphDump {
        name: graph.name.clone(),
        nodes: graph.all_nodes().cloned().collect(),
        edges: graph.all_edges().cloned().collect(),
    };
    let config = ron::ser::PrettyConfig::default().struct_names(true);
    let saved = ron::ser::to_string_pretty(&dump, config)?;
    println!("{saved}");

    let loaded: GraphDump = ron::from_str(&saved)?;
    let mut reloaded = GraphEditor::new(&loaded.name, editor.settings().clone());
    reloaded.restore(&loaded.nodes, &loaded.edges)?;
    tracing::info!(
        nodes = reloaded.graph().node_count(),
        edges = reloaded.graph().edge_count(),
        "reloaded {}",
        loaded.name
    );
    Ok(())
}

fn terminal_center(editor: &GraphEditor, terminal: &TerminalRef) -> Result<Pos2, GraphError> {
    editor
        .registry()
        .terminal_widget(terminal)
        .map(|w| w.center)
        .ok_or_else(|| GraphError::NotFound(Missing::Terminal(terminal.clone())))
}
