// SPDX-License-Identifier: MIT OR Apache-2.0
//! nodeflow - headless host for node graph scenes.
//!
//! Loads calculator scenes saved as JSON, evaluates them and prints every
//! node's state. Scenes can be edited from the command line, and `watch`
//! keeps a live graph in sync with a file that another program rewrites.
//!
//! ## Architecture
//!
//! All graph semantics live in `nodeflow_graph`. This binary only wires a
//! [`session::Session`] (graph, history and backing file) to the command
//! line, the RON configuration and the file watcher.

mod config;
mod error;
mod file_watcher;
mod session;

use clap::{Parser, Subcommand};
use config::{AppConfig, CONFIG_FILE_NAME};
use error::Result;
use file_watcher::{FileEvent, FileWatcher, FileWatcherConfig};
use nodeflow_graph::NodeId;
use session::Session;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// How long the watch loop blocks before checking again
const WATCH_TICK: Duration = Duration::from_millis(500);

/// nodeflow - evaluate, edit and live-reload node graph scenes
#[derive(Parser)]
#[command(name = "nodeflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./nodeflow.ron when present)
    #[arg(short, long, env = "NODEFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a scene, evaluate it and print every node
    Eval {
        /// Path to the scene JSON file
        file: PathBuf,
    },

    /// Keep a scene loaded and reconcile it whenever the file changes
    Watch {
        /// Path to the scene JSON file
        file: PathBuf,
    },

    /// Write the sample calculator scene
    Demo {
        /// Where to write the scene
        file: PathBuf,
    },

    /// Change the text of an input node
    Set {
        /// Path to the scene JSON file
        file: PathBuf,

        /// ID of the input node
        node_id: u64,

        /// New value text
        value: String,
    },

    /// Copy nodes and the edges between them, pasting at the configured cursor
    Duplicate {
        /// Path to the scene JSON file
        file: PathBuf,

        /// IDs of the nodes to copy
        #[arg(required = true)]
        node_ids: Vec<u64>,
    },

    /// Write the active configuration to a file
    InitConfig {
        /// Where to write it
        #[arg(default_value = CONFIG_FILE_NAME)]
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("nodeflow: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config, cli.verbose);
    tracing::debug!("Starting nodeflow v{}", env!("CARGO_PKG_VERSION"));

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins over the configured filter; `-v` raises our crates to
/// debug and `-vv` to trace.
fn init_tracing(config: &AppConfig, verbose: u8) {
    let mut env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    let level = match verbose {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    };
    if let Some(level) = level {
        for target in ["nodeflow_graph", "nodeflow_app"] {
            match format!("{target}={level}").parse() {
                Ok(directive) => env_filter = env_filter.add_directive(directive),
                Err(e) => eprintln!("nodeflow: bad log directive: {e}"),
            }
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(command: Commands, config: &AppConfig) -> Result<()> {
    match command {
        Commands::Eval { file } => {
            let session = Session::open(file, config)?;
            print_report(&session);
        }
        Commands::Watch { file } => watch(file, config)?,
        Commands::Demo { file } => {
            let session = Session::create_demo(file, config)?;
            println!(
                "Wrote {} ({} nodes, {} edges)",
                session.path().display(),
                session.graph().node_count(),
                session.graph().edge_count()
            );
            print_report(&session);
        }
        Commands::Set { file, node_id, value } => {
            let mut session = Session::open(file, config)?;
            session.set_input(NodeId(node_id), &value)?;
            if let Some(description) = session.history().undo_description() {
                tracing::info!("{description}");
            }
            print_report(&session);
        }
        Commands::Duplicate { file, node_ids } => {
            let mut session = Session::open(file, config)?;
            let nodes: Vec<NodeId> = node_ids.into_iter().map(NodeId).collect();
            let pasted = session.duplicate(&nodes, config.paste_cursor)?;
            for id in pasted {
                println!("{}", id.0);
            }
        }
        Commands::InitConfig { path } => {
            config.save(&path)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

fn print_report(session: &Session) {
    for line in session.report() {
        println!("{line}");
    }
}

fn watch(file: PathBuf, config: &AppConfig) -> Result<()> {
    let mut session = Session::open(file, config)?;
    let mut watcher = FileWatcher::new(FileWatcherConfig::for_scenes(config.watch_debounce()))?;
    watcher.watch_file(session.path())?;
    print_report(&session);

    loop {
        for event in watcher.wait_events(WATCH_TICK) {
            match event {
                FileEvent::Modified(path) => {
                    tracing::info!("{} changed, reloading", path.display());
                    match session.reload() {
                        Ok(()) => print_report(&session),
                        Err(e) => tracing::error!("Reload failed: {e}"),
                    }
                }
                FileEvent::Deleted(path) => {
                    tracing::warn!("{} was removed; keeping the last loaded scene", path.display());
                }
                FileEvent::Error(message) => tracing::error!("File watcher error: {message}"),
            }
        }
    }
}
