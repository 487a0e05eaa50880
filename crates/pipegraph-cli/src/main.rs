//! Photogrammetry pipeline CLI.
//!
//! Provides the `pipegraph` binary. Every subcommand builds the
//! photogrammetry pipeline from `--images` and/or a `--viewpoints` JSON
//! file, then prints machine-readable JSON to stdout:
//!
//! - `export` prints the graph's primitive projection.
//! - `uids` prints every node's fingerprints in traversal order.
//! - `status` compares against a previous snapshot and lists stale nodes.
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `warn`).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use indexmap::IndexMap;
use tracing_subscriber::EnvFilter;

use pipegraph_cache::{CacheError, DirtySet, UidSnapshot};
use pipegraph_core::{Graph, GraphConfig, Value};
use pipegraph_multiview::{photogrammetry_pipeline_with_config, PipelineError, PipelineInputs};

/// Environment variable overriding the default cache root.
const CACHE_DIR_ENV: &str = "PIPEGRAPH_CACHE_DIR";

/// Photogrammetry pipeline graphs and their fingerprints.
#[derive(Parser)]
#[command(name = "pipegraph", about = "Photogrammetry pipeline graphs and their fingerprints")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Pipeline inputs shared by every subcommand.
#[derive(Args)]
struct InputArgs {
    /// Input image paths, one viewpoint each.
    #[arg(short, long, num_args = 1..)]
    images: Vec<String>,

    /// JSON file holding a list of viewpoint records.
    #[arg(short, long)]
    viewpoints: Option<PathBuf>,

    /// Cache root for output paths (default: $PIPEGRAPH_CACHE_DIR, then "cache").
    #[arg(long)]
    cache_dir: Option<String>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print the graph's primitive projection.
    Export {
        #[command(flatten)]
        input: InputArgs,

        /// Include attributes still at their default value.
        #[arg(long)]
        export_defaults: bool,
    },

    /// Print node and output fingerprints in traversal order.
    Uids {
        #[command(flatten)]
        input: InputArgs,
    },

    /// List nodes whose results are stale against a previous snapshot.
    Status {
        #[command(flatten)]
        input: InputArgs,

        /// Snapshot from a previous run (default: everything is new).
        #[arg(long)]
        previous: Option<PathBuf>,

        /// Write the current snapshot here.
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Export {
            input,
            export_defaults,
        } => run_export(&input, export_defaults),
        Commands::Uids { input } => run_uids(&input),
        Commands::Status {
            input,
            previous,
            save,
        } => run_status(&input, previous.as_deref(), save.as_deref()),
    };
    process::exit(exit_code);
}

/// Execute the export subcommand.
///
/// Returns exit code: 0 = success, 1 = graph error, 3 = I/O or
/// serialization error.
fn run_export(input: &InputArgs, export_defaults: bool) -> i32 {
    let graph = match build_graph(input) {
        Ok(g) => g,
        Err(code) => return code,
    };

    match graph.to_primitive(export_defaults) {
        Ok(projection) => print_json(&projection),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Execute the uids subcommand. Exit codes as [`run_export`].
fn run_uids(input: &InputArgs) -> i32 {
    let graph = match build_graph(input) {
        Ok(g) => g,
        Err(code) => return code,
    };

    match UidSnapshot::from_graph(&graph) {
        Ok(snapshot) => print_json(&snapshot),
        Err(e) => report_cache_error(&e),
    }
}

/// Execute the status subcommand. Exit codes as [`run_export`].
fn run_status(input: &InputArgs, previous: Option<&Path>, save: Option<&Path>) -> i32 {
    let graph = match build_graph(input) {
        Ok(g) => g,
        Err(code) => return code,
    };

    let previous = match previous {
        Some(path) => match UidSnapshot::load(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error: failed to load snapshot '{}'", path.display());
                return report_cache_error(&e);
            }
        },
        None => UidSnapshot::default(),
    };

    let current = match UidSnapshot::from_graph(&graph) {
        Ok(s) => s,
        Err(e) => return report_cache_error(&e),
    };
    let dirty = DirtySet::between(&current, &previous);

    if let Some(path) = save {
        if let Err(e) = current.save(path) {
            eprintln!("Error: failed to save snapshot '{}'", path.display());
            return report_cache_error(&e);
        }
    }

    print_json(&serde_json::json!({
        "clean": dirty.is_clean(),
        "new": dirty.new,
        "modified": dirty.modified,
        "removed": dirty.removed,
        "needsRecompute": dirty.needs_recompute(),
    }))
}

/// Builds the pipeline, reporting failures on stderr.
///
/// Returns the exit code on failure.
fn build_graph(input: &InputArgs) -> Result<Graph, i32> {
    let viewpoints = match &input.viewpoints {
        Some(path) => load_viewpoints(path)?,
        None => Vec::new(),
    };
    let inputs = PipelineInputs {
        images: input.images.clone(),
        viewpoints,
    };

    let cache_dir = input
        .cache_dir
        .clone()
        .or_else(|| env::var(CACHE_DIR_ENV).ok())
        .unwrap_or_else(|| GraphConfig::default().cache_dir);
    tracing::info!("building pipeline: {} viewpoints, cache {}", inputs.len(), cache_dir);

    photogrammetry_pipeline_with_config(&inputs, GraphConfig::with_cache_dir(cache_dir)).map_err(
        |e| {
            match &e {
                PipelineError::Core(core) => eprintln!("Graph error: {}", core),
                PipelineError::MissingImage { .. } => eprintln!("Error: {}", e),
            }
            1
        },
    )
}

fn load_viewpoints(path: &Path) -> Result<Vec<IndexMap<String, Value>>, i32> {
    let json = fs::read_to_string(path).map_err(|e| {
        eprintln!("I/O error: failed to read '{}': {}", path.display(), e);
        3
    })?;
    serde_json::from_str(&json).map_err(|e| {
        eprintln!("Error: '{}' is not a list of viewpoint records: {}", path.display(), e);
        3
    })
}

fn report_cache_error(e: &CacheError) -> i32 {
    match e {
        CacheError::Core(core) => {
            eprintln!("Graph error: {}", core);
            1
        }
        CacheError::Io(io) => {
            eprintln!("I/O error: {}", io);
            3
        }
        CacheError::Serialization(se) => {
            eprintln!("Serialization error: {}", se);
            3
        }
    }
}

/// Prints pretty JSON to stdout for machine-readable output.
fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Serialization error: {}", e);
            3
        }
    }
}
