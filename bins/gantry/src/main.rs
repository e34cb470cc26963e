use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use gantry_ingest::{ImportConfig, Importer, MemoryGraph, NodeDeclaration};

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

/// Bulk CSV import utility.
///
/// Loads vertex files, then relationship files, into an in-process property
/// graph: schema is synchronized up front, data is committed in batches, and a
/// per-file report is printed on stdout when both phases finish.
#[derive(Parser)]
#[clap(author, version, about = "Gantry bulk CSV import utility")]
struct Cli {
    /// Vertex declaration as <label>=<file>[,<file>...]; repeatable
    #[clap(long = "nodes", required = true, value_name = "LABEL=FILES")]
    nodes: Vec<NodeDeclaration>,

    /// Relationship file group as <file>[,<file>...]; repeatable
    #[clap(long = "relationships", value_name = "FILES")]
    relationships: Vec<String>,

    /// Edge labels to synchronize ahead of the data phases
    #[clap(long = "edge-labels", value_delimiter = ',', value_name = "LABEL")]
    edge_labels: Vec<String>,

    /// Maximum number of rows ingested per file group
    #[clap(short = 'n', long = "limit-rows", value_name = "COUNT")]
    limit_rows: Option<u64>,

    /// Number of concurrent loader threads per phase
    #[clap(long, default_value_t = 2)]
    threads: usize,

    /// Skip relationships whose endpoints are unknown instead of
    /// abandoning the file they appear in
    #[clap(long, default_value_t = true, action = clap::ArgAction::Set, value_name = "BOOL")]
    ignore_missing_nodes: bool,

    /// Drop all existing data and schema before importing
    #[clap(short = 'D', long = "drop-before-import")]
    drop_before_import: bool,

    /// Elements written per transaction between checkpoints
    #[clap(long, default_value_t = 10_000, value_name = "COUNT")]
    batch_size: u64,

    /// Report output format
    #[clap(short = 'f', long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Default)]
enum OutputFormat {
    /// Human-readable summary (default)
    #[default]
    Text,
    /// JSON report
    Json,
}

#[tokio::main]
async fn main() {
    gantry_core::telemetry::init_subscriber_with_env_filter();

    let cli = Cli::parse();

    tracing::info!("starting");

    match run(cli).await {
        Ok(failed_loaders) => {
            if failed_loaders > 0 {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("Import failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<usize> {
    let config = ImportConfig {
        nodes: cli.nodes,
        relationships: cli.relationships,
        edge_labels: cli.edge_labels,
        limit_rows: cli.limit_rows,
        ignore_missing_nodes: cli.ignore_missing_nodes,
        workers: cli.threads,
        drop_existing: cli.drop_before_import,
        batch_size: cli.batch_size,
    };

    let store = Arc::new(MemoryGraph::new());
    let report = Importer::new(store, config).run().await?;

    match cli.format {
        OutputFormat::Text => println!("{}", report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(report.failures())
}
