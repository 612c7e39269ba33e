//! Codegraph - command line entry point
//!
//! Builds and queries the knowledge graph of a codebase.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codegraph::orchestrator::{self, Orchestrator};
use codegraph::query::QueryResponse;
use codegraph::sync::SyncManager;
use codegraph::Config;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "codegraph")]
#[command(about = "Knowledge graph of a codebase, kept in sync and queryable in plain words")]
struct Cli {
    /// Project root
    #[arg(short, long, global = true, default_value = ".")]
    path: PathBuf,

    /// Config file (defaults to ./codegraph.yaml)
    #[arg(short, long, global = true, env = "CODEGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report pending changes without touching the graph
    Check,

    /// Bring the graph up to date with the working tree
    Sync {
        /// Re-extract every file
        #[arg(long)]
        full: bool,
    },

    /// Re-run deduplication over the stored relationships
    Clean,

    /// Clear the graph and rebuild it from scratch
    Reset,

    /// Node and relationship counts
    Stats,

    /// Ask a question about the code
    Query {
        /// Free-text query, e.g. "find function createLogger"
        text: Vec<String>,

        /// Maximum results
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,codegraph=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_yaml_and_env(cli.config.as_deref())?;
    let root = cli
        .path
        .canonicalize()
        .with_context(|| format!("Project root {} not found", cli.path.display()))?;

    match cli.command {
        Commands::Check => {
            let manager = SyncManager::new(&root, config.extraction.clone(), config.sync.clone());
            let report = orchestrator::check(&manager);
            print(cli.json, &report, || {
                if report.is_up_to_date() {
                    println!("Up to date ({} files tracked)", report.tracked_files);
                    return;
                }
                if report.full_sync_required {
                    println!("Full sync required");
                }
                let c = &report.changes;
                println!(
                    "{} added, {} changed, {} deleted, {} unchanged",
                    c.added.len(),
                    c.changed.len(),
                    c.deleted.len(),
                    c.unchanged.len()
                );
                for path in &c.added {
                    println!("  + {}", path);
                }
                for path in &c.changed {
                    println!("  ~ {}", path);
                }
                for path in &c.deleted {
                    println!("  - {}", path);
                }
            })
        }
        Commands::Sync { full } => {
            let orch = Orchestrator::connect(&root, &config).await?;
            let report = orch.sync(full).await?;
            print_sync(cli.json, &report)
        }
        Commands::Reset => {
            let orch = Orchestrator::connect(&root, &config).await?;
            let report = orch.reset().await?;
            print_sync(cli.json, &report)
        }
        Commands::Clean => {
            let orch = Orchestrator::connect(&root, &config).await?;
            let report = orch.clean().await?;
            print(cli.json, &report, || {
                println!(
                    "Removed {} of {} relationships ({} remain)",
                    report.removed, report.before, report.after
                );
                println!(
                    "Quality: {} high, {} medium, {} low",
                    report.quality.high, report.quality.medium, report.quality.low
                );
            })
        }
        Commands::Stats => {
            let orch = Orchestrator::connect(&root, &config).await?;
            let stats = orch.stats().await?;
            print(cli.json, &stats, || {
                println!("Nodes: {}", stats.total_nodes);
                for (node_type, count) in &stats.nodes_by_type {
                    println!("  {:<12} {}", node_type, count);
                }
                println!("Relationships: {}", stats.total_relationships);
                for (rel_type, count) in &stats.relationships_by_type {
                    println!("  {:<12} {}", rel_type, count);
                }
            })
        }
        Commands::Query { text, limit } => {
            let text = text.join(" ");
            let orch = Orchestrator::connect(&root, &config).await?;
            let response = orch.query(&text, limit).await?;
            print(cli.json, &response, || print_query(&response))
        }
    }
}

fn print<T: Serialize>(json: bool, value: &T, human: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human();
    }
    Ok(())
}

fn print_sync(json: bool, report: &orchestrator::SyncReport) -> Result<()> {
    print(json, report, || {
        let c = &report.changes;
        println!(
            "{} sync: {} added, {} changed, {} deleted, {} unchanged",
            if report.full { "Full" } else { "Incremental" },
            c.added,
            c.changed,
            c.deleted,
            c.unchanged
        );
        println!(
            "Parsed {} file(s), {} failed; wrote {} nodes and {} relationships in {} ms",
            report.files_parsed,
            report.parse_failures.len(),
            report.import.nodes_written,
            report.import.relationships_written,
            report.duration_ms
        );
        for failure in &report.parse_failures {
            println!("  ! {}", failure);
        }
    })
}

fn print_query(response: &QueryResponse) {
    println!("{}", response.explanation);
    println!(
        "intent: {}  confidence: {:.2}  ({} ms)",
        response.intent, response.confidence, response.execution_time_ms
    );
    for node in &response.nodes {
        match node.file_path() {
            Some(path) => println!("  [{}] {}  ({})", node.node_type, node.name, path),
            None => println!("  [{}] {}", node.node_type, node.name),
        }
    }
    for rel in &response.relationships {
        println!("  {} -[{}]-> {}", rel.source, rel.rel_type, rel.target);
    }
    if !response.suggestions.is_empty() {
        println!("Suggestions:");
        for suggestion in &response.suggestions {
            println!("  - {}", suggestion);
        }
    }
}
