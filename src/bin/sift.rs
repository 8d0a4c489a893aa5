//! Sift CLI: run the enrichment pipeline over JSONL records.
//!
//! Usage:
//!   sift run --input records.jsonl [--config sift.yaml] [--db path] [--limit N] [--json]
//!   sift import --input records.jsonl [--config sift.yaml] [--db path]
//!   sift concept show <id> [--db path]
//!   sift config check <path>

use clap::{Parser, Subcommand};
use sift::storage::MemoryStore;
use sift::{
    CancellationToken, ConceptId, EnrichmentStore, JsonLinesSource, MergeStore, OpenStore,
    PipelineConfig, PipelineOrchestrator, ProviderCatalog, RunOptions, ServiceFactory, SqliteStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;

/// Database path that selects the in-memory store
const MEMORY_DB: &str = ":memory:";

#[derive(Parser)]
#[command(
    name = "sift",
    version,
    about = "Concept-aware deduplication and enrichment pipeline"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich and persist records from a JSONL file
    Run {
        /// JSONL file with one record per line
        #[arg(long)]
        input: PathBuf,
        /// Pipeline configuration (YAML); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
        /// SQLite database file, or ":memory:"; overrides the config
        #[arg(long)]
        db: Option<PathBuf>,
        /// Stop after this many records
        #[arg(long)]
        limit: Option<usize>,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Store already-enriched records without running services
    Import {
        /// JSONL file with one record per line
        #[arg(long)]
        input: PathBuf,
        /// Pipeline configuration (YAML); supplies batch size and required fields
        #[arg(long)]
        config: Option<PathBuf>,
        /// SQLite database file; overrides the config
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Inspect concepts
    Concept {
        #[command(subcommand)]
        action: ConceptAction,
        /// SQLite database file
        #[arg(long, global = true)]
        db: Option<PathBuf>,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConceptAction {
    /// Show one concept as JSON
    Show {
        /// Concept id
        id: i64,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Load and validate a configuration file
    Check {
        /// Path to the YAML file
        path: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, String> {
    match path {
        Some(path) => PipelineConfig::from_path(path)
            .map_err(|e| format!("Failed to load {}: {}", path.display(), e)),
        None => Ok(PipelineConfig::default()),
    }
}

fn open_store(path: &Path, config: &PipelineConfig) -> Result<Arc<dyn EnrichmentStore>, String> {
    if path.as_os_str() == MEMORY_DB {
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = SqliteStore::open_with_timeout(path, config.store.busy_timeout())
        .map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(Arc::new(store))
}

async fn cmd_run(
    input: &Path,
    config: Option<&Path>,
    db: Option<PathBuf>,
    limit: Option<usize>,
    json: bool,
) -> i32 {
    let config = match load_config(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let db_path = db.unwrap_or_else(|| config.store.resolved_path());
    let store = match open_store(&db_path, &config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let mut source = match JsonLinesSource::open(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: failed to open {}: {}", input.display(), e);
            return 1;
        }
    };

    let mut factory = ServiceFactory::new(Arc::new(config), store, ProviderCatalog::new());
    let orchestrator = PipelineOrchestrator::from_factory(&mut factory);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, finishing current record...");
            on_signal.cancel();
        }
    });

    let mut options = RunOptions::default().with_cancel(cancel);
    options.limit = limit;
    let report = orchestrator.run(&mut source, &options).await;

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    } else {
        println!("{}", report);
        if source.skipped() > 0 {
            println!("{} malformed input lines skipped", source.skipped());
        }
    }

    if report.failed_persistence > 0 {
        2
    } else {
        0
    }
}

fn cmd_import(input: &Path, config: Option<&Path>, db: Option<PathBuf>) -> i32 {
    let config = match load_config(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let db_path = db.unwrap_or_else(|| config.store.resolved_path());
    let store = match open_store(&db_path, &config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let mut source = match JsonLinesSource::open(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: failed to open {}: {}", input.display(), e);
            return 1;
        }
    };

    let merge = MergeStore::new(store).with_required_fields(config.persistence.required_fields.clone());
    let report = merge.store_stream(source.by_ref(), config.persistence.batch_size);

    println!(
        "Imported {} records in {} batches ({} failed)",
        report.total_records,
        report.batches,
        report.batches - report.successful_batches
    );
    if source.skipped() > 0 {
        println!("{} malformed input lines skipped", source.skipped());
    }

    if report.successful_batches < report.batches {
        2
    } else {
        0
    }
}

fn cmd_concept_show(db: Option<PathBuf>, id: i64) -> i32 {
    let path = db.unwrap_or_else(|| PipelineConfig::default().store.resolved_path());
    let store = match SqliteStore::open(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: failed to open database: {}", e);
            return 1;
        }
    };
    match store.load_concept(ConceptId::new(id)) {
        Ok(Some(concept)) => match serde_json::to_string_pretty(&concept) {
            Ok(out) => {
                println!("{}", out);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Ok(None) => {
            eprintln!("Error: concept {} not found", id);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_config_check(path: &Path) -> i32 {
    match PipelineConfig::from_path(path) {
        Ok(config) => {
            for service in config.enabled_services() {
                let provider = match (&service.provider, service.kind.needs_provider()) {
                    (_, false) => "rule-based".to_string(),
                    (Some(p), true) => format!("{:?}", p),
                    (None, true) => "no provider (will run as no-op)".to_string(),
                };
                println!("{:<20} {}", service.kind, provider);
            }
            println!("OK: {} service(s) enabled", config.enabled_services().count());
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match cli.command {
        Commands::Run {
            input,
            config,
            db,
            limit,
            json,
        } => cmd_run(&input, config.as_deref(), db, limit, json).await,
        Commands::Import { input, config, db } => cmd_import(&input, config.as_deref(), db),
        Commands::Concept { action, db } => match action {
            ConceptAction::Show { id } => cmd_concept_show(db, id),
        },
        Commands::Config { action } => match action {
            ConfigAction::Check { path } => cmd_config_check(&path),
        },
    };
    std::process::exit(code);
}
