//! # gqmd CLI
//!
//! Thin front end over the `gqmd` library.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gqmd add <name> <path>` | Register a collection |
//! | `gqmd list` | List collections |
//! | `gqmd remove <name>` | Remove a collection and its entries |
//! | `gqmd scan [name]` | Rescan one collection, or all |
//! | `gqmd search "<query>"` | Full-text search |
//! | `gqmd vsearch "<query>"` | Semantic search |
//! | `gqmd get <collection/path>` | Print one document |
//! | `gqmd multi-get <paths>...` | Print several documents under a byte budget |
//! | `gqmd status` | Index overview |
//! | `gqmd embed` | Embed content that has no vectors yet |
//! | `gqmd tool [name] [json]` | Invoke a named operation with JSON parameters |

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use gqmd::config::{self, Config};
use gqmd::embedding::create_embedder;
use gqmd::models::{ScanReport, ScanSummary};
use gqmd::tools::{error_body, ToolContext, ToolRegistry};
use gqmd::{db, embed_cmd, fts, get, registry, scanner, stats, vector};

#[derive(Parser)]
#[command(
    name = "gqmd",
    about = "Local document indexing and retrieval: full-text and vector search over directories of text",
    version
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Index database path (overrides `[db].path`).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// Raise log verbosity (`RUST_LOG` takes precedence).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a directory as a named collection.
    Add {
        name: String,
        path: PathBuf,

        /// Include pattern (`**/*.ext`, `*.ext`, or a file-name glob).
        #[arg(long)]
        pattern: Option<String>,
    },

    /// List registered collections.
    List,

    /// Remove a collection together with its catalog and index entries.
    Remove { name: String },

    /// Scan a collection, or every collection when no name is given.
    Scan { name: Option<String> },

    /// Full-text search over active documents.
    Search {
        query: String,

        #[arg(long, default_value_t = 0)]
        limit: i64,
    },

    /// Semantic search (requires an embedding provider).
    Vsearch {
        query: String,

        #[arg(long, default_value_t = 0)]
        limit: i64,
    },

    /// Print a document by `collection/path`.
    Get { reference: String },

    /// Print several documents by `collection/path`.
    MultiGet {
        references: Vec<String>,

        /// Total body byte budget (0 = configured default).
        #[arg(long, default_value_t = 0)]
        max_bytes: usize,
    },

    /// Show index status.
    Status,

    /// Embed content that has no vectors yet.
    Embed {
        /// Maximum number of content blobs to embed in this run.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Invoke a named operation with JSON parameters; lists operations when
    /// no name is given.
    Tool {
        name: Option<String>,

        #[arg(default_value = "{}")]
        params: String,
    },
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_summary(name: &str, summary: &ScanSummary) {
    println!(
        "{}: added {}, updated {}, removed {}, errors {}",
        name, summary.added, summary.updated, summary.removed, summary.errors
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut cfg: Config = config::load_or_default(cli.config.as_deref())?;
    if let Some(path) = cli.db.clone() {
        cfg.db.path = Some(path);
    }
    let db_path = db::resolve_db_path(&cfg)?;
    let pool = db::open(&db_path)
        .await
        .with_context(|| format!("Failed to open index at {}", db_path.display()))?;

    match cli.command {
        Commands::Add {
            name,
            path,
            pattern,
        } => {
            let collection = registry::add(&pool, &name, &path, pattern.as_deref()).await?;
            if cli.json {
                print_json(&collection)?;
            } else {
                println!(
                    "Added collection {} -> {} ({})",
                    collection.name, collection.root_path, collection.include_pattern
                );
            }
        }
        Commands::List => {
            let collections = registry::list(&pool).await?;
            if cli.json {
                print_json(&collections)?;
            } else if collections.is_empty() {
                println!("No collections.");
            } else {
                for c in &collections {
                    println!("{}\t{}\t{}", c.name, c.root_path, c.include_pattern);
                }
            }
        }
        Commands::Remove { name } => {
            registry::remove(&pool, &name).await?;
            if !cli.json {
                println!("Removed collection {}", name);
            }
        }
        Commands::Scan { name } => {
            let report: ScanReport = match name {
                Some(name) => {
                    let summary = scanner::scan_collection(&pool, &name).await?;
                    std::iter::once((name, summary)).collect()
                }
                None => scanner::scan_all(&pool).await?,
            };
            if cli.json {
                print_json(&report)?;
            } else {
                for (name, summary) in &report {
                    print_summary(name, summary);
                }
            }
        }
        Commands::Search { query, limit } => {
            let results = fts::search(&pool, &query, limit, &cfg.search).await?;
            if cli.json {
                print_json(&results)?;
            } else if results.is_empty() {
                println!("No results.");
            } else {
                for (i, r) in results.iter().enumerate() {
                    println!("{}. [{:.3}] {}/{}  {}", i + 1, r.score, r.collection, r.path, r.title);
                    println!("    {}", r.snippet.replace('\n', " "));
                }
            }
        }
        Commands::Vsearch { query, limit } => {
            if !cfg.embedding.is_enabled() {
                bail!("vsearch requires embeddings. Set [embedding] provider in config.");
            }
            let embedder = create_embedder(&cfg.embedding)?;
            let limit = if limit <= 0 {
                cfg.search.default_limit
            } else {
                limit
            };
            let results = vector::search_text(&pool, embedder.as_ref(), &query, limit).await?;
            if cli.json {
                print_json(&results)?;
            } else if results.is_empty() {
                println!("No results.");
            } else {
                for (i, r) in results.iter().enumerate() {
                    println!(
                        "{}. [{:.3}] {}/{}#{}  {}",
                        i + 1,
                        r.score,
                        r.collection,
                        r.path,
                        r.chunk_index,
                        r.title
                    );
                }
            }
        }
        Commands::Get { reference } => {
            let Some((collection, path)) = get::split_display_path(&reference) else {
                bail!("expected collection/path, got {:?}", reference);
            };
            let doc = get::get_document(&pool, collection, path).await?;
            if cli.json {
                print_json(&doc)?;
            } else {
                print!("{}", doc.content);
            }
        }
        Commands::MultiGet {
            references,
            max_bytes,
        } => {
            let max_bytes = if max_bytes == 0 {
                cfg.get.max_bytes
            } else {
                max_bytes
            };
            let docs = get::multi_get(&pool, &references, max_bytes).await?;
            if cli.json {
                print_json(&docs)?;
            } else {
                for doc in &docs {
                    println!("==> {} <==", doc.document.display_path());
                    println!("{}", doc.content);
                }
            }
        }
        Commands::Status => {
            let status = stats::status(&pool, &db_path).await?;
            if cli.json {
                print_json(&status)?;
            } else {
                println!("{}", stats::format_status(&status));
            }
        }
        Commands::Embed { limit } => {
            if !cfg.embedding.is_enabled() {
                bail!("Embedding provider is disabled. Set [embedding] provider in config.");
            }
            let embedder = create_embedder(&cfg.embedding)?;
            let summary = embed_cmd::embed_pending(
                &pool,
                embedder.as_ref(),
                cfg.chunking.max_tokens,
                limit,
            )
            .await?;
            if cli.json {
                print_json(&summary)?;
            } else {
                println!(
                    "Embedded {} documents ({} chunks), {} pending",
                    summary.documents, summary.chunks, summary.pending
                );
            }
        }
        Commands::Tool { name, params } => {
            let tools = ToolRegistry::with_builtins();
            let Some(name) = name else {
                print_json(&tools.describe())?;
                pool.close().await;
                return Ok(());
            };
            let params: serde_json::Value =
                serde_json::from_str(&params).context("parameters must be a JSON object")?;
            let ctx = ToolContext::new(pool.clone(), Arc::new(cfg), db_path)?;
            match tools.call(&name, params, &ctx).await {
                Ok(result) => print_json(&serde_json::json!({ "result": result }))?,
                Err(e) => {
                    print_json(&error_body(&e))?;
                    pool.close().await;
                    std::process::exit(if e.is_rejection() { 2 } else { 1 });
                }
            }
        }
    }

    pool.close().await;
    Ok(())
}
