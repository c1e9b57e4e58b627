use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod discovery;
mod embedding;
mod error;
mod models;
mod normalize;
mod search;
mod store;
mod ui;

use config::{ConfigArgs, SearchConfig};
use search::SearchEngine;
use store::SurrealVectorStore;

#[derive(Parser)]
#[command(name = "file-search")]
#[command(about = "Find files by the meaning of their names")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Print index, search and stats output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the index from every matching file under DIR
    Index { dir: PathBuf },
    /// Search indexed files with a natural-language query
    Search {
        #[arg(required = true)]
        query: Vec<String>,
        /// Number of results (defaults to the configured top-k)
        #[arg(long, short = 'k')]
        top_k: Option<usize>,
        /// Reveal the Nth result in the file manager
        #[arg(long)]
        open: Option<usize>,
    },
    /// Show collection statistics
    Stats,
    /// Menu-driven session (default)
    Interactive,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "file_search=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn build_engine(config: SearchConfig) -> Result<SearchEngine> {
    let store = SurrealVectorStore::open(&config.storage_path, &config.collection_name)
        .await
        .with_context(|| format!("Failed to open vector store at {}", config.storage_path.display()))?;
    let embedder = embedding::create_client(&config).context("Failed to initialize embedding model")?;

    Ok(SearchEngine::new(config, embedder, Box::new(store)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = SearchConfig::from_args(cli.config)?;
    let engine = build_engine(config).await?;

    match cli.command.unwrap_or(Command::Interactive) {
        Command::Index { dir } => {
            let dir = ui::expand_user_path(&dir.to_string_lossy());
            let report = engine.index_directory(&dir).await?;
            if cli.json {
                ui::print_json(&report)?;
            } else {
                ui::print_report(&report);
            }
        }
        Command::Search { query, top_k, open } => {
            let results = engine.search(&query.join(" "), top_k).await?;
            if cli.json {
                ui::print_json(&results)?;
            } else {
                ui::print_results(&results);
            }

            if let Some(n) = open {
                match results.iter().find(|r| r.rank == n) {
                    Some(result) => match ui::reveal_in_file_manager(&result.metadata.file_path) {
                        Ok(dir) => println!("Opened {}", dir.display()),
                        Err(e) => eprintln!("Could not open file location: {}", e),
                    },
                    None => eprintln!("No result with rank {}", n),
                }
            }
        }
        Command::Stats => {
            let stats = engine.stats().await?;
            if cli.json {
                ui::print_json(&stats)?;
            } else {
                ui::print_stats(&stats);
            }
        }
        Command::Interactive => ui::run_interactive(&engine).await?,
    }

    Ok(())
}
