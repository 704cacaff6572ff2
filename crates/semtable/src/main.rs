use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use semtable_common::{logger, AppConfig};
use semtable_embed::OllamaEmbedder;
use semtable_engine::{MergeKickoff, RegenerationEvent, SearchSession, SemanticEngine};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "semtable")]
#[command(about = "Per-column semantic search over tabular data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available stores
    List,

    /// Show the embedding columns of a store
    Columns {
        /// Store name
        store: String,
    },

    /// Load delimited files, embed every column, and create a store
    Ingest {
        /// Name of the store to create
        #[arg(short, long)]
        output: String,

        /// Input files (CSV or other delimited text)
        files: Vec<PathBuf>,
    },

    /// Merge uploaded rows into a store and regenerate its embeddings
    Merge {
        /// Store name
        store: String,

        /// Input files (CSV or other delimited text)
        files: Vec<PathBuf>,
    },

    /// Run a similarity query against one embedding column
    Query {
        /// Store name
        store: String,

        /// Embedding column to search
        column: String,

        /// Query text
        text: String,

        /// Number of results
        #[arg(long)]
        top_n: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::from_env()?;
    logger::setup_logging(&config.log_dir, &config.log_level)?;

    tracing::info!("semtable starting...");
    tracing::info!("  Store directory: {}", config.store_dir.display());
    tracing::info!("  Embedding model: {}", config.embedding_model);

    let embedder = Arc::new(OllamaEmbedder::new(
        config.ollama_base_url.clone(),
        config.embedding_model.clone(),
    )?);
    let default_top_n = config.default_top_n;
    let engine = SemanticEngine::new(config, embedder);

    match cli.command {
        Commands::List => {
            for name in engine.list_available_stores()? {
                println!("{}", name);
            }
        }
        Commands::Columns { store } => {
            for column in engine.select_store(&store)? {
                println!("{}", column);
            }
        }
        Commands::Ingest { output, files } => {
            engine.ingest_and_save(&files, &output).await?;
            println!("Store '{}' created", output);
        }
        Commands::Merge { store, files } => {
            match engine.merge_and_regenerate(&store, &files).await? {
                MergeKickoff::NoChange => {
                    println!("No new rows to add. Store '{}' is up to date.", store);
                }
                MergeKickoff::Started { mut events, .. } => {
                    let bar = ProgressBar::new(1);
                    bar.set_style(
                        ProgressStyle::with_template(
                            "{bar:40.cyan/blue} {pos}/{len} columns {msg}",
                        )
                        .expect("static template"),
                    );
                    while let Some(event) = events.recv().await {
                        match event {
                            RegenerationEvent::Progress { completed, total } => {
                                bar.set_length(total as u64);
                                bar.set_position(completed as u64);
                            }
                            RegenerationEvent::Completed => {
                                bar.finish_with_message("done");
                                println!("Merged and regenerated store '{}'", store);
                                break;
                            }
                            RegenerationEvent::Failed { message } => {
                                bar.abandon_with_message("failed");
                                anyhow::bail!("regeneration failed: {}", message);
                            }
                        }
                    }
                }
            }
        }
        Commands::Query {
            store,
            column,
            text,
            top_n,
        } => {
            let session = SearchSession { store, column };
            let results = match engine
                .run_query(&session, &text, top_n.unwrap_or(default_top_n))
                .await
            {
                Ok(results) => results,
                // Bad input gets a message, not a backtrace
                Err(e) if e.is_user_error() => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            };
            for result in results {
                let row = result
                    .row
                    .iter()
                    .map(|(col, val)| format!("{}={}", col, val))
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("{:>5.2}  {}", result.similarity, row);
            }
        }
    }

    Ok(())
}
