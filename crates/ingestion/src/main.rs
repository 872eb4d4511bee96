//! ChatDock ingestion CLI
//!
//! Loads a directory of knowledge documents into an organization's vector
//! namespace, or clears that namespace:
//!
//!   ingestion load <directory> <organization_id>
//!   ingestion clear <organization_id>

mod chunker;
mod errors;
mod loader;
mod pdf;
mod processor;

use chatdock_common::{config::AppConfig, embeddings, vector, VERSION};
use chunker::ChunkingConfig;
use processor::IngestionProcessor;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

enum Command {
    Load { directory: PathBuf, organization_id: Uuid },
    Clear { organization_id: Uuid },
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  ingestion load <directory> <organization_id>");
    eprintln!("  ingestion clear <organization_id>");
    std::process::exit(2);
}

fn parse_args() -> Command {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("load") if args.len() == 3 => {
            let organization_id = args[2].parse::<Uuid>().unwrap_or_else(|_| usage());
            Command::Load {
                directory: PathBuf::from(&args[1]),
                organization_id,
            }
        }
        Some("clear") if args.len() == 2 => {
            let organization_id = args[1].parse::<Uuid>().unwrap_or_else(|_| usage());
            Command::Clear { organization_id }
        }
        _ => usage(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .json()
        .init();

    info!("Starting ChatDock ingestion v{}", VERSION);

    let command = parse_args();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let embedder = embeddings::create_embedder(&config.embedding)?;
    let vectors = vector::create_vector_index(&config.vector)?;
    let processor = IngestionProcessor::new(embedder, vectors, config.embedding.batch_size);

    match command {
        Command::Load {
            directory,
            organization_id,
        } => {
            let chunks = loader::load_directory(&directory, &ChunkingConfig::default())?;
            info!(
                organization_id = %organization_id,
                chunk_count = chunks.len(),
                "Documents loaded, starting ingestion"
            );

            let report = processor.ingest(organization_id, &chunks).await?;
            info!(
                upserted = report.upserted,
                failed = report.failed,
                "Ingestion finished"
            );
        }
        Command::Clear { organization_id } => {
            processor.clear(organization_id).await?;
        }
    }

    Ok(())
}
