//! Demonstration CLI: ingest a file or raw text, run a query, or delete a
//! document against a local engine instance rooted at the configured
//! base directory.

use clap::{Parser, Subcommand};
use saga::infrastructure::config::ConfigLoader;
use saga::{Engine, IngestMetadata, QueryOptions};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "saga")]
#[command(about = "Local knowledge-base engine: ingest, chunk, embed, and query documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a single file from disk.
    Ingest {
        /// Path to a `.txt`, `.md`, or `.pdf` file.
        path: PathBuf,
    },
    /// Scan the configured uploads directory and ingest every new file.
    IngestUploads,
    /// Run a query against the corpus.
    Query {
        /// Query text.
        text: String,
        /// Maximum number of results.
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Delete a document by id.
    Delete {
        /// Document id to delete.
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    saga::telemetry::init();

    let cli = Cli::parse();
    let config = ConfigLoader::new().load().await?;
    let engine = Engine::bootstrap(&config).await?;

    match cli.command {
        Command::Ingest { path } => {
            let document = engine.ingest.process_upload_file(&path, IngestMetadata::default()).await?;
            println!("ingested {} ({} chunks, {} code blocks)", document.id, document.chunks_count, document.code_blocks_count);
        }
        Command::IngestUploads => {
            let result = engine.ingest.process_uploads_folder().await?;
            println!("processed {} files", result.processed);
            for error in &result.errors {
                eprintln!("error: {error}");
            }
        }
        Command::Query { text, limit } => {
            let options = QueryOptions { limit, ..Default::default() };
            let response = engine.query.query(&text, options).await?;
            for hit in &response.results {
                println!("{:.3}  {}  {}", hit.score, hit.document.id, hit.document.title);
            }
            println!(
                "{} of {} matching documents",
                response.results.len(),
                response.pagination.total_documents
            );
        }
        Command::Delete { id } => {
            let deleted = engine.ingest.delete_document(&id).await?;
            if deleted {
                println!("deleted {id}");
            } else {
                println!("no such document: {id}");
            }
        }
    }

    engine.shutdown().await?;
    Ok(())
}
