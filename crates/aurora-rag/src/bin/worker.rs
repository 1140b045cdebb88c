//! Ingestion and question-answering worker
//!
//! Run with: cargo run -p aurora-rag --bin aurora-rag-worker -- --config config/aurora-rag.toml

use aurora_rag::{server::state::AppState, server::RagServer, RagConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "aurora-rag-worker", version, about = "DocuAurora ingestion and QA worker")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "AURORA_RAG_CONFIG", default_value = "config/aurora-rag.toml")]
    config: PathBuf,

    /// Consume queues only, without the HTTP front
    #[arg(long)]
    no_http: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aurora_rag=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                       DocuAurora                          ║
║          PDF ingestion and question answering             ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let config = RagConfig::load(&cli.config)?;

    tracing::info!("Configuration loaded from {}", cli.config.display());
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - Embedding dimensions: {}", config.embeddings.dimensions);
    tracing::info!("  - LLM model: {}", config.llm.model);
    tracing::info!("  - Vector index: {:?} '{}'", config.vector_db.backend, config.vector_db.index_name);
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!(
        "  - Queues: '{}' (documents), '{}' (questions)",
        config.broker.document_queue,
        config.broker.question_queue
    );

    let state = AppState::new(config).await?;
    let consumers = state.spawn_consumers()?;

    if cli.no_http {
        tracing::info!("HTTP front disabled; press Ctrl+C to stop");
        tokio::signal::ctrl_c().await?;
    } else {
        let server = RagServer::from_state(state.clone());
        println!("\nServer starting...");
        println!("  Health: http://{}/health", server.address());
        println!("  API Info: http://{}/api/info", server.address());
        println!("\nEndpoints:");
        println!("  POST /api/documents - Queue a document message");
        println!("  POST /api/questions - Ask a question and wait for the answer");
        println!("  POST /api/summaries - Summarize a text three ways");
        println!("\nPress Ctrl+C to stop\n");

        server
            .start(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl+C: {}", e);
                }
            })
            .await?;
    }

    tracing::info!("Shutting down consumers");
    state.shutdown();
    for result in futures::future::join_all(consumers).await {
        if let Err(e) = result {
            tracing::error!("Consumer task failed: {}", e);
        }
    }

    tracing::info!("Worker stopped");
    Ok(())
}
