//! API routes for the HTTP front

pub mod documents;
pub mod questions;
pub mod summaries;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/questions", post(questions::ask))
        .route("/documents", post(documents::submit))
        .route("/summaries", post(summaries::summarize))
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.config();
    let dependencies = state.dependencies().await;
    Json(serde_json::json!({
        "name": "aurora-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Queue-driven PDF ingestion and retrieval-augmented question answering",
        "started_at": state.started_at().to_rfc3339(),
        "ingest_state": state.ingest_consumer().state(),
        "dependencies": dependencies,
        "queues": {
            "documents": config.broker.document_queue,
            "questions": config.broker.question_queue,
        },
        "pipeline": {
            "chunk_size": config.chunking.chunk_size,
            "chunk_overlap": config.chunking.chunk_overlap,
            "embedding_model": config.embeddings.model,
            "index": config.vector_db.index_name,
            "top_k": state.qa().retriever().k(),
            "generation_model": config.llm.model,
        },
        "endpoints": {
            "POST /api/questions": "Ask a question (Question Message body), returns the Answer Response",
            "POST /api/documents": "Queue documents for ingestion (Document Message body)",
            "POST /api/summaries": "Three summaries of a text (JSON string or {\"text\": ...})",
            "GET /api/info": "This description"
        }
    }))
}
