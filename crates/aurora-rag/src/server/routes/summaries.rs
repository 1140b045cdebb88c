//! Summary endpoint: three summaries of a posted text

use axum::{body::Bytes, extract::State, Json};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::generation::Summaries;
use crate::server::state::AppState;

/// Either a bare JSON string or `{"text": "..."}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SummaryRequest {
    Plain(String),
    Object { text: String },
}

impl SummaryRequest {
    fn into_text(self) -> String {
        match self {
            SummaryRequest::Plain(text) | SummaryRequest::Object { text } => text,
        }
    }
}

/// POST /api/summaries
pub async fn summarize(State(state): State<AppState>, body: Bytes) -> Result<Json<Summaries>> {
    let request: SummaryRequest = serde_json::from_slice(&body).map_err(|e| {
        Error::message_format(format!("expected a JSON string or {{\"text\": ...}}: {}", e))
    })?;

    let summaries = state.summarizer().summarize(&request.into_text()).await?;
    Ok(Json(summaries))
}
