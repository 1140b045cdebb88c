//! Question endpoint: publish on the question queue and wait for the reply

use axum::{body::Bytes, extract::State, Json};
use std::time::Duration;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::messaging::MessageBroker;
use crate::server::state::AppState;
use crate::types::{AnswerResponse, QuestionMessage};

/// Deletes a reply queue when the request finishes or is dropped
struct ReplyQueueGuard<'a> {
    broker: &'a MessageBroker,
    name: String,
}

impl Drop for ReplyQueueGuard<'_> {
    fn drop(&mut self) {
        self.broker.delete(&self.name);
    }
}

/// POST /api/questions
pub async fn ask(State(state): State<AppState>, body: Bytes) -> Result<Json<AnswerResponse>> {
    // reject bad bodies here rather than round-tripping an error reply
    QuestionMessage::from_slice(&body)?;

    let broker = state.broker();
    let mut replies = broker.reply_queue()?;
    let guard = ReplyQueueGuard {
        broker,
        name: replies.queue().to_string(),
    };

    broker
        .publish(
            &state.config().broker.question_queue,
            body,
            Some(guard.name.clone()),
        )
        .await?;

    let wait = Duration::from_secs(state.config().server.reply_timeout_secs);
    let delivery = timeout(wait, replies.next())
        .await
        .map_err(|_| Error::timeout(format!("no answer within {}s", wait.as_secs())))?
        .ok_or_else(|| Error::internal("reply queue closed before an answer arrived"))?;
    drop(guard);

    let response: AnswerResponse = serde_json::from_slice(&delivery.body)?;
    Ok(Json(response))
}
