//! Document endpoint: validate and queue an ingestion request

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde_json::json;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::DocumentMessage;

/// POST /api/documents
pub async fn submit(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let message = DocumentMessage::from_slice(&body)?;
    let queue = &state.config().broker.document_queue;
    let message_id = state.broker().publish(queue, body, None).await?;

    tracing::info!(
        "Queued {} documents from bucket '{}' as {}",
        message.document_names.keys().len(),
        message.bucket_name,
        message_id
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message_id": message_id,
            "queue": queue,
        })),
    ))
}

#[cfg(test)]
mod tests {
    use crate::server::state::testing::fake_state;
    use crate::server::RagServer;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn post(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/documents")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_submit_queues_message() {
        let dir = tempfile::tempdir().unwrap();
        let state = fake_state(dir.path());
        let mut queue = state
            .broker()
            .subscribe(&state.config().broker.document_queue)
            .unwrap();
        let app = RagServer::from_state(state).build_router();

        let response = app
            .oneshot(post(r#"{"BucketName":"books","DocumentNames":["a.pdf","b.zip"]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let delivery = queue.next().await.unwrap();
        assert_eq!(json["message_id"], delivery.message_id.as_str());
    }

    #[tokio::test]
    async fn test_submit_without_bucket_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = RagServer::from_state(fake_state(dir.path())).build_router();

        let response = app.oneshot(post(r#"{"DocumentNames":"a.pdf"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
