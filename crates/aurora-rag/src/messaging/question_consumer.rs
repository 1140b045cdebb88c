//! Question message consumer: answer and reply exactly once

use async_trait::async_trait;
use std::sync::Arc;

use crate::retrieval::RetrievalQa;
use crate::types::{AnswerResponse, QuestionMessage};

use super::broker::{Delivery, MessageBroker};
use super::consumer::MessageHandler;

/// Answers Question Messages and publishes one Answer Response per delivery
pub struct QuestionConsumer {
    qa: RetrievalQa,
    broker: Arc<MessageBroker>,
}

impl QuestionConsumer {
    pub fn new(qa: RetrievalQa, broker: Arc<MessageBroker>) -> Self {
        Self { qa, broker }
    }

    /// Build the reply for a delivery; failures become error-flagged replies
    pub async fn respond(&self, body: &[u8]) -> AnswerResponse {
        let question = match QuestionMessage::from_slice(body) {
            Ok(question) => question,
            Err(e) => {
                tracing::warn!("Malformed question message: {}", e);
                let (command, input) = echo_fields(body);
                return AnswerResponse::failed(command, input, &e);
            }
        };

        tracing::info!(
            "Answering '{}' for command {}",
            question.payload.input_question,
            question.command_name
        );

        match self.qa.answer(&question.payload.input_question).await {
            Ok(answer) => AnswerResponse::answered(&question, answer.answer, answer.sources),
            Err(e) => {
                tracing::error!("Failed to answer question ({}): {}", e.kind(), e);
                AnswerResponse::failed(
                    question.command_name,
                    question.payload.input_question,
                    &e,
                )
            }
        }
    }
}

/// Best-effort `CommandName` and `InputQuestion` from a body that failed to parse
fn echo_fields(body: &[u8]) -> (String, String) {
    let value: serde_json::Value = serde_json::from_slice(body).unwrap_or_default();
    let command = value["CommandName"].as_str().unwrap_or_default().to_string();
    let input = value["Payload"]["InputQuestion"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    (command, input)
}

#[async_trait]
impl MessageHandler for QuestionConsumer {
    fn name(&self) -> &str {
        "question"
    }

    async fn handle(&self, delivery: Delivery) {
        let Some(reply_to) = delivery.reply_to.as_deref() else {
            tracing::warn!(
                "Dropping question {} without a reply destination",
                delivery.message_id
            );
            return;
        };

        if !self.broker.has_queue(reply_to) {
            tracing::warn!(
                "Dropping question {}: reply queue '{}' is gone",
                delivery.message_id,
                reply_to
            );
            return;
        }

        let response = self.respond(&delivery.body).await;
        let body = match response.to_vec() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to serialize answer for {}: {}", delivery.message_id, e);
                return;
            }
        };

        if let Err(e) = self.broker.publish_reply(reply_to, body).await {
            tracing::error!(
                "Failed to publish answer for {} to '{}': {}",
                delivery.message_id,
                reply_to,
                e
            );
            return;
        }

        if response.is_error() {
            tracing::warn!("Sent error reply for {} to '{}'", delivery.message_id, reply_to);
        } else {
            tracing::info!("Sent answer for {} to '{}'", delivery.message_id, reply_to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::run_consumer;
    use crate::providers::MemoryIndex;
    use crate::retrieval::testing::{
        BagOfWordsEmbedder, EchoGenerator, FailingEmbedder, FailingGenerator,
    };
    use crate::providers::Generator;
    use crate::retrieval::Retriever;
    use std::time::Duration;

    fn delivery(body: &str, reply_to: Option<&str>) -> Delivery {
        Delivery {
            message_id: uuid::Uuid::new_v4().to_string(),
            body: body.to_string().into(),
            reply_to: reply_to.map(str::to_string),
            published_at: chrono::Utc::now(),
        }
    }

    fn qa(generator: Arc<dyn Generator>) -> RetrievalQa {
        let retriever = Retriever::new(
            Arc::new(BagOfWordsEmbedder::new()),
            Arc::new(MemoryIndex::new(BagOfWordsEmbedder::DIMENSIONS)),
            Retriever::DEFAULT_K,
        );
        RetrievalQa::new(retriever, generator)
    }

    #[tokio::test]
    async fn test_exactly_one_reply_echoing_request() {
        let broker = Arc::new(MessageBroker::new(8));
        let consumer = Arc::new(QuestionConsumer::new(
            qa(Arc::new(EchoGenerator::new())),
            broker.clone(),
        ));
        let subscription = broker.subscribe("questions").unwrap();
        let worker = tokio::spawn(run_consumer(subscription, consumer));

        let mut replies = broker.reply_queue().unwrap();
        broker
            .publish(
                "questions",
                r#"{"CommandName":"ask","Payload":{"InputQuestion":"What is 2+2?"}}"#,
                Some(replies.queue().to_string()),
            )
            .await
            .unwrap();

        let reply = replies.next().await.unwrap();
        let response: AnswerResponse = serde_json::from_slice(&reply.body).unwrap();
        assert_eq!(response.command_name, "ask");
        assert_eq!(response.payload.input_question, "What is 2+2?");
        assert!(!response.is_error());
        assert!(!response.payload.answer.is_empty());

        let second = tokio::time::timeout(Duration::from_millis(200), replies.next()).await;
        assert!(second.is_err(), "expected a single reply");

        broker.close();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_question_gets_error_reply() {
        let consumer = QuestionConsumer::new(
            qa(Arc::new(EchoGenerator::new())),
            Arc::new(MessageBroker::new(8)),
        );

        let response = consumer
            .respond(br#"{"CommandName":"ask","Payload":{}}"#)
            .await;
        assert!(response.is_error());
        assert_eq!(response.command_name, "ask");
        assert!(response.payload.answer.is_empty());
        assert!(response
            .payload
            .error
            .as_deref()
            .unwrap()
            .starts_with("message_format_error"));
    }

    #[tokio::test]
    async fn test_generation_failure_gets_error_reply() {
        let consumer = QuestionConsumer::new(
            qa(Arc::new(FailingGenerator)),
            Arc::new(MessageBroker::new(8)),
        );

        let response = consumer
            .respond(br#"{"CommandName":"ask","Payload":{"InputQuestion":"Who?"}}"#)
            .await;
        assert!(response.is_error());
        assert_eq!(response.payload.input_question, "Who?");
        assert!(response
            .payload
            .error
            .as_deref()
            .unwrap()
            .starts_with("generation_error"));
    }

    #[tokio::test]
    async fn test_missing_reply_destination_is_dropped() {
        let broker = Arc::new(MessageBroker::new(8));
        let generator = Arc::new(EchoGenerator::new());
        let consumer = QuestionConsumer::new(qa(generator.clone()), broker.clone());

        consumer
            .handle(delivery(
                r#"{"CommandName":"ask","Payload":{"InputQuestion":"Hi"}}"#,
                None,
            ))
            .await;

        assert_eq!(generator.calls(), 0);
        assert_eq!(broker.queue_count(), 0);
    }

    #[tokio::test]
    async fn test_retrieval_failure_gets_one_error_reply() {
        let broker = Arc::new(MessageBroker::new(8));
        let generator = Arc::new(EchoGenerator::new());
        let retriever = Retriever::new(
            Arc::new(FailingEmbedder),
            Arc::new(MemoryIndex::new(BagOfWordsEmbedder::DIMENSIONS)),
            Retriever::DEFAULT_K,
        );
        let consumer = QuestionConsumer::new(
            RetrievalQa::new(retriever, generator.clone()),
            broker.clone(),
        );

        let mut replies = broker.reply_queue().unwrap();
        consumer
            .handle(delivery(
                r#"{"CommandName":"ask","Payload":{"InputQuestion":"Who wrote it?"}}"#,
                Some(replies.queue()),
            ))
            .await;

        let reply = replies.next().await.unwrap();
        let response: AnswerResponse = serde_json::from_slice(&reply.body).unwrap();
        assert_eq!(response.command_name, "ask");
        assert_eq!(response.payload.input_question, "Who wrote it?");
        assert!(response.payload.answer.is_empty());
        assert!(response
            .payload
            .error
            .as_deref()
            .unwrap()
            .starts_with("index_error"));
        assert_eq!(generator.calls(), 0);

        let second = tokio::time::timeout(Duration::from_millis(100), replies.next()).await;
        assert!(second.is_err(), "expected a single reply");
    }

    #[tokio::test]
    async fn test_abandoned_reply_queues_are_not_recreated() {
        let broker = Arc::new(MessageBroker::new(8));
        let generator = Arc::new(EchoGenerator::new());
        let consumer = QuestionConsumer::new(qa(generator.clone()), broker.clone());

        for _ in 0..5 {
            let replies = broker.reply_queue().unwrap();
            let name = replies.queue().to_string();
            broker.delete(&name);

            consumer
                .handle(delivery(
                    r#"{"CommandName":"ask","Payload":{"InputQuestion":"Hi"}}"#,
                    Some(&name),
                ))
                .await;
        }

        assert_eq!(broker.queue_count(), 0);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_answers_buffered_questions_after_close() {
        let broker = Arc::new(MessageBroker::new(8));
        let consumer = QuestionConsumer::new(qa(Arc::new(EchoGenerator::new())), broker.clone());
        let mut replies = broker.reply_queue().unwrap();

        broker.close();
        consumer
            .handle(delivery(
                r#"{"CommandName":"ask","Payload":{"InputQuestion":"Still there?"}}"#,
                Some(replies.queue()),
            ))
            .await;

        let reply = replies.next().await.unwrap();
        let response: AnswerResponse = serde_json::from_slice(&reply.body).unwrap();
        assert_eq!(response.payload.input_question, "Still there?");
        assert!(!response.is_error());
    }
}
