//! Queue transport and the two message consumers

mod broker;
mod consumer;
mod ingest_consumer;
mod question_consumer;

pub use broker::{Delivery, MessageBroker, Subscription};
pub use consumer::{run_consumer, MessageHandler};
pub use ingest_consumer::{ConsumerState, IngestConsumer};
pub use question_consumer::QuestionConsumer;
