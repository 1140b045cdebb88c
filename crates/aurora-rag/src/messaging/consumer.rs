//! Sequential consume loop shared by both consumers

use async_trait::async_trait;
use std::sync::Arc;

use super::broker::{Delivery, Subscription};

/// Processes one delivery at a time; errors are handled inside `handle`
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handler name for logging
    fn name(&self) -> &str;

    /// Handle a single delivery to completion
    async fn handle(&self, delivery: Delivery);
}

/// Feed every delivery of `subscription` to `handler`, one after another,
/// until the queue ends
pub async fn run_consumer(mut subscription: Subscription, handler: Arc<dyn MessageHandler>) {
    tracing::info!(
        "{} consumer started on queue '{}'",
        handler.name(),
        subscription.queue()
    );

    let mut handled = 0u64;
    while let Some(delivery) = subscription.next().await {
        tracing::debug!(
            "{} consumer received {} (queued {}ms)",
            handler.name(),
            delivery.message_id,
            (chrono::Utc::now() - delivery.published_at).num_milliseconds()
        );
        handler.handle(delivery).await;
        handled += 1;
    }

    tracing::info!(
        "{} consumer on '{}' stopped after {} messages",
        handler.name(),
        subscription.queue(),
        handled
    );
}
