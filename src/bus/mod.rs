use crate::error::PublishError;

pub mod memory;
pub mod redis_stream;

/// Port for the downstream message bus. Delivery is at-least-once; consumers
/// deduplicate by event id.
#[async_trait::async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(
        &self,
        event_type: &str,
        payload: &serde_json::Value,
        routing_key: &str,
    ) -> Result<(), PublishError>;
}
