use crate::bus::EventBus;
use crate::error::PublishError;

/// Event bus adapter backed by a Redis stream. Entries are appended with a
/// capped length so the stream stays bounded for consumers.
#[derive(Clone)]
pub struct RedisStreamBus {
    client: redis::Client,
    stream_key: String,
}

impl RedisStreamBus {
    pub fn new(redis_url: &str, stream_key: &str) -> Result<Self, PublishError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            stream_key: stream_key.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl EventBus for RedisStreamBus {
    async fn publish(
        &self,
        event_type: &str,
        payload: &serde_json::Value,
        routing_key: &str,
    ) -> Result<(), PublishError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let body = serde_json::to_string(payload)
            .map_err(|e| PublishError::Rejected(e.to_string()))?;

        let _: String = redis::cmd("XADD")
            .arg(&self.stream_key)
            .arg("MAXLEN")
            .arg("~")
            .arg(1_000_000)
            .arg("*")
            .arg("event_type")
            .arg(event_type)
            .arg("routing_key")
            .arg(routing_key)
            .arg("payload")
            .arg(body)
            .query_async(&mut conn)
            .await?;

        Ok(())
    }
}
