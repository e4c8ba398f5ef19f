use std::sync::Mutex;

use crate::bus::EventBus;
use crate::error::PublishError;

#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub event_type: String,
    pub payload: serde_json::Value,
    pub routing_key: String,
}

/// In-memory bus with failure injection, for orchestration and relay tests.
#[derive(Default)]
pub struct InMemoryBus {
    published: Mutex<Vec<PublishedEvent>>,
    failures_remaining: Mutex<u32>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` publish calls fail with a connection error.
    pub fn fail_next(&self, count: u32) {
        *self.failures_remaining.lock().unwrap() = count;
    }

    pub fn published(&self) -> Vec<PublishedEvent> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EventBus for InMemoryBus {
    async fn publish(
        &self,
        event_type: &str,
        payload: &serde_json::Value,
        routing_key: &str,
    ) -> Result<(), PublishError> {
        {
            let mut failures = self.failures_remaining.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(PublishError::Connection("simulated bus outage".to_string()));
            }
        }

        self.published.lock().unwrap().push(PublishedEvent {
            event_type: event_type.to_string(),
            payload: payload.clone(),
            routing_key: routing_key.to_string(),
        });
        Ok(())
    }
}
