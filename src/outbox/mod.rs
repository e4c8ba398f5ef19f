use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

pub mod pg;

pub const AGGREGATE_PAYMENT: &str = "Payment";

pub const EVENT_PAYMENT_CREATED: &str = "PaymentCreated";
pub const EVENT_PAYMENT_COMPLETED: &str = "PaymentCompleted";
pub const EVENT_PAYMENT_FAILED: &str = "PaymentFailed";
pub const EVENT_PAYMENT_REFUNDED: &str = "PaymentRefunded";

/// Durable record of a domain event awaiting delivery. Written in the same
/// transaction as the aggregate change it describes; mutated only by the
/// relay. Published rows stay queryable for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub last_error: Option<String>,
}

impl OutboxEvent {
    pub fn new(
        aggregate_type: &str,
        aggregate_id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            aggregate_type: aggregate_type.to_string(),
            aggregate_id: aggregate_id.to_string(),
            event_type: event_type.to_string(),
            payload,
            created_at: Utc::now(),
            published_at: None,
            attempts: 0,
            last_error: None,
        }
    }
}

/// Port for outbox persistence. `save` also participates in the aggregate
/// write through `PaymentStore::persist`.
#[async_trait::async_trait]
pub trait OutboxRepo: Send + Sync {
    async fn save(&self, event: &OutboxEvent) -> Result<(), StoreError>;

    /// Unpublished events ordered by `created_at` ascending.
    async fn get_unpublished(&self, limit: i64) -> Result<Vec<OutboxEvent>, StoreError>;

    async fn mark_published(&self, id: Uuid) -> Result<(), StoreError>;

    async fn increment_attempts(&self, id: Uuid, error: &str) -> Result<(), StoreError>;

    /// Unpublished events stuck at or past `max_attempts`, for alerting.
    async fn get_failed(&self, max_attempts: i32) -> Result<Vec<OutboxEvent>, StoreError>;
}
