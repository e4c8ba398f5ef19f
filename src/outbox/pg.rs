use chrono::Utc;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::error::StoreError;
use crate::outbox::{OutboxEvent, OutboxRepo};

#[derive(Clone)]
pub struct PgOutboxRepo {
    pub pool: PgPool,
}

impl PgOutboxRepo {
    /// Insert within a caller-owned transaction so the event commits or rolls
    /// back with the aggregate write.
    pub(crate) async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        event: &OutboxEvent,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO payment_outbox (id, aggregate_type, aggregate_id, event_type, payload, created_at, attempts)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.id)
        .bind(&event.aggregate_type)
        .bind(&event.aggregate_id)
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(event.created_at)
        .bind(event.attempts)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    fn row_to_event(row: &sqlx::postgres::PgRow) -> OutboxEvent {
        OutboxEvent {
            id: row.get("id"),
            aggregate_type: row.get("aggregate_type"),
            aggregate_id: row.get("aggregate_id"),
            event_type: row.get("event_type"),
            payload: row.get("payload"),
            created_at: row.get("created_at"),
            published_at: row.get("published_at"),
            attempts: row.get("attempts"),
            last_error: row.get("last_error"),
        }
    }
}

#[async_trait::async_trait]
impl OutboxRepo for PgOutboxRepo {
    async fn save(&self, event: &OutboxEvent) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::insert_tx(&mut tx, event).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_unpublished(&self, limit: i64) -> Result<Vec<OutboxEvent>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_type, aggregate_id, event_type, payload, created_at, published_at, attempts, last_error
            FROM payment_outbox
            WHERE published_at IS NULL
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_event).collect())
    }

    async fn mark_published(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE payment_outbox SET published_at = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_attempts(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE payment_outbox SET attempts = attempts + 1, last_error = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_failed(&self, max_attempts: i32) -> Result<Vec<OutboxEvent>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_type, aggregate_id, event_type, payload, created_at, published_at, attempts, last_error
            FROM payment_outbox
            WHERE published_at IS NULL AND attempts >= $1
            ORDER BY attempts DESC, created_at ASC
            "#,
        )
        .bind(max_attempts)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_event).collect())
    }
}
