use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::amount::Amount;
use crate::domain::ledger::{EntryType, LedgerEntry};
use crate::domain::payment::{Payment, PaymentMethod, PaymentStatus};
use crate::error::StoreError;
use crate::outbox::pg::PgOutboxRepo;
use crate::outbox::OutboxEvent;
use crate::repo::PaymentStore;

#[derive(Clone)]
pub struct PgPaymentStore {
    pub pool: PgPool,
}

impl PgPaymentStore {
    async fn upsert_payment_tx(
        tx: &mut Transaction<'_, Postgres>,
        payment: &Payment,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, customer_id, amount, currency, payment_method, provider,
                status, provider_transaction_id, refunded_amount, metadata,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                provider_transaction_id = EXCLUDED.provider_transaction_id,
                refunded_amount = EXCLUDED.refunded_amount,
                metadata = EXCLUDED.metadata,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(payment.id)
        .bind(&payment.customer_id)
        .bind(payment.amount.value())
        .bind(payment.amount.currency())
        .bind(payment.payment_method.as_str())
        .bind(&payment.provider)
        .bind(payment.status.as_str())
        .bind(&payment.provider_transaction_id)
        .bind(payment.refunded_amount.value())
        .bind(serde_json::to_value(&payment.metadata)?)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    async fn upsert_entry_tx(
        tx: &mut Transaction<'_, Postgres>,
        entry: &LedgerEntry,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                id, payment_id, amount, currency, entry_type, status, provider,
                provider_transaction_id, error_message, metadata, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                provider_transaction_id = EXCLUDED.provider_transaction_id,
                error_message = EXCLUDED.error_message
            "#,
        )
        .bind(entry.id)
        .bind(entry.payment_id)
        .bind(entry.amount.value())
        .bind(entry.amount.currency())
        .bind(entry.entry_type.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.provider)
        .bind(&entry.provider_transaction_id)
        .bind(&entry.error_message)
        .bind(serde_json::to_value(&entry.metadata)?)
        .bind(entry.created_at)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    fn row_to_payment(row: &sqlx::postgres::PgRow) -> Result<Payment, StoreError> {
        let amount = Amount::new(row.get("amount"), row.get("currency"))
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let refunded_amount = Amount::new(row.get("refunded_amount"), row.get("currency"))
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let status: String = row.get("status");
        let method: String = row.get("payment_method");
        let metadata: serde_json::Value = row.get("metadata");

        Ok(Payment {
            id: row.get("id"),
            customer_id: row.get("customer_id"),
            amount,
            payment_method: PaymentMethod::parse(&method)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown payment method {method}")))?,
            provider: row.get("provider"),
            status: PaymentStatus::parse(&status)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown payment status {status}")))?,
            provider_transaction_id: row.get("provider_transaction_id"),
            refunded_amount,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            metadata: serde_json::from_value(metadata)?,
        })
    }

    fn row_to_entry(row: &sqlx::postgres::PgRow) -> Result<LedgerEntry, StoreError> {
        let amount = Amount::new(row.get("amount"), row.get("currency"))
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let entry_type: String = row.get("entry_type");
        let status: String = row.get("status");
        let metadata: serde_json::Value = row.get("metadata");

        Ok(LedgerEntry {
            id: row.get("id"),
            payment_id: row.get("payment_id"),
            amount,
            entry_type: EntryType::parse(&entry_type)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown entry type {entry_type}")))?,
            status: PaymentStatus::parse(&status)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown entry status {status}")))?,
            provider: row.get("provider"),
            provider_transaction_id: row.get("provider_transaction_id"),
            error_message: row.get("error_message"),
            created_at: row.get("created_at"),
            metadata: serde_json::from_value(metadata)?,
        })
    }
}

const PAYMENT_COLUMNS: &str = "id, customer_id, amount, currency, payment_method, provider, \
     status, provider_transaction_id, refunded_amount, metadata, created_at, updated_at";

#[async_trait::async_trait]
impl PaymentStore for PgPaymentStore {
    async fn persist(
        &self,
        payment: &Payment,
        entry: Option<&LedgerEntry>,
        event: Option<&OutboxEvent>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::upsert_payment_tx(&mut tx, payment).await?;
        if let Some(entry) = entry {
            Self::upsert_entry_tx(&mut tx, entry).await?;
        }
        if let Some(event) = event {
            PgOutboxRepo::insert_tx(&mut tx, event).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_payment).transpose()
    }

    async fn get_by_customer_id(&self, customer_id: &str) -> Result<Vec<Payment>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE customer_id = $1 ORDER BY created_at ASC"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_payment).collect()
    }

    async fn entries_for_payment(&self, payment_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, payment_id, amount, currency, entry_type, status, provider,
                   provider_transaction_id, error_message, metadata, created_at
            FROM ledger_entries
            WHERE payment_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_entry).collect()
    }
}
