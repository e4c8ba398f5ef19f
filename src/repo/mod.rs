use uuid::Uuid;

use crate::domain::ledger::LedgerEntry;
use crate::domain::payment::Payment;
use crate::error::StoreError;
use crate::outbox::OutboxEvent;

pub mod memory;
pub mod pg;

/// Port for Payment/Transaction persistence.
///
/// `persist` is the transactional-outbox seam: the aggregate, an optional
/// ledger entry, and an optional outbox event commit atomically or not at
/// all. Serializing concurrent writes to one payment id is the adapter's
/// responsibility (row locks in Postgres, a single mutex in memory).
#[async_trait::async_trait]
pub trait PaymentStore: Send + Sync {
    async fn persist(
        &self,
        payment: &Payment,
        entry: Option<&LedgerEntry>,
        event: Option<&OutboxEvent>,
    ) -> Result<(), StoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Payment>, StoreError>;

    async fn get_by_customer_id(&self, customer_id: &str) -> Result<Vec<Payment>, StoreError>;

    /// Ledger entries for a payment, oldest first.
    async fn entries_for_payment(&self, payment_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError>;
}
