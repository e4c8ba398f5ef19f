use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use crate::domain::ledger::LedgerEntry;
use crate::domain::payment::Payment;
use crate::error::StoreError;
use crate::outbox::{OutboxEvent, OutboxRepo};
use crate::repo::PaymentStore;

#[derive(Default)]
struct Inner {
    payments: HashMap<Uuid, Payment>,
    entries: Vec<LedgerEntry>,
    outbox: Vec<OutboxEvent>,
}

/// In-memory store implementing both `PaymentStore` and `OutboxRepo`. A
/// single mutex makes `persist` atomic and serializes writers, mirroring
/// what the Postgres adapter gets from transactions and row locks.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outbox_events(&self) -> Vec<OutboxEvent> {
        self.inner.lock().unwrap().outbox.clone()
    }
}

#[async_trait::async_trait]
impl PaymentStore for InMemoryStore {
    async fn persist(
        &self,
        payment: &Payment,
        entry: Option<&LedgerEntry>,
        event: Option<&OutboxEvent>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.payments.insert(payment.id, payment.clone());
        if let Some(entry) = entry {
            match inner.entries.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry.clone(),
                None => inner.entries.push(entry.clone()),
            }
        }
        if let Some(event) = event {
            inner.outbox.push(event.clone());
        }
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        Ok(self.inner.lock().unwrap().payments.get(&id).cloned())
    }

    async fn get_by_customer_id(&self, customer_id: &str) -> Result<Vec<Payment>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut payments: Vec<Payment> = inner
            .payments
            .values()
            .filter(|p| p.customer_id == customer_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn entries_for_payment(&self, payment_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut entries: Vec<LedgerEntry> = inner
            .entries
            .iter()
            .filter(|e| e.payment_id == payment_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl OutboxRepo for InMemoryStore {
    async fn save(&self, event: &OutboxEvent) -> Result<(), StoreError> {
        self.inner.lock().unwrap().outbox.push(event.clone());
        Ok(())
    }

    async fn get_unpublished(&self, limit: i64) -> Result<Vec<OutboxEvent>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut pending: Vec<OutboxEvent> = inner
            .outbox
            .iter()
            .filter(|e| e.published_at.is_none())
            .cloned()
            .collect();
        pending.sort_by_key(|e| e.created_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn mark_published(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(event) = inner.outbox.iter_mut().find(|e| e.id == id) {
            event.published_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn increment_attempts(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(event) = inner.outbox.iter_mut().find(|e| e.id == id) {
            event.attempts += 1;
            event.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn get_failed(&self, max_attempts: i32) -> Result<Vec<OutboxEvent>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .outbox
            .iter()
            .filter(|e| e.published_at.is_none() && e.attempts >= max_attempts)
            .cloned()
            .collect())
    }
}
