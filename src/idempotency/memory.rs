use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::StoreError;
use crate::idempotency::IdempotencyStore;

struct Entry {
    value: Option<serde_json::Value>,
    expires_at: Instant,
}

/// In-memory idempotency store for tests. Reserve-then-store semantics match
/// the Redis adapter, including expiry.
#[derive(Default)]
pub struct InMemoryIdempotencyStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn try_reserve(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(false),
            _ => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: None,
                        expires_at: now + ttl,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn get_result(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .and_then(|entry| entry.value.clone()))
    }

    async fn store_result(
        &self,
        key: &str,
        value: &serde_json::Value,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value: Some(value.clone()),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn is_duplicate(&self, key: &str) -> Result<bool, StoreError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(key)
            .is_some_and(|entry| entry.expires_at > Instant::now()))
    }
}
