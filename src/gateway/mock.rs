use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use uuid::Uuid;

use crate::domain::amount::Amount;
use crate::error::ProviderError;
use crate::gateway::{ChargeRequest, PaymentGateway};

#[derive(Debug, Clone)]
pub enum MockBehavior {
    Approve,
    Fail(ProviderError),
}

/// Gateway adapter with scriptable behavior. Records call counts so callers
/// can assert that idempotency prevented a second charge.
pub struct MockGateway {
    behavior: Mutex<MockBehavior>,
    charge_calls: AtomicUsize,
    refund_calls: AtomicUsize,
}

impl MockGateway {
    pub fn approving() -> Self {
        Self::with_behavior(MockBehavior::Approve)
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::with_behavior(MockBehavior::Fail(error))
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            charge_calls: AtomicUsize::new(0),
            refund_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn charge_calls(&self) -> usize {
        self.charge_calls.load(Ordering::SeqCst)
    }

    pub fn refund_calls(&self) -> usize {
        self.refund_calls.load(Ordering::SeqCst)
    }

    fn outcome(&self) -> Result<(), ProviderError> {
        match &*self.behavior.lock().unwrap() {
            MockBehavior::Approve => Ok(()),
            MockBehavior::Fail(err) => Err(err.clone()),
        }
    }
}

#[async_trait::async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &str {
        "mock"
    }

    async fn charge(&self, _request: &ChargeRequest) -> Result<String, ProviderError> {
        self.charge_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome()?;
        Ok(format!("mock_txn_{}", Uuid::new_v4()))
    }

    async fn refund(
        &self,
        _provider_transaction_id: &str,
        _amount: &Amount,
        _idempotency_key: &str,
    ) -> Result<String, ProviderError> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome()?;
        Ok(format!("mock_ref_{}", Uuid::new_v4()))
    }

    async fn charge_status(
        &self,
        provider_transaction_id: &str,
    ) -> Result<HashMap<String, String>, ProviderError> {
        self.outcome()?;
        let mut status = HashMap::new();
        status.insert("id".to_string(), provider_transaction_id.to_string());
        status.insert("status".to_string(), "succeeded".to_string());
        Ok(status)
    }
}
