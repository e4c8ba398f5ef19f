#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use payment_orchestrator::config::OrchestratorConfig;
use payment_orchestrator::domain::amount::Amount;
use payment_orchestrator::domain::payment::PaymentMethod;
use payment_orchestrator::gateway::mock::MockGateway;
use payment_orchestrator::idempotency::memory::InMemoryIdempotencyStore;
use payment_orchestrator::repo::memory::InMemoryStore;
use payment_orchestrator::service::orchestrator::{PaymentOrchestrator, ProcessPaymentRequest};
use rust_decimal::Decimal;

pub struct Harness {
    pub store: InMemoryStore,
    pub gateway: Arc<MockGateway>,
    pub idempotency: Arc<InMemoryIdempotencyStore>,
    pub orchestrator: PaymentOrchestrator,
}

pub fn harness() -> Harness {
    harness_with(MockGateway::approving())
}

pub fn harness_with(gateway: MockGateway) -> Harness {
    let store = InMemoryStore::new();
    let gateway = Arc::new(gateway);
    let idempotency = Arc::new(InMemoryIdempotencyStore::new());
    let config = OrchestratorConfig {
        duplicate_wait: Duration::from_millis(200),
        duplicate_poll: Duration::from_millis(10),
        ..OrchestratorConfig::default()
    };
    let orchestrator = PaymentOrchestrator::new(
        Arc::new(store.clone()),
        gateway.clone(),
        idempotency.clone(),
        config,
    );
    Harness {
        store,
        gateway,
        idempotency,
        orchestrator,
    }
}

pub fn usd(value: Decimal) -> Amount {
    Amount::new(value, "USD").unwrap()
}

pub fn charge_request(idempotency_key: &str, amount: Amount) -> ProcessPaymentRequest {
    ProcessPaymentRequest {
        customer_id: "cust-1".to_string(),
        amount,
        payment_method: PaymentMethod::CreditCard,
        payment_method_token: "tok_visa".to_string(),
        idempotency_key: idempotency_key.to_string(),
        metadata: HashMap::new(),
    }
}
