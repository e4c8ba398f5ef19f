mod common;

use common::{charge_request, harness, harness_with, usd};
use payment_orchestrator::domain::ledger::EntryType;
use payment_orchestrator::domain::payment::PaymentStatus;
use payment_orchestrator::error::{PaymentError, ProviderError};
use payment_orchestrator::gateway::mock::{MockBehavior, MockGateway};
use payment_orchestrator::idempotency::IdempotencyStore;
use payment_orchestrator::outbox::{
    EVENT_PAYMENT_COMPLETED, EVENT_PAYMENT_CREATED, EVENT_PAYMENT_FAILED,
};
use payment_orchestrator::repo::PaymentStore;
use rust_decimal_macros::dec;

#[tokio::test]
async fn successful_charge_completes_payment_and_fills_outbox() {
    let h = harness();

    let response = h
        .orchestrator
        .process_payment(charge_request("key-1", usd(dec!(100.00))))
        .await
        .unwrap();

    assert_eq!(response.status, PaymentStatus::Completed);
    assert!(response.provider_transaction_id.is_some());

    let payment = h
        .store
        .get_by_id(response.payment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);

    let events = h.store.outbox_events();
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec![EVENT_PAYMENT_CREATED, EVENT_PAYMENT_COMPLETED]);
    assert!(events
        .iter()
        .all(|e| e.aggregate_id == response.payment_id.to_string()));

    // The response is cached under the submitted key.
    let cached = h.idempotency.get_result("key-1").await.unwrap().unwrap();
    assert_eq!(cached["payment_id"], response.payment_id.to_string());
}

#[tokio::test]
async fn duplicate_key_returns_first_response_without_second_charge() {
    let h = harness();
    let first = h
        .orchestrator
        .process_payment(charge_request("key-dup", usd(dec!(50.00))))
        .await
        .unwrap();

    let second = h
        .orchestrator
        .process_payment(charge_request("key-dup", usd(dec!(50.00))))
        .await
        .unwrap();

    assert_eq!(second.payment_id, first.payment_id);
    assert_eq!(
        second.provider_transaction_id,
        first.provider_transaction_id
    );
    assert_eq!(h.gateway.charge_calls(), 1);
}

#[tokio::test]
async fn held_reservation_times_out_as_request_in_flight() {
    let h = harness();

    // Another caller holds the key but never stores a response.
    assert!(h
        .idempotency
        .try_reserve("key-held", std::time::Duration::from_secs(60))
        .await
        .unwrap());

    let err = h
        .orchestrator
        .process_payment(charge_request("key-held", usd(dec!(10.00))))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::RequestInFlight(_)));
    assert_eq!(h.gateway.charge_calls(), 0);
}

#[tokio::test]
async fn concurrent_duplicates_charge_the_gateway_once() {
    let h = harness();

    let (first, second) = tokio::join!(
        h.orchestrator
            .process_payment(charge_request("key-race", usd(dec!(10.00)))),
        h.orchestrator
            .process_payment(charge_request("key-race", usd(dec!(10.00)))),
    );

    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first.payment_id, second.payment_id);
    assert_eq!(h.gateway.charge_calls(), 1);
}

#[tokio::test]
async fn gateway_failure_marks_payment_failed_and_propagates() {
    let h = harness_with(MockGateway::failing(ProviderError::InsufficientFunds(
        "card declined".to_string(),
    )));

    let err = h
        .orchestrator
        .process_payment(charge_request("key-fail", usd(dec!(100.00))))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::Provider(ProviderError::InsufficientFunds(_))
    ));

    let events = h.store.outbox_events();
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec![EVENT_PAYMENT_CREATED, EVENT_PAYMENT_FAILED]);

    let payment_id = events[0].aggregate_id.parse().unwrap();
    let payment = h.store.get_by_id(payment_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);

    let entries = h.store.entries_for_payment(payment_id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_type, EntryType::Charge);
    assert_eq!(entries[0].status, PaymentStatus::Failed);
    assert!(entries[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("card declined"));
}

#[tokio::test]
async fn failed_run_releases_reservation_so_retry_can_charge() {
    let h = harness_with(MockGateway::failing(ProviderError::Connection(
        "gateway unreachable".to_string(),
    )));

    let err = h
        .orchestrator
        .process_payment(charge_request("key-retry", usd(dec!(25.00))))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Provider(_)));

    // The key was released, so a client retry reaches the gateway again.
    h.gateway.set_behavior(MockBehavior::Approve);
    let response = h
        .orchestrator
        .process_payment(charge_request("key-retry", usd(dec!(25.00))))
        .await
        .unwrap();
    assert_eq!(response.status, PaymentStatus::Completed);
    assert_eq!(h.gateway.charge_calls(), 2);
}

#[tokio::test]
async fn each_payment_gets_exactly_one_created_and_one_terminal_event() {
    let h = harness();
    let a = h
        .orchestrator
        .process_payment(charge_request("key-a", usd(dec!(10.00))))
        .await
        .unwrap();
    let b = h
        .orchestrator
        .process_payment(charge_request("key-b", usd(dec!(20.00))))
        .await
        .unwrap();

    for payment_id in [a.payment_id, b.payment_id] {
        let id = payment_id.to_string();
        let events = h.store.outbox_events();
        let created = events
            .iter()
            .filter(|e| e.aggregate_id == id && e.event_type == EVENT_PAYMENT_CREATED)
            .count();
        let terminal = events
            .iter()
            .filter(|e| {
                e.aggregate_id == id
                    && (e.event_type == EVENT_PAYMENT_COMPLETED
                        || e.event_type == EVENT_PAYMENT_FAILED)
            })
            .count();
        assert_eq!(created, 1);
        assert_eq!(terminal, 1);
    }
}

#[tokio::test]
async fn customer_lookup_returns_own_payments_oldest_first() {
    let h = harness();
    let first = h
        .orchestrator
        .process_payment(charge_request("key-1", usd(dec!(10.00))))
        .await
        .unwrap();
    let second = h
        .orchestrator
        .process_payment(charge_request("key-2", usd(dec!(20.00))))
        .await
        .unwrap();

    let mut other = charge_request("key-3", usd(dec!(30.00)));
    other.customer_id = "cust-2".to_string();
    h.orchestrator.process_payment(other).await.unwrap();

    let payments = h.store.get_by_customer_id("cust-1").await.unwrap();
    let ids: Vec<_> = payments.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![first.payment_id, second.payment_id]);

    assert!(h
        .store
        .get_by_customer_id("cust-none")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn payment_status_returns_summary_with_ledger() {
    let h = harness();
    let response = h
        .orchestrator
        .process_payment(charge_request("key-status", usd(dec!(75.00))))
        .await
        .unwrap();

    let status = h
        .orchestrator
        .payment_status(response.payment_id)
        .await
        .unwrap();
    assert_eq!(status.customer_id, "cust-1");
    assert_eq!(status.status, PaymentStatus::Completed);
    assert_eq!(status.total_amount.value(), dec!(75.00));
    assert_eq!(status.entries.len(), 1);
    assert_eq!(status.entries[0].entry_type, EntryType::Charge);
    assert_eq!(status.entries[0].status, PaymentStatus::Completed);
}

#[tokio::test]
async fn unknown_payment_status_is_not_found() {
    let h = harness();
    let err = h
        .orchestrator
        .payment_status(uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::PaymentNotFound(_)));
}
