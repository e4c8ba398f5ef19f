mod common;

use common::{charge_request, harness, usd};
use payment_orchestrator::domain::ledger::EntryType;
use payment_orchestrator::domain::payment::PaymentStatus;
use payment_orchestrator::error::{DomainError, PaymentError};
use payment_orchestrator::outbox::EVENT_PAYMENT_REFUNDED;
use payment_orchestrator::repo::PaymentStore;
use payment_orchestrator::service::orchestrator::RefundPaymentRequest;
use rust_decimal_macros::dec;
use uuid::Uuid;

async fn completed_payment(h: &common::Harness, key: &str) -> Uuid {
    h.orchestrator
        .process_payment(charge_request(key, usd(dec!(100.00))))
        .await
        .unwrap()
        .payment_id
}

#[tokio::test]
async fn partial_then_exact_refund_reaches_refunded() {
    let h = harness();
    let payment_id = completed_payment(&h, "key-1").await;

    let partial = h
        .orchestrator
        .refund_payment(RefundPaymentRequest {
            payment_id,
            amount: Some(usd(dec!(30.00))),
            idempotency_key: Some("refund-1".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(partial.status, PaymentStatus::PartiallyRefunded);
    assert_eq!(partial.refund_amount.value(), dec!(30.00));

    let err = h
        .orchestrator
        .refund_payment(RefundPaymentRequest {
            payment_id,
            amount: Some(usd(dec!(70.01))),
            idempotency_key: Some("refund-2".to_string()),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::Domain(DomainError::RefundExceedsOriginal { .. })
    ));
    // The over-refund is rejected before the gateway is called.
    assert_eq!(h.gateway.refund_calls(), 1);

    let full = h
        .orchestrator
        .refund_payment(RefundPaymentRequest {
            payment_id,
            amount: Some(usd(dec!(70.00))),
            idempotency_key: Some("refund-3".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(full.status, PaymentStatus::Refunded);

    let payment = h.store.get_by_id(payment_id).await.unwrap().unwrap();
    assert_eq!(payment.refunded_amount.value(), dec!(100.00));
}

#[tokio::test]
async fn refund_writes_ledger_entry_and_outbox_event() {
    let h = harness();
    let payment_id = completed_payment(&h, "key-1").await;

    let response = h
        .orchestrator
        .refund_payment(RefundPaymentRequest {
            payment_id,
            amount: Some(usd(dec!(25.00))),
            idempotency_key: Some("refund-1".to_string()),
        })
        .await
        .unwrap();

    let entries = h.store.entries_for_payment(payment_id).await.unwrap();
    let refund_entry = entries
        .iter()
        .find(|e| e.entry_type == EntryType::Refund)
        .unwrap();
    assert_eq!(refund_entry.status, PaymentStatus::Completed);
    assert_eq!(
        refund_entry.provider_transaction_id.as_deref(),
        Some(response.refund_transaction_id.as_str())
    );

    let refunded_events: Vec<_> = h
        .store
        .outbox_events()
        .into_iter()
        .filter(|e| e.event_type == EVENT_PAYMENT_REFUNDED)
        .collect();
    assert_eq!(refunded_events.len(), 1);
    assert_eq!(refunded_events[0].payload["refund_amount"], "25.00");
}

#[tokio::test]
async fn refund_without_amount_refunds_remainder() {
    let h = harness();
    let payment_id = completed_payment(&h, "key-1").await;

    h.orchestrator
        .refund_payment(RefundPaymentRequest {
            payment_id,
            amount: Some(usd(dec!(40.00))),
            idempotency_key: Some("refund-1".to_string()),
        })
        .await
        .unwrap();

    let rest = h
        .orchestrator
        .refund_payment(RefundPaymentRequest {
            payment_id,
            amount: None,
            idempotency_key: Some("refund-2".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(rest.refund_amount.value(), dec!(60.00));
    assert_eq!(rest.status, PaymentStatus::Refunded);
}

#[tokio::test]
async fn refund_rejects_ineligible_payment() {
    let h = harness();
    let payment_id = completed_payment(&h, "key-1").await;

    // Drain the payment fully, then try again.
    h.orchestrator
        .refund_payment(RefundPaymentRequest {
            payment_id,
            amount: None,
            idempotency_key: Some("refund-1".to_string()),
        })
        .await
        .unwrap();

    let err = h
        .orchestrator
        .refund_payment(RefundPaymentRequest {
            payment_id,
            amount: Some(usd(dec!(1.00))),
            idempotency_key: Some("refund-2".to_string()),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::NotRefundable {
            status: PaymentStatus::Refunded,
            ..
        }
    ));
}

#[tokio::test]
async fn refund_of_unknown_payment_is_not_found() {
    let h = harness();
    let err = h
        .orchestrator
        .refund_payment(RefundPaymentRequest {
            payment_id: Uuid::new_v4(),
            amount: None,
            idempotency_key: Some("refund-1".to_string()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::PaymentNotFound(_)));
}

#[tokio::test]
async fn duplicate_refund_key_returns_cached_response() {
    let h = harness();
    let payment_id = completed_payment(&h, "key-1").await;

    let request = RefundPaymentRequest {
        payment_id,
        amount: Some(usd(dec!(10.00))),
        idempotency_key: Some("refund-dup".to_string()),
    };
    let first = h.orchestrator.refund_payment(request.clone()).await.unwrap();
    let second = h.orchestrator.refund_payment(request).await.unwrap();

    assert_eq!(
        second.refund_transaction_id,
        first.refund_transaction_id
    );
    assert_eq!(h.gateway.refund_calls(), 1);

    let payment = h.store.get_by_id(payment_id).await.unwrap().unwrap();
    assert_eq!(payment.refunded_amount.value(), dec!(10.00));
}
