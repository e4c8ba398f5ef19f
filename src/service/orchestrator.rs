use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::domain::amount::Amount;
use crate::domain::ledger::LedgerEntry;
use crate::domain::payment::{Payment, PaymentMethod, PaymentStatus};
use crate::error::{DomainError, PaymentError, StoreError};
use crate::gateway::{ChargeRequest, PaymentGateway};
use crate::idempotency::IdempotencyStore;
use crate::outbox::{
    OutboxEvent, AGGREGATE_PAYMENT, EVENT_PAYMENT_COMPLETED, EVENT_PAYMENT_CREATED,
    EVENT_PAYMENT_FAILED, EVENT_PAYMENT_REFUNDED,
};
use crate::repo::PaymentStore;

#[derive(Debug, Clone)]
pub struct ProcessPaymentRequest {
    pub customer_id: String,
    pub amount: Amount,
    pub payment_method: PaymentMethod,
    pub payment_method_token: String,
    pub idempotency_key: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessPaymentResponse {
    pub payment_id: Uuid,
    pub status: PaymentStatus,
    pub provider_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RefundPaymentRequest {
    pub payment_id: Uuid,
    /// None refunds the remaining refundable amount.
    pub amount: Option<Amount>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundPaymentResponse {
    pub payment_id: Uuid,
    pub refund_amount: Amount,
    pub status: PaymentStatus,
    pub refund_transaction_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusResponse {
    pub payment_id: Uuid,
    pub customer_id: String,
    pub total_amount: Amount,
    pub refunded_amount: Amount,
    pub status: PaymentStatus,
    pub entries: Vec<LedgerEntry>,
}

/// Drives the payment state machine against the gateway, enforcing
/// idempotency and writing ledger entries and outbox events atomically with
/// every aggregate change.
pub struct PaymentOrchestrator {
    store: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    idempotency: Arc<dyn IdempotencyStore>,
    config: OrchestratorConfig,
}

impl PaymentOrchestrator {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        idempotency: Arc<dyn IdempotencyStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            idempotency,
            config,
        }
    }

    pub async fn process_payment(
        &self,
        request: ProcessPaymentRequest,
    ) -> Result<ProcessPaymentResponse, PaymentError> {
        if let Some(cached) = self.claim_key(&request.idempotency_key).await? {
            let response = serde_json::from_value(cached).map_err(StoreError::from)?;
            return Ok(response);
        }

        match self.execute_charge(&request).await {
            Ok(response) => {
                let body = serde_json::to_value(&response).map_err(StoreError::from)?;
                self.idempotency
                    .store_result(&request.idempotency_key, &body, self.config.idempotency_ttl)
                    .await?;
                Ok(response)
            }
            Err(err) => {
                // Release the reservation so the client can retry.
                if let Err(release_err) = self.idempotency.delete(&request.idempotency_key).await {
                    tracing::error!(
                        idempotency_key = %request.idempotency_key,
                        error = %release_err,
                        "failed to release idempotency reservation"
                    );
                }
                Err(err)
            }
        }
    }

    async fn execute_charge(
        &self,
        request: &ProcessPaymentRequest,
    ) -> Result<ProcessPaymentResponse, PaymentError> {
        let mut payment = Payment::new(
            Uuid::new_v4(),
            &request.customer_id,
            request.amount.clone(),
            request.payment_method,
            self.gateway.name(),
            request.metadata.clone(),
        )?;

        let created = payment_event(
            &payment,
            EVENT_PAYMENT_CREATED,
            json!({
                "payment_id": payment.id,
                "customer_id": payment.customer_id,
                "amount": payment.amount.value().to_string(),
                "currency": payment.amount.currency(),
                "payment_method": payment.payment_method.as_str(),
                "status": payment.status.as_str(),
            }),
        );
        self.store.persist(&payment, None, Some(&created)).await?;

        let charge = ChargeRequest {
            amount: request.amount.clone(),
            payment_method_token: request.payment_method_token.clone(),
            idempotency_key: request.idempotency_key.clone(),
            customer_id: request.customer_id.clone(),
            metadata: request.metadata.clone(),
        };

        match self.gateway.charge(&charge).await {
            Ok(provider_tx_id) => {
                payment.mark_processing(&provider_tx_id)?;
                let mut entry = LedgerEntry::charge(
                    payment.id,
                    request.amount.clone(),
                    &payment.provider,
                    &provider_tx_id,
                );
                self.store.persist(&payment, Some(&entry), None).await?;

                payment.mark_completed()?;
                entry.status = PaymentStatus::Completed;
                let completed = payment_event(
                    &payment,
                    EVENT_PAYMENT_COMPLETED,
                    json!({
                        "payment_id": payment.id,
                        "customer_id": payment.customer_id,
                        "amount": payment.amount.value().to_string(),
                        "currency": payment.amount.currency(),
                        "provider_transaction_id": provider_tx_id,
                        "status": payment.status.as_str(),
                    }),
                );
                self.store
                    .persist(&payment, Some(&entry), Some(&completed))
                    .await?;

                tracing::info!(
                    payment_id = %payment.id,
                    customer_id = %payment.customer_id,
                    "payment completed"
                );

                Ok(ProcessPaymentResponse {
                    payment_id: payment.id,
                    status: payment.status,
                    provider_transaction_id: Some(provider_tx_id),
                    created_at: payment.created_at,
                })
            }
            Err(provider_err) => {
                payment.mark_failed()?;
                let entry = LedgerEntry::failed_charge(
                    payment.id,
                    request.amount.clone(),
                    &payment.provider,
                    &provider_err.to_string(),
                );
                let failed = payment_event(
                    &payment,
                    EVENT_PAYMENT_FAILED,
                    json!({
                        "payment_id": payment.id,
                        "customer_id": payment.customer_id,
                        "amount": payment.amount.value().to_string(),
                        "currency": payment.amount.currency(),
                        "error": provider_err.to_string(),
                        "status": payment.status.as_str(),
                    }),
                );
                self.store
                    .persist(&payment, Some(&entry), Some(&failed))
                    .await?;

                tracing::warn!(
                    payment_id = %payment.id,
                    customer_id = %payment.customer_id,
                    error = %provider_err,
                    "payment failed at gateway"
                );

                Err(provider_err.into())
            }
        }
    }

    pub async fn refund_payment(
        &self,
        request: RefundPaymentRequest,
    ) -> Result<RefundPaymentResponse, PaymentError> {
        let key = request
            .idempotency_key
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if let Some(cached) = self.claim_key(&key).await? {
            let response = serde_json::from_value(cached).map_err(StoreError::from)?;
            return Ok(response);
        }

        match self.execute_refund(&request, &key).await {
            Ok(response) => {
                let body = serde_json::to_value(&response).map_err(StoreError::from)?;
                self.idempotency
                    .store_result(&key, &body, self.config.idempotency_ttl)
                    .await?;
                Ok(response)
            }
            Err(err) => {
                if let Err(release_err) = self.idempotency.delete(&key).await {
                    tracing::error!(
                        idempotency_key = %key,
                        error = %release_err,
                        "failed to release idempotency reservation"
                    );
                }
                Err(err)
            }
        }
    }

    async fn execute_refund(
        &self,
        request: &RefundPaymentRequest,
        idempotency_key: &str,
    ) -> Result<RefundPaymentResponse, PaymentError> {
        let mut payment = self
            .store
            .get_by_id(request.payment_id)
            .await?
            .ok_or(PaymentError::PaymentNotFound(request.payment_id))?;

        if !payment.status.is_refund_eligible() {
            return Err(PaymentError::NotRefundable {
                id: payment.id,
                status: payment.status,
            });
        }
        let provider_tx_id = payment
            .provider_transaction_id
            .clone()
            .ok_or(PaymentError::MissingProviderTransaction(payment.id))?;

        let refund_amount = match &request.amount {
            Some(amount) => amount.clone(),
            None => payment.remaining_refundable()?,
        };

        // Reject an over-refund before the gateway is touched; the provider
        // must never hold a refund the aggregate would then refuse to record.
        let total = payment.refunded_amount.checked_add(&refund_amount)?;
        if total.value() > payment.amount.value() {
            return Err(DomainError::RefundExceedsOriginal {
                attempted: total.to_string(),
                original: payment.amount.to_string(),
            }
            .into());
        }

        let refund_tx_id = self
            .gateway
            .refund(&provider_tx_id, &refund_amount, idempotency_key)
            .await?;

        payment.refund(&refund_amount)?;
        let entry = LedgerEntry::refund(
            payment.id,
            refund_amount.clone(),
            &payment.provider,
            &refund_tx_id,
        );
        let refunded = payment_event(
            &payment,
            EVENT_PAYMENT_REFUNDED,
            json!({
                "payment_id": payment.id,
                "customer_id": payment.customer_id,
                "refund_amount": refund_amount.value().to_string(),
                "currency": refund_amount.currency(),
                "refund_transaction_id": refund_tx_id,
                "refunded_total": payment.refunded_amount.value().to_string(),
                "status": payment.status.as_str(),
            }),
        );
        self.store
            .persist(&payment, Some(&entry), Some(&refunded))
            .await?;

        tracing::info!(
            payment_id = %payment.id,
            refund_amount = %refund_amount,
            status = %payment.status,
            "refund applied"
        );

        Ok(RefundPaymentResponse {
            payment_id: payment.id,
            refund_amount,
            status: payment.status,
            refund_transaction_id: refund_tx_id,
            created_at: entry.created_at,
        })
    }

    /// Payment summary with its full ledger.
    pub async fn payment_status(
        &self,
        payment_id: Uuid,
    ) -> Result<PaymentStatusResponse, PaymentError> {
        let payment = self
            .store
            .get_by_id(payment_id)
            .await?
            .ok_or(PaymentError::PaymentNotFound(payment_id))?;
        let entries = self.store.entries_for_payment(payment_id).await?;

        Ok(PaymentStatusResponse {
            payment_id: payment.id,
            customer_id: payment.customer_id,
            total_amount: payment.amount,
            refunded_amount: payment.refunded_amount,
            status: payment.status,
            entries,
        })
    }

    /// Reserve the idempotency key, or surface the earlier response.
    ///
    /// Returns None when this caller owns the key. A losing caller waits a
    /// bounded time for the winner's cached response instead of racing it to
    /// the gateway.
    async fn claim_key(&self, key: &str) -> Result<Option<serde_json::Value>, PaymentError> {
        if self
            .idempotency
            .try_reserve(key, self.config.idempotency_ttl)
            .await?
        {
            return Ok(None);
        }

        let mut waited = Duration::ZERO;
        loop {
            if let Some(cached) = self.idempotency.get_result(key).await? {
                tracing::info!(
                    idempotency_key = %key,
                    "returning cached response for duplicate request"
                );
                return Ok(Some(cached));
            }
            if waited >= self.config.duplicate_wait {
                return Err(PaymentError::RequestInFlight(key.to_string()));
            }
            tokio::time::sleep(self.config.duplicate_poll).await;
            waited += self.config.duplicate_poll;
        }
    }
}

fn payment_event(payment: &Payment, event_type: &str, payload: serde_json::Value) -> OutboxEvent {
    OutboxEvent::new(
        AGGREGATE_PAYMENT,
        &payment.id.to_string(),
        event_type,
        payload,
    )
}
