use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::amount::Amount;
use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Paypal,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "CREDIT_CARD",
            PaymentMethod::DebitCard => "DEBIT_CARD",
            PaymentMethod::Paypal => "PAYPAL",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREDIT_CARD" => Some(PaymentMethod::CreditCard),
            "DEBIT_CARD" => Some(PaymentMethod::DebitCard),
            "PAYPAL" => Some(PaymentMethod::Paypal),
            "BANK_TRANSFER" => Some(PaymentMethod::BankTransfer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    PartiallyRefunded,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::PartiallyRefunded => "PARTIALLY_REFUNDED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "PROCESSING" => Some(PaymentStatus::Processing),
            "COMPLETED" => Some(PaymentStatus::Completed),
            "FAILED" => Some(PaymentStatus::Failed),
            "REFUNDED" => Some(PaymentStatus::Refunded),
            "PARTIALLY_REFUNDED" => Some(PaymentStatus::PartiallyRefunded),
            "CANCELLED" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }

    /// No further charge-side transition is possible from this status.
    pub fn is_closed_for_charging(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed
                | PaymentStatus::Failed
                | PaymentStatus::Refunded
                | PaymentStatus::Cancelled
        )
    }

    /// The payment can still accept a refund.
    pub fn is_refund_eligible(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::PartiallyRefunded
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment aggregate root. Mutated only through the state-machine methods
/// below; a rejected transition leaves the aggregate untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub customer_id: String,
    pub amount: Amount,
    pub payment_method: PaymentMethod,
    pub provider: String,
    pub status: PaymentStatus,
    pub provider_transaction_id: Option<String>,
    pub refunded_amount: Amount,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

impl Payment {
    pub fn new(
        id: Uuid,
        customer_id: &str,
        amount: Amount,
        payment_method: PaymentMethod,
        provider: &str,
        metadata: HashMap<String, String>,
    ) -> Result<Self, DomainError> {
        if customer_id.is_empty() {
            return Err(DomainError::Validation(
                "customer id is required".to_string(),
            ));
        }
        if provider.is_empty() {
            return Err(DomainError::Validation(
                "payment provider is required".to_string(),
            ));
        }
        let now = Utc::now();
        let refunded_amount = amount.zero_like();
        Ok(Self {
            id,
            customer_id: customer_id.to_string(),
            amount,
            payment_method,
            provider: provider.to_string(),
            status: PaymentStatus::Pending,
            provider_transaction_id: None,
            refunded_amount,
            created_at: now,
            updated_at: now,
            metadata,
        })
    }

    pub fn mark_processing(&mut self, provider_transaction_id: &str) -> Result<(), DomainError> {
        if self.status != PaymentStatus::Pending {
            return Err(DomainError::InvalidPaymentState {
                action: "mark as processing",
                status: self.status,
            });
        }
        self.status = PaymentStatus::Processing;
        self.provider_transaction_id = Some(provider_transaction_id.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_completed(&mut self) -> Result<(), DomainError> {
        if self.status != PaymentStatus::Processing {
            return Err(DomainError::InvalidPaymentState {
                action: "mark as completed",
                status: self.status,
            });
        }
        self.status = PaymentStatus::Completed;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_failed(&mut self) -> Result<(), DomainError> {
        if matches!(
            self.status,
            PaymentStatus::Completed | PaymentStatus::Refunded
        ) {
            return Err(DomainError::InvalidPaymentState {
                action: "mark as failed",
                status: self.status,
            });
        }
        self.status = PaymentStatus::Failed;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Apply a refund. Status moves to `Refunded` when the running total
    /// reaches the original amount, `PartiallyRefunded` otherwise.
    pub fn refund(&mut self, refund_amount: &Amount) -> Result<(), DomainError> {
        if !self.status.is_refund_eligible() {
            return Err(DomainError::InvalidPaymentState {
                action: "refund",
                status: self.status,
            });
        }

        let total_refunded = self.refunded_amount.checked_add(refund_amount)?;
        if total_refunded.value() > self.amount.value() {
            return Err(DomainError::RefundExceedsOriginal {
                attempted: total_refunded.to_string(),
                original: self.amount.to_string(),
            });
        }

        self.status = if total_refunded.value() == self.amount.value() {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };
        self.refunded_amount = total_refunded;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// How much of the original amount can still be refunded.
    pub fn remaining_refundable(&self) -> Result<Amount, DomainError> {
        if !self.status.is_refund_eligible() {
            return Ok(self.amount.zero_like());
        }
        self.amount.checked_sub(&self.refunded_amount)
    }
}
