use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::amount::Amount;
use crate::domain::payment::PaymentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Charge,
    Refund,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Charge => "CHARGE",
            EntryType::Refund => "REFUND",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CHARGE" => Some(EntryType::Charge),
            "REFUND" => Some(EntryType::Refund),
            _ => None,
        }
    }
}

/// Append-only record of one gateway interaction attempt, failures included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub amount: Amount,
    pub entry_type: EntryType,
    pub status: PaymentStatus,
    pub provider: String,
    pub provider_transaction_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

impl LedgerEntry {
    pub fn charge(
        payment_id: Uuid,
        amount: Amount,
        provider: &str,
        provider_transaction_id: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id,
            amount,
            entry_type: EntryType::Charge,
            status: PaymentStatus::Processing,
            provider: provider.to_string(),
            provider_transaction_id: Some(provider_transaction_id.to_string()),
            error_message: None,
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn failed_charge(payment_id: Uuid, amount: Amount, provider: &str, error: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id,
            amount,
            entry_type: EntryType::Charge,
            status: PaymentStatus::Failed,
            provider: provider.to_string(),
            provider_transaction_id: None,
            error_message: Some(error.to_string()),
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn refund(
        payment_id: Uuid,
        amount: Amount,
        provider: &str,
        refund_transaction_id: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id,
            amount,
            entry_type: EntryType::Refund,
            status: PaymentStatus::Completed,
            provider: provider.to_string(),
            provider_transaction_id: Some(refund_transaction_id.to_string()),
            error_message: None,
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }
}
