use thiserror::Error;
use uuid::Uuid;

use crate::domain::payment::PaymentStatus;

/// Invariant violations inside the Payment aggregate and its value objects.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    #[error("cannot {action}: current status is {status}")]
    InvalidPaymentState {
        action: &'static str,
        status: PaymentStatus,
    },

    #[error("refund total {attempted} exceeds original payment {original}")]
    RefundExceedsOriginal { attempted: String, original: String },
}

/// How a gateway failure should be compensated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Permanent,
    Transient,
    Fraud,
}

/// Failures raised by the payment gateway port.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("invalid payment method: {0}")]
    InvalidPaymentMethod(String),

    #[error("provider connection error: {0}")]
    Connection(String),

    #[error("fraud suspected: {0}")]
    FraudSuspected(String),

    #[error("provider error: {0}")]
    Other(String),
}

impl ProviderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::Connection(_) => FailureKind::Transient,
            ProviderError::FraudSuspected(_) => FailureKind::Fraud,
            ProviderError::InsufficientFunds(_)
            | ProviderError::InvalidPaymentMethod(_)
            | ProviderError::Other(_) => FailureKind::Permanent,
        }
    }
}

/// Failures at the storage and cache boundaries.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Relay-internal publish failure. Never surfaces to request callers.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("bus unavailable: {0}")]
    Connection(String),

    #[error("publish rejected: {0}")]
    Rejected(String),
}

impl From<redis::RedisError> for PublishError {
    fn from(err: redis::RedisError) -> Self {
        PublishError::Connection(err.to_string())
    }
}

/// Use-case error surface for `process_payment` / `refund_payment`.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("payment {0} not found")]
    PaymentNotFound(Uuid),

    #[error("payment {0} has no provider transaction id")]
    MissingProviderTransaction(Uuid),

    #[error("payment {id} cannot be refunded (status: {status})")]
    NotRefundable { id: Uuid, status: PaymentStatus },

    #[error("request with idempotency key {0} is already in flight")]
    RequestInFlight(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
