use crate::domain::payment::Payment;
use crate::error::{DomainError, FailureKind, ProviderError};

/// What the dispatcher did with a failed payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompensationOutcome {
    /// Permanent failure: the payment was marked failed.
    MarkedFailed,
    /// Transient failure: state untouched, command redelivery retries.
    RetryScheduled,
    /// Fraud: marked failed and flagged for downstream review.
    FraudAlert,
}

/// Apply the recovery action matching a gateway failure. Performs no I/O
/// beyond the aggregate mutation; notification is an external collaborator.
pub fn dispatch(
    payment: &mut Payment,
    error: &ProviderError,
) -> Result<CompensationOutcome, DomainError> {
    match error.kind() {
        FailureKind::Permanent => {
            payment.mark_failed()?;
            tracing::warn!(
                payment_id = %payment.id,
                customer_id = %payment.customer_id,
                error = %error,
                "payment permanently failed"
            );
            Ok(CompensationOutcome::MarkedFailed)
        }
        FailureKind::Transient => {
            tracing::info!(
                payment_id = %payment.id,
                customer_id = %payment.customer_id,
                error = %error,
                "transient gateway failure, leaving payment for redelivery"
            );
            Ok(CompensationOutcome::RetryScheduled)
        }
        FailureKind::Fraud => {
            payment.mark_failed()?;
            tracing::error!(
                payment_id = %payment.id,
                customer_id = %payment.customer_id,
                error = %error,
                "payment flagged for fraud review"
            );
            Ok(CompensationOutcome::FraudAlert)
        }
    }
}
