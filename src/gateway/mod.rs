use std::collections::HashMap;

use crate::domain::amount::Amount;
use crate::error::ProviderError;

pub mod mock;

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount: Amount,
    pub payment_method_token: String,
    pub idempotency_key: String,
    pub customer_id: String,
    pub metadata: HashMap<String, String>,
}

/// Port for payment provider integrations. Implementations carry their own
/// request timeouts.
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &str;

    /// Charge a payment method, returning the provider transaction id.
    async fn charge(&self, request: &ChargeRequest) -> Result<String, ProviderError>;

    /// Refund a previous charge, returning the refund transaction id.
    async fn refund(
        &self,
        provider_transaction_id: &str,
        amount: &Amount,
        idempotency_key: &str,
    ) -> Result<String, ProviderError>;

    async fn charge_status(
        &self,
        provider_transaction_id: &str,
    ) -> Result<HashMap<String, String>, ProviderError>;
}
