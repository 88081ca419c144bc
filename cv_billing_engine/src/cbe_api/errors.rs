use thiserror::Error;

use crate::{
    credentials::CredentialError,
    db_types::{GatewayOrderId, PaymentOutcome, TransactionId},
    traits::BillingDatabaseError,
};

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    /// Required gateway credentials are missing. The message of the wrapped error names environment variables
    /// only; callers in production mode should surface a generic "payment service unavailable".
    #[error("The payment service is unavailable. {0}")]
    Configuration(#[from] CredentialError),
    /// The pending transaction could not be stored, even after a retry. No gateway configuration was produced.
    #[error("Could not create the checkout. {0}")]
    CheckoutFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum CallbackError {
    /// The callback's signature was missing or did not verify. The transaction is left untouched; an unverified
    /// report must not be trusted.
    #[error("Callback signature is invalid or missing.")]
    InvalidSignature,
    #[error("Callback is missing the required '{0}' parameter.")]
    MissingField(&'static str),
    #[error("No transaction carries gateway order id {0}")]
    OrderNotFound(GatewayOrderId),
    #[error("The payment service is unavailable. {0}")]
    Configuration(#[from] CredentialError),
    #[error("An error occurred in the billing backend. {0}")]
    Backend(String),
}

impl From<BillingDatabaseError> for CallbackError {
    fn from(e: BillingDatabaseError) -> Self {
        match e {
            BillingDatabaseError::OrderNotFound(oid) => CallbackError::OrderNotFound(oid),
            other => CallbackError::Backend(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ActivationError {
    #[error("The requested transaction {0} does not exist.")]
    NotFound(TransactionId),
    /// The transaction exists but is not in the `Succeeded` outcome. Distinct from the idempotent no-op, which is
    /// a success path, not an error.
    #[error("Transaction {0} is not eligible for activation; its outcome is {1}.")]
    NotEligible(TransactionId, PaymentOutcome),
    /// The atomic subscription write kept failing. Safe to retry: no partial state is ever observable.
    #[error("Could not apply activation for transaction {0} after {1} attempts. {2}")]
    ActivationFailed(TransactionId, u32, String),
    #[error("An error occurred in the billing backend. {0}")]
    Backend(String),
}

impl From<BillingDatabaseError> for ActivationError {
    fn from(e: BillingDatabaseError) -> Self {
        ActivationError::Backend(e.to_string())
    }
}
