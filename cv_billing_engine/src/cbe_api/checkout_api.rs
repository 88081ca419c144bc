//! # Checkout orchestration
//!
//! [`CheckoutApi`] turns a buyer's "buy this plan" intent into a signed gateway configuration. The sequence is
//! always: resolve credentials, persist a `Pending` transaction, sign the canonical order message. Persisting
//! before signing means every signature that ever leaves this process corresponds to a stored transaction; a
//! callback can never reference an order we have no record of.
//!
//! Under the [`PaymentStrategy::DirectGrant`] strategy no gateway configuration is produced at all. The
//! transaction is recorded as succeeded on the spot (with a raw status that makes the grant auditable) and the
//! caller hands it straight to the activation engine. Complimentary and promotional grants flow through the same
//! transaction record and the same activation path as paid ones.

use std::{fmt::Display, str::FromStr};

use cvb_common::Money;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::errors::CheckoutError;
use crate::{
    credentials::{CredentialResolver, GatewayMode},
    db_types::{GatewayOrderId, NewTransaction, PaymentOutcome, Transaction, TransactionId},
    helpers::sign_order,
    plans::PlanProduct,
    traits::{BillingDatabase, BillingDatabaseError, OutcomeUpdate},
};

/// Raw status recorded on transactions settled without the gateway.
pub const DIRECT_GRANT_STATUS: &str = "DIRECT_GRANT";

//--------------------------------------   PaymentStrategy   ---------------------------------------------------------
/// How a deployment settles purchases. Injected at construction; nothing downstream of checkout ever consults it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStrategy {
    /// Send the buyer to the payment gateway. The default for production deployments.
    Gateway,
    /// Settle the transaction immediately without the gateway. For internal and demo deployments only.
    DirectGrant,
}

impl Display for PaymentStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStrategy::Gateway => write!(f, "gateway"),
            PaymentStrategy::DirectGrant => write!(f, "direct_grant"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid payment strategy: {0}. Expected 'gateway' or 'direct_grant'")]
pub struct InvalidPaymentStrategy(String);

impl FromStr for PaymentStrategy {
    type Err = InvalidPaymentStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gateway" => Ok(Self::Gateway),
            "direct_grant" => Ok(Self::DirectGrant),
            s => Err(InvalidPaymentStrategy(s.to_string())),
        }
    }
}

//--------------------------------------   CheckoutOptions   ---------------------------------------------------------
/// Deployment-level checkout settings, shared by every checkout this instance creates.
#[derive(Debug, Clone)]
pub struct CheckoutOptions {
    /// Where the gateway sends the buyer's browser after a successful payment.
    pub success_url: String,
    /// Where the gateway sends the buyer's browser after a failed or abandoned payment.
    pub failure_url: String,
    /// UI language for the hosted payment page.
    pub display_language: String,
    pub strategy: PaymentStrategy,
}

//--------------------------------------   CheckoutRequest   ---------------------------------------------------------
/// A buyer's intent to purchase one plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub buyer_id: String,
    pub plan: PlanProduct,
    /// Optional billing email. When present it is folded into the order signature as the customer reference.
    pub buyer_email: Option<String>,
    /// Optional display name, accepted alongside the email. It is not part of the signed order message.
    pub buyer_name: Option<String>,
}

//--------------------------------------   GatewayCheckout   ---------------------------------------------------------
/// Everything the front end needs to open the hosted payment page. Contains the order signature but no key
/// material; the signing keys never leave the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCheckout {
    pub merchant_id: String,
    pub order_id: GatewayOrderId,
    /// The amount exactly as it was signed, with two decimal places.
    pub amount: String,
    pub currency: String,
    pub signature: String,
    pub mode: GatewayMode,
    /// Percent-encoded redirect target for successful payments.
    pub success_url: String,
    /// Percent-encoded redirect target for failed payments.
    pub failure_url: String,
    pub display_language: String,
}

//--------------------------------------   CheckoutResponse  ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub transaction_id: TransactionId,
    pub order_id: GatewayOrderId,
    pub amount: Money,
    pub strategy: PaymentStrategy,
    /// `None` under the direct-grant strategy; the transaction is already settled and ready for activation.
    pub gateway: Option<GatewayCheckout>,
}

//--------------------------------------     CheckoutApi     ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct CheckoutApi<B> {
    db: B,
    resolver: CredentialResolver,
    options: CheckoutOptions,
}

impl<B> CheckoutApi<B>
where B: BillingDatabase
{
    pub fn new(db: B, resolver: CredentialResolver, options: CheckoutOptions) -> Self {
        Self { db, resolver, options }
    }

    pub fn options(&self) -> &CheckoutOptions {
        &self.options
    }

    /// Creates a checkout for the given request.
    ///
    /// Credentials are resolved *before* any write, so a misconfigured deployment fails without leaving stray
    /// `Pending` transactions behind. The store write is retried once (with fresh ids, in case the timestamped
    /// order id collided) before the checkout is reported as failed.
    pub async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutResponse, CheckoutError> {
        let creds = self.resolver.resolve(Some(&request.buyer_id))?;
        let transaction = self.insert_with_retry(&request).await?;
        info!(
            "🛒️ Checkout created for buyer {}: {} for {} (transaction [{}], {} mode)",
            transaction.buyer_id, transaction.plan, transaction.amount, transaction.transaction_id, creds.mode
        );
        if self.options.strategy == PaymentStrategy::DirectGrant {
            let transaction = self.settle_directly(transaction).await?;
            return Ok(CheckoutResponse {
                transaction_id: transaction.transaction_id,
                order_id: transaction.order_id,
                amount: transaction.amount,
                strategy: PaymentStrategy::DirectGrant,
                gateway: None,
            });
        }
        let signature = sign_order(
            &creds.merchant_id,
            &transaction.order_id,
            transaction.amount,
            &transaction.currency,
            &creds.api_key,
            request.buyer_email.as_deref(),
        );
        let gateway = GatewayCheckout {
            merchant_id: creds.merchant_id,
            order_id: transaction.order_id.clone(),
            amount: transaction.amount.to_decimal_string(),
            currency: transaction.currency.clone(),
            signature,
            mode: creds.mode,
            success_url: urlencoding::encode(&self.options.success_url).into_owned(),
            failure_url: urlencoding::encode(&self.options.failure_url).into_owned(),
            display_language: self.options.display_language.clone(),
        };
        Ok(CheckoutResponse {
            transaction_id: transaction.transaction_id,
            order_id: transaction.order_id,
            amount: transaction.amount,
            strategy: PaymentStrategy::Gateway,
            gateway: Some(gateway),
        })
    }

    async fn insert_with_retry(&self, request: &CheckoutRequest) -> Result<Transaction, CheckoutError> {
        let new_tx = NewTransaction::for_plan(&request.buyer_id, request.plan);
        match self.db.insert_transaction(new_tx).await {
            Ok(tx) => Ok(tx),
            Err(e @ (BillingDatabaseError::DuplicateOrderId(_) | BillingDatabaseError::DatabaseError(_))) => {
                debug!("🛒️ Could not store the pending transaction ({e}). Retrying once with fresh ids.");
                let retry = NewTransaction::for_plan(&request.buyer_id, request.plan);
                self.db.insert_transaction(retry).await.map_err(|e| CheckoutError::CheckoutFailed(e.to_string()))
            },
            Err(e) => Err(CheckoutError::CheckoutFailed(e.to_string())),
        }
    }

    async fn settle_directly(&self, transaction: Transaction) -> Result<Transaction, CheckoutError> {
        let update = OutcomeUpdate {
            order_id: transaction.order_id.clone(),
            outcome: PaymentOutcome::Succeeded,
            raw_status: DIRECT_GRANT_STATUS.to_string(),
            gateway_reference: None,
            masked_instrument: None,
        };
        let resolution =
            self.db.record_gateway_outcome(update).await.map_err(|e| CheckoutError::CheckoutFailed(e.to_string()))?;
        info!("🛒️ Transaction [{}] settled directly, bypassing the gateway", transaction.transaction_id);
        Ok(resolution.transaction().clone())
    }
}
