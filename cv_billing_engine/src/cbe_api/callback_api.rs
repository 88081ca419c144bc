//! # Callback verification and outcome recording
//!
//! [`CallbackApi`] handles the gateway's report of a payment, whichever path it arrives on (browser redirect or
//! server-to-server webhook; both carry the same parameters and the same signature scheme).
//!
//! The order of operations is fixed: find the transaction, resolve the credentials the order was created under,
//! verify the signature, and only then touch any state. A callback that fails verification leaves the transaction
//! exactly as it was.

use log::{info, warn};

use super::errors::CallbackError;
use crate::{
    credentials::CredentialResolver,
    db_types::{GatewayOrderId, GatewayStatus, Transaction},
    helpers::{verify_callback_signature, SIGNATURE_FIELD},
    traits::{BillingDatabase, OutcomeResolution, OutcomeUpdate},
};

/// The callback parameter carrying our order id.
pub const ORDER_ID_FIELD: &str = "merchantOrderId";
/// The callback parameter carrying the gateway's status code.
pub const STATUS_FIELD: &str = "paymentStatus";
/// The callback parameter carrying the gateway's own reference number.
pub const REFERENCE_FIELD: &str = "transactionId";
/// The callback parameter carrying the masked payment instrument.
pub const INSTRUMENT_FIELD: &str = "maskedCard";

//--------------------------------------  CallbackResolution ---------------------------------------------------------
/// The outcome of processing a verified callback.
#[derive(Debug, Clone)]
pub struct CallbackResolution {
    pub transaction: Transaction,
    /// `true` when this callback moved the transaction out of `Pending`. Duplicate and conflicting deliveries
    /// report `false`; the caller uses this to decide whether activation needs to run.
    pub transitioned: bool,
}

//--------------------------------------     CallbackApi     ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct CallbackApi<B> {
    db: B,
    resolver: CredentialResolver,
}

impl<B> CallbackApi<B>
where B: BillingDatabase
{
    pub fn new(db: B, resolver: CredentialResolver) -> Self {
        Self { db, resolver }
    }

    /// Processes one gateway callback, given the parameters in the order they arrived.
    ///
    /// The signature covers the parameters as received, so `params` must preserve wire order. The credentials
    /// used for verification are resolved for the transaction's buyer, which is how a sandbox payment gets
    /// verified against the sandbox secret even on a production deployment.
    pub async fn process_callback(&self, params: &[(String, String)]) -> Result<CallbackResolution, CallbackError> {
        let order_id = self.required_field(params, ORDER_ID_FIELD)?;
        let status_code = self.required_field(params, STATUS_FIELD)?;
        let order_id = GatewayOrderId(order_id.to_string());
        let transaction = self
            .db
            .fetch_transaction_by_order_id(&order_id)
            .await?
            .ok_or_else(|| CallbackError::OrderNotFound(order_id.clone()))?;
        let creds = self.resolver.resolve(Some(&transaction.buyer_id))?;
        let signature = params.iter().find(|(k, _)| k == SIGNATURE_FIELD).map(|(_, v)| v.as_str());
        if !verify_callback_signature(params, signature, &creds.secret_key) {
            warn!("🔏️ Callback for order {order_id} failed signature verification. Ignoring it.");
            return Err(CallbackError::InvalidSignature);
        }
        let status = GatewayStatus::from_code(status_code);
        if let GatewayStatus::Unrecognized(code) = &status {
            warn!("🔏️ Gateway reported unknown status '{code}' for order {order_id}. Treating it as a failure.");
        }
        let update = OutcomeUpdate {
            order_id,
            outcome: status.normalized(),
            raw_status: status_code.to_string(),
            gateway_reference: self.optional_field(params, REFERENCE_FIELD),
            masked_instrument: self.optional_field(params, INSTRUMENT_FIELD),
        };
        let resolution = self.db.record_gateway_outcome(update).await?;
        let transitioned = matches!(resolution, OutcomeResolution::Transitioned(_));
        let transaction = resolution.transaction().clone();
        info!(
            "🔏️ Verified callback for transaction [{}]: {} ({}){}",
            transaction.transaction_id,
            transaction.outcome,
            status,
            if transitioned { "" } else { ". No transition; the stored outcome stands." }
        );
        Ok(CallbackResolution { transaction, transitioned })
    }

    fn required_field<'a>(
        &self,
        params: &'a [(String, String)],
        field: &'static str,
    ) -> Result<&'a str, CallbackError> {
        params
            .iter()
            .find(|(k, _)| k == field)
            .map(|(_, v)| v.as_str())
            .ok_or(CallbackError::MissingField(field))
    }

    fn optional_field(&self, params: &[(String, String)], field: &str) -> Option<String> {
        params.iter().find(|(k, _)| k == field).map(|(_, v)| v.clone()).filter(|v| !v.is_empty())
    }
}
