//! # Exactly-once activation
//!
//! [`ActivationApi`] applies a succeeded transaction to the buyer's subscription. The operation is idempotent:
//! however many times activation is requested for one transaction (redirect and webhook both firing, retries,
//! operator replays), the plan's benefits are applied exactly once.
//!
//! The mechanism is optimistic: read the subscription, compute the new state, then attempt a conditional write
//! that only lands if `last_applied_txid` still holds the value that was read. A lost race means another writer
//! got there first; re-read and decide again. Either the fresh read shows this transaction already applied (done,
//! nothing to do) or a *different* transaction won and this one's grant is recomputed against the new state. No
//! partial application is ever observable.

use log::{debug, info, warn};

use super::errors::ActivationError;
use crate::{
    db_types::{ActivationEvent, PaymentOutcome, Subscription, Transaction, TransactionId},
    traits::{ActivationApplied, ActivationGrant, BillingDatabase, BillingDatabaseError},
};

/// Lost races and transient store errors re-read and retry up to this many times before reporting failure. Each
/// race retry only loses if yet another writer landed in between, so in practice two attempts suffice.
const MAX_ATTEMPTS: u32 = 5;

//--------------------------------------      Activation     ---------------------------------------------------------
/// The result of an activation request.
#[derive(Debug, Clone)]
pub struct Activation {
    /// `true` if this call applied the benefits, `false` if they had already been applied earlier. Both are
    /// success: the caller's transaction is reflected in the subscription either way.
    pub applied: bool,
    pub subscription: Subscription,
}

//--------------------------------------     ActivationApi   ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct ActivationApi<B> {
    db: B,
}

impl<B> ActivationApi<B>
where B: BillingDatabase
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Applies the given succeeded transaction to its buyer's subscription, exactly once.
    pub async fn activate(&self, transaction_id: &TransactionId) -> Result<Activation, ActivationError> {
        let transaction = self
            .db
            .fetch_transaction(transaction_id)
            .await?
            .ok_or_else(|| ActivationError::NotFound(transaction_id.clone()))?;
        if transaction.outcome != PaymentOutcome::Succeeded {
            return Err(ActivationError::NotEligible(transaction_id.clone(), transaction.outcome));
        }
        let mut last_error = "the conditional subscription write kept losing races".to_string();
        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt_activation(&transaction).await {
                Ok(Some(activation)) => return Ok(activation),
                Ok(None) => {
                    debug!(
                        "🎫️ Activation attempt {attempt} for transaction [{transaction_id}] lost a race. \
                         Re-reading."
                    );
                },
                Err(e) => {
                    warn!(
                        "🎫️ Activation attempt {attempt} for transaction [{transaction_id}] hit a store error. {e}"
                    );
                    last_error = e.to_string();
                },
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(std::time::Duration::from_millis(10 * u64::from(attempt))).await;
            }
        }
        warn!("🎫️ Gave up activating transaction [{transaction_id}] after {MAX_ATTEMPTS} attempts");
        Err(ActivationError::ActivationFailed(transaction_id.clone(), MAX_ATTEMPTS, last_error))
    }

    /// One optimistic attempt: read the subscription, compute the grant, try the conditional write. `None` means
    /// the write lost a race; a store error means the attempt can be retried wholesale.
    async fn attempt_activation(&self, transaction: &Transaction) -> Result<Option<Activation>, BillingDatabaseError> {
        let transaction_id = &transaction.transaction_id;
        let current = self.db.fetch_subscription(&transaction.buyer_id).await?;
        if let Some(sub) = &current {
            if sub.last_applied_txid.as_ref() == Some(transaction_id) {
                debug!(
                    "🎫️ Transaction [{transaction_id}] has already been applied to {}'s subscription. Nothing to do.",
                    transaction.buyer_id
                );
                return Ok(Some(Activation { applied: false, subscription: sub.clone() }));
            }
        }
        let expected = current.and_then(|sub| sub.last_applied_txid);
        let grant = ActivationGrant::for_transaction(transaction, chrono::Utc::now(), expected);
        match self.db.apply_activation(grant).await? {
            ActivationApplied::Applied(subscription) => {
                info!(
                    "🎫️ Activated {} for {} until {:?} (transaction [{transaction_id}])",
                    transaction.plan, subscription.buyer_id, subscription.valid_until
                );
                Ok(Some(Activation { applied: true, subscription }))
            },
            ActivationApplied::Superseded => Ok(None),
        }
    }

    /// Activates every succeeded, not-yet-applied aspect of a callback in one call. A convenience used by the
    /// callback routes: eligible transactions are activated, anything else is reported as-is.
    pub async fn activate_if_eligible(&self, transaction: &Transaction) -> Result<Option<Activation>, ActivationError> {
        if transaction.outcome != PaymentOutcome::Succeeded {
            return Ok(None);
        }
        self.activate(&transaction.transaction_id).await.map(Some)
    }

    /// The buyer's current subscription, or the implicit "no plan" baseline if they have never activated one.
    pub async fn subscription_for(&self, buyer_id: &str) -> Result<Subscription, ActivationError> {
        let sub = self.db.fetch_subscription(buyer_id).await?;
        Ok(sub.unwrap_or_else(|| Subscription::none_for(buyer_id)))
    }

    /// The append-only activation history for a buyer, oldest first.
    pub async fn history_for(&self, buyer_id: &str) -> Result<Vec<ActivationEvent>, ActivationError> {
        Ok(self.db.fetch_activation_history(buyer_id).await?)
    }
}
