use chrono::{DateTime, Utc};

use crate::{
    db_types::{GatewayOrderId, PaymentOutcome, Subscription, SubscriptionStatus, Transaction, TransactionId},
    plans::PlanProduct,
};

/// A verified gateway report to record against a transaction. Constructed only after the callback signature has
/// been validated; the database layer never sees unverified reports.
#[derive(Debug, Clone)]
pub struct OutcomeUpdate {
    pub order_id: GatewayOrderId,
    pub outcome: PaymentOutcome,
    /// The gateway's status code, verbatim.
    pub raw_status: String,
    pub gateway_reference: Option<String>,
    pub masked_instrument: Option<String>,
}

/// How the store resolved an [`OutcomeUpdate`].
#[derive(Debug, Clone)]
pub enum OutcomeResolution {
    /// The transaction transitioned out of `Pending` into the reported outcome.
    Transitioned(Transaction),
    /// The transaction was already in the reported terminal outcome. Reference and instrument fields may still
    /// have been filled in if this delivery supplied them first.
    AlreadySettled(Transaction),
    /// The transaction was already in a *different* terminal outcome. The stored outcome wins; the report is
    /// ignored.
    Conflicting(Transaction),
}

impl OutcomeResolution {
    pub fn transaction(&self) -> &Transaction {
        match self {
            OutcomeResolution::Transitioned(tx)
            | OutcomeResolution::AlreadySettled(tx)
            | OutcomeResolution::Conflicting(tx) => tx,
        }
    }
}

/// The new subscription state to apply for one succeeded transaction, together with the idempotency precondition.
///
/// `expected_last_applied` is the value of the subscription's `last_applied_txid` that the caller observed before
/// computing the grant. The write only lands if the field still holds that value; otherwise the caller lost a
/// race and must re-read.
#[derive(Debug, Clone)]
pub struct ActivationGrant {
    pub buyer_id: String,
    pub transaction_id: TransactionId,
    pub plan: PlanProduct,
    pub status: SubscriptionStatus,
    pub valid_until: DateTime<Utc>,
    pub credits_remaining: Option<i64>,
    pub expected_last_applied: Option<TransactionId>,
}

impl ActivationGrant {
    /// Computes the grant for a succeeded transaction as of `now`: status becomes `Active`, the validity window
    /// and credit counter come straight from the plan catalogue. Credits are **set**, not merged (see the note in
    /// [`crate::plans`]).
    pub fn for_transaction(tx: &Transaction, now: DateTime<Utc>, expected_last_applied: Option<TransactionId>) -> Self {
        Self {
            buyer_id: tx.buyer_id.clone(),
            transaction_id: tx.transaction_id.clone(),
            plan: tx.plan,
            status: SubscriptionStatus::Active,
            valid_until: now + tx.plan.validity(),
            credits_remaining: tx.plan.credits(),
            expected_last_applied,
        }
    }
}

/// The result of attempting an activation write.
#[derive(Debug, Clone)]
pub enum ActivationApplied {
    /// The conditional write landed; this is the updated subscription.
    Applied(Subscription),
    /// Another writer changed `last_applied_txid` first. No state was written; re-read and decide again.
    Superseded,
}
