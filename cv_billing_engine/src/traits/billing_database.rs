use thiserror::Error;

use crate::{
    db_types::{ActivationEvent, GatewayOrderId, NewTransaction, Subscription, Transaction, TransactionId},
    traits::{ActivationApplied, ActivationGrant, OutcomeResolution, OutcomeUpdate},
};

/// The storage contract for the billing engine.
///
/// The contract bakes in the two guarantees the rest of the engine relies on:
/// * recording a gateway outcome respects terminal states (a settled transaction never transitions again, and
///   the gateway reference / instrument descriptor are written at most once);
/// * applying an activation is a single atomic conditional write keyed on the subscription's prior
///   `last_applied_txid`, so two racing activations can never both land.
#[allow(async_fn_in_trait)]
pub trait BillingDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Stores a new pending transaction. The gateway order id is unique; inserting a duplicate is an error.
    async fn insert_transaction(&self, tx: NewTransaction) -> Result<Transaction, BillingDatabaseError>;

    async fn fetch_transaction(&self, id: &TransactionId) -> Result<Option<Transaction>, BillingDatabaseError>;

    async fn fetch_transaction_by_order_id(
        &self,
        order_id: &GatewayOrderId,
    ) -> Result<Option<Transaction>, BillingDatabaseError>;

    /// Records a verified gateway report against the transaction carrying `update.order_id`, in a single atomic
    /// transaction.
    ///
    /// * A pending transaction transitions to the reported outcome.
    /// * A transaction already in the same terminal outcome is left alone, except that a gateway reference or
    ///   masked instrument descriptor arriving for the first time is still recorded.
    /// * A transaction in a different terminal outcome is left untouched; the original outcome wins.
    async fn record_gateway_outcome(&self, update: OutcomeUpdate) -> Result<OutcomeResolution, BillingDatabaseError>;

    /// The buyer's subscription record, or `None` if nothing has ever been activated for them.
    async fn fetch_subscription(&self, buyer_id: &str) -> Result<Option<Subscription>, BillingDatabaseError>;

    /// The append-only activation history for a buyer, oldest first.
    async fn fetch_activation_history(&self, buyer_id: &str) -> Result<Vec<ActivationEvent>, BillingDatabaseError>;

    /// Applies an activation grant in one atomic unit: the subscription fields and the `last_applied_txid`
    /// idempotency marker land together (or not at all), one history entry is appended, and the transaction is
    /// stamped as activated.
    ///
    /// The write is conditional on `grant.expected_last_applied` still being the stored value. If another writer
    /// got there first, nothing is written and `Superseded` is returned; the caller re-reads and decides again.
    async fn apply_activation(&self, grant: ActivationGrant) -> Result<ActivationApplied, BillingDatabaseError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), BillingDatabaseError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum BillingDatabaseError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Cannot insert transaction, one already exists with order id {0}")]
    DuplicateOrderId(GatewayOrderId),
    #[error("No transaction carries gateway order id {0}")]
    OrderNotFound(GatewayOrderId),
}

impl From<sqlx::Error> for BillingDatabaseError {
    fn from(e: sqlx::Error) -> Self {
        BillingDatabaseError::DatabaseError(e.to_string())
    }
}
