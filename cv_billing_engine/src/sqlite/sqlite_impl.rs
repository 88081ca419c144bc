//! `SqliteDatabase` is the concrete SQLite backend for the billing engine.
//!
//! It implements [`BillingDatabase`] on top of the low-level functions in [`super::db`]. The two multi-statement
//! operations (recording a gateway outcome and applying an activation) run inside sqlx transactions so that no
//! partial state is ever observable; concurrent activations are serialized by SQLite's writer lock and decided by
//! the conditional write in [`super::db::subscriptions::apply_grant`].
use std::fmt::Debug;

use chrono::Utc;
use sqlx::SqlitePool;

use super::db::{new_pool, subscriptions, transactions};
use crate::{
    db_types::{ActivationEvent, GatewayOrderId, NewTransaction, Subscription, Transaction, TransactionId},
    traits::{
        ActivationApplied,
        ActivationGrant,
        BillingDatabase,
        BillingDatabaseError,
        OutcomeResolution,
        OutcomeUpdate,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database connection pool with `max_connections` connections, using the URL from the
    /// environment (or the default).
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = super::db::db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await
    }
}

impl BillingDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_transaction(&self, tx: NewTransaction) -> Result<Transaction, BillingDatabaseError> {
        // An explicit commit, so the pending row is visible on every other pool connection before the signed
        // configuration leaves the process. A callback can arrive on a different connection immediately.
        let mut txn = self.pool.begin().await?;
        let transaction = transactions::insert(tx, &mut txn).await?;
        txn.commit().await?;
        Ok(transaction)
    }

    async fn fetch_transaction(&self, id: &TransactionId) -> Result<Option<Transaction>, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Ok(transactions::fetch_by_transaction_id(id, &mut conn).await?)
    }

    async fn fetch_transaction_by_order_id(
        &self,
        order_id: &GatewayOrderId,
    ) -> Result<Option<Transaction>, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Ok(transactions::fetch_by_order_id(order_id, &mut conn).await?)
    }

    async fn record_gateway_outcome(&self, update: OutcomeUpdate) -> Result<OutcomeResolution, BillingDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let resolution = transactions::record_outcome(update, &mut tx).await?;
        tx.commit().await?;
        Ok(resolution)
    }

    async fn fetch_subscription(&self, buyer_id: &str) -> Result<Option<Subscription>, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Ok(subscriptions::fetch(buyer_id, &mut conn).await?)
    }

    async fn fetch_activation_history(&self, buyer_id: &str) -> Result<Vec<ActivationEvent>, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Ok(subscriptions::history(buyer_id, &mut conn).await?)
    }

    async fn apply_activation(&self, grant: ActivationGrant) -> Result<ActivationApplied, BillingDatabaseError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let applied = match subscriptions::apply_grant(&grant, now, &mut tx).await? {
            Some(subscription) => {
                subscriptions::append_event(&grant, now, &mut tx).await?;
                transactions::stamp_activated(&grant.transaction_id, now, &mut tx).await?;
                ActivationApplied::Applied(subscription)
            },
            None => ActivationApplied::Superseded,
        };
        tx.commit().await?;
        Ok(applied)
    }
}
