use chrono::{DateTime, Utc};
use log::{debug, warn};
use sqlx::SqliteConnection;

use crate::{
    db_types::{GatewayOrderId, NewTransaction, PaymentOutcome, Transaction, TransactionId},
    traits::{BillingDatabaseError, OutcomeResolution, OutcomeUpdate},
};

/// Inserts a new pending transaction. The order id carries a UNIQUE constraint; a collision is an error rather
/// than an overwrite, since the order id is the correlation key for signing and verification.
pub async fn insert(tx: NewTransaction, conn: &mut SqliteConnection) -> Result<Transaction, BillingDatabaseError> {
    let order_id = tx.order_id.clone();
    let transaction: Transaction = sqlx::query_as(
        r#"
            INSERT INTO transactions (transaction_id, buyer_id, plan, amount, currency, order_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(tx.transaction_id)
    .bind(tx.buyer_id)
    .bind(tx.plan)
    .bind(tx.amount)
    .bind(tx.currency)
    .bind(tx.order_id)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => BillingDatabaseError::DuplicateOrderId(order_id),
        _ => BillingDatabaseError::from(e),
    })?;
    debug!("🧾️ Transaction [{}] created for order {}", transaction.transaction_id, transaction.order_id);
    Ok(transaction)
}

pub async fn fetch_by_transaction_id(
    id: &TransactionId,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM transactions WHERE transaction_id = $1").bind(id.as_str()).fetch_optional(conn).await
}

pub async fn fetch_by_order_id(
    order_id: &GatewayOrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM transactions WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await
}

/// Records a verified gateway report. Terminal outcomes are final: a duplicate report of the same outcome only
/// fills in the reference/instrument fields if they are still empty, and a conflicting report is ignored with a
/// warning. This is not atomic on its own; run it inside a transaction.
pub async fn record_outcome(
    update: OutcomeUpdate,
    conn: &mut SqliteConnection,
) -> Result<OutcomeResolution, BillingDatabaseError> {
    let current = fetch_by_order_id(&update.order_id, conn)
        .await?
        .ok_or_else(|| BillingDatabaseError::OrderNotFound(update.order_id.clone()))?;
    let now = Utc::now();
    if current.outcome.is_terminal() {
        return settle_repeat_report(current, &update, now, conn).await;
    }
    // The outcome guard keeps a report that lands between the read above and this write from overwriting a
    // terminal state. Zero rows updated means somebody else settled the order first: re-read and resolve the
    // report against the stored outcome.
    let updated: Option<Transaction> = sqlx::query_as(
        r#"
            UPDATE transactions
            SET outcome = $1,
                raw_status = $2,
                gateway_reference = COALESCE(gateway_reference, $3),
                masked_instrument = COALESCE(masked_instrument, $4),
                updated_at = $5
            WHERE order_id = $6 AND outcome = $7
            RETURNING *;
        "#,
    )
    .bind(update.outcome)
    .bind(&update.raw_status)
    .bind(&update.gateway_reference)
    .bind(&update.masked_instrument)
    .bind(now)
    .bind(update.order_id.as_str())
    .bind(PaymentOutcome::Pending)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(tx) => {
            debug!("🧾️ Transaction [{}] transitioned to {} ({})", tx.transaction_id, tx.outcome, update.raw_status);
            Ok(OutcomeResolution::Transitioned(tx))
        },
        None => {
            let current = fetch_by_order_id(&update.order_id, conn)
                .await?
                .ok_or_else(|| BillingDatabaseError::OrderNotFound(update.order_id.clone()))?;
            settle_repeat_report(current, &update, now, conn).await
        },
    }
}

/// Resolves a report against a transaction that has already settled: the same outcome only fills in the
/// first-arrival fields, a different outcome loses to the stored one.
async fn settle_repeat_report(
    current: Transaction,
    update: &OutcomeUpdate,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<OutcomeResolution, BillingDatabaseError> {
    if current.outcome == update.outcome {
        debug!(
            "🧾️ Transaction [{}] already settled as {}. Recording first-arrival fields only.",
            current.transaction_id, current.outcome
        );
        let tx = fill_first_arrival_fields(update, now, conn).await?;
        return Ok(OutcomeResolution::AlreadySettled(tx));
    }
    warn!(
        "🧾️ Conflicting gateway report for transaction [{}]: stored outcome is {}, report says {} ({}). The \
         original outcome wins.",
        current.transaction_id, current.outcome, update.outcome, update.raw_status
    );
    Ok(OutcomeResolution::Conflicting(current))
}

/// The gateway reference and masked instrument are recorded by whichever callback path supplies them first and
/// never overwritten afterwards.
async fn fill_first_arrival_fields(
    update: &OutcomeUpdate,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Transaction, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE transactions
            SET gateway_reference = COALESCE(gateway_reference, $1),
                masked_instrument = COALESCE(masked_instrument, $2),
                updated_at = $3
            WHERE order_id = $4
            RETURNING *;
        "#,
    )
    .bind(&update.gateway_reference)
    .bind(&update.masked_instrument)
    .bind(now)
    .bind(update.order_id.as_str())
    .fetch_one(conn)
    .await
}

/// Stamps the transaction as applied to the subscription. Called inside the activation write's transaction.
pub async fn stamp_activated(
    id: &TransactionId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE transactions SET activated_at = $1, updated_at = $1 WHERE transaction_id = $2")
        .bind(now)
        .bind(id.as_str())
        .execute(conn)
        .await?;
    Ok(())
}
