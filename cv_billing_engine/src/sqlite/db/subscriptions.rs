use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{ActivationEvent, Subscription},
    traits::ActivationGrant,
};

pub async fn fetch(buyer_id: &str, conn: &mut SqliteConnection) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM subscriptions WHERE buyer_id = $1").bind(buyer_id).fetch_optional(conn).await
}

pub async fn history(buyer_id: &str, conn: &mut SqliteConnection) -> Result<Vec<ActivationEvent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM activation_events WHERE buyer_id = $1 ORDER BY id ASC")
        .bind(buyer_id)
        .fetch_all(conn)
        .await
}

/// The conditional activation write. Returns the updated subscription if the write landed, or `None` if the
/// stored `last_applied_txid` no longer matches the grant's expectation (a concurrent activation won).
///
/// A buyer with no subscription row yet is created here (`expected_last_applied == None`); a row that appears
/// concurrently makes the insert a no-op via `ON CONFLICT DO NOTHING`, which is the same lost-race signal. Rows
/// only ever gain a `last_applied_txid`, never lose one, so `expected == None` can never match an existing row.
pub async fn apply_grant(
    grant: &ActivationGrant,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Subscription>, sqlx::Error> {
    let updated: Option<Subscription> = match &grant.expected_last_applied {
        None => {
            sqlx::query_as(
                r#"
                    INSERT INTO subscriptions
                        (buyer_id, plan, status, valid_until, credits_remaining, last_applied_txid, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
                    ON CONFLICT (buyer_id) DO NOTHING
                    RETURNING *;
                "#,
            )
            .bind(&grant.buyer_id)
            .bind(grant.plan)
            .bind(grant.status)
            .bind(grant.valid_until)
            .bind(grant.credits_remaining)
            .bind(grant.transaction_id.as_str())
            .bind(now)
            .fetch_optional(conn)
            .await?
        },
        Some(expected) => {
            sqlx::query_as(
                r#"
                    UPDATE subscriptions
                    SET plan = $1,
                        status = $2,
                        valid_until = $3,
                        credits_remaining = $4,
                        last_applied_txid = $5,
                        updated_at = $6
                    WHERE buyer_id = $7 AND last_applied_txid = $8
                    RETURNING *;
                "#,
            )
            .bind(grant.plan)
            .bind(grant.status)
            .bind(grant.valid_until)
            .bind(grant.credits_remaining)
            .bind(grant.transaction_id.as_str())
            .bind(now)
            .bind(&grant.buyer_id)
            .bind(expected.as_str())
            .fetch_optional(conn)
            .await?
        },
    };
    match &updated {
        Some(sub) => debug!(
            "📋️ Subscription for {} updated: plan {:?}, last applied transaction [{}]",
            sub.buyer_id, sub.plan, grant.transaction_id
        ),
        None => trace!(
            "📋️ Conditional activation write for {} did not land; expectation {:?} is stale",
            grant.buyer_id, grant.expected_last_applied
        ),
    }
    Ok(updated)
}

/// Appends one entry to the activation history. Called inside the same transaction as the grant write.
pub async fn append_event(
    grant: &ActivationGrant,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO activation_events (buyer_id, transaction_id, plan, created_at) VALUES ($1, $2, $3, $4)")
        .bind(&grant.buyer_id)
        .bind(grant.transaction_id.as_str())
        .bind(grant.plan)
        .bind(now)
        .execute(conn)
        .await?;
    Ok(())
}
