use std::fmt::Display;

use chrono::{DateTime, Utc};
use cv_billing_engine::{
    db_types::{Subscription, SubscriptionStatus, TransactionId},
    plans::PlanProduct,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The subscription as reported to clients. The status is evaluated against the current time, so an expired plan
/// reports `Expired` even though the stored row still says `Active`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionSummary {
    pub buyer_id: String,
    pub plan: Option<PlanProduct>,
    pub status: SubscriptionStatus,
    pub valid_until: Option<DateTime<Utc>>,
    pub credits_remaining: Option<i64>,
    pub last_applied_txid: Option<TransactionId>,
}

impl SubscriptionSummary {
    pub fn from_subscription(sub: &Subscription, now: DateTime<Utc>) -> Self {
        Self {
            buyer_id: sub.buyer_id.clone(),
            plan: sub.plan,
            status: sub.effective_status(now),
            valid_until: sub.valid_until,
            credits_remaining: sub.credits_remaining,
            last_applied_txid: sub.last_applied_txid.clone(),
        }
    }
}
