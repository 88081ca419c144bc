use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use cvb_common::Money;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::plans::PlanProduct;

//--------------------------------------    TransactionId    ---------------------------------------------------------
/// The id we assign to a purchase attempt. This is distinct from the reference number the gateway assigns later;
/// it is the handle the UI carries around and the unit of activation idempotency.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    /// Generates a new process-unique transaction id.
    pub fn generate() -> Self {
        Self(format!("txn_{:016x}", rand::random::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TransactionId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for TransactionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------   GatewayOrderId    ---------------------------------------------------------
/// The order id we hand to the payment gateway. It is unique per transaction and is the correlation key used for
/// signing the order and verifying the callback.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct GatewayOrderId(pub String);

impl GatewayOrderId {
    /// Generates an order id embedding the product and a timestamp + nonce, so that concurrent checkouts for the
    /// same buyer cannot collide.
    pub fn generate(plan: PlanProduct) -> Self {
        let ts = Utc::now().timestamp();
        let nonce = rand::random::<u32>();
        Self(format!("{}-{ts}-{nonce:08x}", plan.slug()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for GatewayOrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for GatewayOrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for GatewayOrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------   PaymentOutcome    ---------------------------------------------------------
/// The normalized lifecycle state of a purchase attempt.
///
/// `Pending` is the only non-terminal state. Once a transaction reaches a terminal state it never leaves it; a
/// callback reporting a conflicting terminal outcome is logged and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentOutcome {
    /// The transaction has been created and the buyer has not completed payment at the gateway.
    Pending,
    /// The gateway reported (with a valid signature) that the payment went through.
    Succeeded,
    /// The gateway reported a terminal non-success status.
    Failed,
    /// The buyer explicitly abandoned the payment.
    Canceled,
}

impl PaymentOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentOutcome::Pending)
    }
}

impl Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentOutcome::Pending => write!(f, "Pending"),
            PaymentOutcome::Succeeded => write!(f, "Succeeded"),
            PaymentOutcome::Failed => write!(f, "Failed"),
            PaymentOutcome::Canceled => write!(f, "Canceled"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid payment outcome: {0}")]
pub struct ConversionError(String);

impl FromStr for PaymentOutcome {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Succeeded" => Ok(Self::Succeeded),
            "Failed" => Ok(Self::Failed),
            "Canceled" => Ok(Self::Canceled),
            s => Err(ConversionError(format!("Invalid payment outcome: {s}"))),
        }
    }
}

impl From<String> for PaymentOutcome {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment outcome: {value}. But this conversion cannot fail. Defaulting to Pending");
            PaymentOutcome::Pending
        })
    }
}

//--------------------------------------    GatewayStatus    ---------------------------------------------------------
/// The raw status code reported by the gateway, parsed into a closed set of known codes.
///
/// Codes we have never seen land in `Unrecognized` and normalize to [`PaymentOutcome::Failed`], so a new gateway
/// status can never silently match the success branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    Success,
    Failed,
    Cancelled,
    Unrecognized(String),
}

impl GatewayStatus {
    pub fn from_code(code: &str) -> Self {
        match code {
            "SUCCESS" => Self::Success,
            "FAILED" => Self::Failed,
            "CANCELLED" => Self::Cancelled,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn normalized(&self) -> PaymentOutcome {
        match self {
            GatewayStatus::Success => PaymentOutcome::Succeeded,
            GatewayStatus::Cancelled => PaymentOutcome::Canceled,
            GatewayStatus::Failed | GatewayStatus::Unrecognized(_) => PaymentOutcome::Failed,
        }
    }
}

impl Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayStatus::Success => write!(f, "SUCCESS"),
            GatewayStatus::Failed => write!(f, "FAILED"),
            GatewayStatus::Cancelled => write!(f, "CANCELLED"),
            GatewayStatus::Unrecognized(code) => write!(f, "UNRECOGNIZED({code})"),
        }
    }
}

//--------------------------------------     Transaction     ---------------------------------------------------------
/// One purchase attempt. Transactions are never deleted; they are the permanent audit record of the purchase.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub transaction_id: TransactionId,
    pub buyer_id: String,
    pub plan: PlanProduct,
    pub amount: Money,
    pub currency: String,
    pub order_id: GatewayOrderId,
    pub outcome: PaymentOutcome,
    /// The raw status code as the gateway reported it, kept verbatim for auditing.
    pub raw_status: Option<String>,
    /// The gateway's own reference number. Assigned by the gateway, so it may arrive later than creation.
    pub gateway_reference: Option<String>,
    /// Masked payment-instrument descriptor, e.g. `xxxx-xxxx-xxxx-1111`.
    pub masked_instrument: Option<String>,
    /// Set by the activation engine when the purchase has been applied to the subscription.
    pub activated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    NewTransaction   ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub transaction_id: TransactionId,
    pub buyer_id: String,
    pub plan: PlanProduct,
    pub amount: Money,
    pub currency: String,
    pub order_id: GatewayOrderId,
}

impl NewTransaction {
    /// A new pending transaction for the given buyer and plan, with freshly generated ids and the plan's fixed
    /// price and currency.
    pub fn for_plan(buyer_id: &str, plan: PlanProduct) -> Self {
        Self {
            transaction_id: TransactionId::generate(),
            buyer_id: buyer_id.to_string(),
            plan,
            amount: plan.price(),
            currency: plan.currency().to_string(),
            order_id: GatewayOrderId::generate(plan),
        }
    }
}

//--------------------------------------  SubscriptionStatus ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    None,
    Active,
    Expired,
}

impl Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionStatus::None => write!(f, "None"),
            SubscriptionStatus::Active => write!(f, "Active"),
            SubscriptionStatus::Expired => write!(f, "Expired"),
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(Self::None),
            "Active" => Ok(Self::Active),
            "Expired" => Ok(Self::Expired),
            s => Err(ConversionError(format!("Invalid subscription status: {s}"))),
        }
    }
}

//--------------------------------------     Subscription    ---------------------------------------------------------
/// The buyer's current entitlement. Mutated only by the activation engine; everything else reads it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub buyer_id: String,
    pub plan: Option<PlanProduct>,
    pub status: SubscriptionStatus,
    pub valid_until: Option<DateTime<Utc>>,
    pub credits_remaining: Option<i64>,
    /// The id of the most recent transaction whose activation has been applied. This field is the idempotency
    /// guard: activation for a transaction already recorded here is a no-op.
    pub last_applied_txid: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// The implicit "no plan" baseline used for buyers who have never activated anything.
    pub fn none_for(buyer_id: &str) -> Self {
        let now = Utc::now();
        Self {
            buyer_id: buyer_id.to_string(),
            plan: None,
            status: SubscriptionStatus::None,
            valid_until: None,
            credits_remaining: None,
            last_applied_txid: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The status as of `now`. A time-boxed plan whose window has passed reports `Expired` without the stored
    /// record being rewritten; the record stays as history.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        match (self.status, self.valid_until) {
            (SubscriptionStatus::Active, Some(until)) if until < now => SubscriptionStatus::Expired,
            (status, _) => status,
        }
    }
}

//--------------------------------------   ActivationEvent   ---------------------------------------------------------
/// One entry in the append-only activation history. Entries are never edited or removed.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ActivationEvent {
    pub id: i64,
    pub buyer_id: String,
    pub transaction_id: TransactionId,
    pub plan: PlanProduct,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pending_is_the_only_non_terminal_outcome() {
        assert!(!PaymentOutcome::Pending.is_terminal());
        assert!(PaymentOutcome::Succeeded.is_terminal());
        assert!(PaymentOutcome::Failed.is_terminal());
        assert!(PaymentOutcome::Canceled.is_terminal());
    }

    #[test]
    fn unknown_gateway_codes_fail_closed() {
        assert_eq!(GatewayStatus::from_code("SUCCESS").normalized(), PaymentOutcome::Succeeded);
        assert_eq!(GatewayStatus::from_code("CANCELLED").normalized(), PaymentOutcome::Canceled);
        assert_eq!(GatewayStatus::from_code("FAILED").normalized(), PaymentOutcome::Failed);
        // A code we have never seen must never match the success branch
        let novel = GatewayStatus::from_code("SETTLEMENT_IN_PROGRESS");
        assert_eq!(novel, GatewayStatus::Unrecognized("SETTLEMENT_IN_PROGRESS".into()));
        assert_eq!(novel.normalized(), PaymentOutcome::Failed);
    }

    #[test]
    fn order_ids_embed_the_plan_and_do_not_collide() {
        let a = GatewayOrderId::generate(PlanProduct::SinglePurchase);
        let b = GatewayOrderId::generate(PlanProduct::SinglePurchase);
        assert!(a.as_str().starts_with("single_purchase-"));
        assert_ne!(a, b);
    }

    #[test]
    fn effective_status_downgrades_expired_plans() {
        let now = Utc::now();
        let mut sub = Subscription::none_for("U1");
        assert_eq!(sub.effective_status(now), SubscriptionStatus::None);
        sub.status = SubscriptionStatus::Active;
        sub.valid_until = Some(now + chrono::Duration::days(7));
        assert_eq!(sub.effective_status(now), SubscriptionStatus::Active);
        assert_eq!(sub.effective_status(now + chrono::Duration::days(8)), SubscriptionStatus::Expired);
    }
}
