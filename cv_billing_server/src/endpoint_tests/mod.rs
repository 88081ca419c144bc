mod callbacks;
mod checkout;
mod mocks;

use chrono::Utc;
use cv_billing_engine::{
    credentials::{CredentialResolver, CredentialSet, GatewayMode},
    db_types::{NewTransaction, PaymentOutcome, Subscription, SubscriptionStatus, Transaction},
    helpers::{calculate_hmac, callback_message, SIGNATURE_FIELD},
    CheckoutOptions,
    PaymentStrategy,
};

pub const MERCHANT_ID: &str = "CVB-M1";
pub const API_KEY: &str = "pk_test";
pub const SECRET_KEY: &str = "sk_test";

pub fn test_resolver() -> CredentialResolver {
    CredentialResolver::new(
        MERCHANT_ID.into(),
        GatewayMode::Sandbox,
        None,
        Some(CredentialSet::new(API_KEY, SECRET_KEY)),
        vec![],
    )
}

pub fn checkout_options(strategy: PaymentStrategy) -> CheckoutOptions {
    CheckoutOptions {
        success_url: "http://localhost:3000/billing/success".into(),
        failure_url: "http://localhost:3000/billing/failure".into(),
        display_language: "en".into(),
        strategy,
    }
}

/// The row the database would hand back for a freshly inserted transaction.
pub fn pending_transaction(new_tx: NewTransaction) -> Transaction {
    let now = Utc::now();
    Transaction {
        id: 1,
        transaction_id: new_tx.transaction_id,
        buyer_id: new_tx.buyer_id,
        plan: new_tx.plan,
        amount: new_tx.amount,
        currency: new_tx.currency,
        order_id: new_tx.order_id,
        outcome: PaymentOutcome::Pending,
        raw_status: None,
        gateway_reference: None,
        masked_instrument: None,
        activated_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn settled(tx: &Transaction, outcome: PaymentOutcome, raw_status: &str) -> Transaction {
    Transaction {
        outcome,
        raw_status: Some(raw_status.to_string()),
        gateway_reference: Some("GW-9911".to_string()),
        updated_at: Utc::now(),
        ..tx.clone()
    }
}

pub fn active_subscription(tx: &Transaction) -> Subscription {
    let now = Utc::now();
    Subscription {
        buyer_id: tx.buyer_id.clone(),
        plan: Some(tx.plan),
        status: SubscriptionStatus::Active,
        valid_until: Some(now + tx.plan.validity()),
        credits_remaining: tx.plan.credits(),
        last_applied_txid: Some(tx.transaction_id.clone()),
        created_at: now,
        updated_at: now,
    }
}

/// A urlencoded callback body signed the way the gateway signs it.
pub fn signed_body(fields: &[(&str, &str)]) -> String {
    let mut params: Vec<(String, String)> = fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    let signature = calculate_hmac(SECRET_KEY, callback_message(&params).as_bytes());
    params.push((SIGNATURE_FIELD.to_string(), signature));
    serde_urlencoded::to_string(&params).expect("could not encode callback body")
}
