//! Shared scaffolding for the engine's integration tests: a throwaway SQLite database per test and a canned
//! gateway deployment (credentials + checkout options) that signs like the real thing.

use cv_billing_engine::{
    credentials::{CredentialResolver, CredentialSet, GatewayMode},
    helpers::{calculate_hmac, callback_message, SIGNATURE_FIELD},
    CheckoutOptions,
    PaymentStrategy,
    SqliteDatabase,
};
use sqlx::migrate::MigrateDatabase;

pub const MERCHANT_ID: &str = "CVB-M1";
pub const ORDER_KEY: &str = "order_signing_key";
pub const CALLBACK_SECRET: &str = "callback_secret_key";

pub async fn new_test_database() -> SqliteDatabase {
    new_test_database_sized(5).await
}

pub async fn new_test_database_sized(max_connections: u32) -> SqliteDatabase {
    let _ = dotenvy::dotenv();
    let _ = env_logger::try_init();
    let path = std::env::temp_dir().join(format!("cvb_test_{:016x}.db", rand::random::<u64>()));
    let url = format!("sqlite://{}", path.display());
    sqlx::Sqlite::create_database(&url).await.expect("could not create test database");
    let db = SqliteDatabase::new_with_url(&url, max_connections).await.expect("could not open test database");
    db.migrate().await.expect("could not migrate test database");
    db
}

pub fn resolver() -> CredentialResolver {
    CredentialResolver::new(
        MERCHANT_ID.into(),
        GatewayMode::Production,
        Some(CredentialSet::new(ORDER_KEY, CALLBACK_SECRET)),
        Some(CredentialSet::new("pk_test", "sk_test")),
        vec!["sandbox.buyer@example.com".into()],
    )
}

pub fn options(strategy: PaymentStrategy) -> CheckoutOptions {
    CheckoutOptions {
        success_url: "https://cv.example.com/billing/success".into(),
        failure_url: "https://cv.example.com/billing/failure".into(),
        display_language: "en".into(),
        strategy,
    }
}

/// Builds callback parameters the way the gateway would send them, signed with the given secret.
pub fn signed_callback(fields: &[(&str, &str)], secret: &str) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    let signature = calculate_hmac(secret, callback_message(&params).as_bytes());
    params.push((SIGNATURE_FIELD.to_string(), signature));
    params
}
