use std::env;

use cv_billing_engine::{
    credentials::{CredentialResolver, CredentialSet, GatewayMode},
    CheckoutOptions,
    PaymentStrategy,
};
use log::*;

const DEFAULT_CVB_HOST: &str = "127.0.0.1";
const DEFAULT_CVB_PORT: u16 = 8480;
const DEFAULT_SUCCESS_URL: &str = "http://localhost:3000/billing/success";
const DEFAULT_FAILURE_URL: &str = "http://localhost:3000/billing/failure";
const DEFAULT_DISPLAY_LANGUAGE: &str = "en";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The merchant account identifier issued by the payment gateway.
    pub merchant_id: String,
    /// The mode used for buyers who are not designated test identities.
    pub default_mode: GatewayMode,
    pub production_credentials: Option<CredentialSet>,
    pub sandbox_credentials: Option<CredentialSet>,
    /// Buyer ids that always check out against the sandbox, whatever the default mode is.
    pub sandbox_buyers: Vec<String>,
    pub success_url: String,
    pub failure_url: String,
    pub display_language: String,
    pub payment_strategy: PaymentStrategy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CVB_HOST.to_string(),
            port: DEFAULT_CVB_PORT,
            database_url: String::default(),
            merchant_id: String::default(),
            default_mode: GatewayMode::Sandbox,
            production_credentials: None,
            sandbox_credentials: None,
            sandbox_buyers: Vec::new(),
            success_url: DEFAULT_SUCCESS_URL.to_string(),
            failure_url: DEFAULT_FAILURE_URL.to_string(),
            display_language: DEFAULT_DISPLAY_LANGUAGE.to_string(),
            payment_strategy: PaymentStrategy::Gateway,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("CVB_HOST").ok().unwrap_or_else(|| DEFAULT_CVB_HOST.into());
        let port = env::var("CVB_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for CVB_PORT. {e} Using the default, {DEFAULT_CVB_PORT}, instead."
                    );
                    DEFAULT_CVB_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_CVB_PORT);
        let database_url = env::var("CVB_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ CVB_DATABASE_URL is not set. Please set it to the URL for the billing database.");
            String::default()
        });
        let merchant_id = env::var("CVB_MERCHANT_ID").ok().unwrap_or_else(|| {
            error!("🪛️ CVB_MERCHANT_ID is not set. Please set it to your gateway merchant id.");
            String::default()
        });
        let default_mode = env::var("CVB_DEFAULT_MODE")
            .map(|s| {
                s.parse::<GatewayMode>().unwrap_or_else(|e| {
                    warn!("🪛️ {e} Defaulting CVB_DEFAULT_MODE to sandbox.");
                    GatewayMode::Sandbox
                })
            })
            .ok()
            .unwrap_or(GatewayMode::Sandbox);
        let production_credentials =
            credential_set_from_env(GatewayMode::Production, "CVB_GATEWAY_API_KEY", "CVB_GATEWAY_SECRET_KEY");
        let sandbox_credentials =
            credential_set_from_env(GatewayMode::Sandbox, "CVB_SANDBOX_API_KEY", "CVB_SANDBOX_SECRET_KEY");
        let sandbox_buyers = env::var("CVB_SANDBOX_BUYERS")
            .map(|s| s.split(',').map(|b| b.trim().to_string()).filter(|b| !b.is_empty()).collect())
            .unwrap_or_default();
        let success_url = env::var("CVB_SUCCESS_URL").ok().unwrap_or_else(|| DEFAULT_SUCCESS_URL.into());
        let failure_url = env::var("CVB_FAILURE_URL").ok().unwrap_or_else(|| DEFAULT_FAILURE_URL.into());
        let display_language =
            env::var("CVB_DISPLAY_LANGUAGE").ok().unwrap_or_else(|| DEFAULT_DISPLAY_LANGUAGE.into());
        let payment_strategy = env::var("CVB_PAYMENT_STRATEGY")
            .map(|s| {
                s.parse::<PaymentStrategy>().unwrap_or_else(|e| {
                    warn!("🪛️ {e} Defaulting CVB_PAYMENT_STRATEGY to gateway.");
                    PaymentStrategy::Gateway
                })
            })
            .ok()
            .unwrap_or(PaymentStrategy::Gateway);
        if payment_strategy == PaymentStrategy::DirectGrant {
            warn!(
                "🪛️ CVB_PAYMENT_STRATEGY is set to direct_grant. Purchases will be settled WITHOUT contacting the \
                 payment gateway. Do not use this on a production deployment."
            );
        }
        Self {
            host,
            port,
            database_url,
            merchant_id,
            default_mode,
            production_credentials,
            sandbox_credentials,
            sandbox_buyers,
            success_url,
            failure_url,
            display_language,
            payment_strategy,
        }
    }

    pub fn credential_resolver(&self) -> CredentialResolver {
        CredentialResolver::new(
            self.merchant_id.clone(),
            self.default_mode,
            self.production_credentials.clone(),
            self.sandbox_credentials.clone(),
            self.sandbox_buyers.clone(),
        )
    }

    pub fn checkout_options(&self) -> CheckoutOptions {
        CheckoutOptions {
            success_url: self.success_url.clone(),
            failure_url: self.failure_url.clone(),
            display_language: self.display_language.clone(),
            strategy: self.payment_strategy,
        }
    }
}

/// Reads one mode's credential pair. Both variables must be set for the set to exist; having only one is a
/// configuration mistake worth shouting about.
fn credential_set_from_env(mode: GatewayMode, api_var: &str, secret_var: &str) -> Option<CredentialSet> {
    let api_key = env::var(api_var).ok();
    let secret_key = env::var(secret_var).ok();
    match (api_key, secret_key) {
        (Some(api_key), Some(secret_key)) => Some(CredentialSet::new(api_key, secret_key)),
        (None, None) => {
            info!("🪛️ No {mode} gateway credentials configured. Checkouts resolving to {mode} will fail.");
            None
        },
        _ => {
            error!("🪛️ Only one of {api_var} and {secret_var} is set. Both are required; ignoring the {mode} pair.");
            None
        },
    }
}
