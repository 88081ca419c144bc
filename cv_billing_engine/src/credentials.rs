//! # Credential resolution
//!
//! The gateway issues two credential sets: one for the sandbox environment and one for production. A deployment
//! configures either or both, designates its test identities, and picks a default mode. Resolution is a pure
//! lookup: designated test buyers always land in sandbox, everyone else follows the deployment default.
//!
//! Missing credentials for a mode are only an error once that mode is actually resolved, so a sandbox-only
//! staging deployment does not need production keys. The error names the environment variable to set, never the
//! key material itself.

use std::{fmt::Display, str::FromStr};

use cvb_common::Secret;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

//--------------------------------------     GatewayMode     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    Sandbox,
    Production,
}

impl Display for GatewayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayMode::Sandbox => write!(f, "sandbox"),
            GatewayMode::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid gateway mode: {0}. Expected 'sandbox' or 'production'")]
pub struct InvalidGatewayMode(String);

impl FromStr for GatewayMode {
    type Err = InvalidGatewayMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "production" => Ok(Self::Production),
            s => Err(InvalidGatewayMode(s.to_string())),
        }
    }
}

//--------------------------------------    CredentialSet    ---------------------------------------------------------
/// One mode's worth of merchant credentials: the API key that signs outgoing orders and the secret key that
/// verifies incoming callbacks.
#[derive(Debug, Clone)]
pub struct CredentialSet {
    pub api_key: Secret<String>,
    pub secret_key: Secret<String>,
}

impl CredentialSet {
    pub fn new<S: Into<String>>(api_key: S, secret_key: S) -> Self {
        Self { api_key: Secret::new(api_key.into()), secret_key: Secret::new(secret_key.into()) }
    }
}

/// The outcome of a resolution: which mode was selected and the credentials to use for it.
#[derive(Debug, Clone)]
pub struct ResolvedCredentials {
    pub mode: GatewayMode,
    pub merchant_id: String,
    pub api_key: Secret<String>,
    pub secret_key: Secret<String>,
}

#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    #[error("No {0} gateway credentials are configured. Set {1} in the environment.")]
    MissingCredentials(GatewayMode, &'static str),
}

impl CredentialError {
    fn for_mode(mode: GatewayMode) -> Self {
        let vars = match mode {
            GatewayMode::Sandbox => "CVB_SANDBOX_API_KEY and CVB_SANDBOX_SECRET_KEY",
            GatewayMode::Production => "CVB_GATEWAY_API_KEY and CVB_GATEWAY_SECRET_KEY",
        };
        CredentialError::MissingCredentials(mode, vars)
    }
}

//--------------------------------------  CredentialResolver ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    merchant_id: String,
    default_mode: GatewayMode,
    production: Option<CredentialSet>,
    sandbox: Option<CredentialSet>,
    sandbox_buyers: Vec<String>,
}

impl CredentialResolver {
    pub fn new(
        merchant_id: String,
        default_mode: GatewayMode,
        production: Option<CredentialSet>,
        sandbox: Option<CredentialSet>,
        sandbox_buyers: Vec<String>,
    ) -> Self {
        Self { merchant_id, default_mode, production, sandbox, sandbox_buyers }
    }

    pub fn merchant_id(&self) -> &str {
        &self.merchant_id
    }

    /// Selects the gateway mode and credential set for the given buyer.
    ///
    /// Designated test identities always resolve to sandbox; all other buyers (and anonymous resolution) follow
    /// the deployment default. This is a pure lookup with no side effects beyond a debug log of the selected
    /// mode, which deliberately contains no key material.
    pub fn resolve(&self, buyer_id: Option<&str>) -> Result<ResolvedCredentials, CredentialError> {
        let mode = match buyer_id {
            Some(buyer) if self.sandbox_buyers.iter().any(|b| b == buyer) => GatewayMode::Sandbox,
            _ => self.default_mode,
        };
        let set = match mode {
            GatewayMode::Sandbox => self.sandbox.as_ref(),
            GatewayMode::Production => self.production.as_ref(),
        }
        .ok_or_else(|| CredentialError::for_mode(mode))?;
        debug!("🔧️ Resolved {mode} gateway credentials for buyer {}", buyer_id.unwrap_or("<none>"));
        Ok(ResolvedCredentials {
            mode,
            merchant_id: self.merchant_id.clone(),
            api_key: set.api_key.clone(),
            secret_key: set.secret_key.clone(),
        })
    }
}
