//! # Plan catalogue
//!
//! The product sells exactly three plans, each with a fixed price, validity window and (for the credit pack) a
//! credit count. The catalogue is immutable configuration: it is compiled into the binary rather than persisted,
//! and a transaction records which plan it bought so history survives future price changes.
//!
//! Note on repurchase semantics: activating a credit pack **sets** the remaining credits to the pack size and
//! resets the validity window. It does not add to an existing balance. This is the current product rule; if it
//! changes, only [`PlanProduct::credits`] and the activation grant need to move.

use std::{fmt::Display, str::FromStr};

use chrono::Duration;
use cvb_common::{Money, CURRENCY_CODE};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

/// The purchasable plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanProduct {
    /// A one-off purchase unlocking the product for a short window.
    SinglePurchase,
    /// A bundle of export credits with a medium validity window.
    CreditPack,
    /// A full year of access.
    AnnualPass,
}

/// The feature tier a plan unlocks. The UI collaborator uses this to gate premium templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureTier {
    Standard,
    Premium,
}

impl PlanProduct {
    pub fn all() -> [PlanProduct; 3] {
        [PlanProduct::SinglePurchase, PlanProduct::CreditPack, PlanProduct::AnnualPass]
    }

    pub fn price(&self) -> Money {
        match self {
            PlanProduct::SinglePurchase => Money::from_pounds(49),
            PlanProduct::CreditPack => Money::from_pounds(99),
            PlanProduct::AnnualPass => Money::from_pounds(299),
        }
    }

    /// The product supports a single currency; every plan prices in it.
    pub fn currency(&self) -> &'static str {
        CURRENCY_CODE
    }

    /// How long an activation of this plan stays valid.
    pub fn validity(&self) -> Duration {
        match self {
            PlanProduct::SinglePurchase => Duration::days(7),
            PlanProduct::CreditPack => Duration::days(30),
            PlanProduct::AnnualPass => Duration::days(365),
        }
    }

    /// The credit grant for credit-counted plans. Time-boxed plans carry no counter.
    pub fn credits(&self) -> Option<i64> {
        match self {
            PlanProduct::CreditPack => Some(10),
            _ => None,
        }
    }

    pub fn tier(&self) -> FeatureTier {
        match self {
            PlanProduct::SinglePurchase | PlanProduct::CreditPack => FeatureTier::Standard,
            PlanProduct::AnnualPass => FeatureTier::Premium,
        }
    }

    /// The short identifier embedded in gateway order ids.
    pub fn slug(&self) -> &'static str {
        match self {
            PlanProduct::SinglePurchase => "single_purchase",
            PlanProduct::CreditPack => "credit_pack",
            PlanProduct::AnnualPass => "annual_pass",
        }
    }
}

impl Display for PlanProduct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slug())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid plan product: {0}")]
pub struct InvalidPlanProduct(String);

impl FromStr for PlanProduct {
    type Err = InvalidPlanProduct;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_purchase" => Ok(Self::SinglePurchase),
            "credit_pack" => Ok(Self::CreditPack),
            "annual_pass" => Ok(Self::AnnualPass),
            s => Err(InvalidPlanProduct(s.to_string())),
        }
    }
}
