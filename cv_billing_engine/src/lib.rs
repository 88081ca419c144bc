//! # CV Billing Engine
//!
//! The CV Billing Engine handles the one part of the CV builder's purchase flow that cannot afford to be sloppy:
//! producing a tamper-proof order for the external payment gateway, proving that the gateway's callback was not
//! forged, and applying a successful purchase to the buyer's subscription exactly once, even when the browser
//! redirect and the server-to-server webhook race each other.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You should never need to
//!    access the database directly; use the public API instead. The exception is the data types used in the
//!    database, which live in [`mod@db_types`] and are public.
//! 2. The billing public API ([`CheckoutApi`], [`CallbackApi`], [`ActivationApi`]). These are generic over a
//!    [`traits::BillingDatabase`] backend, and encode the checkout, callback-verification and activation flows.
//! 3. The cryptographic helpers ([`mod@helpers`]): the canonical order message, its keyed digest, and the
//!    verification of gateway callback signatures.
pub mod credentials;
pub mod db_types;
pub mod helpers;
pub mod plans;
pub mod traits;

mod cbe_api;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use cbe_api::{
    errors::{ActivationError, CallbackError, CheckoutError},
    Activation,
    ActivationApi,
    CallbackApi,
    CallbackResolution,
    CheckoutApi,
    CheckoutOptions,
    CheckoutRequest,
    CheckoutResponse,
    GatewayCheckout,
    PaymentStrategy,
    DIRECT_GRANT_STATUS,
    INSTRUMENT_FIELD,
    ORDER_ID_FIELD,
    REFERENCE_FIELD,
    STATUS_FIELD,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
