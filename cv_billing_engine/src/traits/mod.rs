//! The behaviour a storage backend must provide to host the billing engine. Backends implement
//! [`BillingDatabase`]; everything above it (the checkout, callback and activation APIs) is backend-agnostic.
mod billing_database;
mod data_objects;

pub use billing_database::{BillingDatabase, BillingDatabaseError};
pub use data_objects::{ActivationApplied, ActivationGrant, OutcomeResolution, OutcomeUpdate};
