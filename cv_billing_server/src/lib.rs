//! # CV Billing server
//! This module hosts the HTTP surface of the billing subsystem. It is responsible for:
//! Accepting checkout requests from the CV builder's front end and returning signed gateway configurations.
//! Receiving the gateway's browser redirects and server-to-server webhooks, and handing them to the engine for
//! verification and activation.
//! Reporting a buyer's current subscription.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/checkout`: Creates a transaction and returns the signed gateway configuration.
//! * `/api/subscription/{buyer_id}`: The buyer's current subscription state.
//! * `/gateway/return`: The browser redirect back from the hosted payment page.
//! * `/gateway/webhook`: The gateway's server-to-server payment notification.

pub mod config;
pub mod data_objects;
pub mod errors;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
