//! # Order signing and callback verification
//!
//! The gateway authenticates both directions of the conversation with a shared-secret HMAC.
//!
//! ## Outgoing orders
//!
//! The canonical order message concatenates the fields in a fixed order with `.` separators:
//!
//! ```text
//!     {merchantId}.{orderId}.{amount}.{currency}[.{customerReference}]
//! ```
//!
//! where `amount` carries exactly two decimal places (`49.00`, never `49` or `49.0`). Any other formatting
//! produces a digest the gateway rejects. The digest is HMAC-SHA256 over the message, keyed with the mode's API
//! key and encoded as lowercase hex.
//!
//! ## Incoming callbacks
//!
//! The gateway signs its return call over the query string it sends: all parameters in the order they appear,
//! joined as `key=value` pairs with `&`, excluding the signature parameter itself and the transport-mode
//! parameter. The digest is HMAC-SHA256 keyed with the mode's secret key.
//!
//! Verification never errors: any mismatch, including a missing signature, is simply `false`. The comparison does
//! not short-circuit on the first differing byte.

use cvb_common::{Money, Secret};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::db_types::GatewayOrderId;

type HmacSha256 = Hmac<Sha256>;

/// The callback parameter carrying the gateway's signature. Excluded from the signed message.
pub const SIGNATURE_FIELD: &str = "signature";
/// The callback parameter indicating the transport mode. Excluded from the signed message.
pub const MODE_FIELD: &str = "mode";

/// HMAC-SHA256 over `data`, as lowercase hex.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().iter().map(|b| format!("{b:02x}")).collect()
}

/// The canonical order message, ready for signing.
pub fn order_message(
    merchant_id: &str,
    order_id: &GatewayOrderId,
    amount: Money,
    currency: &str,
    customer_reference: Option<&str>,
) -> String {
    let mut message = format!("{merchant_id}.{}.{}.{currency}", order_id.as_str(), amount.to_decimal_string());
    if let Some(reference) = customer_reference {
        message.push('.');
        message.push_str(reference);
    }
    message
}

/// Signs the canonical order message with the mode's API key. Deterministic and side-effect free.
pub fn sign_order(
    merchant_id: &str,
    order_id: &GatewayOrderId,
    amount: Money,
    currency: &str,
    signing_key: &Secret<String>,
    customer_reference: Option<&str>,
) -> String {
    let message = order_message(merchant_id, order_id, amount, currency, customer_reference);
    calculate_hmac(signing_key.reveal(), message.as_bytes())
}

/// Reconstructs the message the gateway signed: `key=value` pairs joined by `&`, in the order received, with the
/// signature and transport-mode parameters excluded.
pub fn callback_message(params: &[(String, String)]) -> String {
    params
        .iter()
        .filter(|(key, _)| key != SIGNATURE_FIELD && key != MODE_FIELD)
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Verifies the signature on a gateway callback. Returns `false` on any mismatch; a missing signature counts as
/// invalid, not absent.
pub fn verify_callback_signature(
    params: &[(String, String)],
    signature: Option<&str>,
    secret_key: &Secret<String>,
) -> bool {
    let Some(signature) = signature else {
        return false;
    };
    let message = callback_message(params);
    let expected = calculate_hmac(secret_key.reveal(), message.as_bytes());
    // Gateways are inconsistent about hex casing, so normalize before comparing
    constant_time_eq(expected.as_bytes(), signature.to_lowercase().as_bytes())
}

/// Compares every byte regardless of where the first mismatch occurs. Length is checked up front; leaking length
/// reveals nothing here since digest lengths are fixed and public.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
