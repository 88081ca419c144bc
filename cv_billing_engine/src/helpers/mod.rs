pub mod order_signature;

pub use order_signature::{
    calculate_hmac,
    callback_message,
    order_message,
    sign_order,
    verify_callback_signature,
    MODE_FIELD,
    SIGNATURE_FIELD,
};
