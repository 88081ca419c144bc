pub mod errors;

mod activation_api;
mod callback_api;
mod checkout_api;

pub use activation_api::{Activation, ActivationApi};
pub use callback_api::{CallbackApi, CallbackResolution, INSTRUMENT_FIELD, ORDER_ID_FIELD, REFERENCE_FIELD, STATUS_FIELD};
pub use checkout_api::{
    CheckoutApi,
    CheckoutOptions,
    CheckoutRequest,
    CheckoutResponse,
    GatewayCheckout,
    PaymentStrategy,
    DIRECT_GRANT_STATUS,
};
