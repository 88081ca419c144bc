mod money;

mod secret;

pub use money::{Money, MoneyConversionError, CURRENCY_CODE, CURRENCY_CODE_LOWER};
pub use secret::Secret;
