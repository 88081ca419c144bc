use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use cv_billing_engine::{ActivationError, CallbackError, CheckoutError};
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Payment service is temporarily unavailable. Please try again later.")]
    PaymentServiceUnavailable(String),
    #[error("Callback signature is invalid or missing.")]
    InvalidCallbackSignature,
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The transaction cannot be activated. {0}")]
    NotEligible(String),
    #[error("The payment succeeded but activation did not complete. Contact support with reference {0}.")]
    ActivationIncomplete(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCallbackSignature => StatusCode::FORBIDDEN,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::NotEligible(_) => StatusCode::CONFLICT,
            Self::PaymentServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ActivationIncomplete(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // The configuration detail names environment variables; keep it in the server log, not the response.
        if let Self::PaymentServiceUnavailable(detail) = self {
            error!("💻️ Payment service unavailable: {detail}");
        }
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<CheckoutError> for ServerError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::Configuration(c) => Self::PaymentServiceUnavailable(c.to_string()),
            CheckoutError::CheckoutFailed(msg) => Self::BackendError(msg),
        }
    }
}

impl From<CallbackError> for ServerError {
    fn from(e: CallbackError) -> Self {
        match e {
            CallbackError::InvalidSignature => Self::InvalidCallbackSignature,
            CallbackError::MissingField(field) => Self::InvalidRequestBody(format!("missing parameter '{field}'")),
            CallbackError::OrderNotFound(oid) => Self::NoRecordFound(format!("No transaction for order {oid}")),
            CallbackError::Configuration(c) => Self::PaymentServiceUnavailable(c.to_string()),
            CallbackError::Backend(msg) => Self::BackendError(msg),
        }
    }
}

impl From<ActivationError> for ServerError {
    fn from(e: ActivationError) -> Self {
        match e {
            ActivationError::NotFound(txid) => Self::NoRecordFound(format!("No transaction with id {txid}")),
            ActivationError::NotEligible(txid, outcome) => {
                Self::NotEligible(format!("Transaction {txid} has outcome {outcome}"))
            },
            ActivationError::ActivationFailed(txid, _, _) => Self::ActivationIncomplete(txid.to_string()),
            ActivationError::Backend(msg) => Self::BackendError(msg),
        }
    }
}
