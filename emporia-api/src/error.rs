use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use emporia_core::payment::GatewayError;
use emporia_order::CheckoutError;
use serde_json::json;

/// API-boundary error. Domain failures carry their own status mapping
/// and a stable machine-checkable code; anything else is a sanitized
/// internal error.
#[derive(Debug)]
pub enum AppError {
    Checkout(CheckoutError),
    Internal(anyhow::Error),
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        Self::Checkout(err)
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        Self::Checkout(CheckoutError::Gateway(err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Checkout(err) => {
                let code = err.code();
                match &err {
                    CheckoutError::EmptyCart
                    | CheckoutError::InvalidQuantity(_)
                    | CheckoutError::ProductNotFound(_)
                    | CheckoutError::ProductInactive { .. }
                    | CheckoutError::InsufficientStock { .. }
                    | CheckoutError::MissingField(_)
                    | CheckoutError::InvalidAddress(_)
                    | CheckoutError::PaymentNotCompleted => {
                        (StatusCode::BAD_REQUEST, code, err.to_string())
                    }
                    CheckoutError::NotFound => (StatusCode::NOT_FOUND, code, err.to_string()),
                    CheckoutError::Forbidden => (StatusCode::FORBIDDEN, code, err.to_string()),
                    CheckoutError::Gateway(GatewayError::UnknownAuthorization(_)) => {
                        (StatusCode::BAD_REQUEST, code, err.to_string())
                    }
                    CheckoutError::Gateway(GatewayError::Unavailable(_)) => {
                        tracing::error!("payment gateway failure: {err}");
                        (
                            StatusCode::BAD_GATEWAY,
                            code,
                            "Payment gateway unavailable".to_string(),
                        )
                    }
                    CheckoutError::Catalog(_) | CheckoutError::Ledger(_) => {
                        tracing::error!("storage failure during checkout: {err}");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            code,
                            "Internal Server Error".to_string(),
                        )
                    }
                }
            }
            AppError::Internal(err) => {
                tracing::error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "code": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}
