use axum::{extract::State, Extension, Json};
use emporia_core::identity::Principal;
use emporia_core::payment::GatewayMode;
use emporia_order::CheckoutError;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleIntentRequest {
    pub amount: Option<i64>,
}

/// POST /api/payment/create-payment-intent
/// Simplified intent creation for clients that already know their total.
/// The `mock` flag in the response makes the synthetic gateway
/// unmistakable; a mock authorization never looks like a live one.
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<SimpleIntentRequest>,
) -> Result<Json<Value>, AppError> {
    let amount = req.amount.ok_or(CheckoutError::MissingField("amount"))?;

    let authorization = state
        .gateway
        .create_authorization(amount, state.checkout.currency(), principal.id)
        .await?;

    Ok(Json(json!({
        "clientSecret": authorization.client_secret,
        "paymentIntentId": authorization.id,
        "mock": state.gateway.mode() == GatewayMode::Mock,
    })))
}
