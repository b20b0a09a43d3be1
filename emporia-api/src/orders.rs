use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use emporia_core::identity::Principal;
use emporia_order::{
    CartLine, CheckoutError, FulfillmentStatus, Order, Page, Paginated, ShippingAddress,
    TrackingInfo,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub items: Option<Vec<CartLine>>,
    // Captured with the intent on the client, but only validated at
    // confirmation time.
    pub shipping_address: Option<ShippingAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: Option<String>,
    pub items: Option<Vec<CartLine>>,
    pub shipping_address: Option<ShippingAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub status: FulfillmentStatus,
    pub comment: Option<String>,
    pub tracking_info: Option<TrackingInfo>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn order_body(order: &Order) -> Value {
    json!({ "success": true, "data": order })
}

fn paginated_body(result: &Paginated<Order>) -> Value {
    json!({
        "success": true,
        "data": result.items,
        "pagination": {
            "page": result.page,
            "limit": result.limit,
            "total": result.total,
            "pages": result.pages,
        }
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/orders/create-payment-intent
/// Step A of checkout: price the cart and open a payment authorization.
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateIntentRequest>,
) -> Result<Json<Value>, AppError> {
    let items = req.items.unwrap_or_default();
    let intent = state.checkout.create_intent(&principal, &items).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "clientSecret": intent.client_secret,
            "paymentIntentId": intent.payment_intent_id,
            "amount": intent.amount_cents,
            "currency": intent.currency,
        }
    })))
}

/// POST /api/orders/confirm-payment
/// Step B of checkout: verify the payment with the processor and commit
/// the order exactly once. Safe to retry.
pub async fn confirm_payment(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let reference = req
        .payment_intent_id
        .ok_or(CheckoutError::MissingField("paymentIntentId"))?;
    let address = req
        .shipping_address
        .ok_or(CheckoutError::MissingField("shippingAddress"))?;
    let items = req.items.unwrap_or_default();

    let order = state
        .checkout
        .confirm(&principal, &reference, &items, &address)
        .await?;

    Ok((StatusCode::CREATED, Json(order_body(&order))))
}

/// GET /api/orders/myorders
/// The caller's own orders, newest first.
pub async fn my_orders(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, AppError> {
    let page = Page::new(query.page, query.limit);
    let result = state.checkout.own_orders(&principal, page).await?;
    Ok(Json(paginated_body(&result)))
}

/// GET /api/orders
/// Operators see every order; customers see their own.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, AppError> {
    let page = Page::new(query.page, query.limit);
    let result = state.checkout.orders_for(&principal, page).await?;
    Ok(Json(paginated_body(&result)))
}

/// GET /api/orders/{id}
/// Single order; owner or operator only.
pub async fn get_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let order = state.checkout.order_for(&principal, order_id).await?;
    Ok(Json(order_body(&order)))
}

/// PUT /api/orders/{id}
/// Operator-only fulfillment update: appends a status-history entry and
/// optionally attaches tracking details.
pub async fn update_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<Json<Value>, AppError> {
    let order = state
        .checkout
        .update_fulfillment(
            &principal,
            order_id,
            req.status,
            req.comment.as_deref(),
            req.tracking_info,
        )
        .await?;
    Ok(Json(order_body(&order)))
}
