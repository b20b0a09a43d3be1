use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod middleware;
pub mod orders;
pub mod payment;
pub mod state;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .route(
            "/api/orders/create-payment-intent",
            post(orders::create_payment_intent),
        )
        .route("/api/orders/confirm-payment", post(orders::confirm_payment))
        .route("/api/orders/myorders", get(orders::my_orders))
        .route("/api/orders", get(orders::list_orders))
        .route(
            "/api/orders/{id}",
            get(orders::get_order).put(orders::update_order),
        )
        .route(
            "/api/payment/create-payment-intent",
            post(payment::create_payment_intent),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
