use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use emporia_core::identity::{Principal, Role};
use emporia_shared::pii::Masked;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

/// Bearer-token claims minted by the identity collaborator. This service
/// only verifies; it never issues tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: Option<String>,
    pub role: String,
    pub exp: usize,
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let claims = token_data.claims;

    let id = Uuid::parse_str(&claims.sub).map_err(|_| StatusCode::UNAUTHORIZED)?;
    let role = match claims.role.as_str() {
        "ADMIN" => Role::Admin,
        "CUSTOMER" => Role::Customer,
        _ => return Err(StatusCode::FORBIDDEN),
    };

    let principal = Principal {
        id,
        role,
        email: claims.email.map(Masked),
    };
    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}
