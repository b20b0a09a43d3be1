use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Processor-side status of a payment authorization. Only `Succeeded`
/// makes an authorization payable; everything else blocks confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    RequiresPaymentMethod,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    Failed,
}

/// Whether a gateway talks to a real processor or synthesizes results.
/// Selected once at construction; business logic never infers it from
/// the shape of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    Live,
    Mock,
}

/// A processor-side record asserting a cardholder has approved a charge
/// of a given amount, referenced by an opaque identifier (e.g. pi_123).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAuthorization {
    pub id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub client_secret: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("unknown payment authorization: {0}")]
    UnknownAuthorization(String),

    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an authorization with the processor for the given amount.
    /// The customer id travels as processor metadata.
    async fn create_authorization(
        &self,
        amount_cents: i64,
        currency: &str,
        customer_id: Uuid,
    ) -> Result<PaymentAuthorization, GatewayError>;

    /// Fetch the current state of an authorization from the processor.
    /// This is the authoritative status source; client claims about a
    /// payment's outcome are never trusted.
    async fn retrieve_authorization(
        &self,
        authorization_id: &str,
    ) -> Result<PaymentAuthorization, GatewayError>;

    fn mode(&self) -> GatewayMode;
}
