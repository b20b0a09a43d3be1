use crate::error::CheckoutError;
use crate::pricing::PricedCart;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Processor-facing payment state of an order. Only ever written as
/// `Paid` at creation; `Refunded`/`Failed` are operator transitions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "pending",
            PaymentState::Paid => "paid",
            PaymentState::Failed => "failed",
            PaymentState::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentState::Pending),
            "paid" => Some(PaymentState::Paid),
            "failed" => Some(PaymentState::Failed),
            "refunded" => Some(PaymentState::Refunded),
            _ => None,
        }
    }
}

/// Fulfillment lifecycle of an order. The current status is always the
/// status of the last history entry; it is never stored separately.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentStatus {
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl FulfillmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Processing => "processing",
            FulfillmentStatus::Shipped => "shipped",
            FulfillmentStatus::Delivered => "delivered",
            FulfillmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(FulfillmentStatus::Processing),
            "shipped" => Some(FulfillmentStatus::Shipped),
            "delivered" => Some(FulfillmentStatus::Delivered),
            "cancelled" => Some(FulfillmentStatus::Cancelled),
            _ => None,
        }
    }
}

/// One entry of the append-only fulfillment audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    pub status: FulfillmentStatus,
    pub date: DateTime<Utc>,
    pub comment: Option<String>,
}

/// Shipment tracking details attached by an operator after dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackingInfo {
    pub carrier: String,
    pub tracking_number: String,
    pub tracking_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    #[serde(rename = "zipCode")]
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// All five fields are required non-empty at confirmation time.
    pub fn validate(&self) -> Result<(), CheckoutError> {
        for (field, value) in [
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("zipCode", &self.postal_code),
            ("country", &self.country),
        ] {
            if value.trim().is_empty() {
                return Err(CheckoutError::InvalidAddress(field));
            }
        }
        Ok(())
    }
}

/// Client-supplied cart entry. Validated and rewritten into an
/// `OrderLine`, never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// A purchased line with name and unit price snapshotted at confirmation
/// time. Later catalog changes never touch it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i32,
}

impl OrderLine {
    pub fn subtotal_cents(&self) -> i64 {
        self.unit_price_cents * i64::from(self.quantity)
    }
}

/// The order aggregate: the durable record of a confirmed checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderLine>,
    pub total_cents: i64,
    pub currency: String,
    pub shipping_address: ShippingAddress,
    pub payment_reference: String,
    pub payment_state: PaymentState,
    pub status_history: Vec<StatusEntry>,
    pub tracking_info: Option<TrackingInfo>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Build a paid order from an authoritative pricing result. The total
    /// is taken from the priced cart, so it equals the sum of line
    /// subtotals by construction; the first history entry is written
    /// here and every later one is appended by the ledger.
    pub fn create(
        user_id: Uuid,
        priced: PricedCart,
        shipping_address: ShippingAddress,
        payment_reference: String,
        currency: String,
    ) -> Self {
        let now = Utc::now();
        debug_assert_eq!(
            priced.total_cents,
            priced.lines.iter().map(OrderLine::subtotal_cents).sum::<i64>()
        );
        Self {
            id: Uuid::new_v4(),
            user_id,
            items: priced.lines,
            total_cents: priced.total_cents,
            currency,
            shipping_address,
            payment_reference,
            payment_state: PaymentState::Paid,
            status_history: vec![StatusEntry {
                status: FulfillmentStatus::Processing,
                date: now,
                comment: Some("Order placed successfully".to_string()),
            }],
            tracking_info: None,
            created_at: now,
        }
    }

    /// Current fulfillment status, i.e. the last history entry. The
    /// history is non-empty from creation on.
    pub fn fulfillment_status(&self) -> FulfillmentStatus {
        self.status_history
            .last()
            .map(|entry| entry.status)
            .unwrap_or(FulfillmentStatus::Processing)
    }
}

/// 1-based page request with clamped bounds, shared by every list read.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, page: Page, total: u64) -> Self {
        Self {
            items,
            page: page.page,
            limit: page.limit,
            total,
            pages: total.div_ceil(u64::from(page.limit)),
        }
    }
}
