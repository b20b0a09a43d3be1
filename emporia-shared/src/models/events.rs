use crate::pii::Masked;
use uuid::Uuid;

/// Summary emitted after an order commits, consumed by the outbound
/// notification collaborator. Carries no line detail beyond the count;
/// recipients that need more fetch the order by id.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderPlacedEvent {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub customer_email: Option<Masked<String>>,
    pub total_cents: i64,
    pub currency: String,
    pub line_count: usize,
    pub placed_at: i64,
}
