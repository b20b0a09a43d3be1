use crate::models::{FulfillmentStatus, Order, Page, Paginated, TrackingInfo};
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("order not found: {0}")]
    NotFound(Uuid),

    #[error("an order already exists for payment reference {0}")]
    DuplicatePaymentReference(String),

    #[error("ledger backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Durable, append-only record of orders. Uniqueness by payment
/// reference is enforced by the store itself (unique index, or the
/// memory ledger's single write lock): writers call `create` and handle
/// `DuplicatePaymentReference`. A pre-check-then-insert is a race and is
/// never the guard.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    async fn create(&self, order: &Order) -> Result<(), LedgerError>;

    async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, LedgerError>;

    async fn get(&self, id: Uuid) -> Result<Option<Order>, LedgerError>;

    /// Orders owned by `user_id`, newest first. The owner filter is part
    /// of the query, not a post-filter over all orders.
    async fn list_for_user(&self, user_id: Uuid, page: Page)
        -> Result<Paginated<Order>, LedgerError>;

    /// Every order, newest first. Operator-only; callers enforce that.
    async fn list_all(&self, page: Page) -> Result<Paginated<Order>, LedgerError>;

    /// Append a history entry and thereby move the current fulfillment
    /// status, atomically. Returns the updated order.
    async fn append_status(
        &self,
        id: Uuid,
        status: FulfillmentStatus,
        comment: Option<&str>,
    ) -> Result<Order, LedgerError>;

    /// Attach or replace shipment tracking details. Returns the updated
    /// order.
    async fn set_tracking(&self, id: Uuid, tracking: TrackingInfo) -> Result<Order, LedgerError>;
}
