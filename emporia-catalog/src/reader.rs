use crate::product::Product;
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("product not found: {0}")]
    NotFound(Uuid),

    #[error("insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("catalog backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Read-and-decrement contract over the product catalog. The catalog
/// itself (CRUD, search, categories) belongs to a collaborator service;
/// checkout only looks products up and moves stock.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn product(&self, id: Uuid) -> Result<Option<Product>, CatalogError>;

    /// Decrement stock if at least `quantity` units remain. Must be a
    /// single conditional update, never a read-then-write pair: this is
    /// the sole concurrency-control point against overselling.
    async fn decrement_stock(&self, id: Uuid, quantity: i32) -> Result<(), CatalogError>;

    /// Compensating increment, used to roll back decrements already
    /// applied when a later step of the same checkout fails.
    async fn release_stock(&self, id: Uuid, quantity: i32) -> Result<(), CatalogError>;
}
