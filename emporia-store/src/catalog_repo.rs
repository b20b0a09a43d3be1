use async_trait::async_trait;
use chrono::{DateTime, Utc};
use emporia_catalog::{CatalogError, CatalogReader, Product};
use sqlx::PgPool;
use uuid::Uuid;

/// Catalog access backed by the products table. Checkout only reads and
/// moves stock here; catalog CRUD belongs to the collaborator service
/// that owns the table.
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    price_cents: i64,
    stock: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            description: row.description,
            price_cents: row.price_cents,
            stock: row.stock,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn backend(err: sqlx::Error) -> CatalogError {
    CatalogError::Backend(Box::new(err))
}

#[async_trait]
impl CatalogReader for PgCatalog {
    async fn product(&self, id: Uuid) -> Result<Option<Product>, CatalogError> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, description, price_cents, stock, is_active, created_at, updated_at \
             FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(Product::from))
    }

    async fn decrement_stock(&self, id: Uuid, quantity: i32) -> Result<(), CatalogError> {
        // Single conditional update; the database closes the race
        // between two checkouts for the last units.
        let result = sqlx::query(
            "UPDATE products SET stock = stock - $2, updated_at = NOW() \
             WHERE id = $1 AND stock >= $2",
        )
        .bind(id)
        .bind(quantity)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Nothing matched: either the product is gone or stock ran out.
        let available = sqlx::query_scalar::<_, i32>("SELECT stock FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match available {
            None => Err(CatalogError::NotFound(id)),
            Some(available) => Err(CatalogError::InsufficientStock {
                product_id: id,
                requested: quantity,
                available,
            }),
        }
    }

    async fn release_stock(&self, id: Uuid, quantity: i32) -> Result<(), CatalogError> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(quantity)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(id));
        }
        Ok(())
    }
}
