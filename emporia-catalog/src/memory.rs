use crate::product::Product;
use crate::reader::{CatalogError, CatalogReader};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Mutex-guarded in-memory catalog. Backs tests and credential-less
/// development; the decrement holds the lock for the whole
/// check-and-subtract, giving the same atomicity the SQL conditional
/// update provides in production.
pub struct MemoryCatalog {
    products: Mutex<HashMap<Uuid, Product>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            products: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, product: Product) -> Uuid {
        let id = product.id;
        self.products
            .lock()
            .expect("catalog mutex poisoned")
            .insert(id, product);
        id
    }

    pub fn set_stock(&self, id: Uuid, stock: i32) {
        if let Some(product) = self
            .products
            .lock()
            .expect("catalog mutex poisoned")
            .get_mut(&id)
        {
            product.stock = stock;
        }
    }

    pub fn stock_of(&self, id: Uuid) -> Option<i32> {
        self.products
            .lock()
            .expect("catalog mutex poisoned")
            .get(&id)
            .map(|p| p.stock)
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogReader for MemoryCatalog {
    async fn product(&self, id: Uuid) -> Result<Option<Product>, CatalogError> {
        Ok(self
            .products
            .lock()
            .expect("catalog mutex poisoned")
            .get(&id)
            .cloned())
    }

    async fn decrement_stock(&self, id: Uuid, quantity: i32) -> Result<(), CatalogError> {
        let mut products = self.products.lock().expect("catalog mutex poisoned");
        let product = products.get_mut(&id).ok_or(CatalogError::NotFound(id))?;

        if product.stock < quantity {
            return Err(CatalogError::InsufficientStock {
                product_id: id,
                requested: quantity,
                available: product.stock,
            });
        }

        product.stock -= quantity;
        Ok(())
    }

    async fn release_stock(&self, id: Uuid, quantity: i32) -> Result<(), CatalogError> {
        let mut products = self.products.lock().expect("catalog mutex poisoned");
        let product = products.get_mut(&id).ok_or(CatalogError::NotFound(id))?;
        product.stock += quantity;
        Ok(())
    }
}
