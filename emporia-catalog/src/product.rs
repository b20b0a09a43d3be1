use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog product as the checkout workflow sees it. Prices are integer
/// minor currency units (cents); monetary arithmetic never touches
/// floating point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(name: impl Into<String>, price_cents: i64, stock: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            price_cents,
            stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}
