use crate::ledger::{LedgerError, OrderLedger};
use crate::models::{FulfillmentStatus, Order, Page, Paginated, StatusEntry, TrackingInfo};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// HashMap-backed ledger for tests and credential-less development.
/// A single lock spans every check-and-write, so the unique
/// payment-reference constraint and the atomic status append behave
/// exactly like their SQL counterparts under concurrency.
pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

struct Inner {
    orders: HashMap<Uuid, Order>,
    by_reference: HashMap<String, Uuid>,
    // insertion sequence; lists iterate it newest-first
    sequence: Vec<Uuid>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                orders: HashMap::new(),
                by_reference: HashMap::new(),
                sequence: Vec::new(),
            }),
        }
    }

    fn paginate(orders: Vec<Order>, page: Page) -> Paginated<Order> {
        let total = orders.len() as u64;
        let items = orders
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();
        Paginated::new(items, page, total)
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderLedger for MemoryLedger {
    async fn create(&self, order: &Order) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().expect("ledger mutex poisoned");

        // Constraint check and insert happen under the same lock, the
        // in-memory equivalent of the store's unique index.
        if inner.by_reference.contains_key(&order.payment_reference) {
            return Err(LedgerError::DuplicatePaymentReference(
                order.payment_reference.clone(),
            ));
        }

        inner
            .by_reference
            .insert(order.payment_reference.clone(), order.id);
        inner.sequence.push(order.id);
        inner.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, LedgerError> {
        let inner = self.inner.lock().expect("ledger mutex poisoned");
        Ok(inner
            .by_reference
            .get(reference)
            .and_then(|id| inner.orders.get(id))
            .cloned())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, LedgerError> {
        let inner = self.inner.lock().expect("ledger mutex poisoned");
        Ok(inner.orders.get(&id).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<Paginated<Order>, LedgerError> {
        let inner = self.inner.lock().expect("ledger mutex poisoned");
        let orders: Vec<Order> = inner
            .sequence
            .iter()
            .rev()
            .filter_map(|id| inner.orders.get(id))
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        Ok(Self::paginate(orders, page))
    }

    async fn list_all(&self, page: Page) -> Result<Paginated<Order>, LedgerError> {
        let inner = self.inner.lock().expect("ledger mutex poisoned");
        let orders: Vec<Order> = inner
            .sequence
            .iter()
            .rev()
            .filter_map(|id| inner.orders.get(id))
            .cloned()
            .collect();
        Ok(Self::paginate(orders, page))
    }

    async fn append_status(
        &self,
        id: Uuid,
        status: FulfillmentStatus,
        comment: Option<&str>,
    ) -> Result<Order, LedgerError> {
        let mut inner = self.inner.lock().expect("ledger mutex poisoned");
        let order = inner
            .orders
            .get_mut(&id)
            .ok_or(LedgerError::NotFound(id))?;
        order.status_history.push(StatusEntry {
            status,
            date: Utc::now(),
            comment: comment.map(str::to_string),
        });
        Ok(order.clone())
    }

    async fn set_tracking(&self, id: Uuid, tracking: TrackingInfo) -> Result<Order, LedgerError> {
        let mut inner = self.inner.lock().expect("ledger mutex poisoned");
        let order = inner
            .orders
            .get_mut(&id)
            .ok_or(LedgerError::NotFound(id))?;
        order.tracking_info = Some(tracking);
        Ok(order.clone())
    }
}
