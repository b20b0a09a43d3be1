use async_trait::async_trait;
use chrono::{DateTime, Utc};
use emporia_order::{
    FulfillmentStatus, LedgerError, Order, OrderLedger, OrderLine, Page, Paginated, PaymentState,
    ShippingAddress, StatusEntry, TrackingInfo,
};
use sqlx::PgPool;
use uuid::Uuid;

/// Order ledger backed by Postgres. The unique index on
/// `payment_reference` is the idempotency guard; `create` surfaces its
/// violation as `DuplicatePaymentReference` and callers resolve the race
/// from there.
pub struct PgOrderLedger {
    pool: PgPool,
}

impl PgOrderLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load(&self, id: Uuid) -> Result<Option<Order>, LedgerError> {
        let order_row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, user_id, total_cents, currency, street, city, state, postal_code, \
             country, payment_reference, payment_state, carrier, tracking_number, tracking_url, \
             created_at \
             FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let Some(row) = order_row else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, OrderLineRow>(
            "SELECT product_id, name, unit_price_cents, quantity \
             FROM order_lines WHERE order_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let history = sqlx::query_as::<_, StatusRow>(
            "SELECT status, comment, created_at \
             FROM order_status_history WHERE order_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(Some(row.into_order(lines, history)?))
    }

    async fn load_page(
        &self,
        ids: Vec<Uuid>,
        page: Page,
        total: u64,
    ) -> Result<Paginated<Order>, LedgerError> {
        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(order) = self.load(id).await? {
                orders.push(order);
            }
        }
        Ok(Paginated::new(orders, page, total))
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    total_cents: i64,
    currency: String,
    street: String,
    city: String,
    state: String,
    postal_code: String,
    country: String,
    payment_reference: String,
    payment_state: String,
    carrier: Option<String>,
    tracking_number: Option<String>,
    tracking_url: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    product_id: Uuid,
    name: String,
    unit_price_cents: i64,
    quantity: i32,
}

#[derive(sqlx::FromRow)]
struct StatusRow {
    status: String,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(
        self,
        lines: Vec<OrderLineRow>,
        history: Vec<StatusRow>,
    ) -> Result<Order, LedgerError> {
        let payment_state = PaymentState::parse(&self.payment_state)
            .ok_or_else(|| corrupt(format!("unknown payment state {:?}", self.payment_state)))?;

        let status_history = history
            .into_iter()
            .map(|row| {
                let status = FulfillmentStatus::parse(&row.status)
                    .ok_or_else(|| corrupt(format!("unknown fulfillment status {:?}", row.status)))?;
                Ok(StatusEntry {
                    status,
                    date: row.created_at,
                    comment: row.comment,
                })
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        let tracking_info = match (self.carrier, self.tracking_number) {
            (Some(carrier), Some(tracking_number)) => Some(TrackingInfo {
                carrier,
                tracking_number,
                tracking_url: self.tracking_url,
            }),
            _ => None,
        };

        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            items: lines
                .into_iter()
                .map(|line| OrderLine {
                    product_id: line.product_id,
                    name: line.name,
                    unit_price_cents: line.unit_price_cents,
                    quantity: line.quantity,
                })
                .collect(),
            total_cents: self.total_cents,
            currency: self.currency,
            shipping_address: ShippingAddress {
                street: self.street,
                city: self.city,
                state: self.state,
                postal_code: self.postal_code,
                country: self.country,
            },
            payment_reference: self.payment_reference,
            payment_state,
            status_history,
            tracking_info,
            created_at: self.created_at,
        })
    }
}

fn backend(err: sqlx::Error) -> LedgerError {
    LedgerError::Backend(Box::new(err))
}

fn corrupt(message: String) -> LedgerError {
    LedgerError::Backend(message.into())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
        }
        _ => false,
    }
}

#[async_trait]
impl OrderLedger for PgOrderLedger {
    async fn create(&self, order: &Order) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let inserted = sqlx::query(
            "INSERT INTO orders (id, user_id, total_cents, currency, street, city, state, \
             postal_code, country, payment_reference, payment_state, carrier, tracking_number, \
             tracking_url, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.total_cents)
        .bind(&order.currency)
        .bind(&order.shipping_address.street)
        .bind(&order.shipping_address.city)
        .bind(&order.shipping_address.state)
        .bind(&order.shipping_address.postal_code)
        .bind(&order.shipping_address.country)
        .bind(&order.payment_reference)
        .bind(order.payment_state.as_str())
        .bind(order.tracking_info.as_ref().map(|t| t.carrier.as_str()))
        .bind(
            order
                .tracking_info
                .as_ref()
                .map(|t| t.tracking_number.as_str()),
        )
        .bind(
            order
                .tracking_info
                .as_ref()
                .and_then(|t| t.tracking_url.as_deref()),
        )
        .bind(order.created_at)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            if is_unique_violation(&err) {
                return Err(LedgerError::DuplicatePaymentReference(
                    order.payment_reference.clone(),
                ));
            }
            return Err(backend(err));
        }

        for (position, line) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_lines (order_id, position, product_id, name, \
                 unit_price_cents, quantity) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(order.id)
            .bind(position as i32)
            .bind(line.product_id)
            .bind(&line.name)
            .bind(line.unit_price_cents)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        for entry in &order.status_history {
            sqlx::query(
                "INSERT INTO order_status_history (order_id, status, comment, created_at) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(order.id)
            .bind(entry.status.as_str())
            .bind(entry.comment.as_deref())
            .bind(entry.date)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)
    }

    async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, LedgerError> {
        let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM orders WHERE payment_reference = $1")
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match id {
            Some(id) => self.load(id).await,
            None => Ok(None),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, LedgerError> {
        self.load(id).await
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<Paginated<Order>, LedgerError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM orders WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        self.load_page(ids, page, total as u64).await
    }

    async fn list_all(&self, page: Page) -> Result<Paginated<Order>, LedgerError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        self.load_page(ids, page, total as u64).await
    }

    async fn append_status(
        &self,
        id: Uuid,
        status: FulfillmentStatus,
        comment: Option<&str>,
    ) -> Result<Order, LedgerError> {
        let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        if exists.is_none() {
            return Err(LedgerError::NotFound(id));
        }

        sqlx::query(
            "INSERT INTO order_status_history (order_id, status, comment, created_at) \
             VALUES ($1, $2, $3, NOW())",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(comment)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        self.load(id).await?.ok_or(LedgerError::NotFound(id))
    }

    async fn set_tracking(&self, id: Uuid, tracking: TrackingInfo) -> Result<Order, LedgerError> {
        let result = sqlx::query(
            "UPDATE orders SET carrier = $2, tracking_number = $3, tracking_url = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&tracking.carrier)
        .bind(&tracking.tracking_number)
        .bind(tracking.tracking_url.as_deref())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(id));
        }

        self.load(id).await?.ok_or(LedgerError::NotFound(id))
    }
}
