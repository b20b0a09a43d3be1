use crate::error::CheckoutError;
use crate::ledger::{LedgerError, OrderLedger};
use crate::models::{
    CartLine, FulfillmentStatus, Order, OrderLine, Page, Paginated, ShippingAddress, TrackingInfo,
};
use crate::pricing::validate_and_price;
use emporia_catalog::{CatalogError, CatalogReader};
use emporia_core::identity::Principal;
use emporia_core::notify::Notifier;
use emporia_core::payment::{PaymentGateway, PaymentStatus};
use emporia_shared::models::events::OrderPlacedEvent;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Client-facing result of intent creation (Step A). No order exists
/// yet; repeating the step just issues a fresh, unused authorization.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutIntent {
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
}

/// The checkout state machine. Holds handles to its collaborators
/// (catalog, ledger, gateway, notifier), injected at construction; there
/// are no module-level singletons anywhere in the workflow.
pub struct CheckoutOrchestrator {
    catalog: Arc<dyn CatalogReader>,
    ledger: Arc<dyn OrderLedger>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    currency: String,
}

impl CheckoutOrchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogReader>,
        ledger: Arc<dyn OrderLedger>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            ledger,
            gateway,
            notifier,
            currency: currency.into(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Step A: price the cart against live catalog state and open an
    /// authorization with the processor for the computed total. Any
    /// validation failure aborts before the gateway is touched; no side
    /// effects remain on any failure path.
    pub async fn create_intent(
        &self,
        principal: &Principal,
        cart: &[CartLine],
    ) -> Result<CheckoutIntent, CheckoutError> {
        let priced = validate_and_price(self.catalog.as_ref(), cart).await?;

        let authorization = self
            .gateway
            .create_authorization(priced.total_cents, &self.currency, principal.id)
            .await?;

        tracing::info!(
            user = %principal.id,
            authorization = %authorization.id,
            amount_cents = priced.total_cents,
            "payment intent created"
        );

        Ok(CheckoutIntent {
            payment_intent_id: authorization.id,
            client_secret: authorization.client_secret,
            amount_cents: priced.total_cents,
            currency: self.currency.clone(),
        })
    }

    /// Step B: the exactly-once boundary. Safe to invoke any number of
    /// times for the same authorization; retries, double-clicks and
    /// webhook redeliveries all land on the same single order.
    pub async fn confirm(
        &self,
        principal: &Principal,
        payment_intent_id: &str,
        cart: &[CartLine],
        shipping_address: &ShippingAddress,
    ) -> Result<Order, CheckoutError> {
        if payment_intent_id.trim().is_empty() {
            return Err(CheckoutError::MissingField("paymentIntentId"));
        }
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        shipping_address.validate()?;

        // Authoritative status check with the processor; the caller's
        // claim that payment went through is never trusted.
        let authorization = self
            .gateway
            .retrieve_authorization(payment_intent_id)
            .await?;
        if authorization.status != PaymentStatus::Succeeded {
            return Err(CheckoutError::PaymentNotCompleted);
        }

        // Idempotency: a repeat of an already-committed confirmation
        // returns the existing order with no further side effects.
        if let Some(existing) = self
            .ledger
            .find_by_payment_reference(payment_intent_id)
            .await
            .map_err(ledger_failure)?
        {
            tracing::info!(order = %existing.id, "confirmation replay, returning existing order");
            return Ok(existing);
        }

        // Prices and stock may have moved since Step A.
        let priced = validate_and_price(self.catalog.as_ref(), cart).await?;

        // Decrement stock line by line. Each decrement is atomic; on the
        // first failure everything already applied is released so no
        // partial decrement survives.
        let mut applied: Vec<OrderLine> = Vec::with_capacity(priced.lines.len());
        for line in &priced.lines {
            match self
                .catalog
                .decrement_stock(line.product_id, line.quantity)
                .await
            {
                Ok(()) => applied.push(line.clone()),
                Err(err) => {
                    self.release_applied(&applied).await;
                    return Err(match err {
                        CatalogError::InsufficientStock { .. } => CheckoutError::InsufficientStock {
                            name: line.name.clone(),
                        },
                        CatalogError::NotFound(id) => CheckoutError::ProductNotFound(id),
                        CatalogError::Backend(e) => CheckoutError::Catalog(e.to_string()),
                    });
                }
            }
        }

        let order = Order::create(
            principal.id,
            priced,
            shipping_address.clone(),
            payment_intent_id.to_string(),
            self.currency.clone(),
        );

        match self.ledger.create(&order).await {
            Ok(()) => {}
            Err(LedgerError::DuplicatePaymentReference(_)) => {
                // Lost the race against a concurrent confirmation of the
                // same authorization. The winner's decrements stand; ours
                // must not, or stock would be charged twice.
                self.release_applied(&applied).await;
                let winner = self
                    .ledger
                    .find_by_payment_reference(payment_intent_id)
                    .await
                    .map_err(ledger_failure)?
                    .ok_or_else(|| {
                        CheckoutError::Ledger(
                            "order vanished after duplicate payment reference".to_string(),
                        )
                    })?;
                tracing::info!(order = %winner.id, "lost confirmation race, returning winner");
                return Ok(winner);
            }
            Err(err) => {
                self.release_applied(&applied).await;
                return Err(ledger_failure(err));
            }
        }

        tracing::info!(
            order = %order.id,
            user = %principal.id,
            total_cents = order.total_cents,
            "order created"
        );

        // Best-effort admin notification. Detached: the order is already
        // committed and a delivery failure must not unwind it.
        let notifier = Arc::clone(&self.notifier);
        let event = OrderPlacedEvent {
            order_id: order.id,
            user_id: order.user_id,
            customer_email: principal.email.clone(),
            total_cents: order.total_cents,
            currency: order.currency.clone(),
            line_count: order.items.len(),
            placed_at: order.created_at.timestamp(),
        };
        tokio::spawn(async move {
            if let Err(err) = notifier.order_placed(&event).await {
                tracing::warn!("order notification failed: {err}");
            }
        });

        Ok(order)
    }

    /// Single-order read with ownership enforcement: the owner and
    /// operators may read, nobody else.
    pub async fn order_for(
        &self,
        requester: &Principal,
        order_id: Uuid,
    ) -> Result<Order, CheckoutError> {
        let order = self
            .ledger
            .get(order_id)
            .await
            .map_err(ledger_failure)?
            .ok_or(CheckoutError::NotFound)?;

        if order.user_id != requester.id && !requester.is_admin() {
            return Err(CheckoutError::Forbidden);
        }
        Ok(order)
    }

    /// Paginated listing: operators see every order, customers their
    /// own. The owner filter is part of the ledger query so counts never
    /// leak.
    pub async fn orders_for(
        &self,
        requester: &Principal,
        page: Page,
    ) -> Result<Paginated<Order>, CheckoutError> {
        let listed = if requester.is_admin() {
            self.ledger.list_all(page).await
        } else {
            self.ledger.list_for_user(requester.id, page).await
        };
        listed.map_err(ledger_failure)
    }

    /// The caller's own orders, regardless of role.
    pub async fn own_orders(
        &self,
        requester: &Principal,
        page: Page,
    ) -> Result<Paginated<Order>, CheckoutError> {
        self.ledger
            .list_for_user(requester.id, page)
            .await
            .map_err(ledger_failure)
    }

    /// Operator-only fulfillment update: appends to the status history
    /// and optionally attaches tracking details.
    pub async fn update_fulfillment(
        &self,
        requester: &Principal,
        order_id: Uuid,
        status: FulfillmentStatus,
        comment: Option<&str>,
        tracking: Option<TrackingInfo>,
    ) -> Result<Order, CheckoutError> {
        if !requester.is_admin() {
            return Err(CheckoutError::Forbidden);
        }

        let mut order = self
            .ledger
            .append_status(order_id, status, comment)
            .await
            .map_err(ledger_failure)?;

        if let Some(tracking) = tracking {
            order = self
                .ledger
                .set_tracking(order_id, tracking)
                .await
                .map_err(ledger_failure)?;
        }
        Ok(order)
    }

    async fn release_applied(&self, applied: &[OrderLine]) {
        for line in applied {
            if let Err(err) = self
                .catalog
                .release_stock(line.product_id, line.quantity)
                .await
            {
                // Nothing left to do but record it; the stock row now
                // needs operator attention.
                tracing::error!(
                    product = %line.product_id,
                    quantity = line.quantity,
                    "failed to roll back stock decrement: {err}"
                );
            }
        }
    }
}

fn ledger_failure(err: LedgerError) -> CheckoutError {
    match err {
        LedgerError::NotFound(_) => CheckoutError::NotFound,
        other => CheckoutError::Ledger(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::memory::MemoryLedger;
    use crate::models::PaymentState;
    use async_trait::async_trait;
    use emporia_catalog::{MemoryCatalog, Product};
    use emporia_core::notify::LogNotifier;
    use std::time::Duration;

    struct Fixture {
        catalog: Arc<MemoryCatalog>,
        ledger: Arc<MemoryLedger>,
        gateway: Arc<MockGateway>,
        checkout: CheckoutOrchestrator,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(MemoryCatalog::new());
        let ledger = Arc::new(MemoryLedger::new());
        let gateway = Arc::new(MockGateway::with_latency(Duration::from_millis(10)));
        let checkout = CheckoutOrchestrator::new(
            Arc::clone(&catalog) as Arc<dyn CatalogReader>,
            Arc::clone(&ledger) as Arc<dyn OrderLedger>,
            Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
            Arc::new(LogNotifier::default()),
            "usd",
        );
        Fixture {
            catalog,
            ledger,
            gateway,
            checkout,
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            street: "1 Canal St".to_string(),
            city: "New Orleans".to_string(),
            state: "LA".to_string(),
            postal_code: "70130".to_string(),
            country: "US".to_string(),
        }
    }

    fn cart(product_id: Uuid, quantity: i32) -> Vec<CartLine> {
        vec![CartLine {
            product_id,
            quantity,
        }]
    }

    #[tokio::test]
    async fn intent_then_confirm_creates_a_paid_order_and_decrements_stock() {
        let fx = fixture();
        let user = Principal::customer(Uuid::new_v4());
        let p1 = fx.catalog.insert(Product::new("Field jacket", 1_000, 5));

        let intent = fx.checkout.create_intent(&user, &cart(p1, 2)).await.unwrap();
        assert_eq!(intent.amount_cents, 2_000);
        assert!(intent.client_secret.is_some());
        // Step A leaves no order and no stock change behind.
        assert_eq!(fx.catalog.stock_of(p1), Some(5));
        assert_eq!(fx.ledger.list_all(Page::default()).await.unwrap().total, 0);

        let order = fx
            .checkout
            .confirm(&user, &intent.payment_intent_id, &cart(p1, 2), &address())
            .await
            .unwrap();

        assert_eq!(order.total_cents, 2_000);
        assert_eq!(order.payment_state, PaymentState::Paid);
        assert_eq!(order.status_history.len(), 1);
        assert_eq!(order.fulfillment_status(), FulfillmentStatus::Processing);
        assert_eq!(fx.catalog.stock_of(p1), Some(3));
    }

    #[tokio::test]
    async fn confirm_fails_cleanly_when_stock_ran_out_since_intent() {
        let fx = fixture();
        let user = Principal::customer(Uuid::new_v4());
        let p1 = fx.catalog.insert(Product::new("Field jacket", 1_000, 5));

        let intent = fx.checkout.create_intent(&user, &cart(p1, 2)).await.unwrap();
        fx.catalog.set_stock(p1, 1);

        let err = fx
            .checkout
            .confirm(&user, &intent.payment_intent_id, &cart(p1, 2), &address())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InsufficientStock { .. }));
        assert_eq!(fx.catalog.stock_of(p1), Some(1));
        assert_eq!(fx.ledger.list_all(Page::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn confirm_rejects_incomplete_payment_without_side_effects() {
        let fx = fixture();
        let user = Principal::customer(Uuid::new_v4());
        let p1 = fx.catalog.insert(Product::new("Field jacket", 1_000, 5));

        let intent = fx.checkout.create_intent(&user, &cart(p1, 1)).await.unwrap();
        fx.gateway.force_retrieve_status(PaymentStatus::Processing);

        let err = fx
            .checkout
            .confirm(&user, &intent.payment_intent_id, &cart(p1, 1), &address())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::PaymentNotCompleted));
        assert_eq!(fx.catalog.stock_of(p1), Some(5));
        assert_eq!(fx.ledger.list_all(Page::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn confirm_requires_a_payment_reference_and_an_address() {
        let fx = fixture();
        let user = Principal::customer(Uuid::new_v4());
        let p1 = fx.catalog.insert(Product::new("Field jacket", 1_000, 5));

        let err = fx
            .checkout
            .confirm(&user, "  ", &cart(p1, 1), &address())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::MissingField("paymentIntentId")));

        let mut bad_address = address();
        bad_address.country = String::new();
        let intent = fx.checkout.create_intent(&user, &cart(p1, 1)).await.unwrap();
        let err = fx
            .checkout
            .confirm(&user, &intent.payment_intent_id, &cart(p1, 1), &bad_address)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidAddress("country")));
    }

    #[tokio::test]
    async fn sequential_replays_return_the_same_order_once() {
        let fx = fixture();
        let user = Principal::customer(Uuid::new_v4());
        let p1 = fx.catalog.insert(Product::new("Field jacket", 1_000, 5));

        let intent = fx.checkout.create_intent(&user, &cart(p1, 2)).await.unwrap();
        let first = fx
            .checkout
            .confirm(&user, &intent.payment_intent_id, &cart(p1, 2), &address())
            .await
            .unwrap();
        let second = fx
            .checkout
            .confirm(&user, &intent.payment_intent_id, &cart(p1, 2), &address())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        // The replay performed no second decrement.
        assert_eq!(fx.catalog.stock_of(p1), Some(3));
        assert_eq!(fx.ledger.list_all(Page::default()).await.unwrap().total, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_replays_converge_on_one_order() {
        let fx = fixture();
        let user = Principal::customer(Uuid::new_v4());
        let p1 = fx.catalog.insert(Product::new("Field jacket", 1_000, 10));

        let intent = fx.checkout.create_intent(&user, &cart(p1, 2)).await.unwrap();

        let cart_a = cart(p1, 2);
        let cart_b = cart(p1, 2);
        let addr_a = address();
        let addr_b = address();
        let (a, b) = tokio::join!(
            fx.checkout
                .confirm(&user, &intent.payment_intent_id, &cart_a, &addr_a),
            fx.checkout
                .confirm(&user, &intent.payment_intent_id, &cart_b, &addr_b),
        );
        let a = a.unwrap();
        let b = b.unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(fx.ledger.list_all(Page::default()).await.unwrap().total, 1);
        // Whichever task lost the create race rolled its decrement back.
        assert_eq!(fx.catalog.stock_of(p1), Some(8));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn last_unit_goes_to_exactly_one_of_two_checkouts() {
        let fx = fixture();
        let alice = Principal::customer(Uuid::new_v4());
        let bob = Principal::customer(Uuid::new_v4());
        let p1 = fx.catalog.insert(Product::new("Floor sample sofa", 89_900, 1));

        let intent_a = fx
            .checkout
            .create_intent(&alice, &cart(p1, 1))
            .await
            .unwrap();
        let intent_b = fx.checkout.create_intent(&bob, &cart(p1, 1)).await.unwrap();

        let cart_a = cart(p1, 1);
        let cart_b = cart(p1, 1);
        let addr_a = address();
        let addr_b = address();
        let (a, b) = tokio::join!(
            fx.checkout
                .confirm(&alice, &intent_a.payment_intent_id, &cart_a, &addr_a),
            fx.checkout
                .confirm(&bob, &intent_b.payment_intent_id, &cart_b, &addr_b),
        );

        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one checkout may win the last unit");
        let failure = if a.is_err() { a } else { b };
        assert!(matches!(
            failure.unwrap_err(),
            CheckoutError::InsufficientStock { .. }
        ));
        assert_eq!(fx.catalog.stock_of(p1), Some(0));
        assert_eq!(fx.ledger.list_all(Page::default()).await.unwrap().total, 1);
    }

    /// Catalog wrapper that refuses to decrement one product, simulating
    /// stock vanishing between the optimistic pre-check and the commit.
    struct FailingDecrement {
        inner: Arc<MemoryCatalog>,
        poisoned: Uuid,
    }

    #[async_trait]
    impl CatalogReader for FailingDecrement {
        async fn product(&self, id: Uuid) -> Result<Option<Product>, CatalogError> {
            self.inner.product(id).await
        }

        async fn decrement_stock(&self, id: Uuid, quantity: i32) -> Result<(), CatalogError> {
            if id == self.poisoned {
                return Err(CatalogError::InsufficientStock {
                    product_id: id,
                    requested: quantity,
                    available: 0,
                });
            }
            self.inner.decrement_stock(id, quantity).await
        }

        async fn release_stock(&self, id: Uuid, quantity: i32) -> Result<(), CatalogError> {
            self.inner.release_stock(id, quantity).await
        }
    }

    #[tokio::test]
    async fn failed_line_rolls_back_earlier_decrements() {
        let inner = Arc::new(MemoryCatalog::new());
        let first = inner.insert(Product::new("Bookshelf", 12_000, 5));
        let second = inner.insert(Product::new("Reading chair", 45_000, 5));

        let catalog = Arc::new(FailingDecrement {
            inner: Arc::clone(&inner),
            poisoned: second,
        });
        let ledger = Arc::new(MemoryLedger::new());
        let checkout = CheckoutOrchestrator::new(
            Arc::clone(&catalog) as Arc<dyn CatalogReader>,
            Arc::clone(&ledger) as Arc<dyn OrderLedger>,
            Arc::new(MockGateway::with_latency(Duration::ZERO)),
            Arc::new(LogNotifier::default()),
            "usd",
        );

        let user = Principal::customer(Uuid::new_v4());
        let two_lines = vec![
            CartLine {
                product_id: first,
                quantity: 2,
            },
            CartLine {
                product_id: second,
                quantity: 1,
            },
        ];
        let intent = checkout.create_intent(&user, &two_lines).await.unwrap();

        let err = checkout
            .confirm(&user, &intent.payment_intent_id, &two_lines, &address())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InsufficientStock { .. }));
        // The first line's decrement was compensated; nothing committed.
        assert_eq!(inner.stock_of(first), Some(5));
        assert_eq!(inner.stock_of(second), Some(5));
        assert_eq!(ledger.list_all(Page::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn reads_enforce_ownership() {
        let fx = fixture();
        let owner = Principal::customer(Uuid::new_v4());
        let stranger = Principal::customer(Uuid::new_v4());
        let operator = Principal::admin(Uuid::new_v4());
        let p1 = fx.catalog.insert(Product::new("Field jacket", 1_000, 5));

        let intent = fx.checkout.create_intent(&owner, &cart(p1, 1)).await.unwrap();
        let order = fx
            .checkout
            .confirm(&owner, &intent.payment_intent_id, &cart(p1, 1), &address())
            .await
            .unwrap();

        assert_eq!(
            fx.checkout.order_for(&owner, order.id).await.unwrap().id,
            order.id
        );
        assert!(matches!(
            fx.checkout.order_for(&stranger, order.id).await.unwrap_err(),
            CheckoutError::Forbidden
        ));
        assert_eq!(
            fx.checkout.order_for(&operator, order.id).await.unwrap().id,
            order.id
        );
        assert!(matches!(
            fx.checkout.order_for(&owner, Uuid::new_v4()).await.unwrap_err(),
            CheckoutError::NotFound
        ));
    }

    #[tokio::test]
    async fn listings_scope_by_role() {
        let fx = fixture();
        let alice = Principal::customer(Uuid::new_v4());
        let bob = Principal::customer(Uuid::new_v4());
        let operator = Principal::admin(Uuid::new_v4());
        let p1 = fx.catalog.insert(Product::new("Field jacket", 1_000, 50));

        for user in [&alice, &alice, &bob] {
            let intent = fx.checkout.create_intent(user, &cart(p1, 1)).await.unwrap();
            fx.checkout
                .confirm(user, &intent.payment_intent_id, &cart(p1, 1), &address())
                .await
                .unwrap();
        }

        let alices = fx.checkout.orders_for(&alice, Page::default()).await.unwrap();
        assert_eq!(alices.total, 2);
        let everyone = fx
            .checkout
            .orders_for(&operator, Page::default())
            .await
            .unwrap();
        assert_eq!(everyone.total, 3);
        let own = fx.checkout.own_orders(&bob, Page::default()).await.unwrap();
        assert_eq!(own.total, 1);
    }

    #[tokio::test]
    async fn fulfillment_updates_are_operator_only_and_append() {
        let fx = fixture();
        let owner = Principal::customer(Uuid::new_v4());
        let operator = Principal::admin(Uuid::new_v4());
        let p1 = fx.catalog.insert(Product::new("Field jacket", 1_000, 5));

        let intent = fx.checkout.create_intent(&owner, &cart(p1, 1)).await.unwrap();
        let order = fx
            .checkout
            .confirm(&owner, &intent.payment_intent_id, &cart(p1, 1), &address())
            .await
            .unwrap();

        let denied = fx
            .checkout
            .update_fulfillment(&owner, order.id, FulfillmentStatus::Shipped, None, None)
            .await;
        assert!(matches!(denied, Err(CheckoutError::Forbidden)));

        let updated = fx
            .checkout
            .update_fulfillment(
                &operator,
                order.id,
                FulfillmentStatus::Shipped,
                Some("Left the warehouse"),
                Some(TrackingInfo {
                    carrier: "FedEx".to_string(),
                    tracking_number: "794699".to_string(),
                    tracking_url: Some("https://fedex.example/794699".to_string()),
                }),
            )
            .await
            .unwrap();

        assert_eq!(updated.status_history.len(), 2);
        assert_eq!(updated.fulfillment_status(), FulfillmentStatus::Shipped);
        assert_eq!(updated.status_history[0].status, FulfillmentStatus::Processing);
        assert_eq!(updated.tracking_info.unwrap().carrier, "FedEx");
    }

    #[tokio::test]
    async fn unknown_authorization_surfaces_as_gateway_error() {
        let fx = fixture();
        let user = Principal::customer(Uuid::new_v4());
        let p1 = fx.catalog.insert(Product::new("Field jacket", 1_000, 5));

        let err = fx
            .checkout
            .confirm(&user, "pi_never_created", &cart(p1, 1), &address())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Gateway(_)));
        assert_eq!(fx.catalog.stock_of(p1), Some(5));
    }
}
