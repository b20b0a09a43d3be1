use crate::error::CheckoutError;
use crate::models::{CartLine, OrderLine};
use emporia_catalog::{CatalogError, CatalogReader};

/// Output of the pricing engine: snapshotted lines plus the exact total
/// in minor currency units.
#[derive(Debug, Clone)]
pub struct PricedCart {
    pub lines: Vec<OrderLine>,
    pub total_cents: i64,
}

/// Validate a requested cart against current catalog state and compute
/// the authoritative total. Lines are processed in input order and the
/// first failure wins; there is no partial success. The stock check here
/// is an optimistic pre-check; the atomic decrement at commit time is
/// the authority.
pub async fn validate_and_price(
    catalog: &dyn CatalogReader,
    cart: &[CartLine],
) -> Result<PricedCart, CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let mut lines = Vec::with_capacity(cart.len());
    let mut total_cents: i64 = 0;

    for requested in cart {
        if requested.quantity < 1 {
            return Err(CheckoutError::InvalidQuantity(requested.product_id));
        }

        let product = catalog
            .product(requested.product_id)
            .await
            .map_err(backend_failure)?
            .ok_or(CheckoutError::ProductNotFound(requested.product_id))?;

        if !product.is_active {
            return Err(CheckoutError::ProductInactive { name: product.name });
        }
        if product.stock < requested.quantity {
            return Err(CheckoutError::InsufficientStock { name: product.name });
        }

        let line = OrderLine {
            product_id: product.id,
            name: product.name,
            unit_price_cents: product.price_cents,
            quantity: requested.quantity,
        };
        total_cents += line.subtotal_cents();
        lines.push(line);
    }

    Ok(PricedCart { lines, total_cents })
}

fn backend_failure(err: CatalogError) -> CheckoutError {
    CheckoutError::Catalog(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use emporia_catalog::{MemoryCatalog, Product};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[tokio::test]
    async fn prices_lines_in_input_order() {
        let catalog = MemoryCatalog::new();
        let teapot = catalog.insert(Product::new("Teapot", 3_200, 10));
        let cups = catalog.insert(Product::new("Cup set", 1_800, 10));

        let priced = validate_and_price(
            &catalog,
            &[
                CartLine {
                    product_id: cups,
                    quantity: 2,
                },
                CartLine {
                    product_id: teapot,
                    quantity: 1,
                },
            ],
        )
        .await
        .unwrap();

        assert_eq!(priced.total_cents, 2 * 1_800 + 3_200);
        assert_eq!(priced.lines[0].name, "Cup set");
        assert_eq!(priced.lines[1].name, "Teapot");
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let catalog = MemoryCatalog::new();
        let err = validate_and_price(&catalog, &[]).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let catalog = MemoryCatalog::new();
        let id = catalog.insert(Product::new("Teapot", 3_200, 10));
        let err = validate_and_price(
            &catalog,
            &[CartLine {
                product_id: id,
                quantity: 0,
            }],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidQuantity(p) if p == id));
    }

    #[tokio::test]
    async fn unknown_product_fails_first() {
        let catalog = MemoryCatalog::new();
        let known = catalog.insert(Product::new("Teapot", 3_200, 10));
        let unknown = Uuid::new_v4();

        let err = validate_and_price(
            &catalog,
            &[
                CartLine {
                    product_id: unknown,
                    quantity: 1,
                },
                CartLine {
                    product_id: known,
                    quantity: 1,
                },
            ],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CheckoutError::ProductNotFound(p) if p == unknown));
    }

    #[tokio::test]
    async fn inactive_product_is_rejected() {
        let catalog = MemoryCatalog::new();
        let id = catalog.insert(Product::new("Discontinued mug", 900, 10).inactive());
        let err = validate_and_price(
            &catalog,
            &[CartLine {
                product_id: id,
                quantity: 1,
            }],
        )
        .await
        .unwrap_err();
        assert!(
            matches!(err, CheckoutError::ProductInactive { ref name } if name == "Discontinued mug")
        );
    }

    #[tokio::test]
    async fn pre_check_rejects_oversized_quantity() {
        let catalog = MemoryCatalog::new();
        let id = catalog.insert(Product::new("Teapot", 3_200, 1));
        let err = validate_and_price(
            &catalog,
            &[CartLine {
                product_id: id,
                quantity: 2,
            }],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CheckoutError::InsufficientStock { .. }));
    }

    proptest! {
        /// The computed total is always the exact integer sum of snapshot
        /// unit price times quantity, for any cart the catalog can serve.
        #[test]
        fn total_is_exact_integer_sum(
            entries in prop::collection::vec((1i64..100_000, 1i32..10), 1..8)
        ) {
            let catalog = MemoryCatalog::new();
            let cart: Vec<CartLine> = entries
                .iter()
                .enumerate()
                .map(|(i, (price, quantity))| {
                    let id = catalog.insert(Product::new(format!("item-{i}"), *price, 1_000));
                    CartLine { product_id: id, quantity: *quantity }
                })
                .collect();

            let priced = block_on(validate_and_price(&catalog, &cart)).unwrap();

            let expected: i64 = entries
                .iter()
                .map(|(price, quantity)| price * i64::from(*quantity))
                .sum();
            prop_assert_eq!(priced.total_cents, expected);
            prop_assert_eq!(
                priced.lines.iter().map(OrderLine::subtotal_cents).sum::<i64>(),
                expected
            );
        }
    }
}
