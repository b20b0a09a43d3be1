use emporia_core::payment::GatewayError;
use uuid::Uuid;

/// Failure taxonomy of the checkout workflow. Everything user-correctable
/// maps to 400 at the HTTP boundary; `Forbidden`/`NotFound` to 403/404;
/// `Gateway` to 502; backend variants to a sanitized 500.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("cart must contain at least one item")]
    EmptyCart,

    #[error("quantity for product {0} must be at least 1")]
    InvalidQuantity(Uuid),

    #[error("product {0} not found or inactive")]
    ProductNotFound(Uuid),

    #[error("product {name} is not available for purchase")]
    ProductInactive { name: String },

    #[error("insufficient stock for {name}")]
    InsufficientStock { name: String },

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("shipping address field {0} is required")]
    InvalidAddress(&'static str),

    #[error("payment not completed")]
    PaymentNotCompleted,

    #[error("order not found")]
    NotFound,

    #[error("not authorized to access this order")]
    Forbidden,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("catalog unavailable: {0}")]
    Catalog(String),

    #[error("order ledger unavailable: {0}")]
    Ledger(String),
}

impl CheckoutError {
    /// Stable machine-checkable code carried in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CheckoutError::EmptyCart => "EMPTY_CART",
            CheckoutError::InvalidQuantity(_) => "INVALID_QUANTITY",
            CheckoutError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            CheckoutError::ProductInactive { .. } => "PRODUCT_INACTIVE",
            CheckoutError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CheckoutError::MissingField(_) => "MISSING_FIELD",
            CheckoutError::InvalidAddress(_) => "INVALID_ADDRESS",
            CheckoutError::PaymentNotCompleted => "PAYMENT_NOT_COMPLETED",
            CheckoutError::NotFound => "NOT_FOUND",
            CheckoutError::Forbidden => "FORBIDDEN",
            CheckoutError::Gateway(_) => "GATEWAY_ERROR",
            CheckoutError::Catalog(_) => "CATALOG_ERROR",
            CheckoutError::Ledger(_) => "LEDGER_ERROR",
        }
    }
}
