pub mod checkout;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod memory;
pub mod models;
pub mod pricing;

pub use checkout::{CheckoutIntent, CheckoutOrchestrator};
pub use error::CheckoutError;
pub use gateway::MockGateway;
pub use ledger::{LedgerError, OrderLedger};
pub use memory::MemoryLedger;
pub use models::{
    CartLine, FulfillmentStatus, Order, OrderLine, Page, Paginated, PaymentState,
    ShippingAddress, StatusEntry, TrackingInfo,
};
pub use pricing::{validate_and_price, PricedCart};
