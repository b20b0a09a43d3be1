pub mod identity;
pub mod notify;
pub mod payment;

pub use identity::{Principal, Role};
pub use notify::{LogNotifier, NotifyError, Notifier};
pub use payment::{
    GatewayError, GatewayMode, PaymentAuthorization, PaymentGateway, PaymentStatus,
};
