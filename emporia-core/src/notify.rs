use async_trait::async_trait;
use emporia_shared::models::events::OrderPlacedEvent;

#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound notification collaborator (the admin email service, in
/// production). Strictly best-effort: callers submit and move on, and a
/// delivery failure must never fail or roll back the order it announces.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn order_placed(&self, event: &OrderPlacedEvent) -> Result<(), NotifyError>;
}

/// Notifier that writes a structured log line instead of sending mail.
/// Default wiring for development and tests.
pub struct LogNotifier {
    admin_email: Option<String>,
}

impl LogNotifier {
    pub fn new(admin_email: Option<String>) -> Self {
        Self { admin_email }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn order_placed(&self, event: &OrderPlacedEvent) -> Result<(), NotifyError> {
        tracing::info!(
            order_id = %event.order_id,
            user_id = %event.user_id,
            total_cents = event.total_cents,
            currency = %event.currency,
            line_count = event.line_count,
            recipient = self.admin_email.as_deref().unwrap_or("<unconfigured>"),
            "order placed"
        );
        Ok(())
    }
}
