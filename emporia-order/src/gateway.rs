use async_trait::async_trait;
use chrono::Utc;
use emporia_core::payment::{
    GatewayError, GatewayMode, PaymentAuthorization, PaymentGateway, PaymentStatus,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

/// Synthetic payment gateway for environments without live processor
/// credentials. Nothing it returns is a real charge: ids carry a
/// `mock_pi_` prefix, `mode()` reports `GatewayMode::Mock`, and the
/// binary logs a warning when it is selected. Created authorizations are
/// remembered so retrieval reports the true amount, and the simulated
/// cardholder always completes payment unless a test pins a status.
pub struct MockGateway {
    created: Mutex<HashMap<String, PaymentAuthorization>>,
    forced_status: Mutex<Option<PaymentStatus>>,
    latency: Duration,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::with_latency(Duration::from_millis(150))
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            created: Mutex::new(HashMap::new()),
            forced_status: Mutex::new(None),
            latency,
        }
    }

    /// Pin the status every subsequent retrieval reports. Test hook for
    /// exercising the not-yet-payable and failed paths.
    pub fn force_retrieve_status(&self, status: PaymentStatus) {
        *self.forced_status.lock().expect("gateway mutex poisoned") = Some(status);
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_authorization(
        &self,
        amount_cents: i64,
        currency: &str,
        customer_id: Uuid,
    ) -> Result<PaymentAuthorization, GatewayError> {
        sleep(self.latency).await;

        let id = format!("mock_pi_{}", Uuid::new_v4().simple());
        let authorization = PaymentAuthorization {
            id: id.clone(),
            amount_cents,
            currency: currency.to_string(),
            status: PaymentStatus::RequiresPaymentMethod,
            client_secret: Some(format!("{id}_secret_{}", Uuid::new_v4().simple())),
            created_at: Utc::now(),
        };

        tracing::debug!(
            authorization = %id,
            amount_cents,
            customer = %customer_id,
            "mock gateway issued synthetic authorization"
        );

        self.created
            .lock()
            .expect("gateway mutex poisoned")
            .insert(id, authorization.clone());

        Ok(authorization)
    }

    async fn retrieve_authorization(
        &self,
        authorization_id: &str,
    ) -> Result<PaymentAuthorization, GatewayError> {
        sleep(self.latency).await;

        let mut authorization = self
            .created
            .lock()
            .expect("gateway mutex poisoned")
            .get(authorization_id)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownAuthorization(authorization_id.to_string()))?;

        authorization.status = self
            .forced_status
            .lock()
            .expect("gateway mutex poisoned")
            .clone()
            .unwrap_or(PaymentStatus::Succeeded);

        Ok(authorization)
    }

    fn mode(&self) -> GatewayMode {
        GatewayMode::Mock
    }
}
