use emporia_api::{
    app,
    state::{AppState, AuthConfig},
};
use emporia_catalog::CatalogReader;
use emporia_core::notify::{LogNotifier, Notifier};
use emporia_core::payment::PaymentGateway;
use emporia_order::{CheckoutOrchestrator, MockGateway, OrderLedger};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "emporia_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = emporia_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Emporia API on port {}", config.server.port);

    let db = emporia_store::DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let catalog: Arc<dyn CatalogReader> = Arc::new(emporia_store::PgCatalog::new(db.pool.clone()));
    let ledger: Arc<dyn OrderLedger> = Arc::new(emporia_store::PgOrderLedger::new(db.pool.clone()));

    // Gateway selection is explicit: a live processor adapter must be
    // linked into the binary to use live credentials. Nothing ever
    // infers mock-vs-live from the shape of a response.
    let gateway: Arc<dyn PaymentGateway> = match &config.payment.secret_key {
        Some(_) => {
            panic!(
                "payment.secret_key is configured but this build links no live gateway \
                 adapter; unset it to run with the mock gateway"
            );
        }
        None => {
            tracing::warn!(
                "payment credentials not configured; using the mock gateway: \
                 authorizations are synthetic and no card is ever charged"
            );
            Arc::new(MockGateway::new())
        }
    };

    let notifier: Arc<dyn Notifier> =
        Arc::new(LogNotifier::new(config.notifications.admin_email.clone()));

    let checkout = Arc::new(CheckoutOrchestrator::new(
        catalog,
        ledger,
        Arc::clone(&gateway),
        notifier,
        config.payment.currency.clone(),
    ));

    let app_state = AppState {
        checkout,
        gateway,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
