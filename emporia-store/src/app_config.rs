use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    /// Live processor credential. Absent means the explicit mock gateway
    /// is wired instead, never silently.
    pub secret_key: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            currency: default_currency(),
        }
    }
}

fn default_currency() -> String {
    "usd".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotificationConfig {
    pub admin_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Base configuration, always present
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Machine-local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Environment, e.g. EMPORIA__DATABASE__URL=...
            .add_source(config::Environment::with_prefix("EMPORIA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
