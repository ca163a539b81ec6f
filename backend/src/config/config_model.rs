use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub stripe: Stripe,
    pub checkout: Checkout,
    pub api_key: String,
    pub log_level: String,
    pub service_name: String,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// Megabytes.
    pub body_limit: u64,
    pub request_timeout: Duration,
    pub webhook_timeout: Duration,
    pub shutdown_grace: Duration,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: String,
    pub webhook_tolerance: Duration,
}

#[derive(Debug, Clone)]
pub struct Checkout {
    pub max_quantity: u32,
    pub price_prefix: String,
}

impl Default for Checkout {
    fn default() -> Self {
        Self {
            max_quantity: 999,
            price_prefix: "price_".to_string(),
        }
    }
}
