use std::sync::Arc;

use anyhow::Result;
use crates::{
    infra::db::postgres::{
        migrations,
        postgres_connection::{self, PoolSettings},
    },
    payments::stripe_client::{StripeClient, StripeSettings},
};
use payment_gateway::{axum_http::http_serve, config::config_loader};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Payment gateway exited with error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    crates::observability::init_observability("payment-gateway", &log_level)?;

    let dotenvy_env = config_loader::load()?;
    info!(service = %dotenvy_env.service_name, "ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        &PoolSettings {
            max_connections: dotenvy_env.database.max_connections,
            connect_timeout: dotenvy_env.database.connect_timeout,
        },
    )?;
    let postgres_pool = Arc::new(postgres_pool);
    info!("Postgres connection has been established");

    migrations::initialize_schema(&postgres_pool).await?;
    info!("Database schema is ready");

    let stripe_client = StripeClient::new(StripeSettings {
        secret_key: dotenvy_env.stripe.secret_key.clone(),
        webhook_secret: dotenvy_env.stripe.webhook_secret.clone(),
        api_base: dotenvy_env.stripe.api_base.clone(),
        request_timeout: dotenvy_env.backend_server.request_timeout,
        webhook_tolerance: dotenvy_env.stripe.webhook_tolerance,
    })?;

    http_serve::start(Arc::new(dotenvy_env), postgres_pool, Arc::new(stripe_client)).await?;

    Ok(())
}
