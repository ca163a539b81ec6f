use std::sync::Arc;

use diesel::connection::SimpleConnection;
use tracing::info;

use super::postgres_connection::{PgPoolSquad, interact};
use crate::domain::errors::StoreResult;

/// Idempotent DDL; safe to run on every startup. Constraint names match
/// `domain::errors::constraints`.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS customers (
    id UUID PRIMARY KEY,
    user_id TEXT NOT NULL,
    email TEXT NOT NULL,
    provider_customer_id TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT customers_user_id_key UNIQUE (user_id)
);

CREATE UNIQUE INDEX IF NOT EXISTS customers_provider_customer_id_key
    ON customers (provider_customer_id)
    WHERE provider_customer_id <> '';

CREATE TABLE IF NOT EXISTS subscriptions (
    id UUID PRIMARY KEY,
    customer_id UUID NOT NULL,
    user_id TEXT NOT NULL,
    product_id TEXT NOT NULL,
    price_id TEXT NOT NULL DEFAULT '',
    provider_subscription_id TEXT NOT NULL CHECK (provider_subscription_id <> ''),
    status TEXT NOT NULL,
    current_period_start TIMESTAMPTZ,
    current_period_end TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT subscriptions_provider_subscription_id_key UNIQUE (provider_subscription_id),
    CONSTRAINT subscriptions_user_product_key UNIQUE (user_id, product_id),
    CONSTRAINT subscriptions_customer_fk FOREIGN KEY (customer_id) REFERENCES customers (id),
    CONSTRAINT subscriptions_period_check CHECK (
        current_period_start IS NULL
        OR current_period_end IS NULL
        OR current_period_start <= current_period_end
    )
);

CREATE INDEX IF NOT EXISTS subscriptions_customer_id_idx ON subscriptions (customer_id);
"#;

pub async fn initialize_schema(db_pool: &Arc<PgPoolSquad>) -> StoreResult<()> {
    interact(db_pool, |conn| {
        conn.batch_execute(SCHEMA_SQL)?;
        Ok(())
    })
    .await?;

    info!("store: schema initialized");
    Ok(())
}
