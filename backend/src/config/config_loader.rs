use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow};

use super::config_model::{BackendServer, Checkout, Database, DotEnvyConfig, Stripe};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

/// Builds the config from an arbitrary lookup, so tests never touch the process env.
pub fn load_from<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &str| -> Result<String> {
        lookup(key)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("{key} is required"))
    };
    let text_or = |key: &str, default: &str| -> String {
        lookup(key)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    };

    let backend_server = BackendServer {
        port: parsed_or(&lookup, "HTTP_PORT", 8080)?,
        body_limit: parsed_or(&lookup, "SERVER_BODY_LIMIT_MB", 2)?,
        request_timeout: Duration::from_secs(parsed_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?),
        webhook_timeout: Duration::from_secs(parsed_or(&lookup, "WEBHOOK_TIMEOUT_SECS", 10)?),
        shutdown_grace: Duration::from_secs(parsed_or(&lookup, "SHUTDOWN_GRACE_SECS", 15)?),
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: parsed_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
        connect_timeout: Duration::from_secs(parsed_or(
            &lookup,
            "DATABASE_CONNECT_TIMEOUT_SECS",
            5,
        )?),
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        api_base: text_or("STRIPE_API_BASE", crates::payments::stripe_client::DEFAULT_API_BASE),
        webhook_tolerance: Duration::from_secs(parsed_or(
            &lookup,
            "STRIPE_WEBHOOK_TOLERANCE_SECS",
            300,
        )?),
    };

    let defaults = Checkout::default();
    let checkout = Checkout {
        max_quantity: parsed_or(&lookup, "CHECKOUT_MAX_QUANTITY", defaults.max_quantity)?,
        price_prefix: text_or("STRIPE_PRICE_PREFIX", &defaults.price_prefix),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        stripe,
        checkout,
        api_key: required("API_KEY")?,
        log_level: text_or("LOG_LEVEL", "info"),
        service_name: text_or("SERVICE_NAME", "payment-gateway"),
    })
}

fn parsed_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key).filter(|value| !value.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} is invalid: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn required_env() -> HashMap<String, String> {
        env(&[
            ("DATABASE_URL", "postgres://localhost/payments"),
            ("STRIPE_SECRET_KEY", "sk_test_1"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_1"),
            ("API_KEY", "secret-key"),
        ])
    }

    #[test]
    fn applies_defaults() {
        let vars = required_env();
        let config = load_from(|key| vars.get(key).cloned()).unwrap();

        assert_eq!(config.backend_server.port, 8080);
        assert_eq!(config.backend_server.body_limit, 2);
        assert_eq!(config.backend_server.request_timeout, Duration::from_secs(30));
        assert_eq!(config.backend_server.webhook_timeout, Duration::from_secs(10));
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.stripe.api_base, "https://api.stripe.com");
        assert_eq!(config.stripe.webhook_tolerance, Duration::from_secs(300));
        assert_eq!(config.checkout.max_quantity, 999);
        assert_eq!(config.checkout.price_prefix, "price_");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.service_name, "payment-gateway");
    }

    #[test]
    fn overrides_are_read() {
        let mut vars = required_env();
        vars.insert("HTTP_PORT".into(), "9090".into());
        vars.insert("CHECKOUT_MAX_QUANTITY".into(), "5".into());
        vars.insert("LOG_LEVEL".into(), "debug".into());

        let config = load_from(|key| vars.get(key).cloned()).unwrap();

        assert_eq!(config.backend_server.port, 9090);
        assert_eq!(config.checkout.max_quantity, 5);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn missing_required_variable_is_named() {
        let mut vars = required_env();
        vars.remove("API_KEY");

        let err = load_from(|key| vars.get(key).cloned()).unwrap_err();
        assert!(err.to_string().contains("API_KEY"));
    }

    #[test]
    fn unparsable_number_is_named() {
        let mut vars = required_env();
        vars.insert("HTTP_PORT".into(), "eighty".into());

        let err = load_from(|key| vars.get(key).cloned()).unwrap_err();
        assert!(err.to_string().contains("HTTP_PORT"));
    }
}
