use std::{future::IntoFuture, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Router,
    http::{HeaderName, Method, header::CONTENT_TYPE},
    middleware,
};
use crates::{
    domain::repositories::{
        customers::CustomerRepository, payment_gateway::PaymentGateway,
        subscriptions::SubscriptionRepository,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{customers::CustomerPostgres, subscriptions::SubscriptionPostgres},
    },
};
use tokio::{net::TcpListener, sync::watch};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    auth::{self, API_KEY_HEADER, ApiKey},
    axum_http::{
        default_routers,
        request_context::{self, REQUEST_ID_HEADER},
        routers,
    },
    config::config_model::DotEnvyConfig,
    usecases::{
        checkout::{CheckoutSettings, CheckoutUseCase},
        portal::PortalUseCase,
        subscriptions::{SubscriptionSettings, SubscriptionUseCase},
    },
};

/// Outer backstop above the per-flow deadlines enforced by the use cases.
const TIMEOUT_HEADROOM: Duration = Duration::from_secs(5);

/// Builds the full router over any store and gateway.
pub fn app<C, S, G>(
    config: &DotEnvyConfig,
    customer_repo: Arc<C>,
    subscription_repo: Arc<S>,
    gateway: Arc<G>,
) -> Result<Router>
where
    C: CustomerRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let server = &config.backend_server;

    let checkout_usecase = CheckoutUseCase::new(
        Arc::clone(&customer_repo),
        Arc::clone(&gateway),
        CheckoutSettings {
            max_quantity: config.checkout.max_quantity,
            price_prefix: config.checkout.price_prefix.clone(),
            deadline: server.request_timeout,
        },
    );
    let portal_usecase = PortalUseCase::new(
        Arc::clone(&customer_repo),
        Arc::clone(&gateway),
        server.request_timeout,
    );
    let subscriptions_usecase = Arc::new(SubscriptionUseCase::new(
        customer_repo,
        subscription_repo,
        gateway,
        SubscriptionSettings {
            request_deadline: server.request_timeout,
            webhook_deadline: server.webhook_timeout,
        },
    ));

    let api = Router::new()
        .merge(routers::checkout::routes(Arc::new(checkout_usecase)))
        .merge(routers::portal::routes(Arc::new(portal_usecase)))
        .merge(routers::subscriptions::routes(Arc::clone(&subscriptions_usecase)))
        .route_layer(middleware::from_fn_with_state(
            ApiKey::new(&config.api_key),
            auth::require_api_key,
        ));

    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);
    let body_limit: usize = (server.body_limit * 1024 * 1024).try_into()?;

    let app = Router::new()
        .nest("/api/v1", api)
        .merge(routers::webhooks::routes(subscriptions_usecase))
        .merge(default_routers::routes(config.service_name.clone()))
        .fallback(default_routers::not_found)
        .layer(middleware::from_fn(request_context::scope_request_id))
        .layer(TimeoutLayer::new(server.request_timeout + TIMEOUT_HEADROOM))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([
                    CONTENT_TYPE,
                    HeaderName::from_static(API_KEY_HEADER),
                    request_id_header.clone(),
                ])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid));

    Ok(app)
}

pub async fn start<G>(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>, gateway: Arc<G>) -> Result<()>
where
    G: PaymentGateway + Send + Sync + 'static,
{
    let customer_repo = Arc::new(CustomerPostgres::new(Arc::clone(&db_pool)));
    let subscription_repo = Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool)));
    let app = app(&config, customer_repo, subscription_repo, gateway)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;
    info!(port = config.backend_server.port, "Server is running");

    let (signalled_tx, mut signalled_rx) = watch::channel(false);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(true);
        })
        .into_future();

    let grace = config.backend_server.shutdown_grace;
    let grace_elapsed = async move {
        if signalled_rx.wait_for(|signalled| *signalled).await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => result?,
        _ = grace_elapsed => {
            warn!(grace_secs = grace.as_secs(), "in-flight requests did not drain within the grace period");
        }
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
