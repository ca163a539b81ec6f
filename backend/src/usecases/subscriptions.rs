use std::{collections::HashMap, sync::Arc, time::Duration};

use crates::domain::{
    entities::{
        customers::CustomerEntity,
        subscriptions::{SubscriptionEntity, UpsertSubscriptionEntity},
    },
    errors::GatewayError,
    repositories::{
        customers::CustomerRepository, payment_gateway::PaymentGateway,
        subscriptions::SubscriptionRepository,
    },
    value_objects::{
        enums::{checkout_modes::CheckoutMode, subscription_statuses::SubscriptionStatus},
        payments::{
            METADATA_PRODUCT_ID, METADATA_USER_ID, ProviderCheckoutSession, ProviderEvent,
            ProviderEventObject, ProviderSubscription,
        },
        subscriptions::SubscriptionStatusDto,
    },
};
use tracing::{debug, error, info, warn};

use super::errors::{UseCaseError, UseCaseResult, with_deadline};

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const SUBSCRIPTION_CREATED: &str = "customer.subscription.created";
pub const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";
pub const INVOICE_PAYMENT_SUCCEEDED: &str = "invoice.payment_succeeded";
pub const INVOICE_PAYMENT_FAILED: &str = "invoice.payment_failed";

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Applied(SubscriptionEntity),
    Ignored(String),
    Dropped(String),
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Applied(_) => "applied",
            ReconcileOutcome::Ignored(_) => "ignored",
            ReconcileOutcome::Dropped(_) => "dropped",
        }
    }
}

/// Identity hints carried by the event that triggered a re-fetch.
#[derive(Debug, Default)]
struct Hints {
    customer_id: Option<String>,
    metadata: HashMap<String, String>,
}

impl From<&ProviderCheckoutSession> for Hints {
    fn from(session: &ProviderCheckoutSession) -> Self {
        Self {
            customer_id: session.customer_id.clone(),
            metadata: session.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubscriptionSettings {
    pub request_deadline: Duration,
    pub webhook_deadline: Duration,
}

/// Keeps the subscription mirror in step with provider events.
pub struct SubscriptionUseCase<C, S, G>
where
    C: CustomerRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    customer_repo: Arc<C>,
    subscription_repo: Arc<S>,
    gateway: Arc<G>,
    settings: SubscriptionSettings,
}

impl<C, S, G> SubscriptionUseCase<C, S, G>
where
    C: CustomerRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(
        customer_repo: Arc<C>,
        subscription_repo: Arc<S>,
        gateway: Arc<G>,
        settings: SubscriptionSettings,
    ) -> Self {
        Self {
            customer_repo,
            subscription_repo,
            gateway,
            settings,
        }
    }

    pub async fn get_status(&self, user_id: &str, product_id: &str) -> UseCaseResult<SubscriptionStatusDto> {
        with_deadline(self.settings.request_deadline, "loading subscription status", async {
            let subscription = self
                .subscription_repo
                .get_subscription(user_id, product_id)
                .await
                .map_err(|err| {
                    error!(%user_id, %product_id, db_error = ?err, "subscriptions: failed to load subscription");
                    err
                })?;

            Ok(match subscription {
                Some(subscription) => SubscriptionStatusDto::from(subscription),
                None => {
                    debug!(%user_id, %product_id, "subscriptions: no subscription");
                    SubscriptionStatusDto::none()
                }
            })
        })
        .await
    }

    /// Verifies the signature and decodes the event. Bad signatures stay
    /// `Gateway(InvalidSignature)`; undecodable bodies become `InvalidPayload`.
    pub fn verify_event(&self, payload: &[u8], signature_header: &str) -> UseCaseResult<ProviderEvent> {
        self.gateway
            .verify_webhook(payload, signature_header)
            .map_err(|err| match err {
                GatewayError::Payload(message) => UseCaseError::InvalidPayload(message),
                other => {
                    warn!(error = %other, "reconciler: webhook verification failed");
                    UseCaseError::Gateway(other)
                }
            })
    }

    pub async fn handle_event(&self, event: ProviderEvent) -> UseCaseResult<ReconcileOutcome> {
        let event_id = event.id.clone();
        let event_type = event.event_type.clone();

        let outcome = with_deadline(self.settings.webhook_deadline, "processing webhook event", self.dispatch(event)).await;

        match &outcome {
            Ok(ReconcileOutcome::Applied(row)) => info!(
                %event_id,
                %event_type,
                provider_subscription_id = %row.provider_subscription_id,
                status = %row.status,
                "reconciler: event applied"
            ),
            Ok(ReconcileOutcome::Ignored(reason)) => {
                debug!(%event_id, %event_type, %reason, "reconciler: event ignored")
            }
            Ok(ReconcileOutcome::Dropped(reason)) => {
                warn!(%event_id, %event_type, %reason, "reconciler: event dropped")
            }
            Err(err) => error!(%event_id, %event_type, error = %err, "reconciler: event failed"),
        }
        outcome
    }

    async fn dispatch(&self, event: ProviderEvent) -> UseCaseResult<ReconcileOutcome> {
        match (event.event_type.as_str(), event.object) {
            (CHECKOUT_SESSION_COMPLETED, ProviderEventObject::CheckoutSession(session)) => {
                if session.mode != Some(CheckoutMode::Subscription) {
                    return Ok(ReconcileOutcome::Ignored("checkout session is not in subscription mode".into()));
                }
                if session.payment_status.as_deref() != Some("paid") {
                    return Ok(ReconcileOutcome::Ignored("checkout session is not paid".into()));
                }
                let Some(subscription_id) = session.subscription_id.as_deref() else {
                    return Err(UseCaseError::InvalidPayload(format!(
                        "checkout session {} has no subscription",
                        session.id
                    )));
                };
                let snapshot = self.fetch(subscription_id).await?;
                self.apply(snapshot, Hints::from(&session), None).await
            }
            (SUBSCRIPTION_CREATED | SUBSCRIPTION_UPDATED, ProviderEventObject::Subscription(snapshot)) => {
                self.apply(snapshot, Hints::default(), None).await
            }
            (SUBSCRIPTION_DELETED, ProviderEventObject::Subscription(snapshot)) => {
                self.apply(snapshot, Hints::default(), Some(SubscriptionStatus::Canceled))
                    .await
            }
            (INVOICE_PAYMENT_SUCCEEDED | INVOICE_PAYMENT_FAILED, ProviderEventObject::Invoice(invoice)) => {
                let Some(subscription_id) = invoice.subscription_id.as_deref() else {
                    return Ok(ReconcileOutcome::Ignored(format!(
                        "invoice {} has no subscription",
                        invoice.id
                    )));
                };
                let snapshot = self.fetch(subscription_id).await?;
                let hints = Hints {
                    customer_id: invoice.customer_id.clone(),
                    metadata: HashMap::new(),
                };
                self.apply(snapshot, hints, None).await
            }
            (other, _) => Ok(ReconcileOutcome::Ignored(format!("unhandled event type {other}"))),
        }
    }

    async fn fetch(&self, provider_subscription_id: &str) -> UseCaseResult<ProviderSubscription> {
        let snapshot = self
            .gateway
            .fetch_subscription(provider_subscription_id)
            .await
            .map_err(|err| {
                error!(%provider_subscription_id, provider_error = ?err, "reconciler: failed to fetch subscription");
                err
            })?;
        Ok(snapshot)
    }

    async fn find_customer(
        &self,
        snapshot: &ProviderSubscription,
        hints: &Hints,
        existing: Option<&SubscriptionEntity>,
    ) -> UseCaseResult<Option<CustomerEntity>> {
        for provider_customer_id in [snapshot.customer_id.as_deref(), hints.customer_id.as_deref()]
            .into_iter()
            .flatten()
        {
            if let Some(customer) = self
                .customer_repo
                .get_customer_by_provider_customer_id(provider_customer_id)
                .await?
            {
                return Ok(Some(customer));
            }
        }

        let metadata_user = hints
            .metadata
            .get(METADATA_USER_ID)
            .or_else(|| snapshot.metadata.get(METADATA_USER_ID))
            .map(String::as_str);
        let stored_user = existing.map(|row| row.user_id.as_str());

        for user_id in [metadata_user, stored_user].into_iter().flatten() {
            if let Some(customer) = self.customer_repo.get_customer_by_user_id(user_id).await? {
                return Ok(Some(customer));
            }
        }

        Ok(None)
    }

    async fn apply(
        &self,
        snapshot: ProviderSubscription,
        hints: Hints,
        forced_status: Option<SubscriptionStatus>,
    ) -> UseCaseResult<ReconcileOutcome> {
        let existing = self
            .subscription_repo
            .get_subscription_by_provider_id(&snapshot.id)
            .await?;

        let status = match forced_status {
            Some(status) => status,
            None => snapshot
                .status
                .parse::<SubscriptionStatus>()
                .map_err(|err| UseCaseError::InvalidPayload(err.to_string()))?,
        };

        let Some(customer) = self.find_customer(&snapshot, &hints, existing.as_ref()).await? else {
            return Ok(ReconcileOutcome::Dropped(format!(
                "no local customer for subscription {}",
                snapshot.id
            )));
        };

        let product_id = hints
            .metadata
            .get(METADATA_PRODUCT_ID)
            .or_else(|| snapshot.metadata.get(METADATA_PRODUCT_ID))
            .cloned()
            .or_else(|| snapshot.product_id.clone())
            .or_else(|| existing.as_ref().map(|row| row.product_id.clone()))
            .filter(|product_id| !product_id.is_empty())
            .ok_or_else(|| {
                UseCaseError::InvalidPayload(format!("subscription {} names no product", snapshot.id))
            })?;

        let price_id = snapshot
            .price_id
            .clone()
            .or_else(|| existing.as_ref().map(|row| row.price_id.clone()))
            .unwrap_or_default();

        let keep_stored = forced_status.is_some();
        let (current_period_start, current_period_end) = match (&existing, keep_stored) {
            (Some(row), true) => (
                snapshot.current_period_start.or(row.current_period_start),
                snapshot.current_period_end.or(row.current_period_end),
            ),
            _ => (snapshot.current_period_start, snapshot.current_period_end),
        };

        if let (Some(start), Some(end)) = (current_period_start, current_period_end) {
            if start > end {
                return Err(UseCaseError::InvalidPayload(format!(
                    "subscription {} period starts after it ends",
                    snapshot.id
                )));
            }
        }

        let upsert = UpsertSubscriptionEntity {
            customer_id: customer.id,
            user_id: customer.user_id,
            product_id,
            price_id,
            provider_subscription_id: snapshot.id,
            status,
            current_period_start,
            current_period_end,
        };

        match self
            .subscription_repo
            .upsert_subscription_by_provider_id(upsert.clone())
            .await
        {
            Ok(row) => Ok(ReconcileOutcome::Applied(row)),
            Err(err) if err.is_user_product_conflict() => {
                info!(
                    user_id = %upsert.user_id,
                    product_id = %upsert.product_id,
                    provider_subscription_id = %upsert.provider_subscription_id,
                    "reconciler: rebinding product to newer subscription"
                );
                let row = self.subscription_repo.rebind_subscription_pair(upsert).await?;
                Ok(ReconcileOutcome::Applied(row))
            }
            Err(err) => Err(err.into()),
        }
    }
}
