use std::{sync::Arc, time::Duration};

use crates::domain::{
    repositories::{customers::CustomerRepository, payment_gateway::PaymentGateway},
    value_objects::portal::{PortalModel, PortalSessionDto},
};
use tracing::{error, info};

use super::{
    customers::CustomerResolver,
    errors::{UseCaseError, UseCaseResult, with_deadline},
    validation,
};

pub struct PortalUseCase<C, G>
where
    C: CustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    resolver: CustomerResolver<C, G>,
    gateway: Arc<G>,
    deadline: Duration,
}

impl<C, G> PortalUseCase<C, G>
where
    C: CustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(customer_repo: Arc<C>, gateway: Arc<G>, deadline: Duration) -> Self {
        Self {
            resolver: CustomerResolver::new(customer_repo, Arc::clone(&gateway)),
            gateway,
            deadline,
        }
    }

    pub async fn create_portal(&self, model: PortalModel) -> UseCaseResult<PortalSessionDto> {
        validation::require("user_id", &model.user_id)?;
        validation::absolute_http_url("return_url", &model.return_url)?;

        with_deadline(self.deadline, "creating portal session", async {
            let customer = self
                .resolver
                .find(&model.user_id)
                .await?
                .filter(|customer| customer.has_provider_customer())
                .ok_or_else(|| UseCaseError::CustomerNotFound(model.user_id.clone()))?;

            let session = self
                .gateway
                .create_portal_session(&customer.provider_customer_id, &model.return_url)
                .await
                .map_err(|err| {
                    error!(user_id = %model.user_id, provider_error = ?err, "portal: failed to create session");
                    err
                })?;

            info!(user_id = %model.user_id, "portal: session created");
            Ok(PortalSessionDto {
                portal_url: session.url,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crates::{
        domain::{
            repositories::payment_gateway::MockPaymentGateway,
            value_objects::payments::PortalSession,
        },
        infra::memory::MemoryStore,
    };

    use super::*;

    fn model(user_id: &str) -> PortalModel {
        PortalModel {
            user_id: user_id.to_string(),
            return_url: "https://x/account".to_string(),
        }
    }

    #[tokio::test]
    async fn creates_session_for_known_customer() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_customer("u1", "a@b.co", "cus_1").await.unwrap();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_portal_session()
            .withf(|customer_id, return_url| customer_id == "cus_1" && return_url == "https://x/account")
            .times(1)
            .returning(|_, _| {
                Ok(PortalSession {
                    url: "https://billing.stripe.com/p/session_1".to_string(),
                })
            });

        let usecase = PortalUseCase::new(store, Arc::new(gateway), Duration::from_secs(5));
        let session = usecase.create_portal(model("u1")).await.unwrap();

        assert_eq!(session.portal_url, "https://billing.stripe.com/p/session_1");
    }

    #[tokio::test]
    async fn unknown_user_has_no_portal() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_customer("partial", "a@b.co", "").await.unwrap();
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_portal_session().never();

        let usecase = PortalUseCase::new(store, Arc::new(gateway), Duration::from_secs(5));

        for user_id in ["ghost", "partial"] {
            let err = usecase.create_portal(model(user_id)).await.unwrap_err();
            assert!(matches!(err, UseCaseError::CustomerNotFound(ref id) if id == user_id));
        }
    }

    #[tokio::test]
    async fn return_url_is_validated() {
        let usecase = PortalUseCase::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MockPaymentGateway::new()),
            Duration::from_secs(5),
        );

        let err = usecase
            .create_portal(PortalModel {
                user_id: "u1".into(),
                return_url: "account".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, UseCaseError::Validation { ref field, .. } if field == "return_url"));
    }
}
