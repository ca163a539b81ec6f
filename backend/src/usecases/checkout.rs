use std::{collections::BTreeMap, sync::Arc, time::Duration};

use crates::domain::{
    repositories::{customers::CustomerRepository, payment_gateway::PaymentGateway},
    value_objects::{
        checkout::{CartCheckoutModel, CheckoutSessionDto, ItemCheckoutModel, SubscriptionCheckoutModel},
        enums::checkout_modes::CheckoutMode,
        payments::{CheckoutSessionRequest, LineItem, METADATA_PRODUCT_ID, METADATA_USER_ID},
    },
};
use tracing::{error, info};

use super::{
    customers::CustomerResolver,
    errors::{UseCaseError, UseCaseResult, with_deadline},
    validation,
};

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub max_quantity: u32,
    pub price_prefix: String,
    pub deadline: Duration,
}

pub struct CheckoutUseCase<C, G>
where
    C: CustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    resolver: CustomerResolver<C, G>,
    gateway: Arc<G>,
    settings: CheckoutSettings,
}

impl<C, G> CheckoutUseCase<C, G>
where
    C: CustomerRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(customer_repo: Arc<C>, gateway: Arc<G>, settings: CheckoutSettings) -> Self {
        Self {
            resolver: CustomerResolver::new(customer_repo, Arc::clone(&gateway)),
            gateway,
            settings,
        }
    }

    fn validate_common(&self, user_id: &str, email: &str, success_url: &str, cancel_url: &str) -> UseCaseResult<()> {
        validation::require("user_id", user_id)?;
        validation::email("email", email)?;
        validation::absolute_http_url("success_url", success_url)?;
        validation::absolute_http_url("cancel_url", cancel_url)?;
        Ok(())
    }

    pub async fn subscription(&self, model: SubscriptionCheckoutModel) -> UseCaseResult<CheckoutSessionDto> {
        self.validate_common(&model.user_id, &model.email, &model.success_url, &model.cancel_url)?;
        validation::require("product_id", &model.product_id)?;
        validation::price_id("price_id", &model.price_id, &self.settings.price_prefix)?;

        let metadata = BTreeMap::from([
            (METADATA_USER_ID.to_string(), model.user_id.clone()),
            (METADATA_PRODUCT_ID.to_string(), model.product_id.clone()),
        ]);
        let line_items = vec![LineItem {
            price_id: model.price_id,
            quantity: 1,
        }];

        info!(
            user_id = %model.user_id,
            product_id = %model.product_id,
            "checkout: creating subscription session"
        );
        self.create(
            CheckoutMode::Subscription,
            &model.user_id,
            &model.email,
            line_items,
            model.success_url,
            model.cancel_url,
            metadata,
        )
        .await
    }

    pub async fn item(&self, model: ItemCheckoutModel) -> UseCaseResult<CheckoutSessionDto> {
        self.validate_common(&model.user_id, &model.email, &model.success_url, &model.cancel_url)?;
        validation::price_id("price_id", &model.price_id, &self.settings.price_prefix)?;
        let quantity = validation::quantity("quantity", model.quantity, self.settings.max_quantity)?;

        let metadata = BTreeMap::from([(METADATA_USER_ID.to_string(), model.user_id.clone())]);
        let line_items = vec![LineItem {
            price_id: model.price_id,
            quantity,
        }];

        info!(user_id = %model.user_id, quantity, "checkout: creating single item session");
        self.create(
            CheckoutMode::Payment,
            &model.user_id,
            &model.email,
            line_items,
            model.success_url,
            model.cancel_url,
            metadata,
        )
        .await
    }

    pub async fn cart(&self, model: CartCheckoutModel) -> UseCaseResult<CheckoutSessionDto> {
        self.validate_common(&model.user_id, &model.email, &model.success_url, &model.cancel_url)?;
        if model.items.is_empty() {
            return Err(UseCaseError::validation(
                "items",
                validation::EMPTY_CART,
                "items must contain at least one entry",
            ));
        }

        let mut line_items = Vec::with_capacity(model.items.len());
        for (idx, item) in model.items.into_iter().enumerate() {
            validation::price_id(&format!("items[{idx}].price_id"), &item.price_id, &self.settings.price_prefix)?;
            let quantity = validation::quantity(
                &format!("items[{idx}].quantity"),
                item.quantity,
                self.settings.max_quantity,
            )?;
            line_items.push(LineItem {
                price_id: item.price_id,
                quantity,
            });
        }

        let metadata = BTreeMap::from([(METADATA_USER_ID.to_string(), model.user_id.clone())]);

        info!(user_id = %model.user_id, item_count = line_items.len(), "checkout: creating cart session");
        self.create(
            CheckoutMode::Payment,
            &model.user_id,
            &model.email,
            line_items,
            model.success_url,
            model.cancel_url,
            metadata,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn create(
        &self,
        mode: CheckoutMode,
        user_id: &str,
        email: &str,
        line_items: Vec<LineItem>,
        success_url: String,
        cancel_url: String,
        metadata: BTreeMap<String, String>,
    ) -> UseCaseResult<CheckoutSessionDto> {
        with_deadline(self.settings.deadline, "creating checkout session", async {
            let customer_id = self.resolver.resolve(user_id, email).await?;

            let request = CheckoutSessionRequest {
                mode,
                customer_id,
                line_items,
                success_url,
                cancel_url,
                metadata,
            };

            let session = self
                .gateway
                .create_checkout_session(request)
                .await
                .map_err(|err| {
                    error!(%user_id, %mode, provider_error = ?err, "checkout: failed to create session");
                    err
                })?;

            info!(%user_id, %mode, session_id = %session.id, "checkout: session created");
            Ok(CheckoutSessionDto {
                checkout_session_id: session.id,
                checkout_url: session.url,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crates::{
        domain::{
            errors::GatewayError,
            repositories::payment_gateway::MockPaymentGateway,
            value_objects::{checkout::CartItemModel, payments::CheckoutSession},
        },
        infra::memory::MemoryStore,
    };

    use super::*;

    fn settings() -> CheckoutSettings {
        CheckoutSettings {
            max_quantity: 999,
            price_prefix: "price_".to_string(),
            deadline: Duration::from_secs(5),
        }
    }

    fn gateway_expecting<F>(check: F) -> MockPaymentGateway
    where
        F: Fn(&CheckoutSessionRequest) -> bool + Send + 'static,
    {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_customer()
            .returning(|_, _| Ok("cus_1".to_string()));
        gateway
            .expect_create_checkout_session()
            .withf(check)
            .times(1)
            .returning(|_| {
                Ok(CheckoutSession {
                    id: "cs_1".to_string(),
                    url: "https://checkout.stripe.com/c/cs_1".to_string(),
                })
            });
        gateway
    }

    fn subscription_model() -> SubscriptionCheckoutModel {
        SubscriptionCheckoutModel {
            user_id: "u1".into(),
            email: "a@b.co".into(),
            product_id: "prod_A".into(),
            price_id: "price_A".into(),
            success_url: "https://x/s".into(),
            cancel_url: "https://x/c".into(),
        }
    }

    #[tokio::test]
    async fn subscription_checkout_attaches_identity_metadata() {
        let gateway = gateway_expecting(|request| {
            request.mode == CheckoutMode::Subscription
                && request.customer_id == "cus_1"
                && request.line_items == vec![LineItem { price_id: "price_A".into(), quantity: 1 }]
                && request.metadata.get("user_id").map(String::as_str) == Some("u1")
                && request.metadata.get("product_id").map(String::as_str) == Some("prod_A")
        });
        let usecase = CheckoutUseCase::new(Arc::new(MemoryStore::new()), Arc::new(gateway), settings());

        let session = usecase.subscription(subscription_model()).await.unwrap();

        assert_eq!(session.checkout_session_id, "cs_1");
        assert!(!session.checkout_url.is_empty());
    }

    #[tokio::test]
    async fn item_checkout_defaults_quantity_to_one() {
        let gateway = gateway_expecting(|request| {
            request.mode == CheckoutMode::Payment && request.line_items[0].quantity == 1
        });
        let usecase = CheckoutUseCase::new(Arc::new(MemoryStore::new()), Arc::new(gateway), settings());

        let model = ItemCheckoutModel {
            user_id: "u1".into(),
            email: "a@b.co".into(),
            price_id: "price_A".into(),
            quantity: None,
            success_url: "https://x/s".into(),
            cancel_url: "https://x/c".into(),
        };
        usecase.item(model).await.unwrap();
    }

    #[tokio::test]
    async fn cart_keeps_item_order() {
        let gateway = gateway_expecting(|request| {
            request.line_items
                == vec![
                    LineItem { price_id: "price_B".into(), quantity: 2 },
                    LineItem { price_id: "price_A".into(), quantity: 1 },
                ]
        });
        let store = Arc::new(MemoryStore::new());
        let usecase = CheckoutUseCase::new(store.clone(), Arc::new(gateway), settings());

        let model = CartCheckoutModel {
            user_id: "u1".into(),
            email: "a@b.co".into(),
            items: vec![
                CartItemModel { price_id: "price_B".into(), quantity: Some(2) },
                CartItemModel { price_id: "price_A".into(), quantity: Some(1) },
            ],
            success_url: "https://x/s".into(),
            cancel_url: "https://x/c".into(),
        };
        usecase.cart(model).await.unwrap();

        assert_eq!(store.subscription_count().await, 0);
    }

    #[tokio::test]
    async fn validation_runs_before_any_provider_call() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_customer().never();
        gateway.expect_create_checkout_session().never();
        let usecase = CheckoutUseCase::new(Arc::new(MemoryStore::new()), Arc::new(gateway), settings());

        let mut model = subscription_model();
        model.price_id = "prod_A".into();
        let err = usecase.subscription(model).await.unwrap_err();
        assert!(matches!(err, UseCaseError::Validation { ref field, .. } if field == "price_id"));

        let empty_cart = CartCheckoutModel {
            user_id: "u1".into(),
            email: "a@b.co".into(),
            items: vec![],
            success_url: "https://x/s".into(),
            cancel_url: "https://x/c".into(),
        };
        let err = usecase.cart(empty_cart).await.unwrap_err();
        assert!(matches!(err, UseCaseError::Validation { ref field, .. } if field == "items"));

        let bad_item = CartCheckoutModel {
            user_id: "u1".into(),
            email: "a@b.co".into(),
            items: vec![
                CartItemModel { price_id: "price_A".into(), quantity: Some(1) },
                CartItemModel { price_id: "price_B".into(), quantity: Some(0) },
            ],
            success_url: "https://x/s".into(),
            cancel_url: "https://x/c".into(),
        };
        let err = usecase.cart(bad_item).await.unwrap_err();
        assert!(matches!(err, UseCaseError::Validation { ref field, .. } if field == "items[1].quantity"));
    }

    #[tokio::test]
    async fn provider_rejection_is_passed_through() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_customer()
            .returning(|_, _| Ok("cus_1".to_string()));
        gateway.expect_create_checkout_session().returning(|_| {
            Err(GatewayError::Provider {
                status: 400,
                message: "No such price".into(),
            })
        });
        let usecase = CheckoutUseCase::new(Arc::new(MemoryStore::new()), Arc::new(gateway), settings());

        let err = usecase.subscription(subscription_model()).await.unwrap_err();
        assert!(matches!(err, UseCaseError::Gateway(GatewayError::Provider { status: 400, .. })));
    }
}
