use std::{collections::HashMap, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, error};

use crate::domain::{
    errors::{GatewayError, GatewayResult},
    repositories::payment_gateway::PaymentGateway,
    value_objects::{
        enums::checkout_modes::CheckoutMode,
        payments::{
            CheckoutSession, CheckoutSessionRequest, PortalSession, ProviderCheckoutSession,
            ProviderEvent, ProviderEventObject, ProviderInvoice, ProviderSubscription,
        },
    },
};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: String,
    pub request_timeout: Duration,
    pub webhook_tolerance: Duration,
}

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    api_base: String,
    webhook_tolerance_secs: i64,
}

/// Stripe returns either a bare id or the expanded object for references.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    fn into_id(self) -> String {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object { id } => id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    type_: String,
    created: Option<i64>,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeCheckoutSession {
    id: String,
    mode: Option<String>,
    payment_status: Option<String>,
    subscription: Option<Expandable>,
    customer: Option<Expandable>,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct StripeInvoice {
    id: String,
    subscription: Option<Expandable>,
    customer: Option<Expandable>,
    parent: Option<StripeInvoiceParent>,
}

#[derive(Debug, Deserialize)]
struct StripeInvoiceParent {
    subscription_details: Option<StripeInvoiceSubscriptionDetails>,
}

#[derive(Debug, Deserialize)]
struct StripeInvoiceSubscriptionDetails {
    subscription: Option<Expandable>,
}

#[derive(Debug, Deserialize)]
struct StripeSubscription {
    id: String,
    customer: Option<Expandable>,
    status: String,
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
    #[serde(default)]
    items: StripeSubscriptionItems,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize, Default)]
struct StripeSubscriptionItems {
    data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct StripeSubscriptionItem {
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
    price: Option<StripePrice>,
}

#[derive(Debug, Deserialize)]
struct StripePrice {
    id: String,
    product: Option<Expandable>,
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|secs| DateTime::from_timestamp(secs, 0))
}

impl From<StripeSubscription> for ProviderSubscription {
    fn from(sub: StripeSubscription) -> Self {
        let first_item = sub.items.data.into_iter().next();
        let item_start = first_item.as_ref().and_then(|i| i.current_period_start);
        let item_end = first_item.as_ref().and_then(|i| i.current_period_end);
        let price = first_item.and_then(|i| i.price);

        ProviderSubscription {
            id: sub.id,
            customer_id: sub.customer.map(Expandable::into_id),
            status: sub.status,
            current_period_start: timestamp(sub.current_period_start.or(item_start)),
            current_period_end: timestamp(sub.current_period_end.or(item_end)),
            price_id: price.as_ref().map(|p| p.id.clone()),
            product_id: price.and_then(|p| p.product).map(Expandable::into_id),
            metadata: sub.metadata.unwrap_or_default(),
        }
    }
}

impl From<StripeCheckoutSession> for ProviderCheckoutSession {
    fn from(session: StripeCheckoutSession) -> Self {
        ProviderCheckoutSession {
            id: session.id,
            mode: session.mode.and_then(|mode| mode.parse::<CheckoutMode>().ok()),
            payment_status: session.payment_status,
            subscription_id: session.subscription.map(Expandable::into_id),
            customer_id: session.customer.map(Expandable::into_id),
            metadata: session.metadata.unwrap_or_default(),
        }
    }
}

impl From<StripeInvoice> for ProviderInvoice {
    fn from(invoice: StripeInvoice) -> Self {
        let nested = invoice
            .parent
            .and_then(|p| p.subscription_details)
            .and_then(|d| d.subscription);

        ProviderInvoice {
            id: invoice.id,
            subscription_id: invoice.subscription.or(nested).map(Expandable::into_id),
            customer_id: invoice.customer.map(Expandable::into_id),
        }
    }
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`, the value Stripe sends as `v1=`.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> GatewayResult<String> {
    let mac = signing_mac(secret, timestamp, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn signing_mac(secret: &str, timestamp: i64, payload: &[u8]) -> GatewayResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| GatewayError::InvalidSignature(err.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Checks a `Stripe-Signature` header against `payload`. Any `v1=` entry may
/// match; the timestamp must be within `tolerance_secs` of `now`.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    signature_header: &str,
    tolerance_secs: i64,
    now: i64,
) -> GatewayResult<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',').map(str::trim) {
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = rest.parse().ok();
        } else if let Some(rest) = part.strip_prefix("v1=") {
            signatures.push(rest);
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        GatewayError::InvalidSignature("missing timestamp in stripe-signature".into())
    })?;
    if signatures.is_empty() {
        return Err(GatewayError::InvalidSignature(
            "missing v1 in stripe-signature".into(),
        ));
    }
    if (now - timestamp).abs() > tolerance_secs {
        return Err(GatewayError::InvalidSignature(
            "timestamp outside the tolerance zone".into(),
        ));
    }

    let mac = signing_mac(secret, timestamp, payload)?;
    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|provided| mac.clone().verify_slice(&provided).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(GatewayError::InvalidSignature(
            "no signature matches the payload".into(),
        ))
    }
}

/// Decodes a verified webhook body, picking the object shape from the event type.
pub fn decode_event(payload: &[u8]) -> GatewayResult<ProviderEvent> {
    let event: StripeEvent =
        serde_json::from_slice(payload).map_err(|err| GatewayError::Payload(err.to_string()))?;

    // Only reconciled event types are decoded; previews such as
    // `invoice.upcoming` carry objects without an id.
    let object = match event.type_.as_str() {
        "checkout.session.completed" => ProviderEventObject::CheckoutSession(
            decode_object::<StripeCheckoutSession>(event.data.object)?.into(),
        ),
        "customer.subscription.created"
        | "customer.subscription.updated"
        | "customer.subscription.deleted" => ProviderEventObject::Subscription(
            decode_object::<StripeSubscription>(event.data.object)?.into(),
        ),
        "invoice.payment_succeeded" | "invoice.payment_failed" => {
            ProviderEventObject::Invoice(decode_object::<StripeInvoice>(event.data.object)?.into())
        }
        _ => ProviderEventObject::Other,
    };

    Ok(ProviderEvent {
        id: event.id,
        event_type: event.type_,
        created: event.created,
        object,
    })
}

fn decode_object<T: for<'de> Deserialize<'de>>(value: serde_json::Value) -> GatewayResult<T> {
    serde_json::from_value(value).map_err(|err| GatewayError::Payload(err.to_string()))
}

/// Form fields for `POST /v1/checkout/sessions`. Line items keep request order.
pub fn checkout_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut body: Vec<(String, String)> = vec![
        ("mode".to_string(), request.mode.to_string()),
        ("customer".to_string(), request.customer_id.clone()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];

    for (idx, item) in request.line_items.iter().enumerate() {
        body.push((format!("line_items[{idx}][price]"), item.price_id.clone()));
        body.push((format!("line_items[{idx}][quantity]"), item.quantity.to_string()));
    }

    for (key, value) in &request.metadata {
        body.push((format!("metadata[{key}]"), value.clone()));
    }

    if request.mode == CheckoutMode::Subscription {
        for (key, value) in &request.metadata {
            body.push((format!("subscription_data[metadata][{key}]"), value.clone()));
        }
    }

    body
}

fn classify_status(status: u16, message: String) -> GatewayError {
    if status == 429 || status >= 500 {
        GatewayError::Transient(format!("status {status}: {message}"))
    } else {
        GatewayError::Provider { status, message }
    }
}

fn transport_error(context: &str, err: reqwest::Error) -> GatewayError {
    error!(context = %context, error = ?err, "stripe request could not be sent");
    GatewayError::Transient(format!("{context}: {err}"))
}

impl StripeClient {
    pub fn new(settings: StripeSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self {
            http,
            secret_key: settings.secret_key,
            webhook_secret: settings.webhook_secret,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            webhook_tolerance_secs: settings.webhook_tolerance.as_secs() as i64,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> GatewayResult<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.clone()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.clone()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.clone()),
            context = %context,
            "stripe api request failed"
        );

        let message = details
            .and_then(|d| d.message)
            .unwrap_or_else(|| format!("{context} failed"));

        Err(classify_status(status.as_u16(), message))
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &[(String, String)],
        context: &str,
    ) -> GatewayResult<T> {
        let resp = self
            .http
            .post(self.url(path))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .form(body)
            .send()
            .await
            .map_err(|err| transport_error(context, err))?;
        let resp = Self::ensure_success(resp, context).await?;

        resp.json::<T>()
            .await
            .map_err(|err| GatewayError::Payload(format!("{context}: {err}")))
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> GatewayResult<CheckoutSession> {
        // https://stripe.com/docs/api/checkout/sessions/create
        #[derive(Deserialize)]
        struct CheckoutResp {
            id: String,
            url: Option<String>,
        }

        let body = checkout_form(&request);
        let parsed: CheckoutResp = self
            .post_form("/v1/checkout/sessions", &body, "create checkout session")
            .await?;

        let url = parsed.url.ok_or_else(|| {
            GatewayError::Payload("checkout session url is missing".to_string())
        })?;
        debug!(session_id = %parsed.id, mode = %request.mode, "stripe: checkout session created");

        Ok(CheckoutSession { id: parsed.id, url })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> GatewayResult<PortalSession> {
        #[derive(Deserialize)]
        struct PortalResp {
            url: String,
        }

        let body = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];
        let parsed: PortalResp = self
            .post_form("/v1/billing_portal/sessions", &body, "create portal session")
            .await?;

        Ok(PortalSession { url: parsed.url })
    }

    async fn fetch_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> GatewayResult<ProviderSubscription> {
        // https://stripe.com/docs/api/subscriptions/retrieve
        let context = "retrieve subscription";
        let resp = self
            .http
            .get(self.url(&format!("/v1/subscriptions/{provider_subscription_id}")))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await
            .map_err(|err| transport_error(context, err))?;
        let resp = Self::ensure_success(resp, context).await?;

        let subscription: StripeSubscription = resp
            .json()
            .await
            .map_err(|err| GatewayError::Payload(format!("{context}: {err}")))?;
        Ok(subscription.into())
    }

    fn verify_webhook(&self, payload: &[u8], signature_header: &str) -> GatewayResult<ProviderEvent> {
        verify_signature(
            &self.webhook_secret,
            payload,
            signature_header,
            self.webhook_tolerance_secs,
            Utc::now().timestamp(),
        )?;
        decode_event(payload)
    }

    async fn create_customer(
        &self,
        email: &str,
        metadata: HashMap<String, String>,
    ) -> GatewayResult<String> {
        // https://stripe.com/docs/api/customers/create
        #[derive(Deserialize)]
        struct CustomerResp {
            id: String,
        }

        let mut body = vec![("email".to_string(), email.to_string())];
        for (key, value) in metadata {
            body.push((format!("metadata[{key}]"), value));
        }

        let parsed: CustomerResp = self
            .post_form("/v1/customers", &body, "create customer")
            .await?;
        Ok(parsed.id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::domain::value_objects::payments::LineItem;

    const SECRET: &str = "whsec_test";

    fn signed_header(payload: &[u8], timestamp: i64) -> String {
        format!("t={timestamp},v1={}", compute_signature(SECRET, timestamp, payload).unwrap())
    }

    #[test]
    fn accepts_any_matching_v1_entry() {
        let payload = br#"{"id":"evt_1"}"#;
        let good = compute_signature(SECRET, 1_000, payload).unwrap();
        let header = format!("t=1000,v1={},v1={good}", "00".repeat(32));

        assert!(verify_signature(SECRET, payload, &header, 300, 1_100).is_ok());
    }

    #[test]
    fn rejects_tampered_payload_and_wrong_secret() {
        let header = signed_header(br#"{"id":"evt_1"}"#, 1_000);

        let tampered = verify_signature(SECRET, br#"{"id":"evt_2"}"#, &header, 300, 1_000);
        assert!(matches!(tampered, Err(GatewayError::InvalidSignature(_))));

        let wrong_secret = verify_signature("whsec_other", br#"{"id":"evt_1"}"#, &header, 300, 1_000);
        assert!(matches!(wrong_secret, Err(GatewayError::InvalidSignature(_))));
    }

    #[test]
    fn rejects_stale_timestamp_and_malformed_header() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = signed_header(payload, 1_000);
        assert!(verify_signature(SECRET, payload, &header, 300, 1_301).is_err());

        assert!(verify_signature(SECRET, payload, "v1=abcd", 300, 1_000).is_err());
        assert!(verify_signature(SECRET, payload, "t=1000", 300, 1_000).is_err());
        assert!(verify_signature(SECRET, payload, "t=1000,v1=not-hex", 300, 1_000).is_err());
    }

    #[test]
    fn decodes_subscription_event_with_item_fallbacks() {
        let payload = json!({
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "created": 1_700_000_000,
            "data": { "object": {
                "id": "sub_1",
                "customer": { "id": "cus_1", "object": "customer" },
                "status": "past_due",
                "metadata": { "user_id": "u1" },
                "items": { "data": [{
                    "current_period_start": 100,
                    "current_period_end": 200,
                    "price": { "id": "price_A", "product": "prod_A" }
                }]}
            }}
        });

        let event = decode_event(payload.to_string().as_bytes()).unwrap();
        let ProviderEventObject::Subscription(sub) = event.object else {
            panic!("expected subscription object");
        };

        assert_eq!(sub.customer_id.as_deref(), Some("cus_1"));
        assert_eq!(sub.status, "past_due");
        assert_eq!(sub.current_period_start, DateTime::from_timestamp(100, 0));
        assert_eq!(sub.current_period_end, DateTime::from_timestamp(200, 0));
        assert_eq!(sub.price_id.as_deref(), Some("price_A"));
        assert_eq!(sub.product_id.as_deref(), Some("prod_A"));
        assert_eq!(sub.metadata.get("user_id").map(String::as_str), Some("u1"));
    }

    #[test]
    fn decodes_invoice_subscription_from_parent_details() {
        let payload = json!({
            "id": "evt_2",
            "type": "invoice.payment_failed",
            "data": { "object": {
                "id": "in_1",
                "customer": "cus_1",
                "parent": { "subscription_details": { "subscription": "sub_9" } }
            }}
        });

        let event = decode_event(payload.to_string().as_bytes()).unwrap();
        assert_eq!(
            event.object,
            ProviderEventObject::Invoice(ProviderInvoice {
                id: "in_1".into(),
                subscription_id: Some("sub_9".into()),
                customer_id: Some("cus_1".into()),
            })
        );
    }

    #[test]
    fn unknown_event_types_decode_as_other() {
        let payload = json!({"id": "evt_3", "type": "charge.refunded", "data": {"object": {}}});
        let event = decode_event(payload.to_string().as_bytes()).unwrap();
        assert_eq!(event.object, ProviderEventObject::Other);
    }

    #[test]
    fn unreconciled_invoice_events_skip_object_decoding() {
        let payload = json!({
            "id": "evt_4",
            "type": "invoice.upcoming",
            "data": { "object": { "object": "invoice", "customer": "cus_1", "subscription": "sub_1" } }
        });

        let event = decode_event(payload.to_string().as_bytes()).unwrap();

        assert_eq!(event.event_type, "invoice.upcoming");
        assert_eq!(event.object, ProviderEventObject::Other);
    }

    #[test]
    fn checkout_form_keeps_item_order_and_copies_subscription_metadata() {
        let mut metadata = BTreeMap::new();
        metadata.insert("product_id".to_string(), "prod_A".to_string());
        metadata.insert("user_id".to_string(), "u1".to_string());

        let request = CheckoutSessionRequest {
            mode: CheckoutMode::Subscription,
            customer_id: "cus_1".into(),
            line_items: vec![
                LineItem { price_id: "price_B".into(), quantity: 2 },
                LineItem { price_id: "price_A".into(), quantity: 1 },
            ],
            success_url: "https://x/s".into(),
            cancel_url: "https://x/c".into(),
            metadata,
        };

        let form = checkout_form(&request);
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("subscription"));
        assert_eq!(get("line_items[0][price]"), Some("price_B"));
        assert_eq!(get("line_items[0][quantity]"), Some("2"));
        assert_eq!(get("line_items[1][price]"), Some("price_A"));
        assert_eq!(get("metadata[user_id]"), Some("u1"));
        assert_eq!(get("subscription_data[metadata][product_id]"), Some("prod_A"));
    }

    #[test]
    fn payment_mode_form_has_no_subscription_data() {
        let request = CheckoutSessionRequest {
            mode: CheckoutMode::Payment,
            customer_id: "cus_1".into(),
            line_items: vec![LineItem { price_id: "price_A".into(), quantity: 3 }],
            success_url: "https://x/s".into(),
            cancel_url: "https://x/c".into(),
            metadata: BTreeMap::from([("user_id".to_string(), "u1".to_string())]),
        };

        let form = checkout_form(&request);
        assert!(form.iter().all(|(k, _)| !k.starts_with("subscription_data")));
    }

    #[test]
    fn rate_limits_and_server_errors_are_transient() {
        assert!(classify_status(429, "slow down".into()).is_retryable());
        assert!(classify_status(503, "down".into()).is_retryable());
        assert_eq!(
            classify_status(400, "No such price".into()),
            GatewayError::Provider { status: 400, message: "No such price".into() }
        );
    }
}
