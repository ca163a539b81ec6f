pub mod checkout;
pub mod portal;
pub mod subscriptions;
pub mod webhooks;
