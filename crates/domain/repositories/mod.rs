pub mod customers;
pub mod payment_gateway;
pub mod subscriptions;
