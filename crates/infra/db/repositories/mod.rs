pub mod customers;
pub mod subscriptions;
