pub mod checkout;
pub mod customers;
pub mod errors;
pub mod portal;
pub mod subscriptions;
pub mod validation;
