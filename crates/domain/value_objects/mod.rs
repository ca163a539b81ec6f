pub mod checkout;
pub mod enums;
pub mod payments;
pub mod portal;
pub mod subscriptions;
