pub mod checkout_modes;
pub mod subscription_statuses;
