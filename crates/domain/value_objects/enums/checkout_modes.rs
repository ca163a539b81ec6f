use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    Subscription,
    Payment,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Subscription => "subscription",
            CheckoutMode::Payment => "payment",
        }
    }
}

impl Display for CheckoutMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported checkout mode: {0}")]
pub struct UnsupportedCheckoutMode(pub String);

impl FromStr for CheckoutMode {
    type Err = UnsupportedCheckoutMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "subscription" => Ok(CheckoutMode::Subscription),
            "payment" => Ok(CheckoutMode::Payment),
            other => Err(UnsupportedCheckoutMode(other.to_string())),
        }
    }
}
