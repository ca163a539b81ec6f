use url::Url;

use super::errors::{UseCaseError, UseCaseResult};

pub const REQUIRED: &str = "REQUIRED";
pub const INVALID_EMAIL: &str = "INVALID_EMAIL";
pub const INVALID_URL: &str = "INVALID_URL";
pub const INVALID_PRICE_ID: &str = "INVALID_PRICE_ID";
pub const INVALID_QUANTITY: &str = "INVALID_QUANTITY";
pub const EMPTY_CART: &str = "EMPTY_CART";

pub fn require(field: &str, value: &str) -> UseCaseResult<()> {
    if value.trim().is_empty() {
        return Err(UseCaseError::validation(field, REQUIRED, format!("{field} is required")));
    }
    Ok(())
}

/// A local part, `@`, and a domain containing at least one dot.
pub fn email(field: &str, value: &str) -> UseCaseResult<()> {
    let invalid = || UseCaseError::validation(field, INVALID_EMAIL, format!("{field} is not a valid email address"));

    if value.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

pub fn absolute_http_url(field: &str, value: &str) -> UseCaseResult<()> {
    let valid = Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false);

    if !valid {
        return Err(UseCaseError::validation(
            field,
            INVALID_URL,
            format!("{field} must be an absolute http(s) URL"),
        ));
    }
    Ok(())
}

pub fn price_id(field: &str, value: &str, prefix: &str) -> UseCaseResult<()> {
    if value.len() <= prefix.len() || !value.starts_with(prefix) {
        return Err(UseCaseError::validation(
            field,
            INVALID_PRICE_ID,
            format!("{field} must start with {prefix:?}"),
        ));
    }
    Ok(())
}

/// Absent quantities mean 1.
pub fn quantity(field: &str, value: Option<i64>, max: u32) -> UseCaseResult<u32> {
    let value = value.unwrap_or(1);
    if value < 1 || value > i64::from(max) {
        return Err(UseCaseError::validation(
            field,
            INVALID_QUANTITY,
            format!("{field} must be between 1 and {max}"),
        ));
    }
    Ok(value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: UseCaseError) -> (String, &'static str) {
        match err {
            UseCaseError::Validation { field, code, .. } => (field, code),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn emails() {
        assert!(email("email", "a@b.co").is_ok());
        assert!(email("email", "first.last@mail.example.com").is_ok());

        for bad in ["", "ab.co", "@b.co", "a@b", "a@.co", "a@b.", "a b@c.co", "a@b@c.co"] {
            let (field, code) = field_of(email("email", bad).unwrap_err());
            assert_eq!(field, "email");
            assert_eq!(code, INVALID_EMAIL);
        }
    }

    #[test]
    fn urls_must_be_absolute_http() {
        assert!(absolute_http_url("success_url", "https://x/s").is_ok());
        assert!(absolute_http_url("success_url", "http://localhost:3000/done").is_ok());

        for bad in ["", "/relative", "ftp://x/s", "mailto:a@b.co", "not a url"] {
            assert!(absolute_http_url("success_url", bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn price_ids_need_prefix_and_body() {
        assert!(price_id("price_id", "price_A", "price_").is_ok());
        assert!(price_id("price_id", "price_", "price_").is_err());
        assert!(price_id("price_id", "prod_A", "price_").is_err());
        assert!(price_id("price_id", "", "price_").is_err());
    }

    #[test]
    fn quantities() {
        assert_eq!(quantity("quantity", None, 999).unwrap(), 1);
        assert_eq!(quantity("quantity", Some(999), 999).unwrap(), 999);

        for bad in [0, -1, 1000] {
            let (field, code) = field_of(quantity("quantity", Some(bad), 999).unwrap_err());
            assert_eq!(field, "quantity");
            assert_eq!(code, INVALID_QUANTITY);
        }
    }

    #[test]
    fn required_rejects_blank() {
        assert!(require("user_id", "u1").is_ok());
        let (field, code) = field_of(require("user_id", "  ").unwrap_err());
        assert_eq!((field.as_str(), code), ("user_id", REQUIRED));
    }
}
