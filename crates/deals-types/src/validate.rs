//! Input limits applied at the API boundary.

use thiserror::Error;
use url::Url;
use validator::ValidateEmail;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub type Validated = Result<(), ValidationError>;

/// Character-count bounds, inclusive.
pub fn length(field: &'static str, value: &str, min: usize, max: usize) -> Validated {
    let len = value.chars().count();
    if len < min {
        return Err(ValidationError::new(
            field,
            format!("must be at least {min} characters"),
        ));
    }
    if len > max {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}

pub fn optional_length(field: &'static str, value: Option<&str>, max: usize) -> Validated {
    match value {
        Some(v) => length(field, v, 0, max),
        None => Ok(()),
    }
}

pub fn title(value: &str) -> Validated {
    length("title", value.trim(), 3, 200)
}

pub fn description(value: Option<&str>) -> Validated {
    optional_length("description", value, 2000)
}

pub fn store(value: &str) -> Validated {
    length("store", value.trim(), 2, 100)
}

pub fn link(value: &str) -> Validated {
    let parsed =
        Url::parse(value).map_err(|e| ValidationError::new("link", format!("invalid URL: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::new("link", "must be an http(s) URL"));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::new("link", "must include a host"));
    }
    length("link", value, 0, 2048)
}

pub fn price(field: &'static str, value: f64) -> Validated {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::new(field, "must be a non-negative number"));
    }
    Ok(())
}

/// The deal price must undercut the original price when both are known.
pub fn prices(price_value: f64, original: Option<f64>) -> Validated {
    price("price", price_value)?;
    if let Some(original) = original {
        price("original_price", original)?;
        if price_value >= original {
            return Err(ValidationError::new(
                "price",
                "must be less than the original price",
            ));
        }
    }
    Ok(())
}

pub fn discount_percentage(price_value: f64, original: Option<f64>) -> Option<f64> {
    match original {
        Some(o) if o > 0.0 && price_value < o => {
            Some(((o - price_value) / o * 10_000.0).round() / 100.0)
        }
        _ => None,
    }
}

pub fn coupon_code(value: &str) -> Validated {
    let trimmed = value.trim();
    length("code", trimmed, 1, 50)?;
    if trimmed.contains(char::is_whitespace) {
        return Err(ValidationError::new("code", "must not contain whitespace"));
    }
    Ok(())
}

pub fn discount_value(value: &str) -> Validated {
    length("discount_value", value.trim(), 1, 50)
}

pub fn min_purchase(value: Option<&str>) -> Validated {
    optional_length("min_purchase", value, 50)
}

pub fn comment(value: &str) -> Validated {
    length("content", value.trim(), 1, 1000)
}

pub fn username(value: &str) -> Validated {
    length("username", value, 3, 32)?;
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(ValidationError::new(
            "username",
            "may only contain letters, digits, '_', '-' and '.'",
        ));
    }
    Ok(())
}

pub fn password(value: &str) -> Validated {
    length("password", value, 8, 128)
}

pub fn email(value: &str) -> Validated {
    length("email", value, 3, 254)?;
    if !value.validate_email() {
        return Err(ValidationError::new("email", "must be a valid address"));
    }
    Ok(())
}
