use bigdecimal::BigDecimal;
use std::fmt;

pub const EMAIL_MAX_LEN: usize = 255;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 100;
pub const PHONE_MIN_LEN: usize = 10;
pub const PHONE_MAX_LEN: usize = 20;
pub const DESCRIPTION_MAX_LEN: usize = 255;
pub const PAYMENT_METHOD_MAX_LEN: usize = 50;
pub const AMOUNT_MAX_SCALE: i64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
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

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_min_len(field: &'static str, value: &str, min_len: usize) -> ValidationResult {
    if value.chars().count() < min_len {
        return Err(ValidationError::new(
            field,
            format!("must be at least {} characters", min_len),
        ));
    }

    Ok(())
}

pub fn validate_email(email: &str) -> ValidationResult {
    validate_required("email", email)?;
    validate_max_len("email", email, EMAIL_MAX_LEN)?;

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| ValidationError::new("email", "must be a valid email address"))?;

    if local.is_empty()
        || domain.starts_with('.')
        || domain.ends_with('.')
        || !domain.contains('.')
        || email.chars().any(char::is_whitespace)
        || domain.contains('@')
    {
        return Err(ValidationError::new("email", "must be a valid email address"));
    }

    Ok(())
}

pub fn validate_password(password: &str) -> ValidationResult {
    validate_min_len("password", password, PASSWORD_MIN_LEN)
}

pub fn validate_name(field: &'static str, name: &str) -> ValidationResult {
    let name = sanitize_string(name);
    validate_min_len(field, &name, NAME_MIN_LEN)?;
    validate_max_len(field, &name, NAME_MAX_LEN)
}

pub fn validate_phone(phone: &str) -> ValidationResult {
    let phone = phone.trim();
    validate_min_len("phone", phone, PHONE_MIN_LEN)?;
    validate_max_len("phone", phone, PHONE_MAX_LEN)?;

    if !phone
        .chars()
        .enumerate()
        .all(|(i, ch)| ch.is_ascii_digit() || (i == 0 && ch == '+'))
    {
        return Err(ValidationError::new("phone", "must contain only digits"));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    if amount.with_scale(AMOUNT_MAX_SCALE) != *amount {
        return Err(ValidationError::new(
            "amount",
            format!("must have at most {} decimal places", AMOUNT_MAX_SCALE),
        ));
    }

    Ok(())
}

/// The gateway currency has no minor unit, so charges must be whole amounts.
pub fn validate_whole_amount(amount: &BigDecimal) -> ValidationResult {
    if amount.with_scale(0) != *amount {
        return Err(ValidationError::new("amount", "must be a whole amount"));
    }
    Ok(())
}

pub fn validate_payment_method(payment_method: &str) -> ValidationResult {
    validate_required("payment_method", payment_method)?;
    validate_max_len("payment_method", payment_method, PAYMENT_METHOD_MAX_LEN)
}

pub fn validate_description(description: &str) -> ValidationResult {
    validate_max_len("description", description, DESCRIPTION_MAX_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_lengths() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
        assert!(validate_min_len("field", "ab", 2).is_ok());
        assert!(validate_min_len("field", "a", 2).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_email() {
        assert!(validate_email("ann@example.com").is_ok());
        assert!(validate_email("ann.example.com").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ann@example").is_err());
        assert!(validate_email("ann @example.com").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn validates_registration_fields() {
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("1234567").is_err());
        assert!(validate_name("first_name", "Al").is_ok());
        assert!(validate_name("first_name", " A ").is_err());
        assert!(validate_phone("+6281234567").is_ok());
        assert!(validate_phone("081234").is_err());
        assert!(validate_phone("0812-345-678").is_err());
    }

    #[test]
    fn validates_positive_amount() {
        let positive = BigDecimal::from_str("1.23").expect("valid decimal");
        let too_precise = BigDecimal::from_str("1.234").expect("valid decimal");
        let zero = BigDecimal::from(0);
        let negative = BigDecimal::from(-1);

        assert!(validate_positive_amount(&positive).is_ok());
        assert!(validate_positive_amount(&too_precise).is_err());
        assert!(validate_positive_amount(&zero).is_err());
        assert!(validate_positive_amount(&negative).is_err());
    }

    #[test]
    fn validates_whole_amount() {
        let whole = BigDecimal::from_str("200.00").expect("valid decimal");
        let fractional = BigDecimal::from_str("200.50").expect("valid decimal");

        assert!(validate_whole_amount(&whole).is_ok());
        assert!(validate_whole_amount(&BigDecimal::from(15)).is_ok());
        assert!(validate_whole_amount(&fractional).is_err());
    }

    #[test]
    fn validates_payment_method_and_description() {
        assert!(validate_payment_method("bank_transfer").is_ok());
        assert!(validate_payment_method("").is_err());
        assert!(validate_description(&"x".repeat(256)).is_err());
        assert!(validate_description("").is_ok());
    }
}
