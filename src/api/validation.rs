//! Input validation for API requests.
//!
//! Validators return `Err(message)` suitable for a per-field entry in a
//! `ValidationErrorBuilder`.

use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::billing::DATE_FORMAT;

lazy_static! {
    /// Pragmatic email check: local@domain.tld without spaces
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9]([A-Za-z0-9\-]*[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9\-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$"
    ).unwrap();

    /// E.164 phone numbers: '+' then 8 to 15 digits
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+[1-9][0-9]{7,14}$").unwrap();
}

/// Largest accepted money amount in minor units (100 million major units)
pub const MAX_AMOUNT: i64 = 10_000_000_000;

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }
    Ok(())
}

/// Strip formatting characters a user may type ("+233 20-123 4567")
pub fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '(' && *c != ')')
        .collect()
}

pub fn validate_phone(phone: &str) -> Result<(), String> {
    if phone.is_empty() {
        return Err("Phone number is required".to_string());
    }
    if !PHONE_REGEX.is_match(phone) {
        return Err("Phone number must be in international format, e.g. +233201234567".to_string());
    }
    Ok(())
}

/// Required free text with length bounds (in characters)
pub fn validate_text(label: &str, value: &str, min: usize, max: usize) -> Result<(), String> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(format!("{} is required", label));
    }
    if len < min {
        return Err(format!("{} is too short (min {} characters)", label, min));
    }
    if len > max {
        return Err(format!("{} is too long (max {} characters)", label, max));
    }
    Ok(())
}

pub fn validate_optional_text(label: &str, value: &Option<String>, max: usize) -> Result<(), String> {
    match value {
        Some(v) if v.chars().count() > max => {
            Err(format!("{} is too long (max {} characters)", label, max))
        }
        _ => Ok(()),
    }
}

/// Strictly positive amount in minor units
pub fn validate_amount(label: &str, amount: i64) -> Result<(), String> {
    if amount <= 0 {
        return Err(format!("{} must be greater than 0", label));
    }
    if amount > MAX_AMOUNT {
        return Err(format!("{} is too large", label));
    }
    Ok(())
}

pub fn validate_non_negative(label: &str, value: i64, max: i64) -> Result<(), String> {
    if value < 0 {
        return Err(format!("{} cannot be negative", label));
    }
    if value > max {
        return Err(format!("{} is too large (max {})", label, max));
    }
    Ok(())
}

pub fn validate_due_day(day: i64) -> Result<(), String> {
    if !(1..=31).contains(&day) {
        return Err("Due day must be between 1 and 31".to_string());
    }
    Ok(())
}

/// Calendar date in YYYY-MM-DD form
pub fn validate_date(label: &str, value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| format!("{} must be a date in YYYY-MM-DD format", label))
}

/// RFC 3339 timestamp strictly after `now`
pub fn validate_future_timestamp(
    label: &str,
    value: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, String> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .map_err(|_| format!("{} must be an RFC 3339 timestamp", label))?
        .with_timezone(&Utc);
    if parsed <= now {
        return Err(format!("{} must be in the future", label));
    }
    Ok(parsed)
}

pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }
    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }
    Ok(())
}

/// Password policy for self-registered accounts
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }

    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !has_upper {
        return Err("Password must contain at least one uppercase letter".to_string());
    }
    if !has_lower {
        return Err("Password must contain at least one lowercase letter".to_string());
    }
    if !has_digit {
        return Err("Password must contain at least one digit".to_string());
    }

    let common = ["password1", "qwerty123", "letmein1", "welcome1", "12345678a"];
    let lower = password.to_lowercase();
    if common.iter().any(|c| lower.contains(c)) {
        return Err("Password is too common. Please choose a stronger password.".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ama@example.com").is_ok());
        assert!(validate_email("first.last+tag@mail.example.co.uk").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("spaces in@example.com").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+233201234567").is_ok());
        assert!(validate_phone("+14155550100").is_ok());
        assert!(validate_phone(&normalize_phone("+233 20-123 4567")).is_ok());

        assert!(validate_phone("").is_err());
        assert!(validate_phone("0201234567").is_err());
        assert!(validate_phone("+0123456789").is_err());
        assert!(validate_phone("+12").is_err());
    }

    #[test]
    fn test_validate_text() {
        assert!(validate_text("Title", "Cosy studio", 3, 120).is_ok());
        assert!(validate_text("Title", "   ", 3, 120).is_err());
        assert!(validate_text("Title", "ab", 3, 120).is_err());
        assert!(validate_text("Title", &"x".repeat(121), 3, 120).is_err());
        assert!(validate_optional_text("Note", &None, 5).is_ok());
        assert!(validate_optional_text("Note", &Some("too long".to_string()), 5).is_err());
    }

    #[test]
    fn test_validate_amounts_and_days() {
        assert!(validate_amount("Rent", 1).is_ok());
        assert!(validate_amount("Rent", 0).is_err());
        assert!(validate_amount("Rent", -5).is_err());
        assert!(validate_amount("Rent", MAX_AMOUNT + 1).is_err());
        assert!(validate_non_negative("Deposit", 0, 100).is_ok());
        assert!(validate_non_negative("Deposit", -1, 100).is_err());
        assert!(validate_due_day(1).is_ok());
        assert!(validate_due_day(31).is_ok());
        assert!(validate_due_day(0).is_err());
        assert!(validate_due_day(32).is_err());
    }

    #[test]
    fn test_validate_dates() {
        assert!(validate_date("Start date", "2026-02-28").is_ok());
        assert!(validate_date("Start date", "2026-02-30").is_err());
        assert!(validate_date("Start date", "28/02/2026").is_err());

        let now = Utc::now();
        let tomorrow = (now + Duration::days(1)).to_rfc3339();
        let yesterday = (now - Duration::days(1)).to_rfc3339();
        assert!(validate_future_timestamp("Date", &tomorrow, now).is_ok());
        assert!(validate_future_timestamp("Date", &yesterday, now).is_err());
        assert!(validate_future_timestamp("Date", "tomorrow", now).is_err());
    }

    #[test]
    fn test_validate_password_strength() {
        assert!(validate_password_strength("Harbour9View").is_ok());
        assert!(validate_password_strength("Short1").is_err());
        assert!(validate_password_strength("alllowercase1").is_err());
        assert!(validate_password_strength("ALLUPPERCASE1").is_err());
        assert!(validate_password_strength("NoDigitsHere").is_err());
        assert!(validate_password_strength("MyPassword1").is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000", "listing_id").is_ok());
        assert!(validate_uuid("", "listing_id").is_err());
        assert!(validate_uuid("nope", "listing_id").is_err());
    }
}
