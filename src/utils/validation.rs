//! Validation Utilities
//!
//! Input validation and normalization for identifiers used in the
//! authentication flows.

use regex::Regex;
use std::sync::OnceLock;
use validator::ValidationError;

/// Validates email address format using a comprehensive regex pattern
pub fn validate_email(email: &str) -> bool {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    regex.is_match(email)
}

/// Normalizes email address to lowercase and removes whitespace
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates phone number format: optional leading `+` followed by 8-15
/// digits (E.164), allowing spaces and dashes in the raw input.
pub fn validate_phone(phone: &str) -> bool {
    let normalized = normalize_phone(phone);
    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PHONE_REGEX
        .get_or_init(|| Regex::new(r"^\+?[0-9]{8,15}$").expect("Failed to compile phone regex"));

    regex.is_match(&normalized)
}

/// Normalizes a phone number: strips spaces, dashes, and parentheses,
/// keeping digits and a single leading `+`.
pub fn normalize_phone(phone: &str) -> String {
    let trimmed = phone.trim();
    let mut normalized = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        if c.is_ascii_digit() || (c == '+' && i == 0) {
            normalized.push(c);
        }
    }
    normalized
}

/// Normalizes a login identifier: email addresses are lowercased, anything
/// else is treated as a phone number.
pub fn normalize_identifier(identifier: &str) -> String {
    if identifier.contains('@') {
        normalize_email(identifier)
    } else {
        normalize_phone(identifier)
    }
}

/// Custom validator for email fields using the validator crate
pub fn email_validator(email: &str) -> Result<(), ValidationError> {
    if validate_email(email) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_email"))
    }
}

/// Custom validator for phone fields using the validator crate
pub fn phone_validator(phone: &str) -> Result<(), ValidationError> {
    if validate_phone(phone) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_phone"))
    }
}

/// Custom validator for identifier fields (email or phone)
pub fn identifier_validator(identifier: &str) -> Result<(), ValidationError> {
    if identifier.contains('@') {
        email_validator(identifier)
    } else {
        phone_validator(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com"));
        assert!(validate_email("test.user+tag@domain.co.uk"));
        assert!(!validate_email("invalid.email"));
        assert!(!validate_email("@domain.com"));
        assert!(!validate_email("user@"));
        assert!(!validate_email(""));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  USER@EXAMPLE.COM  "), "user@example.com");
        assert_eq!(normalize_email("Test@Domain.org"), "test@domain.org");
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+8801712345678"));
        assert!(validate_phone("01712345678"));
        assert!(validate_phone("+1 415 555-0142"));
        assert!(!validate_phone("12345")); // too short
        assert!(!validate_phone("not-a-phone"));
        assert!(!validate_phone(""));
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+880 1712-345678"), "+8801712345678");
        assert_eq!(normalize_phone(" (415) 555-0142 "), "4155550142");
        assert_eq!(normalize_phone("+8801712345678"), "+8801712345678");
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier(" Admin@Example.COM"), "admin@example.com");
        assert_eq!(normalize_identifier("+880 1712 345678"), "+8801712345678");
    }
}
