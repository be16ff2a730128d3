/// Request field validators
///
/// Each validator trims its input and returns the cleaned value, or the
/// `ValidationError` a handler turns into a 400.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MAX_NAME_LENGTH: usize = 100;
pub const MIN_PASSWORD_LENGTH: usize = 8;
/// bcrypt ignores everything past 72 bytes
pub const MAX_PASSWORD_BYTES: usize = 72;

lazy_static! {
    // RFC 5322 simplified
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    )
    .expect("email pattern compiles");
}

/// Lowercased, trimmed email
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }
    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }
    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    Ok(trimmed.to_lowercase())
}

/// Display names are optional. Blank counts as absent.
pub fn is_valid_name(name: Option<&str>) -> Result<Option<String>, ValidationError> {
    let trimmed = match name.map(str::trim) {
        Some(n) if !n.is_empty() => n,
        _ => return Ok(None),
    };

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong("name".to_string(), MAX_NAME_LENGTH));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat("name".to_string()));
    }

    Ok(Some(trimmed.to_string()))
}

/// The minimum counts characters, the maximum counts bytes. Passwords are not
/// trimmed.
pub fn is_valid_password(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();

    if length == 0 {
        return Err(ValidationError::EmptyField("password".to_string()));
    }
    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort("password".to_string(), MIN_PASSWORD_LENGTH));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::TooLong("password".to_string(), MAX_PASSWORD_BYTES));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(is_valid_email("user@example.com").is_ok());
        assert!(is_valid_email("test.email@domain.co.uk").is_ok());
        assert!(is_valid_email("user+tag@example.com").is_ok());
    }

    #[test]
    fn test_email_is_normalised() {
        assert_eq!(
            is_valid_email("  John@Example.COM ").unwrap(),
            "john@example.com"
        );
    }

    #[test]
    fn test_invalid_email_format() {
        for email in ["invalid", "user@", "@example.com", "user@@example.com", "user@localhost"] {
            assert!(is_valid_email(email).is_err(), "{}", email);
        }
        assert_eq!(
            is_valid_email(""),
            Err(ValidationError::EmptyField("email".to_string()))
        );
    }

    #[test]
    fn test_email_length_limit() {
        let too_long = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(
            is_valid_email(&too_long),
            Err(ValidationError::TooLong(_, MAX_EMAIL_LENGTH))
        ));
    }

    #[test]
    fn test_name() {
        assert_eq!(is_valid_name(None), Ok(None));
        assert_eq!(is_valid_name(Some("   ")), Ok(None));
        assert_eq!(
            is_valid_name(Some(" Jean-Pierre ")),
            Ok(Some("Jean-Pierre".to_string()))
        );
        assert_eq!(is_valid_name(Some(&"é".repeat(100))).map(|n| n.is_some()), Ok(true));
        assert!(is_valid_name(Some(&"a".repeat(101))).is_err());
        assert!(is_valid_name(Some("Name\0with\0null")).is_err());
    }

    #[test]
    fn test_password_length() {
        assert!(is_valid_password("12345678").is_ok());
        assert!(is_valid_password(&"p".repeat(72)).is_ok());
        assert_eq!(
            is_valid_password("short"),
            Err(ValidationError::TooShort("password".to_string(), 8))
        );
        assert!(is_valid_password("").is_err());
    }

    #[test]
    fn test_password_limit_counts_bytes() {
        assert_eq!(
            is_valid_password(&"p".repeat(73)),
            Err(ValidationError::TooLong("password".to_string(), MAX_PASSWORD_BYTES))
        );
        // 40 characters, 80 bytes
        assert!(is_valid_password(&"é".repeat(40)).is_err());
        assert!(is_valid_password(&"é".repeat(36)).is_ok());
    }
}
