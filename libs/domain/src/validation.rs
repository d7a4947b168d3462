//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

use crate::error::ServiceError;

/// Longest accepted request title
pub const MAX_TITLE_LENGTH: usize = 200;
/// Shortest accepted password
pub const MIN_PASSWORD_LENGTH: usize = 6;
/// Most image references a request may carry
pub const MAX_IMAGES: usize = 5;

/// Validate a display name
pub fn validate_name(name: &str) -> Result<(), ServiceError> {
    if name.trim().is_empty() {
        return Err(ServiceError::validation("Name is required"));
    }

    if name.chars().count() > 100 {
        return Err(ServiceError::validation(
            "Name must be at most 100 characters long",
        ));
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), ServiceError> {
    if email.is_empty() {
        return Err(ServiceError::validation("Email is required"));
    }

    if email.len() > 254 {
        return Err(ServiceError::validation(
            "Email must be at most 254 characters long",
        ));
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err(ServiceError::validation("Invalid email format"));
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), ServiceError> {
    if password.is_empty() {
        return Err(ServiceError::validation("Password is required"));
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ServiceError::validation(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }

    if password.len() > 128 {
        return Err(ServiceError::validation(
            "Password must be at most 128 characters long",
        ));
    }

    Ok(())
}

/// Validate a required free-text field and return it trimmed
pub fn required_text(value: &str, field: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Validate a request title
pub fn validate_title(title: &str) -> Result<String, ServiceError> {
    let title = required_text(title, "Title")?;
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ServiceError::validation(format!(
            "Title must be at most {} characters long",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title)
}

/// Validate an effort estimate in hours
pub fn validate_hours(hours: f64, field: &str) -> Result<(), ServiceError> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(ServiceError::validation(format!(
            "{} must be a non-negative number",
            field
        )));
    }
    Ok(())
}

/// Validate the image references of a request
pub fn validate_images(images: &[String]) -> Result<(), ServiceError> {
    if images.len() > MAX_IMAGES {
        return Err(ServiceError::validation(format!(
            "At most {} images may be attached",
            MAX_IMAGES
        )));
    }
    if images.iter().any(|i| i.trim().is_empty()) {
        return Err(ServiceError::validation("Image reference must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_formats() {
        assert!(validate_email("admin@company.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
    }

    #[test]
    fn password_length_boundary() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
        assert!(validate_password("").is_err());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn title_is_trimmed_and_bounded() {
        assert_eq!(validate_title("  Leak  ").unwrap(), "Leak");
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"t".repeat(MAX_TITLE_LENGTH)).is_ok());
        assert!(validate_title(&"t".repeat(MAX_TITLE_LENGTH + 1)).is_err());
    }

    #[test]
    fn hours_must_be_non_negative() {
        assert!(validate_hours(0.0, "Estimated hours").is_ok());
        assert!(validate_hours(2.5, "Estimated hours").is_ok());
        assert!(validate_hours(-1.0, "Estimated hours").is_err());
        assert!(validate_hours(f64::NAN, "Estimated hours").is_err());
    }

    #[test]
    fn image_count_is_limited() {
        let five: Vec<String> = (0..5).map(|i| format!("{}.jpg", i)).collect();
        assert!(validate_images(&five).is_ok());

        let six: Vec<String> = (0..6).map(|i| format!("{}.jpg", i)).collect();
        assert!(validate_images(&six).is_err());
    }
}
