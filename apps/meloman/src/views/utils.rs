//! Shared helpers for views: form validation and display formatting

use chrono::NaiveDateTime;

/// Validation messages keyed by form field.
#[derive(Debug, Default)]
pub struct FormErrors(Vec<(&'static str, String)>);

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push((field, message.into()));
    }

    /// First message for `field`, if any.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, message)| message.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks that `value` has between `min` and `max` characters.
    pub fn check_length(&mut self, field: &'static str, value: &str, min: usize, max: usize) {
        let len = value.chars().count();
        if len == 0 && min > 0 {
            self.add(field, "This field is required");
        } else if len < min {
            self.add(field, format!("Must be at least {} characters", min));
        } else if len > max {
            self.add(field, format!("Must be at most {} characters", max));
        }
    }
}

/// Loose email syntax check: `local@domain.tld`, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|part| !part.is_empty())
}

/// Formats an SQLite `datetime('now')` value as `DD.MM.YYYY`.
pub fn format_date(timestamp: &str) -> String {
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.format("%d.%m.%Y").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}

/// Treats empty form inputs as absent.
pub fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@mail.example.org"));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("user"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("user@example."));
        assert!(!is_valid_email("us er@example.com"));
        assert!(!is_valid_email("a@b@example.com"));
    }

    #[test]
    fn test_check_length() {
        let mut errors = FormErrors::default();
        errors.check_length("password", "abc", 6, 64);
        errors.check_length("title", "", 1, 255);
        errors.check_length("artist", "ok", 1, 255);

        assert_eq!(errors.get("password"), Some("Must be at least 6 characters"));
        assert_eq!(errors.get("title"), Some("This field is required"));
        assert_eq!(errors.get("artist"), None);
    }

    #[test]
    fn test_check_length_counts_chars() {
        let mut errors = FormErrors::default();
        errors.check_length("title", &"ж".repeat(255), 1, 255);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2024-03-09 17:45:00"), "09.03.2024");
        assert_eq!(format_date("yesterday"), "yesterday");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  "), None);
        assert_eq!(non_empty(" hi "), Some("hi".to_string()));
    }
}
