//! Customer Form Validation
//!
//! Every rule runs on submit and all failures are reported together,
//! keyed by field, so the shopper can fix the whole form in one pass.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::CustomerInfo;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Number of digits in a US phone number
pub const PHONE_DIGITS: usize = 10;

/// Field-keyed validation failures
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field failure
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.insert(field, message);
        errors
    }

    pub fn insert(&mut self, field: &str, message: impl Into<String>) {
        self.0.insert(field.to_string(), message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

/// Raw customer form input, as typed
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
}

impl CustomerForm {
    /// Run all rules; on success the returned customer holds normalized values
    pub fn validate(&self) -> Result<CustomerInfo, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let first_name = self.first_name.trim();
        if first_name.is_empty() {
            errors.insert("firstName", "First name is required");
        }

        let last_name = self.last_name.trim();
        if last_name.is_empty() {
            errors.insert("lastName", "Last name is required");
        }

        let email = self.email.trim();
        if email.is_empty() {
            errors.insert("email", "Email is required");
        } else if !is_valid_email(email) {
            errors.insert("email", "Invalid email format");
        }

        let phone = phone_digits(&self.phone);
        if self.phone.trim().is_empty() {
            errors.insert("phone", "Phone number is required");
        } else if phone.len() != PHONE_DIGITS {
            errors.insert("phone", "Phone number must be 10 digits");
        }

        let address = self.address.trim();
        if address.is_empty() {
            errors.insert("address", "Address is required");
        }

        let city = self.city.trim();
        if city.is_empty() {
            errors.insert("city", "City is required");
        }

        let state = self.state.trim().to_uppercase();
        if state.is_empty() {
            errors.insert("state", "State is required");
        } else if state.chars().count() != 2 {
            errors.insert("state", "State must be 2 characters (e.g., PA)");
        }

        let zip = self.zip.trim();
        if zip.is_empty() {
            errors.insert("zip", "Zip code is required");
        } else if !is_valid_zip(zip) {
            errors.insert("zip", "Zip code must be 5 digits");
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(CustomerInfo {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            phone_digits: phone,
            street_address: address.to_string(),
            city: city.to_string(),
            state,
            zip: zip.to_string(),
        })
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

pub fn is_valid_zip(zip: &str) -> bool {
    zip.len() == 5 && zip.bytes().all(|b| b.is_ascii_digit())
}

/// Strip everything but ASCII digits
pub fn phone_digits(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

/// Progressive `DDD-DDD-DDDD` formatting for a phone input field
///
/// Extra digits beyond ten are dropped.
pub fn format_phone(input: &str) -> String {
    let digits: String = phone_digits(input).chars().take(PHONE_DIGITS).collect();

    match digits.len() {
        0..=3 => digits,
        4..=6 => format!("{}-{}", &digits[..3], &digits[3..]),
        _ => format!("{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..]),
    }
}

/// Hint shown while the shopper is still typing a phone number
pub fn phone_hint(input: &str) -> Option<&'static str> {
    match phone_digits(input).len() {
        1..PHONE_DIGITS => Some("Phone number must be 10 digits"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> CustomerForm {
        CustomerForm {
            first_name: "John".into(),
            last_name: "Smith".into(),
            email: "john@example.com".into(),
            phone: "(555) 123-4567".into(),
            address: "1 Market St".into(),
            city: "Philadelphia".into(),
            state: "pa".into(),
            zip: "19106".into(),
        }
    }

    #[test]
    fn test_valid_form_normalizes() {
        let customer = valid_form().validate().unwrap();
        assert_eq!(customer.phone_digits, "5551234567");
        assert_eq!(customer.state, "PA");
    }

    #[test]
    fn test_all_errors_reported_together() {
        let errors = CustomerForm::default().validate().unwrap_err();
        for field in ["firstName", "lastName", "email", "phone", "address", "city", "state", "zip"] {
            assert!(errors.contains(field), "missing error for {field}");
        }
        assert_eq!(errors.len(), 8);
    }

    #[test]
    fn test_whitespace_names_rejected() {
        let form = CustomerForm { first_name: "   ".into(), ..valid_form() };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("firstName"), Some("First name is required"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_email_rules() {
        assert!(!is_valid_email("john@example"));
        assert!(is_valid_email("john@example.com"));
        assert!(!is_valid_email("john doe@example.com"));
    }

    #[test]
    fn test_zip_rules() {
        assert!(!is_valid_zip("1234"));
        assert!(is_valid_zip("12345"));
        assert!(!is_valid_zip("1234a"));
    }

    #[test]
    fn test_state_rules() {
        let long = CustomerForm { state: "Pennsylvania".into(), ..valid_form() };
        assert!(long.validate().unwrap_err().contains("state"));

        let code = CustomerForm { state: "PA".into(), ..valid_form() };
        assert_eq!(code.validate().unwrap().state, "PA");
    }

    #[test]
    fn test_phone_formatting() {
        assert_eq!(format_phone("5551234567"), "555-123-4567");
        assert_eq!(format_phone("(555) 123.4567"), "555-123-4567");
        assert_eq!(format_phone("555"), "555");
        assert_eq!(format_phone("55512"), "555-12");
        assert_eq!(format_phone("555123456789"), "555-123-4567");
        assert_eq!(phone_digits("+1 (555) 123-4567"), "15551234567");
    }

    #[test]
    fn test_short_phone_rejected() {
        let form = CustomerForm { phone: "555-1234".into(), ..valid_form() };
        assert_eq!(form.validate().unwrap_err().get("phone"), Some("Phone number must be 10 digits"));
    }

    #[test]
    fn test_phone_hint() {
        assert_eq!(phone_hint(""), None);
        assert_eq!(phone_hint("555-12"), Some("Phone number must be 10 digits"));
        assert_eq!(phone_hint("555-123-4567"), None);
    }
}
