//! Shipping address stored as JSON on orders and user profiles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-field validation failures for a [`ShippingAddress`].
///
/// Keys are the JSON field names so clients can highlight inputs directly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid shipping address: {}", .0.keys().cloned().collect::<Vec<_>>().join(", "))]
pub struct AddressError(pub BTreeMap<&'static str, String>);

/// A postal address an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ShippingAddress {
    const MAX_FIELD_LENGTH: usize = 200;

    /// Validate required fields and lengths, returning a trimmed copy.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] listing every offending field.
    pub fn validate(&self) -> Result<Self, AddressError> {
        let mut errors = BTreeMap::new();

        let mut required = |name: &'static str, value: &str| -> String {
            let value = value.trim();
            if value.is_empty() {
                errors.insert(name, format!("{name} is required"));
            } else if value.len() > Self::MAX_FIELD_LENGTH {
                errors.insert(
                    name,
                    format!("{name} must be at most {} characters", Self::MAX_FIELD_LENGTH),
                );
            }
            value.to_owned()
        };

        let full_name = required("full_name", &self.full_name);
        let line1 = required("line1", &self.line1);
        let city = required("city", &self.city);
        let postal_code = required("postal_code", &self.postal_code);
        let country = required("country", &self.country).to_uppercase();

        if !errors.contains_key("country")
            && (country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()))
        {
            errors.insert("country", "country must be a two-letter code".to_owned());
        }

        let optional = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };

        if errors.is_empty() {
            Ok(Self {
                full_name,
                line1,
                line2: optional(&self.line2),
                city,
                state: self.state.trim().to_owned(),
                postal_code,
                country,
                phone: optional(&self.phone),
            })
        } else {
            Err(AddressError(errors))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: " Ryu Hayabusa ".to_owned(),
            line1: "1 Dragon Way".to_owned(),
            line2: Some("   ".to_owned()),
            city: "Portland".to_owned(),
            state: "OR".to_owned(),
            postal_code: "97201".to_owned(),
            country: "us".to_owned(),
            phone: None,
        }
    }

    #[test]
    fn test_validate_trims_and_normalizes() {
        let valid = address().validate().unwrap();
        assert_eq!(valid.full_name, "Ryu Hayabusa");
        assert_eq!(valid.country, "US");
        assert_eq!(valid.line2, None);
    }

    #[test]
    fn test_validate_reports_every_missing_field() {
        let mut bad = address();
        bad.line1 = String::new();
        bad.city = "  ".to_owned();

        let err = bad.validate().unwrap_err();
        assert!(err.0.contains_key("line1"));
        assert!(err.0.contains_key("city"));
        assert_eq!(err.0.len(), 2);
    }

    #[test]
    fn test_validate_country_code() {
        let mut bad = address();
        bad.country = "USA".to_owned();
        let err = bad.validate().unwrap_err();
        assert!(err.0.contains_key("country"));
    }

    #[test]
    fn test_deserialize_optional_fields() {
        let json = r#"{"full_name":"A","line1":"B","city":"C","postal_code":"D","country":"JP"}"#;
        let parsed: ShippingAddress = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.state, "");
        assert!(parsed.line2.is_none());
    }
}
