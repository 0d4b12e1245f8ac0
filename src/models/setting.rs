//! Site settings
//!
//! Settings are opaque JSON documents keyed by name. The public site reads
//! the `general` key; its shape is [`GeneralSettings`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key of the general site settings document
pub const GENERAL_SETTINGS_KEY: &str = "general";

/// A stored settings document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSetting {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// The `general` document edited on the settings screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralSettings {
    pub site_title: String,
    pub description: String,
    pub support_email: String,
    pub phone: String,
    pub office_address: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            site_title: "Newsdesk".to_string(),
            description: "Independent student journalism from across campus.".to_string(),
            support_email: String::new(),
            phone: String::new(),
            office_address: String::new(),
        }
    }
}

impl GeneralSettings {
    /// Read from a stored document, filling missing fields with defaults.
    /// A document of the wrong shape yields the defaults.
    pub fn from_value(value: &serde_json::Value) -> Self {
        // Derived structs also accept positional arrays
        if !value.is_object() {
            return Self::default();
        }
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_settings_partial_document() {
        let value = serde_json::json!({"siteTitle": "The Ledger", "phone": "555-0100"});
        let settings = GeneralSettings::from_value(&value);
        assert_eq!(settings.site_title, "The Ledger");
        assert_eq!(settings.phone, "555-0100");
        assert_eq!(settings.description, GeneralSettings::default().description);
    }

    #[test]
    fn test_general_settings_wrong_shape() {
        let settings = GeneralSettings::from_value(&serde_json::json!(["not", "an", "object"]));
        assert_eq!(settings, GeneralSettings::default());
        assert_eq!(GeneralSettings::from_value(&serde_json::json!("Newsdesk")), GeneralSettings::default());
        assert_eq!(GeneralSettings::from_value(&serde_json::Value::Null), GeneralSettings::default());
    }

    #[test]
    fn test_general_settings_camel_case() {
        let json = serde_json::to_value(GeneralSettings::default()).unwrap();
        assert!(json.get("supportEmail").is_some());
        assert!(json.get("officeAddress").is_some());
    }
}
