//! Settings service
//!
//! Site settings are JSON documents stored per key. The `general` document
//! drives the public site's title, description and contact details.

use anyhow::Context;
use std::sync::Arc;
use thiserror::Error;

use crate::db::repositories::SettingsRepository;
use crate::models::{GeneralSettings, SiteSetting, GENERAL_SETTINGS_KEY};

/// Settings service errors
#[derive(Debug, Error)]
pub enum SettingsServiceError {
    #[error("Invalid setting key: {0}")]
    InvalidKey(String),

    #[error("Invalid setting value: {0}")]
    InvalidValue(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Keys are short identifiers: ASCII letters, digits, `_`, `-` and `.`
fn validate_key(key: &str) -> Result<(), SettingsServiceError> {
    let valid = !key.is_empty()
        && key.len() <= 64
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(SettingsServiceError::InvalidKey(key.to_string()))
    }
}

/// Settings service for managing site configuration
pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
}

impl SettingsService {
    pub fn new(repo: Arc<dyn SettingsRepository>) -> Self {
        Self { repo }
    }

    /// Stored document for `key`, if any
    pub async fn get(&self, key: &str) -> Result<Option<SiteSetting>, SettingsServiceError> {
        validate_key(key)?;
        Ok(self
            .repo
            .get(key)
            .await
            .with_context(|| format!("Failed to load setting '{}'", key))?)
    }

    /// Replace the document stored under `key`
    pub async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<SiteSetting, SettingsServiceError> {
        validate_key(key)?;
        if key == GENERAL_SETTINGS_KEY && !value.is_object() {
            return Err(SettingsServiceError::InvalidValue(
                "general settings must be a JSON object".to_string(),
            ));
        }
        let saved = self
            .repo
            .upsert(key, &value)
            .await
            .with_context(|| format!("Failed to save setting '{}'", key))?;
        tracing::info!("Setting '{}' updated", key);
        Ok(saved)
    }

    /// The general settings with defaults for anything not stored
    pub async fn general(&self) -> Result<GeneralSettings, SettingsServiceError> {
        Ok(self
            .get(GENERAL_SETTINGS_KEY)
            .await?
            .map(|s| GeneralSettings::from_value(&s.value))
            .unwrap_or_default())
    }

    pub async fn save_general(
        &self,
        settings: &GeneralSettings,
    ) -> Result<GeneralSettings, SettingsServiceError> {
        let value = serde_json::to_value(settings).context("Failed to encode general settings")?;
        self.put(GENERAL_SETTINGS_KEY, value).await?;
        Ok(settings.clone())
    }
}
