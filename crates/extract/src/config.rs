use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Built-in model lists used when configuration leaves them blank,
/// cheapest first.
pub const DEFAULT_OCR_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o"];
pub const DEFAULT_STATEMENT_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("No provider configured; set [provider], or both [ocr_provider] and [statement_provider]")]
    MissingProvider,
    #[error("Composite mode needs both [ocr_provider] and [statement_provider]")]
    IncompleteComposite,
}

/// One vendor endpoint plus its model lists. Model lists are comma-separated
/// strings so they read naturally in TOML; blank means the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub ocr_models: String,
    pub statement_models: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            ocr_models: String::new(),
            statement_models: String::new(),
        }
    }
}

impl ProviderSettings {
    pub fn ocr_model_list(&self) -> Vec<String> {
        let models = split_models(&self.ocr_models);
        if models.is_empty() {
            DEFAULT_OCR_MODELS.iter().map(|m| m.to_string()).collect()
        } else {
            models
        }
    }

    pub fn statement_model_list(&self) -> Vec<String> {
        let models = split_models(&self.statement_models);
        if models.is_empty() {
            DEFAULT_STATEMENT_MODELS
                .iter()
                .map(|m| m.to_string())
                .collect()
        } else {
            models
        }
    }
}

/// Comma-split, trimmed, empties dropped.
pub fn split_models(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// Provider selection: either one `[provider]` serving both stages, or an
/// `[ocr_provider]`/`[statement_provider]` pair for composite mode.
/// `[provider]` wins when both styles are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub provider: Option<ProviderSettings>,
    pub ocr_provider: Option<ProviderSettings>,
    pub statement_provider: Option<ProviderSettings>,
}

#[derive(Debug)]
pub enum ProviderMode<'a> {
    Single(&'a ProviderSettings),
    Composite {
        ocr: &'a ProviderSettings,
        statement: &'a ProviderSettings,
    },
}

impl ExtractionSettings {
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn mode(&self) -> Result<ProviderMode<'_>, ConfigError> {
        match (&self.provider, &self.ocr_provider, &self.statement_provider) {
            (Some(single), _, _) => Ok(ProviderMode::Single(single)),
            (None, Some(ocr), Some(statement)) => Ok(ProviderMode::Composite { ocr, statement }),
            (None, None, None) => Err(ConfigError::MissingProvider),
            _ => Err(ConfigError::IncompleteComposite),
        }
    }
}
