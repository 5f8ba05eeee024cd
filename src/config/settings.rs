//! User settings
//!
//! Persisted in `config.json`: the active budget and display preferences.

use serde::{Deserialize, Serialize};

use super::paths::EnvelopePaths;
use crate::error::EnvelopeError;
use crate::models::BudgetId;

/// User settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Budget used when no `--budget` is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_budget: Option<BudgetId>,

    /// Default currency symbol
    #[serde(default = "default_currency")]
    pub currency_symbol: String,

    /// Date format preference (strftime format)
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_schema_version() -> u32 {
    1
}

fn default_currency() -> String {
    "$".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            active_budget: None,
            currency_symbol: default_currency(),
            date_format: default_date_format(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or return defaults if the file doesn't exist
    pub fn load_or_create(paths: &EnvelopePaths) -> Result<Self, EnvelopeError> {
        let settings_path = paths.settings_file();

        if !settings_path.exists() {
            // Don't save yet - let caller decide when to persist
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(&settings_path)
            .map_err(|e| EnvelopeError::Io(format!("Failed to read settings file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| EnvelopeError::Config(format!("Failed to parse settings file: {}", e)))
    }

    /// Save settings to disk
    pub fn save(&self, paths: &EnvelopePaths) -> Result<(), EnvelopeError> {
        paths.ensure_directories()?;
        crate::storage::write_json_atomic(paths.settings_file(), self)
    }

    /// Set a setting by its `config` key
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), EnvelopeError> {
        match key {
            "currency_symbol" | "currency" => {
                self.currency_symbol = value.to_string();
            }
            "date_format" => {
                // Reject formats chrono can't render
                let probe = chrono::NaiveDate::from_ymd_opt(2000, 1, 31)
                    .ok_or_else(|| EnvelopeError::Config("invalid probe date".into()))?;
                let mut rendered = String::new();
                use std::fmt::Write;
                write!(rendered, "{}", probe.format(value)).map_err(|_| {
                    EnvelopeError::Config(format!("Invalid date format: {}", value))
                })?;
                self.date_format = value.to_string();
            }
            _ => {
                return Err(EnvelopeError::Config(format!(
                    "Unknown setting '{}'. Valid keys: currency_symbol, date_format",
                    key
                )))
            }
        }
        Ok(())
    }

    /// Format a date with the configured format
    pub fn format_date(&self, date: chrono::NaiveDate) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        if write!(out, "{}", date.format(&self.date_format)).is_err() {
            return date.format("%Y-%m-%d").to_string();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.schema_version, 1);
        assert_eq!(settings.currency_symbol, "$");
        assert!(settings.active_budget.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = EnvelopePaths::with_base_dir(temp_dir.path().to_path_buf());

        let budget = BudgetId::new();
        let mut settings = Settings::default();
        settings.active_budget = Some(budget);
        settings.currency_symbol = "€".into();
        settings.save(&paths).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.active_budget, Some(budget));
        assert_eq!(loaded.currency_symbol, "€");
    }

    #[test]
    fn test_set_known_and_unknown_keys() {
        let mut settings = Settings::default();
        settings.set("date_format", "%d/%m/%Y").unwrap();
        assert_eq!(
            settings.format_date(chrono::NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()),
            "09/03/2025"
        );

        assert!(settings.set("date_format", "%Q").is_err());
        assert!(settings.set("colour", "blue").is_err());
    }
}
