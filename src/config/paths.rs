//! Path management
//!
//! ## Path Resolution Order
//!
//! 1. `ENVELOPE_BUDGET_DIR` environment variable (if set)
//! 2. `$XDG_CONFIG_HOME/envelope-budget`
//! 3. The platform config directory from `directories` (`~/.config` on
//!    Linux, `~/Library/Application Support` on macOS, `%APPDATA%` on Windows)

use std::path::{Path, PathBuf};

use directories::BaseDirs;

use crate::error::EnvelopeError;

/// Environment variable that overrides the base directory
pub const BASE_DIR_ENV: &str = "ENVELOPE_BUDGET_DIR";

const APP_DIR: &str = "envelope-budget";

/// Data files that live under `data/` and can appear in a commit journal
pub const DATA_FILES: [&str; 4] = [
    "budgets.json",
    "accounts.json",
    "categories.json",
    "transactions.json",
];

/// Manages all paths used by the application
#[derive(Debug, Clone)]
pub struct EnvelopePaths {
    base_dir: PathBuf,
}

impl EnvelopePaths {
    /// Resolve the base directory from the environment
    ///
    /// # Errors
    ///
    /// Returns an error if no configuration directory can be determined.
    pub fn new() -> Result<Self, EnvelopeError> {
        let base_dir = match std::env::var_os(BASE_DIR_ENV) {
            Some(custom) if !custom.is_empty() => PathBuf::from(custom),
            _ => resolve_default_path()?,
        };

        Ok(Self { base_dir })
    }

    /// Create EnvelopePaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding the JSON documents
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    pub fn audit_log(&self) -> PathBuf {
        self.base_dir.join("audit.log")
    }

    pub fn budgets_file(&self) -> PathBuf {
        self.data_file("budgets.json")
    }

    pub fn accounts_file(&self) -> PathBuf {
        self.data_file("accounts.json")
    }

    pub fn categories_file(&self) -> PathBuf {
        self.data_file("categories.json")
    }

    pub fn transactions_file(&self) -> PathBuf {
        self.data_file("transactions.json")
    }

    /// Write-ahead journal, present only while a commit is in flight
    pub fn journal_file(&self) -> PathBuf {
        self.data_file("journal.json")
    }

    /// Resolve a data file by name; only the known data files are accepted
    pub fn data_file_checked(&self, name: &str) -> Result<PathBuf, EnvelopeError> {
        if DATA_FILES.contains(&name) {
            Ok(self.data_file(name))
        } else {
            Err(EnvelopeError::Storage(format!(
                "Unknown data file in journal: {}",
                name
            )))
        }
    }

    fn data_file(&self, name: &str) -> PathBuf {
        self.data_dir().join(name)
    }

    /// Ensure the base and data directories exist
    pub fn ensure_directories(&self) -> Result<(), EnvelopeError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| EnvelopeError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.data_dir())
            .map_err(|e| EnvelopeError::Io(format!("Failed to create data directory: {}", e)))?;

        Ok(())
    }

    /// Initialized once `init` has written the settings file
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

fn resolve_default_path() -> Result<PathBuf, EnvelopeError> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(xdg).join(APP_DIR));
    }

    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join(APP_DIR))
        .ok_or_else(|| {
            EnvelopeError::Config(format!(
                "Could not determine a configuration directory; set {}",
                BASE_DIR_ENV
            ))
        })
}
