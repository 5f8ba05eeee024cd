//! Budget snapshot export
//!
//! A snapshot holds one budget with its accounts, categories and
//! transactions plus a little metadata:
//! - JSON: for machine-readable backups
//! - YAML: for human-readable backups

pub mod json;
pub mod yaml;

pub use json::{export_budget_json, read_budget_json, BudgetExport, EXPORT_SCHEMA_VERSION};
pub use yaml::{export_budget_yaml, read_budget_yaml};

/// Snapshot formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Yaml,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Guess the format from a file extension
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::parse)
    }
}
