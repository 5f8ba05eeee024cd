//! Append-only JSONL audit log

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::{EnvelopeError, EnvelopeResult};

use super::entry::{AuditEntry, EntityType};

/// Selects entries when reading the log back
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub entity_type: Option<EntityType>,
    /// Matches the entity id display form or the entity name (case-insensitive)
    pub entity: Option<String>,
    /// Keep only the most recent N matching entries
    pub limit: Option<usize>,
}

impl AuditFilter {
    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(kind) = self.entity_type {
            if entry.entity_type != kind {
                return false;
            }
        }

        if let Some(needle) = &self.entity {
            let needle = needle.to_lowercase();
            let id_match = entry.entity_id.to_lowercase().starts_with(&needle);
            let name_match = entry
                .entity_name
                .as_ref()
                .is_some_and(|n| n.to_lowercase() == needle);
            if !id_match && !name_match {
                return false;
            }
        }

        true
    }
}

/// Writes audit entries to the audit log file
pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    /// Append entries and flush once at the end
    pub fn log_batch(&self, entries: &[AuditEntry]) -> EnvelopeResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| EnvelopeError::Io(format!("Failed to open audit log: {}", e)))?;

        for entry in entries {
            let json = serde_json::to_string(entry).map_err(|e| {
                EnvelopeError::Json(format!("Failed to serialize audit entry: {}", e))
            })?;

            writeln!(file, "{}", json)
                .map_err(|e| EnvelopeError::Io(format!("Failed to write audit entry: {}", e)))?;
        }

        file.flush()
            .map_err(|e| EnvelopeError::Io(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }

    pub fn log(&self, entry: &AuditEntry) -> EnvelopeResult<()> {
        self.log_batch(std::slice::from_ref(entry))
    }

    /// Read all entries, oldest first
    pub fn read_all(&self) -> EnvelopeResult<Vec<AuditEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| EnvelopeError::Io(format!("Failed to open audit log: {}", e)))?;

        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                EnvelopeError::Io(format!("Failed to read audit log line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| {
                EnvelopeError::Json(format!(
                    "Failed to parse audit entry at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            entries.push(entry);
        }

        Ok(entries)
    }

    /// Read matching entries, oldest first
    pub fn read_filtered(&self, filter: &AuditFilter) -> EnvelopeResult<Vec<AuditEntry>> {
        let mut entries: Vec<_> = self
            .read_all()?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();

        if let Some(limit) = filter.limit {
            let start = entries.len().saturating_sub(limit);
            entries.drain(..start);
        }

        Ok(entries)
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }
}
