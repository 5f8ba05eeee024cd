//! Write-ahead journal for multi-file commits
//!
//! Before any data file changes, the complete new contents of every touched
//! file are written to `data/journal.json`. If the process dies while the
//! data files are being replaced, the next load finds the journal and rolls
//! the commit forward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::paths::EnvelopePaths;
use crate::error::EnvelopeResult;

use super::file_io::{read_json_required, remove_if_exists, temp_path, write_json_atomic};

/// New contents for one data file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// File name under `data/`
    pub file: String,
    pub contents: Value,
}

/// A commit in flight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    pub started_at: DateTime<Utc>,
    pub entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn new(entries: Vec<JournalEntry>) -> Self {
        Self {
            started_at: Utc::now(),
            entries,
        }
    }

    /// Make the journal durable; after this returns the commit will happen
    pub fn write(&self, paths: &EnvelopePaths) -> EnvelopeResult<()> {
        write_json_atomic(paths.journal_file(), self)
    }

    /// Write every entry to its data file
    pub fn apply(&self, paths: &EnvelopePaths) -> EnvelopeResult<()> {
        for entry in &self.entries {
            let path = paths.data_file_checked(&entry.file)?;
            write_json_atomic(path, &entry.contents)?;
        }
        Ok(())
    }

    /// Remove the journal once every data file has been written
    pub fn clear(paths: &EnvelopePaths) -> EnvelopeResult<()> {
        remove_if_exists(paths.journal_file())?;
        Ok(())
    }

    /// Roll forward a commit interrupted by a crash
    ///
    /// Returns `true` when a journal was found and applied.
    pub fn recover(paths: &EnvelopePaths) -> EnvelopeResult<bool> {
        // A temp file means the journal itself never became durable
        let partial = temp_path(&paths.journal_file());
        if remove_if_exists(&partial)? {
            tracing::warn!(path = %partial.display(), "discarded incomplete commit journal");
        }

        if !paths.journal_file().exists() {
            return Ok(false);
        }

        let journal: Journal = read_json_required(paths.journal_file())?;
        tracing::warn!(
            started_at = %journal.started_at,
            files = journal.entries.len(),
            "replaying interrupted commit"
        );
        journal.apply(paths)?;
        Self::clear(paths)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use serde_json::json;
    use tempfile::TempDir;

    fn paths() -> (TempDir, EnvelopePaths) {
        let temp_dir = TempDir::new().unwrap();
        let paths = EnvelopePaths::with_base_dir(temp_dir.path().to_path_buf());
        paths.ensure_directories().unwrap();
        (temp_dir, paths)
    }

    #[test]
    fn test_recover_without_journal() {
        let (_temp, paths) = paths();
        assert!(!Journal::recover(&paths).unwrap());
    }

    #[test]
    fn test_recover_applies_and_clears() {
        let (_temp, paths) = paths();
        fs::write(paths.accounts_file(), r#"{"accounts": []}"#).unwrap();

        let journal = Journal::new(vec![JournalEntry {
            file: "accounts.json".into(),
            contents: json!({"accounts": [{"name": "from journal"}]}),
        }]);
        journal.write(&paths).unwrap();

        assert!(Journal::recover(&paths).unwrap());
        assert!(!paths.journal_file().exists());

        let on_disk: Value =
            serde_json::from_str(&fs::read_to_string(paths.accounts_file()).unwrap()).unwrap();
        assert_eq!(on_disk["accounts"][0]["name"], "from journal");
    }

    #[test]
    fn test_recover_rejects_unknown_files() {
        let (_temp, paths) = paths();
        let journal = Journal::new(vec![JournalEntry {
            file: "../config.json".into(),
            contents: json!({}),
        }]);
        journal.write(&paths).unwrap();

        assert!(Journal::recover(&paths).is_err());
        assert!(!paths.settings_file().exists());
    }

    #[test]
    fn test_partial_journal_is_discarded() {
        let (_temp, paths) = paths();
        let partial = paths.journal_file().with_extension("json.tmp");
        fs::write(&partial, "{\"entries\": [").unwrap();

        assert!(!Journal::recover(&paths).unwrap());
        assert!(!partial.exists());
    }
}
