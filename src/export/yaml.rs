//! YAML Export functionality
//!
//! Exports one budget to YAML format for human-readable backup.

use std::io::Write;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::export::json::BudgetExport;
use crate::models::BudgetId;
use crate::storage::Storage;

/// Export a budget to YAML format
pub fn export_budget_yaml<W: Write>(
    storage: &Storage,
    budget_id: BudgetId,
    writer: &mut W,
) -> EnvelopeResult<BudgetExport> {
    let export = BudgetExport::from_storage(storage, budget_id)?;

    let header = format!(
        "# Envelope budget export: {}\n# Generated: {}\n# App Version: {}\n#\n\
         # Keep it secure - it contains all your financial data.\n\n",
        export.budget.name, export.exported_at, export.app_version
    );
    writer
        .write_all(header.as_bytes())
        .map_err(|e| EnvelopeError::Export(e.to_string()))?;

    serde_yaml::to_writer(writer, &export).map_err(|e| EnvelopeError::Export(e.to_string()))?;

    Ok(export)
}

/// Read a YAML snapshot back
pub fn read_budget_yaml(yaml_str: &str) -> EnvelopeResult<BudgetExport> {
    let export: BudgetExport =
        serde_yaml::from_str(yaml_str).map_err(|e| EnvelopeError::Import(e.to_string()))?;

    export.validate().map_err(EnvelopeError::Import)?;

    Ok(export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{expense, Fixture};

    #[test]
    fn test_yaml_export() {
        let f = Fixture::new();
        f.post(expense(&f, f.groceries, 5000, (2025, 1, 15)).payee("Corner Market"));

        let mut output = Vec::new();
        export_budget_yaml(&f.storage, f.budget.id, &mut output).unwrap();
        let yaml = String::from_utf8(output).unwrap();

        assert!(yaml.starts_with("# Envelope budget export: Household"));
        assert!(yaml.contains("Checking"));
        assert!(yaml.contains("Groceries"));
        assert!(yaml.contains("Corner Market"));

        // Comments are ignored by the parser
        let imported = read_budget_yaml(&yaml).unwrap();
        assert_eq!(imported.transactions.len(), 1);
        assert_eq!(imported.accounts.len(), 2);
    }
}
