//! JSON Export functionality
//!
//! Exports one budget to JSON format with schema versioning.

use std::collections::HashSet;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{Account, Budget, BudgetId, Category, Transaction};
use crate::storage::Storage;

/// Current export schema version
pub const EXPORT_SCHEMA_VERSION: &str = "1.0.0";

/// Snapshot of one budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetExport {
    /// Schema version for compatibility checking
    pub schema_version: String,

    pub exported_at: DateTime<Utc>,

    /// Application version that created the export
    pub app_version: String,

    pub budget: Budget,
    pub accounts: Vec<Account>,
    pub categories: Vec<Category>,
    pub transactions: Vec<Transaction>,

    pub metadata: ExportMetadata,
}

/// Export metadata for reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub account_count: usize,
    pub category_count: usize,
    pub transaction_count: usize,

    /// Date range of transactions (earliest)
    pub earliest_transaction: Option<String>,

    /// Date range of transactions (latest)
    pub latest_transaction: Option<String>,
}

impl BudgetExport {
    /// Collect a budget and everything that belongs to it
    pub fn from_storage(storage: &Storage, budget_id: BudgetId) -> EnvelopeResult<Self> {
        let budget = storage
            .budgets
            .get(budget_id)?
            .ok_or_else(|| EnvelopeError::budget_not_found(budget_id.to_string()))?;
        let accounts = storage.accounts.for_budget(budget_id)?;
        let categories = storage.categories.for_budget(budget_id)?;
        let transactions = storage.transactions.for_budget(budget_id)?;

        let dates = || transactions.iter().map(|t| t.date);
        let metadata = ExportMetadata {
            account_count: accounts.len(),
            category_count: categories.len(),
            transaction_count: transactions.len(),
            earliest_transaction: dates().min().map(|d| d.to_string()),
            latest_transaction: dates().max().map(|d| d.to_string()),
        };

        Ok(Self {
            schema_version: EXPORT_SCHEMA_VERSION.to_string(),
            exported_at: Utc::now(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            budget,
            accounts,
            categories,
            transactions,
            metadata,
        })
    }

    /// Check the schema version and that every reference resolves
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version != EXPORT_SCHEMA_VERSION {
            return Err(format!(
                "Schema version mismatch: expected {}, got {}",
                EXPORT_SCHEMA_VERSION, self.schema_version
            ));
        }

        let budget_id = self.budget.id;
        let account_ids: HashSet<_> = self.accounts.iter().map(|a| a.id).collect();
        let category_ids: HashSet<_> = self.categories.iter().map(|c| c.id).collect();
        let transaction_ids: HashSet<_> = self.transactions.iter().map(|t| t.id).collect();

        if let Some(a) = self.accounts.iter().find(|a| a.budget_id != budget_id) {
            return Err(format!("Account {} belongs to another budget", a.id));
        }

        for cat in &self.categories {
            if cat.budget_id != budget_id {
                return Err(format!("Category {} belongs to another budget", cat.id));
            }
            if let Some(parent) = cat.parent_id {
                if !category_ids.contains(&parent) {
                    return Err(format!(
                        "Category {} references unknown parent {}",
                        cat.id, parent
                    ));
                }
            }
        }

        for txn in &self.transactions {
            if !account_ids.contains(&txn.account_id) {
                return Err(format!(
                    "Transaction {} references unknown account {}",
                    txn.id, txn.account_id
                ));
            }
            if let Some(split) = txn.splits.iter().find(|s| !category_ids.contains(&s.category_id)) {
                return Err(format!(
                    "Transaction {} references unknown category {}",
                    txn.id, split.category_id
                ));
            }
            if let Some(other) = txn.transfer_transaction_id {
                if !transaction_ids.contains(&other) {
                    return Err(format!(
                        "Transfer {} references unknown counterpart {}",
                        txn.id, other
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Export a budget to JSON
pub fn export_budget_json<W: Write>(
    storage: &Storage,
    budget_id: BudgetId,
    writer: &mut W,
    pretty: bool,
) -> EnvelopeResult<BudgetExport> {
    let export = BudgetExport::from_storage(storage, budget_id)?;

    if pretty {
        serde_json::to_writer_pretty(writer, &export)
    } else {
        serde_json::to_writer(writer, &export)
    }
    .map_err(|e| EnvelopeError::Export(e.to_string()))?;

    Ok(export)
}

/// Read a JSON snapshot back (for verification)
pub fn read_budget_json(json_str: &str) -> EnvelopeResult<BudgetExport> {
    let export: BudgetExport =
        serde_json::from_str(json_str).map_err(|e| EnvelopeError::Import(e.to_string()))?;

    export.validate().map_err(EnvelopeError::Import)?;

    Ok(export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Money;
    use crate::services::test_support::{date, expense, Fixture};
    use crate::services::{BudgetService, TransferService};

    #[test]
    fn test_budget_export() {
        let f = Fixture::new();
        f.post(expense(&f, f.groceries, 5000, (2025, 1, 15)));
        f.post(expense(&f, f.dining, 1200, (2025, 3, 2)));
        // Another budget stays out of the snapshot
        BudgetService::new(&f.storage).create("Other", false).unwrap();

        let export = BudgetExport::from_storage(&f.storage, f.budget.id).unwrap();

        assert_eq!(export.schema_version, EXPORT_SCHEMA_VERSION);
        assert_eq!(export.budget.name, "Household");
        assert_eq!(export.accounts.len(), 2);
        assert_eq!(export.transactions.len(), 2);
        assert_eq!(export.metadata.category_count, export.categories.len());
        assert_eq!(export.metadata.earliest_transaction.as_deref(), Some("2025-01-15"));
        assert_eq!(export.metadata.latest_transaction.as_deref(), Some("2025-03-02"));
        assert!(export.validate().is_ok());
    }

    #[test]
    fn test_json_read_back() {
        let f = Fixture::new();
        TransferService::new(&f.storage)
            .create_transfer(
                f.budget.id,
                f.checking,
                f.savings,
                Money::from_cents(100),
                date(2025, 1, 1),
                "",
            )
            .unwrap();

        let mut output = Vec::new();
        export_budget_json(&f.storage, f.budget.id, &mut output, true).unwrap();
        let imported = read_budget_json(&String::from_utf8(output).unwrap()).unwrap();

        assert_eq!(imported.budget.id, f.budget.id);
        assert_eq!(imported.accounts[0].name, "Checking");
        assert_eq!(imported.transactions.len(), 2);
    }

    #[test]
    fn test_validate_rejects_dangling_references() {
        let f = Fixture::new();
        f.post(expense(&f, f.groceries, 100, (2025, 1, 1)));
        let mut export = BudgetExport::from_storage(&f.storage, f.budget.id).unwrap();
        export.accounts.clear();
        assert!(export.validate().is_err());

        let mut export = BudgetExport::from_storage(&f.storage, f.budget.id).unwrap();
        export.schema_version = "0.1".into();
        assert!(export.validate().is_err());
    }
}
