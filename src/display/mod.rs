//! Display formatting for terminal output
//!
//! Formats budgets, accounts, categories and transactions as plain-text
//! tables and detail views. Every formatter returns a `String`; printing is
//! left to the command handlers.

pub mod account;
pub mod budget;
pub mod category;
pub mod import;
pub mod integrity;
pub mod transaction;

use std::collections::HashMap;

use crate::error::EnvelopeResult;
use crate::models::{AccountId, BudgetId, CategoryId};
use crate::storage::Storage;

pub use account::{format_account_details, format_account_list, format_reconcile_outcome};
pub use budget::{format_budget_list, format_budget_overview};
pub use category::format_category_tree;
pub use import::{format_import_outcome, format_import_preview};
pub use integrity::format_integrity_report;
pub use transaction::{format_transaction_details, format_transaction_register};

/// Account and category names of one budget, for views that only hold ids
#[derive(Debug, Default, Clone)]
pub struct NameLookup {
    accounts: HashMap<AccountId, String>,
    categories: HashMap<CategoryId, String>,
}

impl NameLookup {
    pub fn for_budget(storage: &Storage, budget_id: BudgetId) -> EnvelopeResult<Self> {
        let accounts = storage
            .accounts
            .for_budget(budget_id)?
            .into_iter()
            .map(|a| (a.id, a.name))
            .collect();

        let categories = storage.categories.for_budget(budget_id)?;
        let headers: HashMap<CategoryId, String> = categories
            .iter()
            .filter(|c| c.is_header())
            .map(|c| (c.id, c.name.clone()))
            .collect();
        let categories = categories
            .into_iter()
            .map(|c| {
                let name = match c.parent_id.and_then(|p| headers.get(&p)) {
                    Some(header) => format!("{}/{}", header, c.name),
                    None => c.name,
                };
                (c.id, name)
            })
            .collect();

        Ok(Self {
            accounts,
            categories,
        })
    }

    pub fn account(&self, id: AccountId) -> String {
        self.accounts
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    pub fn category(&self, id: CategoryId) -> String {
        self.categories
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }
}

/// Cut a string to `max` characters, marking the cut with `...`
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else if max <= 3 {
        s.chars().take(max).collect()
    } else {
        let mut out: String = s.chars().take(max - 3).collect();
        out.push_str("...");
        out
    }
}

/// Width of the widest entry, never narrower than `min`
pub(crate) fn column_width<'a>(values: impl Iterator<Item = &'a str>, min: usize) -> usize {
    values.map(|v| v.chars().count()).max().unwrap_or(min).max(min)
}
