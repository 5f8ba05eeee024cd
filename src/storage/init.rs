//! Storage initialization
//!
//! First-run setup: directories, settings file and a starter budget.

use crate::config::Settings;
use crate::error::EnvelopeError;
use crate::models::{starter_categories, Budget};

use super::{Changeset, Storage};

/// Name of the budget created on first run
pub const DEFAULT_BUDGET_NAME: &str = "My Budget";

/// Initialize storage for a fresh installation
///
/// Creates a starter budget with the default category groups when no budget
/// exists yet and makes it active. Returns the created budget, or `None`
/// when there was already data.
pub fn initialize_storage(
    storage: &Storage,
    settings: &mut Settings,
) -> Result<Option<Budget>, EnvelopeError> {
    storage.paths().ensure_directories()?;

    let created = if storage.budgets.count()? == 0 {
        let budget = Budget::new(DEFAULT_BUDGET_NAME);
        let mut changeset = Changeset::new();
        for category in starter_categories(budget.id, true) {
            changeset.put(category);
        }
        changeset.put(budget.clone());
        storage.commit(changeset)?;

        tracing::info!(budget = %budget.id, "created starter budget");
        settings.active_budget = Some(budget.id);
        Some(budget)
    } else {
        None
    };

    settings.save(storage.paths())?;
    Ok(created)
}
