//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the service layer.

pub mod account;
pub mod audit;
pub mod budget;
pub mod category;
pub mod export;
pub mod import;
pub mod integrity;
pub mod transaction;
pub mod transfer;

pub use account::{handle_account_command, AccountCommands};
pub use audit::{handle_audit_command, AuditArgs};
pub use budget::{handle_budget_command, BudgetCommands};
pub use category::{handle_category_command, CategoryCommands};
pub use export::{handle_export_command, ExportArgs};
pub use import::{handle_import_command, ImportArgs};
pub use integrity::handle_check_command;
pub use transaction::{handle_transaction_command, TransactionCommands};
pub use transfer::{handle_transfer_command, TransferCommands};

use chrono::NaiveDate;

use crate::config::Settings;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{Budget, Money, MonthKey};
use crate::services::BudgetService;
use crate::storage::Storage;

/// The budget a command works on: `--budget` if given, else the active one
pub(crate) fn resolve_budget(
    storage: &Storage,
    settings: &Settings,
    explicit: Option<&str>,
) -> EnvelopeResult<Budget> {
    BudgetService::new(storage).resolve(settings, explicit)
}

pub(crate) fn parse_money(input: &str) -> EnvelopeResult<Money> {
    Money::parse(input).map_err(|e| {
        EnvelopeError::Validation(format!(
            "Invalid amount '{}'. Use a format like '50.00' or '-50'. {}",
            input, e
        ))
    })
}

/// Parse `YYYY-MM-DD`, `today` or `yesterday`; `None` means today
pub(crate) fn parse_date(input: Option<&str>) -> EnvelopeResult<NaiveDate> {
    let today = chrono::Local::now().date_naive();
    let Some(input) = input else {
        return Ok(today);
    };

    match input.trim().to_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => today
            .pred_opt()
            .ok_or_else(|| EnvelopeError::Validation("Date out of range".into())),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").map_err(|_| {
            EnvelopeError::Validation(format!(
                "Invalid date '{}'. Use YYYY-MM-DD.",
                input
            ))
        }),
    }
}

/// Parse a month argument; `None` means the current month
pub(crate) fn parse_month(input: Option<&str>) -> EnvelopeResult<MonthKey> {
    match input {
        None => Ok(MonthKey::current()),
        Some(s) => MonthKey::resolve(s, chrono::Local::now().date_naive())
            .map_err(|e| EnvelopeError::Validation(e.to_string())),
    }
}

/// Render an amount with the configured currency symbol
pub(crate) fn money(settings: &Settings, amount: Money) -> String {
    amount.format_with_symbol(&settings.currency_symbol)
}
