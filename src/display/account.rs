//! Account display formatting
//!
//! Formats accounts for terminal output in table and detail views.

use crate::models::Money;
use crate::services::{AccountSummary, ReconcileOutcome};

use super::column_width;

/// Format a list of accounts with balances as a table
pub fn format_account_list(summaries: &[AccountSummary]) -> String {
    if summaries.is_empty() {
        return "No accounts found.".to_string();
    }

    let name_width = column_width(summaries.iter().map(|s| s.account.name.as_str()), 4);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<name_width$}  {:>12}  {:>12}  {:>12}  {}\n",
        "Name", "Balance", "Cleared", "Uncleared", "Status",
    ));
    let separator = format!(
        "{:-<name_width$}  {:->12}  {:->12}  {:->12}  {:-<10}\n",
        "", "", "", "", "",
    );
    output.push_str(&separator);

    for summary in summaries {
        let account = &summary.account;
        let status = if account.archived {
            "Archived".to_string()
        } else if summary.uncleared_count > 0 {
            format!("{} pending", summary.uncleared_count)
        } else {
            String::new()
        };

        output.push_str(&format!(
            "{:<name_width$}  {:>12}  {:>12}  {:>12}  {}\n",
            account.name,
            account.balance,
            account.cleared_balance,
            account.uncleared_balance(),
            status,
        ));
    }

    let total_balance: Money = summaries.iter().map(|s| s.account.balance).sum();
    let total_cleared: Money = summaries.iter().map(|s| s.account.cleared_balance).sum();

    output.push_str(&separator);
    output.push_str(&format!(
        "{:<name_width$}  {:>12}  {:>12}  {:>12}\n",
        "TOTAL",
        total_balance,
        total_cleared,
        total_balance - total_cleared,
    ));

    output
}

/// Format a single account's details
pub fn format_account_details(summary: &AccountSummary) -> String {
    let account = &summary.account;

    let mut output = String::new();

    output.push_str(&format!("Account: {}\n", account.name));
    output.push_str(&format!("  ID:             {}\n", account.id));
    output.push_str(&format!(
        "  Archived:       {}\n",
        if account.archived { "Yes" } else { "No" }
    ));
    output.push('\n');
    output.push_str(&format!("  Current Balance:   {}\n", account.balance));
    output.push_str(&format!("  Cleared Balance:   {}\n", account.cleared_balance));
    output.push_str(&format!(
        "  Uncleared Balance: {}\n",
        account.uncleared_balance()
    ));
    output.push_str(&format!(
        "  Transactions:      {} ({} uncleared)\n",
        summary.transaction_count, summary.uncleared_count
    ));

    if let Some(date) = account.last_reconciled_date {
        output.push('\n');
        output.push_str(&format!("  Last Reconciled:   {}\n", date));
        if let Some(balance) = account.last_reconciled_balance {
            output.push_str(&format!("  Reconciled Balance: {}\n", balance));
        }
    }

    if !account.notes.is_empty() {
        output.push('\n');
        output.push_str(&format!("  Notes: {}\n", account.notes));
    }

    output.push('\n');
    output.push_str(&format!(
        "  Created:  {}\n",
        account.created_at.format("%Y-%m-%d %H:%M UTC")
    ));
    output.push_str(&format!(
        "  Modified: {}\n",
        account.updated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    output
}

/// Format the result of comparing an account with a bank statement
pub fn format_reconcile_outcome(outcome: &ReconcileOutcome) -> String {
    let mut output = String::new();
    output.push_str(&format!("Reconciling: {}\n", outcome.account.name));
    output.push_str(&format!("  Statement Balance: {:>12}\n", outcome.statement_balance));
    output.push_str(&format!(
        "  Cleared Balance:   {:>12}\n",
        outcome.account.cleared_balance
    ));
    output.push_str(&format!("  Difference:        {:>12}\n", outcome.difference));
    output.push('\n');

    if outcome.is_reconciled() {
        output.push_str("Account reconciled.\n");
    } else {
        output.push_str(
            "Balances differ. Clear the missing transactions or add the ones not yet entered, then try again.\n",
        );
    }

    output
}
