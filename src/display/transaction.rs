//! Transaction display formatting
//!
//! Register rows and the detail view of a single transaction.

use crate::models::Transaction;

use super::{truncate, NameLookup};

/// Format a single transaction as a register row
pub fn format_transaction_row(txn: &Transaction, names: &NameLookup) -> String {
    let status = if txn.cleared { "C" } else { " " };

    let category = if txn.is_transfer() {
        "(transfer)".to_string()
    } else if txn.splits.len() > 1 {
        format!("Split [{}]", txn.splits.len())
    } else {
        txn.splits
            .first()
            .map(|s| names.category(s.category_id))
            .unwrap_or_default()
    };

    let payee = if txn.payee.is_empty() {
        "(no payee)"
    } else {
        txn.payee.as_str()
    };

    format!(
        "{} {}  {:<12}  {:<20}  {:<24}  {:>12}  {}",
        status,
        txn.date.format("%Y-%m-%d"),
        truncate(&txn.id.to_string(), 12),
        truncate(payee, 20),
        truncate(&category, 24),
        txn.amount,
        truncate(&names.account(txn.account_id), 16),
    )
}

/// Format a list of transactions as a register
pub fn format_transaction_register(transactions: &[Transaction], names: &NameLookup) -> String {
    if transactions.is_empty() {
        return "No transactions found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{} {:<10}  {:<12}  {:<20}  {:<24}  {:>12}  {}\n",
        "C", "Date", "ID", "Payee", "Category", "Amount", "Account"
    ));
    output.push_str(&"-".repeat(108));
    output.push('\n');

    for txn in transactions {
        output.push_str(&format_transaction_row(txn, names));
        output.push('\n');
    }

    output.push_str(&format!("\n{} transaction(s)\n", transactions.len()));
    output
}

/// Format transaction details for display
pub fn format_transaction_details(txn: &Transaction, names: &NameLookup) -> String {
    let mut output = String::new();

    output.push_str(&format!("Transaction: {}\n", txn.id));
    output.push_str(&format!("Date:        {}\n", txn.date.format("%Y-%m-%d")));
    output.push_str(&format!("Account:     {}\n", names.account(txn.account_id)));
    output.push_str(&format!("Amount:      {}\n", txn.amount));
    output.push_str(&format!("Type:        {}\n", txn.kind()));

    if !txn.payee.is_empty() {
        output.push_str(&format!("Payee:       {}\n", txn.payee));
    }
    if !txn.memo.is_empty() {
        output.push_str(&format!("Memo:        {}\n", txn.memo));
    }

    output.push_str(&format!(
        "Cleared:     {}\n",
        if txn.cleared { "Yes" } else { "No" }
    ));

    if let Some(other) = txn.transfer_transaction_id {
        output.push_str(&format!("Transfer:    linked to {}\n", other));
    }
    if let Some(import_id) = &txn.import_id {
        output.push_str(&format!("Imported:    {}\n", import_id));
    }

    if !txn.splits.is_empty() {
        output.push_str("\nSplits:\n");
        for (i, split) in txn.splits.iter().enumerate() {
            let memo_part = if split.memo.is_empty() {
                String::new()
            } else {
                format!(" - {}", split.memo)
            };
            output.push_str(&format!(
                "  {}. {:>12}  {}{}\n",
                i + 1,
                split.net(),
                names.category(split.category_id),
                memo_part
            ));
        }
    }

    output
}
