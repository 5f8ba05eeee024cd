//! Transaction CLI commands
//!
//! Implements CLI commands for transaction management.

use chrono::NaiveDate;
use clap::Subcommand;

use crate::config::Settings;
use crate::display::{format_transaction_details, format_transaction_register, NameLookup};
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{BudgetId, CategorySplit, Money, SystemCategory};
use crate::services::{
    AccountService, CategoryService, NewTransaction, TransactionFilter, TransactionService,
    TransactionUpdate,
};
use crate::storage::Storage;

use super::{money, parse_date, parse_money, parse_month, resolve_budget};

/// Transaction subcommands
#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Add a new transaction
    Add {
        /// Account name or ID
        account: String,
        /// Amount (e.g., "-50.00" for outflow, "100.00" for inflow)
        #[arg(allow_hyphen_values = true)]
        amount: Option<String>,
        /// Category name or "Header/Child" path (defaults to Uncategorized)
        #[arg(short, long)]
        category: Option<String>,
        /// Split across categories: "CATEGORY=AMOUNT", repeatable
        #[arg(short, long = "split", conflicts_with = "category")]
        splits: Vec<String>,
        /// Payee name
        #[arg(short, long)]
        payee: Option<String>,
        /// Memo
        #[arg(short, long)]
        memo: Option<String>,
        /// Transaction date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<String>,
        /// Mark as cleared
        #[arg(long)]
        cleared: bool,
    },
    /// List transactions, newest first
    List {
        /// Filter by account name or ID
        #[arg(short, long)]
        account: Option<String>,
        /// Filter by category
        #[arg(short = 'C', long)]
        category: Option<String>,
        /// Only this month (e.g., "2025-01", "January")
        #[arg(short, long, conflicts_with_all = ["from", "to"])]
        month: Option<String>,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
        /// Include cleared transactions
        #[arg(long)]
        all: bool,
        /// Number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show transaction details
    Show {
        /// Transaction ID (or a unique prefix)
        id: String,
    },
    /// Edit a transaction
    Edit {
        /// Transaction ID (or a unique prefix)
        id: String,
        /// New amount (single-category transactions)
        #[arg(short, long, allow_hyphen_values = true)]
        amount: Option<String>,
        /// New category (single-category transactions)
        #[arg(short, long)]
        category: Option<String>,
        /// Replace all splits: "CATEGORY=AMOUNT", repeatable
        #[arg(short, long = "split", conflicts_with_all = ["amount", "category"])]
        splits: Vec<String>,
        /// New payee
        #[arg(short, long)]
        payee: Option<String>,
        /// New memo
        #[arg(short, long)]
        memo: Option<String>,
        /// New date (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<String>,
        /// Move to another account
        #[arg(long)]
        account: Option<String>,
    },
    /// Delete a transaction (both sides of a transfer)
    Delete {
        /// Transaction ID (or a unique prefix)
        id: String,
    },
    /// Mark a transaction as cleared
    Clear {
        /// Transaction ID (or a unique prefix)
        id: String,
    },
    /// Mark a transaction as not cleared
    Unclear {
        /// Transaction ID (or a unique prefix)
        id: String,
    },
}

/// Parse `--split CATEGORY=AMOUNT` arguments
fn parse_splits(
    categories: &CategoryService,
    budget_id: BudgetId,
    args: &[String],
) -> EnvelopeResult<Vec<CategorySplit>> {
    args.iter()
        .map(|arg| {
            let (category, amount) = arg.rsplit_once('=').ok_or_else(|| {
                EnvelopeError::Validation(format!(
                    "Invalid split '{}'. Use CATEGORY=AMOUNT, e.g. Groceries=-40",
                    arg
                ))
            })?;
            let category = categories.find(budget_id, category.trim())?;
            Ok(CategorySplit::new(category.id, parse_money(amount)?))
        })
        .collect()
}

fn optional_date(input: Option<&str>) -> EnvelopeResult<Option<NaiveDate>> {
    input.map(|d| parse_date(Some(d))).transpose()
}

/// Handle a transaction command
pub fn handle_transaction_command(
    storage: &Storage,
    settings: &Settings,
    budget_flag: Option<&str>,
    cmd: TransactionCommands,
) -> EnvelopeResult<()> {
    let budget = resolve_budget(storage, settings, budget_flag)?;
    let service = TransactionService::new(storage);
    let accounts = AccountService::new(storage);
    let categories = CategoryService::new(storage);

    match cmd {
        TransactionCommands::Add {
            account,
            amount,
            category,
            splits,
            payee,
            memo,
            date,
            cleared,
        } => {
            let account = accounts.find(budget.id, &account)?;
            let amount = amount.as_deref().map(parse_money).transpose()?;

            let splits = if splits.is_empty() {
                let amount = amount.ok_or_else(|| {
                    EnvelopeError::Validation("An amount or at least one --split is required".into())
                })?;
                let category = match category {
                    Some(name) => categories.find(budget.id, &name)?,
                    None => categories.system(budget.id, SystemCategory::Uncategorized)?,
                };
                vec![CategorySplit::new(category.id, amount)]
            } else {
                let splits = parse_splits(&categories, budget.id, &splits)?;
                let total: Money = splits.iter().map(|s| s.net()).sum();
                if let Some(amount) = amount.filter(|a| *a != total) {
                    return Err(EnvelopeError::Validation(format!(
                        "Splits add up to {} but the amount is {}",
                        total, amount
                    )));
                }
                splits
            };

            let date = parse_date(date.as_deref())?;
            let input = NewTransaction::new(budget.id, account.id, date, splits)
                .payee(payee.unwrap_or_default())
                .memo(memo.unwrap_or_default())
                .cleared(cleared);
            let txn = service.create(input)?;

            println!(
                "Added transaction: {} {} on {}",
                money(settings, txn.amount),
                if txn.payee.is_empty() { "(no payee)" } else { &txn.payee },
                settings.format_date(txn.date)
            );
            println!("  ID: {}", txn.id);
        }

        TransactionCommands::List {
            account,
            category,
            month,
            from,
            to,
            all,
            limit,
        } => {
            let mut filter = TransactionFilter::new()
                .budget(budget.id)
                .include_cleared(all)
                .limit(limit);
            if let Some(account) = account {
                filter = filter.account(accounts.find(budget.id, &account)?.id);
            }
            if let Some(category) = category {
                filter = filter.category(categories.find(budget.id, &category)?.id);
            }
            if month.is_some() {
                filter = filter.month(parse_month(month.as_deref())?);
            } else {
                filter.start_date = optional_date(from.as_deref())?;
                filter.end_date = optional_date(to.as_deref())?;
            }

            let txns = service.list(&filter)?;
            let names = NameLookup::for_budget(storage, budget.id)?;
            print!("{}", format_transaction_register(&txns, &names));
            if !all {
                println!("Cleared transactions are hidden; use --all to include them.");
            }
        }

        TransactionCommands::Show { id } => {
            let txn = service.find(budget.id, &id)?;
            let names = NameLookup::for_budget(storage, budget.id)?;
            print!("{}", format_transaction_details(&txn, &names));
        }

        TransactionCommands::Edit {
            id,
            amount,
            category,
            splits,
            payee,
            memo,
            date,
            account,
        } => {
            let txn = service.find(budget.id, &id)?;
            let mut update = TransactionUpdate {
                date: optional_date(date.as_deref())?,
                payee,
                memo,
                account_id: account
                    .map(|a| accounts.find(budget.id, &a).map(|a| a.id))
                    .transpose()?,
                ..Default::default()
            };

            if !splits.is_empty() {
                update.splits = Some(parse_splits(&categories, budget.id, &splits)?);
            } else if amount.is_some() || category.is_some() {
                let [split] = txn.splits.as_slice() else {
                    return Err(EnvelopeError::Validation(
                        "This transaction has several splits (or is a transfer); use --split"
                            .into(),
                    ));
                };
                let category_id = match category {
                    Some(name) => categories.find(budget.id, &name)?.id,
                    None => split.category_id,
                };
                let amount = match amount {
                    Some(a) => parse_money(&a)?,
                    None => split.net(),
                };
                update.splits =
                    Some(vec![CategorySplit::new(category_id, amount).with_memo(split.memo.clone())]);
            }

            let updated = service.update(txn.id, update)?;
            println!("Updated transaction: {}", updated.id);
            println!("  Amount: {}", money(settings, updated.amount));
            println!("  Date:   {}", settings.format_date(updated.date));
        }

        TransactionCommands::Delete { id } => {
            let txn = service.find(budget.id, &id)?;
            let removed = service.delete(txn.id)?;
            for txn in &removed {
                println!(
                    "Deleted transaction: {} {} ({})",
                    txn.id,
                    money(settings, txn.amount),
                    txn.payee
                );
            }
        }

        TransactionCommands::Clear { id } => {
            let txn = service.find(budget.id, &id)?;
            let updated = service.set_cleared(txn.id, true)?;
            println!("Cleared transaction: {}", updated.id);
        }

        TransactionCommands::Unclear { id } => {
            let txn = service.find(budget.id, &id)?;
            let updated = service.set_cleared(txn.id, false)?;
            println!("Marked transaction as not cleared: {}", updated.id);
        }
    }

    Ok(())
}
