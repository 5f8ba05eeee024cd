//! CLI commands for account transfers
//!
//! A transfer is a linked pair of transactions: an outflow from one account
//! and a matching inflow into another. Budget totals are not affected.

use clap::Subcommand;

use crate::config::Settings;
use crate::error::EnvelopeResult;
use crate::models::Transaction;
use crate::services::{AccountService, TransactionService, TransferService};
use crate::storage::Storage;

use super::{money, parse_date, parse_money, resolve_budget};

/// Transfer subcommands
#[derive(Subcommand)]
pub enum TransferCommands {
    /// Move money from one account to another
    Create {
        /// Source account name or ID
        from: String,
        /// Destination account name or ID
        to: String,
        /// Amount to move (positive)
        amount: String,
        /// Transfer date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<String>,
        /// Memo
        #[arg(short, long)]
        memo: Option<String>,
    },
    /// Change the amount, date or memo of a transfer (either side)
    Edit {
        /// Transaction ID of either side
        id: String,
        /// New amount (positive)
        #[arg(short, long)]
        amount: Option<String>,
        /// New date (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<String>,
        /// New memo
        #[arg(short, long)]
        memo: Option<String>,
    },
}

fn print_legs(settings: &Settings, outgoing: &Transaction, incoming: &Transaction) {
    println!(
        "  {}  {:>12}  {}",
        outgoing.id,
        money(settings, outgoing.amount),
        outgoing.payee
    );
    println!(
        "  {}  {:>12}  {}",
        incoming.id,
        money(settings, incoming.amount),
        incoming.payee
    );
}

/// Handle a transfer command
pub fn handle_transfer_command(
    storage: &Storage,
    settings: &Settings,
    budget_flag: Option<&str>,
    cmd: TransferCommands,
) -> EnvelopeResult<()> {
    let budget = resolve_budget(storage, settings, budget_flag)?;
    let service = TransferService::new(storage);

    match cmd {
        TransferCommands::Create {
            from,
            to,
            amount,
            date,
            memo,
        } => {
            let accounts = AccountService::new(storage);
            let from = accounts.find(budget.id, &from)?;
            let to = accounts.find(budget.id, &to)?;
            let amount = parse_money(&amount)?;
            let date = parse_date(date.as_deref())?;

            let (outgoing, incoming) = service.create_transfer(
                budget.id,
                from.id,
                to.id,
                amount,
                date,
                memo.as_deref().unwrap_or_default(),
            )?;

            println!(
                "Transferred {} from {} to {} on {}",
                money(settings, amount),
                from.name,
                to.name,
                settings.format_date(date)
            );
            print_legs(settings, &outgoing, &incoming);
        }

        TransferCommands::Edit {
            id,
            amount,
            date,
            memo,
        } => {
            let txn = TransactionService::new(storage).find(budget.id, &id)?;
            let amount = amount.as_deref().map(parse_money).transpose()?;
            let date = date.map(|d| parse_date(Some(&d))).transpose()?;

            let (first, second) = service.update_transfer(txn.id, amount, date, memo.as_deref())?;
            println!("Updated transfer:");
            print_legs(settings, &first, &second);
        }
    }

    Ok(())
}
