//! Account CLI commands
//!
//! Implements CLI commands for account management.

use clap::Subcommand;

use crate::config::Settings;
use crate::display::{format_account_details, format_account_list, format_reconcile_outcome};
use crate::error::EnvelopeResult;
use crate::services::AccountService;
use crate::storage::Storage;

use super::{money, parse_date, parse_money, resolve_budget};

/// Account subcommands
#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create a new account
    Create {
        /// Account name
        name: String,
        /// Starting balance (e.g., "1000.00" or "1000")
        #[arg(short = 'B', long, default_value = "0")]
        balance: String,
        /// Date of the starting balance (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<String>,
    },
    /// List all accounts
    List {
        /// Show archived accounts
        #[arg(short, long)]
        all: bool,
    },
    /// Show account details
    Show {
        /// Account name or ID
        account: String,
    },
    /// Rename an account
    Rename {
        /// Account name or ID
        account: String,
        /// New name
        name: String,
    },
    /// Archive an account
    Archive {
        /// Account name or ID
        account: String,
    },
    /// Unarchive an account
    Unarchive {
        /// Account name or ID
        account: String,
    },
    /// Delete an account that has no transactions
    Delete {
        /// Account name or ID
        account: String,
    },
    /// Compare the cleared balance with a bank statement
    Reconcile {
        /// Account name or ID
        account: String,
        /// Statement ending balance
        statement_balance: String,
        /// Statement date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<String>,
    },
}

/// Handle an account command
pub fn handle_account_command(
    storage: &Storage,
    settings: &Settings,
    budget_flag: Option<&str>,
    cmd: AccountCommands,
) -> EnvelopeResult<()> {
    let budget = resolve_budget(storage, settings, budget_flag)?;
    let service = AccountService::new(storage);

    match cmd {
        AccountCommands::Create {
            name,
            balance,
            date,
        } => {
            let starting_balance = parse_money(&balance)?;
            let date = parse_date(date.as_deref())?;
            let account = service.create(budget.id, &name, starting_balance, date)?;

            println!("Created account: {}", account.name);
            println!("  Budget: {}", budget.name);
            println!("  Starting Balance: {}", money(settings, account.balance));
            if !starting_balance.is_zero() {
                println!("  Opened: {}", settings.format_date(date));
            }
            println!("  ID: {}", account.id);
        }

        AccountCommands::List { all } => {
            let summaries = service
                .list(budget.id, all)?
                .iter()
                .map(|a| service.summary(a))
                .collect::<EnvelopeResult<Vec<_>>>()?;
            print!("{}", format_account_list(&summaries));
        }

        AccountCommands::Show { account } => {
            let found = service.find(budget.id, &account)?;
            let summary = service.summary(&found)?;
            print!("{}", format_account_details(&summary));
        }

        AccountCommands::Rename { account, name } => {
            let found = service.find(budget.id, &account)?;
            let updated = service.rename(found.id, &name)?;
            println!("Renamed account '{}' to '{}'", found.name, updated.name);
        }

        AccountCommands::Archive { account } => {
            let found = service.find(budget.id, &account)?;
            let archived = service.archive(found.id)?;
            println!("Archived account: {}", archived.name);
        }

        AccountCommands::Unarchive { account } => {
            let found = service.find(budget.id, &account)?;
            let unarchived = service.unarchive(found.id)?;
            println!("Unarchived account: {}", unarchived.name);
        }

        AccountCommands::Delete { account } => {
            let found = service.find(budget.id, &account)?;
            let deleted = service.delete(found.id)?;
            println!("Deleted account: {}", deleted.name);
        }

        AccountCommands::Reconcile {
            account,
            statement_balance,
            date,
        } => {
            let found = service.find(budget.id, &account)?;
            let statement_balance = parse_money(&statement_balance)?;
            let date = parse_date(date.as_deref())?;

            let outcome = service.reconcile(found.id, statement_balance, date)?;
            print!("{}", format_reconcile_outcome(&outcome));
            if outcome.is_reconciled() {
                println!("Reconciled as of {}.", settings.format_date(date));
            }
        }
    }

    Ok(())
}
