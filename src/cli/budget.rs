//! Budget CLI commands
//!
//! Budget lifecycle, the active budget, monthly planning and the overview.

use clap::Subcommand;

use crate::config::Settings;
use crate::display::{format_budget_list, format_budget_overview};
use crate::error::EnvelopeResult;
use crate::services::{BudgetService, CategoryService};
use crate::storage::Storage;

use super::{money, parse_money, parse_month, resolve_budget};

/// Budget subcommands
#[derive(Subcommand)]
pub enum BudgetCommands {
    /// Create a new budget
    Create {
        /// Budget name
        name: String,
        /// Only the built-in categories and the Income group
        #[arg(long)]
        empty: bool,
        /// Make the new budget the active one
        #[arg(long = "use")]
        make_active: bool,
    },

    /// List all budgets
    List,

    /// Make a budget the default for later commands
    Use {
        /// Budget name or ID
        budget: String,
    },

    /// Rename the selected budget
    Rename {
        /// New name
        name: String,
    },

    /// Show planned vs. actual for a month
    Show {
        /// Month (e.g., "2025-01", "202501", "January", "next"); defaults to current
        month: Option<String>,
    },

    /// Set the planned amount of a category
    Plan {
        /// Category name, "Header/Child" path or ID
        category: String,
        /// Amount (e.g., "400" or "400.00")
        amount: String,
        /// Month; defaults to current
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Move planned money between categories
    Move {
        /// Source category
        from: String,
        /// Destination category
        to: String,
        /// Amount
        amount: String,
        /// Month; defaults to current
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Start a new budget with the same categories and no money
    FreshStart {
        /// Name for the new budget (defaults to the old name and today's date)
        #[arg(short, long)]
        name: Option<String>,
    },
}

/// Handle a budget command
pub fn handle_budget_command(
    storage: &Storage,
    settings: &mut Settings,
    budget_flag: Option<&str>,
    cmd: BudgetCommands,
) -> EnvelopeResult<()> {
    let service = BudgetService::new(storage);

    match cmd {
        BudgetCommands::Create {
            name,
            empty,
            make_active,
        } => {
            let created = service.create(&name, !empty)?;
            println!("Created budget: {}", created.name);
            println!("  ID: {}", created.id);

            if make_active || settings.active_budget.is_none() {
                service.set_active(settings, created.id)?;
                println!("  Now the active budget.");
            }
        }

        BudgetCommands::List => {
            let budgets = service.list()?;
            print!("{}", format_budget_list(&budgets, settings.active_budget));
        }

        BudgetCommands::Use { budget } => {
            let found = service.find(&budget)?;
            service.set_active(settings, found.id)?;
            println!("Active budget: {}", found.name);
        }

        BudgetCommands::Rename { name } => {
            let target = resolve_budget(storage, settings, budget_flag)?;
            let old_name = target.name.clone();
            let renamed = service.rename(target.id, &name)?;
            println!("Renamed budget '{}' to '{}'", old_name, renamed.name);
        }

        BudgetCommands::Show { month } => {
            let target = resolve_budget(storage, settings, budget_flag)?;
            let month = parse_month(month.as_deref())?;
            let overview = service.overview(target.id, month)?;
            print!("{}", format_budget_overview(&overview));
        }

        BudgetCommands::Plan {
            category,
            amount,
            month,
        } => {
            let target = resolve_budget(storage, settings, budget_flag)?;
            let category = CategoryService::new(storage).find(target.id, &category)?;
            let amount = parse_money(&amount)?;
            let month = parse_month(month.as_deref())?;

            let (updated, previous) = service.plan(target.id, category.id, month, amount)?;
            println!(
                "Planned {} for {} in {} (was {})",
                money(settings, amount),
                updated.name,
                month,
                money(settings, previous)
            );
            println!("  Envelope balance: {}", money(settings, updated.balance));
        }

        BudgetCommands::Move {
            from,
            to,
            amount,
            month,
        } => {
            let target = resolve_budget(storage, settings, budget_flag)?;
            let categories = CategoryService::new(storage);
            let from = categories.find(target.id, &from)?;
            let to = categories.find(target.id, &to)?;
            let amount = parse_money(&amount)?;
            let month = parse_month(month.as_deref())?;

            let (source, dest) = service.move_planned(target.id, from.id, to.id, month, amount)?;
            println!(
                "Moved {} from {} to {} in {}",
                money(settings, amount),
                source.name,
                dest.name,
                month
            );
            println!(
                "  {} planned: {}",
                source.name,
                money(settings, source.allocation(month).planned)
            );
            println!(
                "  {} planned: {}",
                dest.name,
                money(settings, dest.allocation(month).planned)
            );
        }

        BudgetCommands::FreshStart { name } => {
            let source = resolve_budget(storage, settings, budget_flag)?;
            let created = service.fresh_start(settings, source.id, name.as_deref())?;
            println!("Created budget '{}' from '{}'", created.name, source.name);
            println!("Categories were copied; accounts and transactions start empty.");
            println!("'{}' is now the active budget.", created.name);
        }
    }

    Ok(())
}
