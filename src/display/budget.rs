//! Budget display formatting
//!
//! The budget list and the monthly planned-vs-actual overview.

use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Style};
use tabled::{Table, Tabled};

use crate::models::{Budget, BudgetId};
use crate::services::{BudgetOverview, OverviewRow};

use super::column_width;

#[derive(Tabled)]
struct OverviewLine {
    #[tabled(rename = "Category")]
    name: String,
    #[tabled(rename = "Planned")]
    planned: String,
    #[tabled(rename = "Actual")]
    actual: String,
    #[tabled(rename = "Balance")]
    balance: String,
}

impl From<&OverviewRow> for OverviewLine {
    fn from(row: &OverviewRow) -> Self {
        let name = if row.is_header || row.category.is_system() {
            row.category.name.clone()
        } else {
            format!("  {}", row.category.name)
        };
        Self {
            name,
            planned: row.planned.to_string(),
            actual: row.actual.to_string(),
            balance: row.balance.to_string(),
        }
    }
}

/// Format all budgets, marking the active one
pub fn format_budget_list(budgets: &[Budget], active: Option<BudgetId>) -> String {
    if budgets.is_empty() {
        return "No budgets found.\n\nRun 'envelope init' or 'envelope budget create <name>'."
            .to_string();
    }

    let name_width = column_width(budgets.iter().map(|b| b.name.as_str()), 4);

    let mut output = String::new();
    output.push_str(&format!(
        "  {:<name_width$}  {:>12}  {}\n",
        "Name", "Balance", "ID"
    ));
    output.push_str(&format!("  {:-<name_width$}  {:->12}  {:-<12}\n", "", "", ""));

    for budget in budgets {
        let marker = if Some(budget.id) == active { "*" } else { " " };
        output.push_str(&format!(
            "{} {:<name_width$}  {:>12}  {}\n",
            marker, budget.name, budget.balance, budget.id
        ));
    }

    output
}

/// Format the overview of one month
pub fn format_budget_overview(overview: &BudgetOverview) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{}: {}\n\n",
        overview.budget.name,
        overview.month.long_name()
    ));

    if overview.rows.is_empty() {
        output.push_str("No spending categories.\n");
    } else {
        let mut lines: Vec<OverviewLine> = overview.rows.iter().map(OverviewLine::from).collect();
        lines.push(OverviewLine {
            name: "TOTAL".to_string(),
            planned: overview.total_planned.to_string(),
            actual: overview.total_actual.to_string(),
            balance: overview.total_balance.to_string(),
        });

        let mut table = Table::new(lines);
        table
            .with(Style::psql())
            .modify(Columns::new(1..), Alignment::right());
        output.push_str(&table.to_string());
        output.push('\n');
    }

    output.push('\n');
    output.push_str(&format!("  Income:              {:>12}\n", overview.totals.income));
    output.push_str(&format!("  Expenses:            {:>12}\n", overview.totals.expense));
    output.push_str(&format!("  Net:                 {:>12}\n", overview.totals.net()));
    output.push_str(&format!(
        "  Available to Budget: {:>12}\n",
        overview.available_to_budget
    ));

    if overview.available_to_budget.is_negative() {
        output.push_str("\nMore has been planned than received. Reduce planned amounts.\n");
    }

    output
}
