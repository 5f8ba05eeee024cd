//! CLI command for verifying and repairing stored balances

use crate::config::Settings;
use crate::display::format_integrity_report;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::services::IntegrityService;
use crate::storage::Storage;

use super::resolve_budget;

/// Handle `check [--fix]`
///
/// Fails when problems remain so scripts can tell a clean budget apart.
pub fn handle_check_command(
    storage: &Storage,
    settings: &Settings,
    budget_flag: Option<&str>,
    fix: bool,
) -> EnvelopeResult<()> {
    let budget = resolve_budget(storage, settings, budget_flag)?;
    let service = IntegrityService::new(storage);

    println!("Checking budget '{}'", budget.name);
    let report = if fix {
        service.recalculate(budget.id)?
    } else {
        service.verify(budget.id)?
    };
    print!("{}", format_integrity_report(&report, fix));

    let unresolved = if fix {
        report.problems.len()
    } else {
        report.discrepancies.len() + report.problems.len()
    };
    if unresolved > 0 {
        return Err(EnvelopeError::Integrity(format!(
            "{} issue(s) in budget '{}'",
            unresolved, budget.name
        )));
    }

    Ok(())
}
