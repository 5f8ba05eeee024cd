//! Integrity report formatting

use crate::services::IntegrityReport;

/// Format the result of `check`, or of `check --fix` when `repaired` is set
pub fn format_integrity_report(report: &IntegrityReport, repaired: bool) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "Checked {} transaction(s).\n",
        report.transactions_checked
    ));

    if report.is_clean() {
        output.push_str("All balances are consistent.\n");
        return output;
    }

    if !report.discrepancies.is_empty() {
        let verb = if repaired { "Repaired" } else { "Found" };
        output.push_str(&format!(
            "\n{} {} balance discrepanc{}:\n",
            verb,
            report.discrepancies.len(),
            if report.discrepancies.len() == 1 { "y" } else { "ies" }
        ));
        for discrepancy in &report.discrepancies {
            output.push_str(&format!("  - {}\n", discrepancy));
        }
    }

    if !report.problems.is_empty() {
        output.push_str(&format!(
            "\n{} transaction problem(s) need manual attention:\n",
            report.problems.len()
        ));
        for problem in &report.problems {
            output.push_str(&format!("  - {}\n", problem));
        }
    }

    if !repaired && !report.discrepancies.is_empty() {
        output.push_str("\nRun 'envelope check --fix' to recalculate stored balances.\n");
    }

    output
}
