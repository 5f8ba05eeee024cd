//! Import preview and result formatting

use crate::services::{ImportOutcome, ImportRow, RowStatus};

use super::truncate;

/// Format what an import would do, row by row
pub fn format_import_preview(rows: &[ImportRow]) -> String {
    if rows.is_empty() {
        return "No rows found in file.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:>5}  {:<10}  {:<24}  {:>12}  {}\n",
        "Row", "Date", "Payee", "Amount", "Status"
    ));
    output.push_str(&"-".repeat(72));
    output.push('\n');

    let (mut new, mut matched, mut duplicate, mut errors) = (0, 0, 0, 0);
    for row in rows {
        let status = match &row.status {
            RowStatus::New => {
                new += 1;
                "new".to_string()
            }
            RowStatus::Matched(id) => {
                matched += 1;
                format!("matches {}", id)
            }
            RowStatus::Duplicate => {
                duplicate += 1;
                "already imported".to_string()
            }
            RowStatus::Error(message) => {
                errors += 1;
                format!("error: {}", message)
            }
        };

        match &row.parsed {
            Some(parsed) => output.push_str(&format!(
                "{:>5}  {}  {:<24}  {:>12}  {}\n",
                row.row_number,
                parsed.date.format("%Y-%m-%d"),
                truncate(&parsed.payee, 24),
                parsed.amount,
                status
            )),
            None => output.push_str(&format!(
                "{:>5}  {:<10}  {:<24}  {:>12}  {}\n",
                row.row_number, "", "", "", status
            )),
        }
    }

    output.push_str(&format!(
        "\n{} new, {} matched, {} already imported, {} error(s)\n",
        new, matched, duplicate, errors
    ));
    output
}

/// Format the summary of a completed import
pub fn format_import_outcome(outcome: &ImportOutcome) -> String {
    let mut output = String::new();
    output.push_str("Import complete:\n");
    output.push_str(&format!("  Imported:          {}\n", outcome.imported.len()));
    output.push_str(&format!("  Cleared matches:   {}\n", outcome.cleared.len()));
    output.push_str(&format!("  Already cleared:   {}\n", outcome.already_cleared));
    output.push_str(&format!("  Skipped duplicates: {}\n", outcome.duplicates));

    if !outcome.errors.is_empty() {
        output.push_str(&format!("  Errors:            {}\n", outcome.errors.len()));
        for (row, message) in &outcome.errors {
            output.push_str(&format!("    row {}: {}\n", row, message));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Money, TransactionId};
    use crate::services::ParsedRow;
    use crate::services::test_support::date;

    fn parsed(row_number: usize, payee: &str, cents: i64) -> Option<ParsedRow> {
        Some(ParsedRow {
            row_number,
            date: date(2025, 4, row_number as u32),
            amount: Money::from_cents(cents),
            payee: payee.to_string(),
            memo: String::new(),
            import_id: format!("row-{}", row_number),
        })
    }

    #[test]
    fn test_format_import_preview() {
        let rows = vec![
            ImportRow {
                row_number: 1,
                parsed: parsed(1, "Corner Market", -2599),
                status: RowStatus::New,
            },
            ImportRow {
                row_number: 2,
                parsed: parsed(2, "Employer", 150000),
                status: RowStatus::Matched(TransactionId::new()),
            },
            ImportRow {
                row_number: 3,
                parsed: None,
                status: RowStatus::Error("bad date".into()),
            },
        ];

        let output = format_import_preview(&rows);
        assert!(output.contains("2025-04-01"));
        assert!(output.contains("-$25.99"));
        assert!(output.contains("matches txn-"));
        assert!(output.contains("error: bad date"));
        assert!(output.contains("1 new, 1 matched, 0 already imported, 1 error(s)"));
    }

    #[test]
    fn test_format_import_outcome_lists_errors() {
        let outcome = ImportOutcome {
            imported: vec![TransactionId::new()],
            duplicates: 2,
            errors: vec![(7, "bad amount".into())],
            ..Default::default()
        };

        let output = format_import_outcome(&outcome);
        assert!(output.contains("Imported:          1"));
        assert!(output.contains("Skipped duplicates: 2"));
        assert!(output.contains("row 7: bad amount"));
    }
}
