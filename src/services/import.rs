//! CSV Import service
//!
//! Reads bank statement CSV files, matches the rows against transactions
//! already entered for the account and imports the rest, including column
//! mapping, date parsing and duplicate detection.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, Utc};
use csv::{ReaderBuilder, StringRecord};

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{
    import_key, Account, AccountId, CategorySplit, Money, SystemCategory, Transaction,
    TransactionId,
};
use crate::storage::{Changeset, Storage};

use super::category::CategoryService;
use super::posting::{current, LedgerDelta};
use super::transaction::{NewTransaction, TransactionService};

/// Column mapping configuration for CSV import
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    /// Index of the date column
    pub date_column: usize,
    /// Index of the amount column (or separate inflow/outflow columns)
    pub amount_column: Option<usize>,
    /// Index of the outflow column (if using separate columns)
    pub outflow_column: Option<usize>,
    /// Index of the inflow column (if using separate columns)
    pub inflow_column: Option<usize>,
    /// Column holding DEBIT/CREDIT; the amount column is then unsigned
    pub type_column: Option<usize>,
    /// Index of the payee/description column
    pub payee_column: Option<usize>,
    /// Index of the memo/notes column
    pub memo_column: Option<usize>,
    /// Date format string (e.g., "%Y-%m-%d", "%m/%d/%Y")
    pub date_format: String,
    /// Whether the first row is a header
    pub has_header: bool,
    pub delimiter: u8,
    /// Whether to invert amounts (some banks use positive for debits)
    pub invert_amounts: bool,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            date_column: 0,
            amount_column: Some(1),
            outflow_column: None,
            inflow_column: None,
            type_column: None,
            payee_column: Some(2),
            memo_column: None,
            date_format: "%Y-%m-%d".to_string(),
            has_header: true,
            delimiter: b',',
            invert_amounts: false,
        }
    }
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapping for separate inflow/outflow columns
    pub fn separate_inout(
        date_col: usize,
        outflow_col: usize,
        inflow_col: usize,
        payee_col: usize,
    ) -> Self {
        Self {
            date_column: date_col,
            amount_column: None,
            outflow_column: Some(outflow_col),
            inflow_column: Some(inflow_col),
            payee_column: Some(payee_col),
            ..Self::default()
        }
    }

    /// Guess the mapping from a header row
    pub fn from_headers(headers: &StringRecord) -> Self {
        let mut mapping = Self {
            amount_column: None,
            payee_column: None,
            ..Self::default()
        };

        for (idx, header) in headers.iter().enumerate() {
            let h = header.trim().to_lowercase();

            if h == "type" || h.contains("trntype") || h.ends_with(" type") {
                mapping.type_column = Some(idx);
            } else if h.contains("date") || h.contains("posted") {
                mapping.date_column = idx;
            } else if (h.contains("amount") || h.contains("trnamt")) && mapping.amount_column.is_none() {
                mapping.amount_column = Some(idx);
            } else if h.contains("debit") || h.contains("outflow") || h.contains("withdrawal") {
                mapping.outflow_column = Some(idx);
            } else if h.contains("credit") || h.contains("inflow") || h.contains("deposit") {
                mapping.inflow_column = Some(idx);
            } else if h.contains("description")
                || h.contains("payee")
                || h.contains("merchant")
                || h.contains("name")
            {
                mapping.payee_column = Some(idx);
            } else if h.contains("memo") || h.contains("note") {
                mapping.memo_column = Some(idx);
            }
        }

        if mapping.outflow_column.is_some() && mapping.inflow_column.is_some() {
            mapping.amount_column = None;
        }

        mapping
    }

    pub fn with_date_format(mut self, format: &str) -> Self {
        self.date_format = format.to_string();
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_type_column(mut self, column: usize) -> Self {
        self.type_column = Some(column);
        self
    }
}

/// A statement row parsed from the CSV
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    /// Row number in the file, counting from 1 after any header
    pub row_number: usize,
    pub date: NaiveDate,
    /// Signed amount (negative for outflow)
    pub amount: Money,
    pub payee: String,
    pub memo: String,
    /// Key used to recognize the row on a later import
    pub import_id: String,
}

/// What importing a row will do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowStatus {
    /// A new cleared transaction will be created
    New,
    /// An existing transaction of the account records the same movement
    Matched(TransactionId),
    /// The row was imported before and is skipped
    Duplicate,
    /// The row could not be read
    Error(String),
}

/// One row of an import preview
#[derive(Debug, Clone)]
pub struct ImportRow {
    pub row_number: usize,
    pub parsed: Option<ParsedRow>,
    pub status: RowStatus,
}

/// Result of a completed import
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    /// Transactions created from new rows
    pub imported: Vec<TransactionId>,
    /// Existing transactions marked cleared by a matching row
    pub cleared: Vec<TransactionId>,
    /// Matching rows whose transaction was already cleared
    pub already_cleared: usize,
    pub duplicates: usize,
    /// Row number and message for each unreadable row
    pub errors: Vec<(usize, String)>,
}

/// Service for CSV import
pub struct ImportService<'a> {
    storage: &'a Storage,
}

impl<'a> ImportService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Parse a CSV file
    pub fn parse_file(
        &self,
        path: &Path,
        mapping: &ColumnMapping,
    ) -> EnvelopeResult<Vec<Result<ParsedRow, String>>> {
        let file = std::fs::File::open(path).map_err(|e| {
            EnvelopeError::Import(format!("Failed to open {}: {}", path.display(), e))
        })?;
        self.parse(file, mapping)
    }

    /// Parse CSV data; unreadable rows are returned as errors
    pub fn parse<R: Read>(
        &self,
        reader: R,
        mapping: &ColumnMapping,
    ) -> EnvelopeResult<Vec<Result<ParsedRow, String>>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(mapping.has_header)
            .delimiter(mapping.delimiter)
            .flexible(true)
            .from_reader(reader);

        let mut results = Vec::new();
        let mut occurrences = HashMap::new();
        for (idx, record) in reader.records().enumerate() {
            let row_number = idx + 1;
            let parsed = match record {
                Ok(record) => parse_record(&record, row_number, mapping, &mut occurrences),
                Err(e) => Err(format!("Error reading CSV record: {}", e)),
            };
            results.push(parsed);
        }

        tracing::debug!(rows = results.len(), "parsed import file");
        Ok(results)
    }

    /// Read the header row of a CSV file and guess the mapping from it
    pub fn detect_mapping(&self, path: &Path) -> EnvelopeResult<ColumnMapping> {
        let mut reader = ReaderBuilder::new().from_path(path).map_err(|e| {
            EnvelopeError::Import(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let headers = reader
            .headers()
            .map_err(|e| EnvelopeError::Import(format!("Failed to read header row: {}", e)))?;
        Ok(ColumnMapping::from_headers(headers))
    }

    /// Decide what importing each row into `account_id` would do
    ///
    /// Rows whose import id is already present are duplicates. Otherwise a
    /// row matches an existing, not yet imported transaction of the account
    /// with the same amount; uncleared transactions are preferred, then the
    /// closest date. Each transaction matches at most one row.
    pub fn preview(
        &self,
        account_id: AccountId,
        parsed: &[Result<ParsedRow, String>],
    ) -> EnvelopeResult<Vec<ImportRow>> {
        self.require_account(account_id)?;
        let existing = self.storage.transactions.filter(|t| t.account_id == account_id)?;

        let stored: HashSet<&str> = existing.iter().filter_map(|t| t.import_id.as_deref()).collect();
        let mut candidates: Vec<&Transaction> = existing
            .iter()
            .filter(|t| t.import_id.is_none() && !t.is_transfer())
            .collect();

        let mut rows = Vec::with_capacity(parsed.len());
        for (idx, result) in parsed.iter().enumerate() {
            let row = match result {
                Ok(row) => row,
                Err(message) => {
                    rows.push(ImportRow {
                        row_number: idx + 1,
                        parsed: None,
                        status: RowStatus::Error(message.clone()),
                    });
                    continue;
                }
            };

            let status = if stored.contains(row.import_id.as_str()) {
                RowStatus::Duplicate
            } else {
                let best = candidates
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.amount == row.amount)
                    .min_by_key(|(_, t)| (t.cleared, (t.date - row.date).num_days().abs()))
                    .map(|(i, _)| i);
                match best {
                    Some(i) => RowStatus::Matched(candidates.remove(i).id),
                    None => RowStatus::New,
                }
            };

            rows.push(ImportRow {
                row_number: row.row_number,
                parsed: Some(row.clone()),
                status,
            });
        }

        Ok(rows)
    }

    /// Apply a preview in one commit
    ///
    /// New rows become cleared transactions in Uncategorized; matched
    /// transactions are marked cleared and remember the row's import id.
    pub fn import(&self, account_id: AccountId, rows: &[ImportRow]) -> EnvelopeResult<ImportOutcome> {
        let account = self.require_account(account_id)?;
        let budget_id = account.budget_id;
        let txns = TransactionService::new(self.storage);

        let mut changeset = Changeset::new();
        let mut outcome = ImportOutcome::default();

        for row in rows {
            let parsed = match (&row.status, &row.parsed) {
                (RowStatus::Error(message), _) => {
                    outcome.errors.push((row.row_number, message.clone()));
                    continue;
                }
                (RowStatus::Duplicate, _) => {
                    outcome.duplicates += 1;
                    continue;
                }
                (_, None) => continue,
                (_, Some(parsed)) => parsed,
            };

            match &row.status {
                RowStatus::New => {
                    let uncategorized = CategoryService::new(self.storage).ensure_system(
                        budget_id,
                        SystemCategory::Uncategorized,
                        &mut changeset,
                    )?;
                    let mut input = NewTransaction::new(
                        budget_id,
                        account_id,
                        parsed.date,
                        vec![CategorySplit::new(uncategorized.id, parsed.amount)],
                    )
                    .payee(parsed.payee.as_str())
                    .memo(parsed.memo.as_str())
                    .cleared(true);
                    input.import_id = Some(parsed.import_id.clone());

                    let txn = txns.stage_new(input, &mut changeset)?;
                    outcome.imported.push(txn.id);
                }
                RowStatus::Matched(id) => {
                    let id = *id;
                    let old = current(&self.storage.transactions, &changeset, id)?
                        .ok_or_else(|| EnvelopeError::transaction_not_found(id.to_string()))?;
                    let mut new = old.clone();
                    new.import_id = Some(parsed.import_id.clone());
                    new.updated_at = Utc::now();

                    if old.cleared {
                        outcome.already_cleared += 1;
                    } else {
                        new.cleared = true;
                        LedgerDelta::replace(&old, &new).stage(self.storage, &mut changeset)?;
                        outcome.cleared.push(id);
                    }
                    changeset.put(new);
                }
                RowStatus::Duplicate | RowStatus::Error(_) => {}
            }
        }

        self.storage.commit(changeset)?;

        tracing::info!(
            account = %account_id,
            imported = outcome.imported.len(),
            cleared = outcome.cleared.len(),
            duplicates = outcome.duplicates,
            "imported statement"
        );
        Ok(outcome)
    }

    fn require_account(&self, id: AccountId) -> EnvelopeResult<Account> {
        let account = self
            .storage
            .accounts
            .get(id)?
            .ok_or_else(|| EnvelopeError::account_not_found(id.to_string()))?;
        if account.archived {
            return Err(EnvelopeError::Import(format!(
                "Account '{}' is archived",
                account.name
            )));
        }
        Ok(account)
    }
}

fn parse_record(
    record: &StringRecord,
    row_number: usize,
    mapping: &ColumnMapping,
    occurrences: &mut HashMap<String, u32>,
) -> Result<ParsedRow, String> {
    let date_str = record
        .get(mapping.date_column)
        .ok_or_else(|| "Missing date column".to_string())?
        .trim();
    let date = parse_date(date_str, &mapping.date_format)?;

    let amount = parse_amount_from_record(record, mapping)?;

    let text = |column: Option<usize>| {
        column
            .and_then(|col| record.get(col))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };
    let payee = text(mapping.payee_column);
    let memo = text(mapping.memo_column);

    let occurrence = occurrences
        .entry(import_key(date, amount, &payee, 0))
        .or_insert(0);
    let import_id = import_key(date, amount, &payee, *occurrence);
    *occurrence += 1;

    Ok(ParsedRow {
        row_number,
        date,
        amount,
        import_id,
        payee,
        memo,
    })
}

fn parse_amount_from_record(record: &StringRecord, mapping: &ColumnMapping) -> Result<Money, String> {
    let amount = if let Some(amount_col) = mapping.amount_column {
        let amount_str = record
            .get(amount_col)
            .ok_or_else(|| "Missing amount column".to_string())?
            .trim();
        parse_amount_string(amount_str)?
    } else {
        let outflow_col = mapping
            .outflow_column
            .ok_or_else(|| "Missing outflow column configuration".to_string())?;
        let inflow_col = mapping
            .inflow_column
            .ok_or_else(|| "Missing inflow column configuration".to_string())?;

        let outflow_str = record.get(outflow_col).map(|s| s.trim()).unwrap_or("");
        let inflow_str = record.get(inflow_col).map(|s| s.trim()).unwrap_or("");

        let outflow = if outflow_str.is_empty() {
            Money::zero()
        } else {
            -parse_amount_string(outflow_str)?.abs()
        };
        let inflow = if inflow_str.is_empty() {
            Money::zero()
        } else {
            parse_amount_string(inflow_str)?.abs()
        };

        outflow + inflow
    };

    let amount = match mapping.type_column {
        Some(col) => {
            let kind = record.get(col).map(|s| s.trim().to_uppercase()).unwrap_or_default();
            match kind.as_str() {
                "DEBIT" => -amount.abs(),
                "CREDIT" => amount.abs(),
                other => return Err(format!("Unknown transaction type '{}'", other)),
            }
        }
        None => amount,
    };

    if mapping.invert_amounts {
        Ok(-amount)
    } else {
        Ok(amount)
    }
}

/// Parse a date string, falling back to common formats
fn parse_date(s: &str, primary_format: &str) -> Result<NaiveDate, String> {
    if let Ok(date) = NaiveDate::parse_from_str(s, primary_format) {
        return Ok(date);
    }

    // OFX-style compact dates, optionally followed by a time
    if s.len() >= 8 && s.as_bytes()[..8].iter().all(u8::is_ascii_digit) {
        if let Ok(date) = NaiveDate::parse_from_str(&s[..8], "%Y%m%d") {
            return Ok(date);
        }
    }

    let formats = [
        "%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%d/%m/%Y", "%d/%m/%y", "%Y/%m/%d", "%m-%d-%Y",
        "%d-%m-%Y",
    ];
    for format in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Ok(date);
        }
    }

    Err(format!("Could not parse date: '{}'", s))
}

/// Parse an amount, accepting currency symbols and accounting negatives
fn parse_amount_string(s: &str) -> Result<Money, String> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '(' || *c == ')')
        .collect();

    let (is_negative, value) = if cleaned.starts_with('(') && cleaned.ends_with(')') {
        (true, &cleaned[1..cleaned.len() - 1])
    } else if let Some(stripped) = cleaned.strip_prefix('-') {
        (true, stripped)
    } else {
        (false, cleaned.as_str())
    };

    Money::parse(value)
        .map(|m| if is_negative { -m } else { m })
        .map_err(|e| format!("Could not parse amount '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{date, expense, Fixture};

    fn parse(f: &Fixture, data: &str, mapping: &ColumnMapping) -> Vec<Result<ParsedRow, String>> {
        ImportService::new(&f.storage)
            .parse(data.as_bytes(), mapping)
            .unwrap()
    }

    #[test]
    fn test_parse_simple_csv() {
        let f = Fixture::new();
        let rows = parse(
            &f,
            "Date,Amount,Description\n2025-01-15,-50.00,Test Store\n2025-01-16,100.00,Paycheck",
            &ColumnMapping::new(),
        );
        assert_eq!(rows.len(), 2);

        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.date, date(2025, 1, 15));
        assert_eq!(first.amount.cents(), -5000);
        assert_eq!(first.payee, "Test Store");
        assert_eq!(rows[1].as_ref().unwrap().amount.cents(), 10000);
    }

    #[test]
    fn test_parse_type_column_and_compact_dates() {
        let f = Fixture::new();
        let data = "TRNTYPE,DTPOSTED,TRNAMT,NAME,MEMO\n\
                    DEBIT,20250115120000,42.10,Corner Shop,card\n\
                    CREDIT,20250116,1000,Employer,\n\
                    FEE,20250117,1,Bank,";
        let mut reader = ReaderBuilder::new().from_reader(data.as_bytes());
        let mapping = ColumnMapping::from_headers(reader.headers().unwrap());
        assert_eq!(mapping.type_column, Some(0));
        assert_eq!(mapping.date_column, 1);
        assert_eq!(mapping.amount_column, Some(2));

        let rows = parse(&f, data, &mapping);
        let debit = rows[0].as_ref().unwrap();
        assert_eq!(debit.amount.cents(), -4210);
        assert_eq!(debit.date, date(2025, 1, 15));
        assert_eq!(debit.memo, "card");
        assert_eq!(rows[1].as_ref().unwrap().amount.cents(), 100000);
        assert!(rows[2].is_err());
    }

    #[test]
    fn test_parse_separate_inflow_outflow_and_accounting() {
        let f = Fixture::new();
        let rows = parse(
            &f,
            "Date,Outflow,Inflow,Description\n2025-01-15,50.00,,Groceries\n2025-01-16,,100.00,Paycheck",
            &ColumnMapping::separate_inout(0, 1, 2, 3),
        );
        assert_eq!(rows[0].as_ref().unwrap().amount.cents(), -5000);
        assert_eq!(rows[1].as_ref().unwrap().amount.cents(), 10000);

        let rows = parse(&f, "Date,Amount,Description\n2025-01-15,(50.00),Test", &ColumnMapping::new());
        assert_eq!(rows[0].as_ref().unwrap().amount.cents(), -5000);
    }

    #[test]
    fn test_matching_consumes_each_transaction_once() {
        let f = Fixture::new();
        let service = ImportService::new(&f.storage);
        let entered = f.post(expense(&f, f.groceries, 2000, (2025, 1, 10)));

        let rows = parse(
            &f,
            "Date,Amount,Description\n2025-01-11,-20.00,Market\n2025-01-12,-20.00,Market again",
            &ColumnMapping::new(),
        );
        let preview = service.preview(f.checking, &rows).unwrap();
        assert_eq!(preview[0].status, RowStatus::Matched(entered.id));
        assert_eq!(preview[1].status, RowStatus::New);
    }

    #[test]
    fn test_import_clears_matches_and_creates_uncategorized() {
        let f = Fixture::new();
        let service = ImportService::new(&f.storage);
        let entered = f.post(expense(&f, f.groceries, 2000, (2025, 1, 10)));

        let rows = parse(
            &f,
            "Date,Amount,Description\n2025-01-11,-20.00,Market\n2025-01-12,-7.50,Coffee\nnot a date,1,x",
            &ColumnMapping::new(),
        );
        let preview = service.preview(f.checking, &rows).unwrap();
        let outcome = service.import(f.checking, &preview).unwrap();

        assert_eq!(outcome.cleared, vec![entered.id]);
        assert_eq!(outcome.imported.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].0, 3);

        let account = f.account(f.checking);
        assert_eq!(account.balance.cents(), -2750);
        assert_eq!(account.cleared_balance.cents(), -2750);

        let created = f.storage.transactions.get(outcome.imported[0]).unwrap().unwrap();
        assert!(created.cleared);
        assert_eq!(created.payee, "Coffee");
        let category = f.category(created.splits[0].category_id);
        assert_eq!(category.system, Some(SystemCategory::Uncategorized));

        // Importing the same file again finds only duplicates
        let again = service.preview(f.checking, &rows).unwrap();
        assert_eq!(again[0].status, RowStatus::Duplicate);
        assert_eq!(again[1].status, RowStatus::Duplicate);
        let outcome = service.import(f.checking, &again).unwrap();
        assert_eq!(outcome.duplicates, 2);
        assert!(outcome.imported.is_empty());
    }

    #[test]
    fn test_identical_rows_in_one_file_are_all_imported() {
        let f = Fixture::new();
        let service = ImportService::new(&f.storage);
        let data = "Date,Amount,Description\n2025-01-11,-4.50,Coffee\n2025-01-11,-4.50,Coffee";

        let rows = parse(&f, data, &ColumnMapping::new());
        let preview = service.preview(f.checking, &rows).unwrap();
        assert_eq!(preview[0].status, RowStatus::New);
        assert_eq!(preview[1].status, RowStatus::New);

        let outcome = service.import(f.checking, &preview).unwrap();
        assert_eq!(outcome.imported.len(), 2);
        assert_eq!(outcome.duplicates, 0);
        assert_eq!(f.account(f.checking).balance.cents(), -900);

        // Both rows are recognized on a second import
        let again = service.preview(f.checking, &parse(&f, data, &ColumnMapping::new())).unwrap();
        assert!(again.iter().all(|row| row.status == RowStatus::Duplicate));
    }
}
