//! CLI command handler for CSV import
//!
//! Detects the column mapping from the header row, previews each row
//! (new, matched or duplicate) and applies the preview in one commit.

use std::path::PathBuf;

use clap::Args;

use crate::config::Settings;
use crate::display::{format_import_outcome, format_import_preview};
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::services::{AccountService, ImportService, RowStatus};
use crate::storage::Storage;

use super::resolve_budget;

/// Arguments of `import`
#[derive(Args)]
pub struct ImportArgs {
    /// Path to the bank's CSV file
    pub file: PathBuf,

    /// Target account name or ID
    #[arg(short, long)]
    pub account: String,

    /// Date format of the file (strftime), e.g. "%m/%d/%Y"
    #[arg(long)]
    pub date_format: Option<String>,

    /// Amounts in the file are positive for spending
    #[arg(long)]
    pub invert: bool,

    /// Show what would happen without changing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Handle the import command
pub fn handle_import_command(
    storage: &Storage,
    settings: &Settings,
    budget_flag: Option<&str>,
    args: ImportArgs,
) -> EnvelopeResult<()> {
    let budget = resolve_budget(storage, settings, budget_flag)?;
    let account = AccountService::new(storage).find(budget.id, &args.account)?;
    let service = ImportService::new(storage);

    if !args.file.exists() {
        return Err(EnvelopeError::Import(format!(
            "File not found: {}",
            args.file.display()
        )));
    }

    let mut mapping = service.detect_mapping(&args.file)?;
    if let Some(format) = &args.date_format {
        mapping = mapping.with_date_format(format);
    }
    mapping.invert_amounts = args.invert;

    let parsed = service.parse_file(&args.file, &mapping)?;
    if parsed.is_empty() {
        println!("No transactions found in CSV file.");
        return Ok(());
    }

    let preview = service.preview(account.id, &parsed)?;
    println!("Import preview for '{}'", account.name);
    println!("{}", "=".repeat(40));
    print!("{}", format_import_preview(&preview));

    if args.dry_run {
        println!("\nDry run: nothing was imported.");
        return Ok(());
    }

    let actionable = preview
        .iter()
        .any(|r| matches!(r.status, RowStatus::New | RowStatus::Matched(_)));
    if !actionable {
        println!("\nNothing to import.");
        return Ok(());
    }

    let outcome = service.import(account.id, &preview)?;
    println!();
    print!("{}", format_import_outcome(&outcome));
    if !outcome.imported.is_empty() {
        println!(
            "\nNew transactions are in Uncategorized. Use 'envelope txn edit <id> --category' to file them."
        );
    }

    Ok(())
}
