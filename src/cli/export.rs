//! CLI command for budget snapshot export

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::{Args, ValueEnum};

use crate::config::Settings;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::export::{export_budget_json, export_budget_yaml, BudgetExport, ExportFormat};
use crate::storage::Storage;

use super::resolve_budget;

/// Format flag of `export`
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    /// JSON (machine-readable)
    Json,
    /// YAML (human-readable)
    Yaml,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => ExportFormat::Json,
            FormatArg::Yaml => ExportFormat::Yaml,
        }
    }
}

/// Arguments of `export`
#[derive(Args)]
pub struct ExportArgs {
    /// Output file; stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Snapshot format; guessed from the output extension, else JSON
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Compact JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,
}

fn write_snapshot<W: Write>(
    storage: &Storage,
    budget: &crate::models::Budget,
    format: ExportFormat,
    compact: bool,
    writer: &mut W,
) -> EnvelopeResult<BudgetExport> {
    let export = match format {
        ExportFormat::Json => export_budget_json(storage, budget.id, writer, !compact)?,
        ExportFormat::Yaml => export_budget_yaml(storage, budget.id, writer)?,
    };
    writer
        .flush()
        .map_err(|e| EnvelopeError::Export(e.to_string()))?;
    Ok(export)
}

/// Handle the export command
pub fn handle_export_command(
    storage: &Storage,
    settings: &Settings,
    budget_flag: Option<&str>,
    args: ExportArgs,
) -> EnvelopeResult<()> {
    let budget = resolve_budget(storage, settings, budget_flag)?;
    let format = args
        .format
        .map(ExportFormat::from)
        .or_else(|| args.output.as_deref().and_then(ExportFormat::from_path))
        .unwrap_or(ExportFormat::Json);

    match args.output {
        Some(path) => {
            let file = File::create(&path).map_err(|e| {
                EnvelopeError::Export(format!("Failed to create {}: {}", path.display(), e))
            })?;
            let mut writer = BufWriter::new(file);
            let export = write_snapshot(storage, &budget, format, args.compact, &mut writer)?;

            println!("Exported '{}' to {}", budget.name, path.display());
            println!("  Accounts:     {}", export.metadata.account_count);
            println!("  Categories:   {}", export.metadata.category_count);
            println!("  Transactions: {}", export.metadata.transaction_count);
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            write_snapshot(storage, &budget, format, args.compact, &mut writer)?;
            if format == ExportFormat::Json {
                writeln!(writer).map_err(|e| EnvelopeError::Export(e.to_string()))?;
            }
        }
    }

    Ok(())
}
