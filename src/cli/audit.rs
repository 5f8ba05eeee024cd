//! CLI command for reading the audit log

use clap::Args;

use crate::audit::{AuditFilter, EntityType};
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::storage::Storage;

/// Arguments of `audit`
#[derive(Args)]
pub struct AuditArgs {
    /// Only entries of this kind (budget, account, category, transaction)
    #[arg(short = 't', long = "type")]
    pub entity_type: Option<String>,

    /// Only entries for this name or ID prefix
    #[arg(short, long)]
    pub entity: Option<String>,

    /// Show the most recent N entries
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

/// Handle the audit command
pub fn handle_audit_command(storage: &Storage, args: AuditArgs) -> EnvelopeResult<()> {
    let entity_type = args
        .entity_type
        .as_deref()
        .map(|s| {
            EntityType::parse(s).ok_or_else(|| {
                EnvelopeError::Validation(format!(
                    "Unknown entity type '{}'. Valid types: budget, account, category, transaction",
                    s
                ))
            })
        })
        .transpose()?;

    let filter = AuditFilter {
        entity_type,
        entity: args.entity,
        limit: Some(args.limit),
    };
    let entries = storage.audit().read_filtered(&filter)?;

    if entries.is_empty() {
        println!("No audit entries found.");
        return Ok(());
    }

    for entry in &entries {
        println!("{}", entry.format_human_readable());
    }
    println!(
        "\n{} entr{} from {}",
        entries.len(),
        if entries.len() == 1 { "y" } else { "ies" },
        storage.audit().path().display()
    );

    Ok(())
}
