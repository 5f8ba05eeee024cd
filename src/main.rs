use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use envelope::cli::{
    handle_account_command, handle_audit_command, handle_budget_command, handle_category_command,
    handle_check_command, handle_export_command, handle_import_command,
    handle_transaction_command, handle_transfer_command,
};
use envelope::config::{EnvelopePaths, Settings};
use envelope::models::DEFAULT_CATEGORIES;
use envelope::storage::Storage;

/// Environment variable holding the tracing filter
const LOG_ENV: &str = "ENVELOPE_LOG";

#[derive(Parser)]
#[command(
    name = "envelope",
    version,
    about = "Envelope budgeting from the command line",
    long_about = "Track accounts, plan monthly spending per category and see \
                  planned against actual. Balances are kept consistent with the \
                  transactions and can be verified with 'envelope check'."
)]
struct Cli {
    /// Budget to work on (name or ID); defaults to the active budget
    #[arg(short, long, global = true, env = "ENVELOPE_BUDGET")]
    budget: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and a starter budget
    Init,

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Budget management, planning and the monthly overview
    #[command(subcommand)]
    Budget(envelope::cli::BudgetCommands),

    /// Account management commands
    #[command(subcommand)]
    Account(envelope::cli::AccountCommands),

    /// Category management commands
    #[command(subcommand)]
    Category(envelope::cli::CategoryCommands),

    /// Transaction management commands
    #[command(subcommand, alias = "txn")]
    Transaction(envelope::cli::TransactionCommands),

    /// Transfers between accounts
    #[command(subcommand)]
    Transfer(envelope::cli::TransferCommands),

    /// Import transactions from a bank CSV
    Import(envelope::cli::ImportArgs),

    /// Export the budget as a JSON or YAML snapshot
    Export(envelope::cli::ExportArgs),

    /// Verify stored balances against the transactions
    Check {
        /// Recalculate and save every stored balance
        #[arg(long)]
        fix: bool,
    },

    /// Show the audit log
    Audit(envelope::cli::AuditArgs),
}

impl Commands {
    /// Everything except `init` and `config` works on budget data
    fn requires_init(&self) -> bool {
        !matches!(self, Commands::Init | Commands::Config { .. })
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show paths and settings
    Show,
    /// Change a setting (currency_symbol, date_format)
    Set { key: String, value: String },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Initialize paths and settings
    let paths = EnvelopePaths::new()?;
    let mut settings = Settings::load_or_create(&paths)?;

    // Initialize storage
    let storage = Storage::new(paths.clone())?;
    storage.load_all()?;

    if cli.command.as_ref().is_some_and(Commands::requires_init) && !storage.is_initialized() {
        anyhow::bail!(
            "No data found at {}. Run 'envelope init' first.",
            paths.base_dir().display()
        );
    }

    let budget = cli.budget.as_deref();
    match cli.command {
        Some(Commands::Init) => {
            println!("Initializing envelope at: {}", paths.base_dir().display());
            match envelope::storage::init::initialize_storage(&storage, &mut settings)? {
                Some(created) => {
                    println!("Created budget '{}' and made it active.", created.name);
                    println!();
                    println!("Default category groups and categories have been created:");
                    for (header, _, children) in DEFAULT_CATEGORIES {
                        println!("  - {} ({})", header, children.join(", "));
                    }
                    println!();
                    println!("Run 'envelope category list' to see all categories.");
                }
                None => println!("Already initialized; existing budgets were left alone."),
            }
        }
        Some(Commands::Config { action }) => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => {
                println!("envelope configuration");
                println!("======================");
                println!("Base directory:  {}", paths.base_dir().display());
                println!("Data directory:  {}", paths.data_dir().display());
                println!("Settings file:   {}", paths.settings_file().display());
                println!("Audit log:       {}", paths.audit_log().display());
                println!();
                println!("Settings:");
                let active = settings
                    .active_budget
                    .and_then(|id| storage.budgets.get(id).ok().flatten())
                    .map(|b| b.name)
                    .unwrap_or_else(|| "(none)".to_string());
                println!("  Active budget:   {}", active);
                println!("  currency_symbol: {}", settings.currency_symbol);
                println!("  date_format:     {}", settings.date_format);
            }
            ConfigAction::Set { key, value } => {
                settings.set(&key, &value)?;
                settings.save(&paths)?;
                println!("Set {} = {}", key, value);
            }
        },
        Some(Commands::Budget(cmd)) => {
            handle_budget_command(&storage, &mut settings, budget, cmd)?;
        }
        Some(Commands::Account(cmd)) => {
            handle_account_command(&storage, &settings, budget, cmd)?;
        }
        Some(Commands::Category(cmd)) => {
            handle_category_command(&storage, &settings, budget, cmd)?;
        }
        Some(Commands::Transaction(cmd)) => {
            handle_transaction_command(&storage, &settings, budget, cmd)?;
        }
        Some(Commands::Transfer(cmd)) => {
            handle_transfer_command(&storage, &settings, budget, cmd)?;
        }
        Some(Commands::Import(args)) => {
            handle_import_command(&storage, &settings, budget, args)?;
        }
        Some(Commands::Export(args)) => {
            handle_export_command(&storage, &settings, budget, args)?;
        }
        Some(Commands::Check { fix }) => {
            handle_check_command(&storage, &settings, budget, fix)?;
        }
        Some(Commands::Audit(args)) => {
            handle_audit_command(&storage, args)?;
        }
        None => {
            println!("envelope - envelope budgeting from the command line");
            println!();
            println!("Run 'envelope init' to get started, or 'envelope --help' for usage.");
        }
    }

    Ok(())
}
