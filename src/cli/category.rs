//! Category CLI commands
//!
//! Implements CLI commands for category management.

use clap::Subcommand;

use crate::config::Settings;
use crate::display::format_category_tree;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::CategoryKind;
use crate::services::{CategoryService, CategoryUpdate};
use crate::storage::Storage;

use super::resolve_budget;

/// Category subcommands
#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Create a header, or a category under a header
    Create {
        /// Category name
        name: String,
        /// Header to create the category under
        #[arg(short, long)]
        parent: Option<String>,
        /// Type of a new header (income, expense)
        #[arg(short = 't', long = "type")]
        kind: Option<String>,
    },
    /// List categories as a tree
    List {
        /// Include hidden categories
        #[arg(short, long)]
        all: bool,
    },
    /// Rename, move, re-type, hide or show a category
    Edit {
        /// Category name, "Header/Child" path or ID
        category: String,
        /// New name
        #[arg(short, long)]
        name: Option<String>,
        /// Move under another header
        #[arg(short, long)]
        parent: Option<String>,
        /// New type for a header (income, expense)
        #[arg(short = 't', long = "type")]
        kind: Option<String>,
        /// Hide the category
        #[arg(long, conflicts_with = "show")]
        hide: bool,
        /// Show a hidden category
        #[arg(long)]
        show: bool,
    },
    /// Put sibling categories in the given order
    Reorder {
        /// Categories in their new order (all under the same header)
        #[arg(required = true)]
        categories: Vec<String>,
    },
    /// Delete a category no transaction uses
    Delete {
        /// Category name, "Header/Child" path or ID
        category: String,
    },
}

fn parse_kind(input: Option<&str>) -> EnvelopeResult<Option<CategoryKind>> {
    input
        .map(|s| {
            CategoryKind::parse(s).ok_or_else(|| {
                EnvelopeError::Validation(format!(
                    "Invalid category type: '{}'. Valid types: income, expense",
                    s
                ))
            })
        })
        .transpose()
}

/// Handle a category command
pub fn handle_category_command(
    storage: &Storage,
    settings: &Settings,
    budget_flag: Option<&str>,
    cmd: CategoryCommands,
) -> EnvelopeResult<()> {
    let budget = resolve_budget(storage, settings, budget_flag)?;
    let service = CategoryService::new(storage);

    match cmd {
        CategoryCommands::Create { name, parent, kind } => {
            let parent = parent
                .map(|p| service.find(budget.id, &p))
                .transpose()?;
            let kind = parse_kind(kind.as_deref())?;

            let category = service.create(budget.id, &name, parent.as_ref().map(|p| p.id), kind)?;
            match &parent {
                Some(parent) => println!("Created category: {}/{}", parent.name, category.name),
                None => println!("Created header: {} ({})", category.name, category.kind),
            }
            println!("  ID: {}", category.id);
        }

        CategoryCommands::List { all } => {
            let tree = service.tree(budget.id, all)?;
            print!("{}", format_category_tree(&tree));
        }

        CategoryCommands::Edit {
            category,
            name,
            parent,
            kind,
            hide,
            show,
        } => {
            let found = service.find(budget.id, &category)?;
            let update = CategoryUpdate {
                name,
                parent_id: parent
                    .map(|p| service.find(budget.id, &p).map(|c| c.id))
                    .transpose()?,
                kind: parse_kind(kind.as_deref())?,
                hidden: match (hide, show) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
            };

            if update == CategoryUpdate::default() {
                println!("No changes specified. Use --name, --parent, --type, --hide or --show.");
                return Ok(());
            }

            let updated = service.update(found.id, update)?;
            println!("Updated category: {}", updated.name);
        }

        CategoryCommands::Reorder { categories } => {
            let ids = categories
                .iter()
                .map(|c| service.find(budget.id, c).map(|c| c.id))
                .collect::<EnvelopeResult<Vec<_>>>()?;

            let ordered = service.reorder(budget.id, &ids)?;
            println!("New order:");
            for (i, category) in ordered.iter().enumerate() {
                println!("  {}. {}", i + 1, category.name);
            }
        }

        CategoryCommands::Delete { category } => {
            let found = service.find(budget.id, &category)?;
            let deleted = service.delete(found.id)?;
            println!("Deleted category: {}", deleted.name);
        }
    }

    Ok(())
}
