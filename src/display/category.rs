//! Category display formatting
//!
//! Formats the category tree with kinds and running balances.

use crate::services::CategoryNode;

/// Format categories as a tree: headers with their children beneath
pub fn format_category_tree(nodes: &[CategoryNode]) -> String {
    if nodes.is_empty() {
        return "No categories found.\n\nRun 'envelope init' to create default categories."
            .to_string();
    }

    let mut output = String::new();

    for (i, node) in nodes.iter().enumerate() {
        let header = &node.category;
        let mut flags = Vec::new();
        if header.is_system() {
            flags.push("built-in".to_string());
        }
        if header.hidden {
            flags.push("hidden".to_string());
        }
        flags.push(header.kind.to_string());

        if header.is_header() {
            output.push_str(&format!("{} ({})\n", header.name, flags.join(", ")));
        } else {
            output.push_str(&format!(
                "{:<28} {:>12}  ({})\n",
                header.name,
                header.balance,
                flags.join(", ")
            ));
        }

        if header.is_header() && node.children.is_empty() {
            output.push_str("  (no categories)\n");
        }

        for (j, category) in node.children.iter().enumerate() {
            let prefix = if j == node.children.len() - 1 {
                "└── "
            } else {
                "├── "
            };
            let hidden = if category.hidden { " (hidden)" } else { "" };
            output.push_str(&format!(
                "  {}{:<22} {:>12}{}\n",
                prefix, category.name, category.balance, hidden
            ));
        }

        let next_is_header = nodes.get(i + 1).is_some_and(|n| n.category.is_header());
        if header.is_header() && next_is_header {
            output.push('\n');
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{expense, Fixture};
    use crate::services::CategoryService;

    #[test]
    fn test_format_category_tree() {
        let f = Fixture::new();
        f.post(expense(&f, f.groceries, 1234, (2025, 1, 5)));

        let tree = CategoryService::new(&f.storage).tree(f.budget.id, false).unwrap();
        let output = format_category_tree(&tree);

        assert!(output.contains("Starting Balance"));
        assert!(output.contains("built-in"));
        assert!(output.contains("Needs (expense)"));
        assert!(output.contains("Income (income)"));
        let groceries = output.lines().find(|l| l.contains("Groceries")).unwrap();
        assert!(groceries.contains("-$12.34"));
    }

    #[test]
    fn test_format_empty_tree() {
        assert!(format_category_tree(&[]).contains("No categories found"));
    }
}
