use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn envelope(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("envelope").unwrap();
    cmd.env("ENVELOPE_BUDGET_DIR", dir.path())
        .env_remove("ENVELOPE_BUDGET")
        .env_remove("ENVELOPE_LOG");
    cmd
}

/// An initialized directory with a funded checking account
fn setup() -> TempDir {
    let dir = TempDir::new().unwrap();
    envelope(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created budget 'My Budget'"));
    envelope(&dir)
        .args(["account", "create", "Checking", "--balance", "1000", "--date", "2025-01-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Starting Balance: $1000.00"));
    dir
}

#[test]
fn test_add_transaction_and_show_budget() {
    let dir = setup();

    envelope(&dir)
        .args([
            "txn", "add", "Checking", "--category", "Groceries", "--payee", "Corner Market",
            "--date", "2025-01-10", "--", "-45.50",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added transaction: -$45.50 Corner Market"));

    envelope(&dir)
        .args(["budget", "plan", "Needs/Groceries", "400", "--month", "2025-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Planned $400.00 for Groceries"));

    envelope(&dir)
        .args(["budget", "show", "2025-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("January 2025"))
        .stdout(predicate::str::contains("-$45.50"))
        .stdout(predicate::str::contains("$354.50"));

    envelope(&dir)
        .args(["account", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("$954.50"));

    envelope(&dir)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("All balances are consistent"));
}

#[test]
fn test_register_hides_cleared_by_default() {
    let dir = setup();

    // The opening balance is cleared
    envelope(&dir)
        .args(["txn", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No transactions found"));

    envelope(&dir)
        .args(["txn", "list", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Starting Balance"));
}

#[test]
fn test_transfer_between_accounts() {
    let dir = setup();
    envelope(&dir)
        .args(["account", "create", "Savings", "-B", "50", "-d", "2025-01-01"])
        .assert()
        .success();

    envelope(&dir)
        .args(["transfer", "create", "Checking", "Savings", "250", "--date", "2025-01-15"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Transfer to Savings"))
        .stdout(predicate::str::contains("Transfer from Checking"));

    envelope(&dir)
        .args(["account", "show", "Savings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Current Balance:   $300.00"));

    envelope(&dir).arg("check").assert().success();
}

#[test]
fn test_import_matches_then_skips_duplicates() {
    let dir = setup();
    envelope(&dir)
        .args([
            "txn", "add", "Checking", "--category", "Groceries", "--date", "2025-01-10", "--",
            "-45.50",
        ])
        .assert()
        .success();

    let csv = dir.path().join("statement.csv");
    fs::write(
        &csv,
        "Date,Description,Amount\n2025-01-10,CORNER MARKET,-45.50\n2025-01-12,Coffee Shop,-4.00\n",
    )
    .unwrap();
    let csv = csv.to_str().unwrap();

    envelope(&dir)
        .args(["import", csv, "--account", "Checking", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 new, 1 matched"))
        .stdout(predicate::str::contains("Dry run"));

    envelope(&dir)
        .args(["import", csv, "--account", "Checking"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported:          1"))
        .stdout(predicate::str::contains("Cleared matches:   1"));

    envelope(&dir)
        .args(["import", csv, "--account", "Checking"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 new, 0 matched, 2 already imported"))
        .stdout(predicate::str::contains("Nothing to import"));

    envelope(&dir).arg("check").assert().success();
}

#[test]
fn test_budget_flag_selects_budget() {
    let dir = setup();
    envelope(&dir)
        .args(["budget", "create", "Side Business"])
        .assert()
        .success();

    envelope(&dir)
        .args(["--budget", "Side Business", "account", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No accounts found"));

    envelope(&dir)
        .args(["account", "list"])
        .env("ENVELOPE_BUDGET", "My Budget")
        .assert()
        .success()
        .stdout(predicate::str::contains("Checking"));
}

#[test]
fn test_export_yaml_to_stdout() {
    let dir = setup();
    envelope(&dir)
        .args(["export", "--format", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("# Envelope budget export: My Budget"))
        .stdout(predicate::str::contains("Checking"));
}

#[test]
fn test_data_commands_need_init() {
    let dir = TempDir::new().unwrap();
    envelope(&dir)
        .args(["account", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("envelope init"));

    envelope(&dir).args(["config", "show"]).assert().success();
}

#[test]
fn test_errors_exit_nonzero() {
    let dir = setup();
    envelope(&dir)
        .args(["account", "show", "Nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));

    envelope(&dir)
        .args(["category", "delete", "Starting Balance"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("built in"));
}

#[test]
fn test_audit_records_changes() {
    let dir = setup();
    envelope(&dir)
        .args(["audit", "--type", "account"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CREATE Account"))
        .stdout(predicate::str::contains("(Checking)"));
}
