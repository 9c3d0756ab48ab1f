//! CLI integration tests
//!
//! Run the `plainledger` binary against journals written to a temporary
//! directory and check its output and exit status.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const JOURNAL: &str = "\
; sample journal
P 2011/01/20 EUR $1.40

2011/01/01 * Opening Balance
    Assets:Bank:Checking  $1,000.00
    Assets:Bank:Savings   $500.00
    Equity:Opening Balance

2011/01/05 Grocery Store
    Expenses:Food  $45.50
    Assets:Bank:Checking

2011/01/10 * Trip
    Expenses:Travel  100 EUR @ $1.30
    Assets:Bank:Checking
";

fn write_journal(dir: &TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("test.ledger");
    fs::write(&path, text).unwrap();
    path
}

fn plainledger() -> Command {
    let mut cmd = Command::cargo_bin("plainledger").unwrap();
    cmd.env_remove("LEDGER_FILE").env_remove("RUST_LOG");
    cmd
}

/// Test basic command help
#[test]
fn test_help_output() {
    plainledger()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("balance"))
        .stdout(predicate::str::contains("register"))
        .stdout(predicate::str::contains("print"));
}

#[test]
fn test_balance_report() {
    let dir = TempDir::new().unwrap();
    let path = write_journal(&dir, JOURNAL);

    plainledger()
        .arg("-f")
        .arg(&path)
        .arg("balance")
        .assert()
        .success()
        .stdout(predicate::str::contains("            $1324.50  Assets:Bank\n"))
        .stdout(predicate::str::contains("             $824.50    Checking\n"))
        .stdout(predicate::str::contains("             $500.00    Savings\n"))
        .stdout(predicate::str::contains("              $45.50    Food\n"))
        .stdout(predicate::str::contains("             100 EUR    Travel\n"))
        .stdout(predicate::str::contains("--------------------\n"));
}

#[test]
fn test_balance_flags() {
    let dir = TempDir::new().unwrap();
    let path = write_journal(&dir, JOURNAL);

    plainledger()
        .args(["bal", "--flat", "--no-total", "-f"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Assets:Bank:Checking"))
        .stdout(predicate::str::contains("-----").not());

    plainledger()
        .args(["bal", "-n"])
        .arg("--file")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("  Assets\n"))
        .stdout(predicate::str::contains("Checking").not());

    plainledger()
        .args(["bal", "-n", "--flat"])
        .arg("-f")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_register_with_pattern() {
    let dir = TempDir::new().unwrap();
    let path = write_journal(&dir, JOURNAL);

    plainledger()
        .arg("-f")
        .arg(&path)
        .args(["reg", "checking"])
        .assert()
        .success()
        .stdout(predicate::str::contains("11-Jan-01 Opening Balance"))
        .stdout(predicate::str::contains("11-Jan-05 Grocery Store"))
        .stdout(predicate::str::contains("Expenses").not());
}

#[test]
fn test_print_output_parses_again() {
    let dir = TempDir::new().unwrap();
    let path = write_journal(&dir, JOURNAL);

    let output = plainledger().arg("-f").arg(&path).arg("print").output().unwrap();
    assert!(output.status.success());
    let printed = String::from_utf8(output.stdout).unwrap();
    assert!(printed.starts_with("2011/01/01 * Opening Balance\n"));
    assert!(printed.contains("    Expenses:Travel"));

    let reprinted_path = dir.path().join("printed.ledger");
    fs::write(&reprinted_path, &printed).unwrap();
    plainledger()
        .arg("-f")
        .arg(&reprinted_path)
        .arg("print")
        .assert()
        .success()
        .stdout(printed);
}

#[test]
fn test_listing_commands() {
    let dir = TempDir::new().unwrap();
    let path = write_journal(&dir, JOURNAL);

    plainledger()
        .arg("-f")
        .arg(&path)
        .args(["accounts", "bank"])
        .assert()
        .success()
        .stdout("Assets:Bank:Checking\nAssets:Bank:Savings\n");

    plainledger()
        .arg("-f")
        .arg(&path)
        .arg("payees")
        .assert()
        .success()
        .stdout("Grocery Store\nOpening Balance\nTrip\n");

    plainledger()
        .arg("-f")
        .arg(&path)
        .arg("commodities")
        .assert()
        .success()
        .stdout("$\nEUR\n");
}

#[test]
fn test_prices_and_equity() {
    let dir = TempDir::new().unwrap();
    let path = write_journal(&dir, JOURNAL);

    plainledger()
        .arg("-f")
        .arg(&path)
        .args(["prices", "EUR"])
        .assert()
        .success()
        .stdout("2011/01/10 EUR                $1.30\n2011/01/20 EUR                $1.40\n");

    plainledger()
        .arg("-f")
        .arg(&path)
        .args(["equity", "assets"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("2011/01/10 Opening Balances\n"))
        .stdout(predicate::str::contains("    Equity:Opening Balances"));
}

#[test]
fn test_stats() {
    let dir = TempDir::new().unwrap();
    let path = write_journal(&dir, JOURNAL);

    plainledger()
        .arg("-f")
        .arg(&path)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Time period: 11-Jan-01 to 11-Jan-10 (10 days)"))
        .stdout(predicate::str::contains("Unique payees:               3"))
        .stdout(predicate::str::contains("Uncleared postings:          2"));
}

#[test]
fn test_ledger_file_environment_variable() {
    let dir = TempDir::new().unwrap();
    let path = write_journal(&dir, JOURNAL);

    plainledger()
        .env("LEDGER_FILE", &path)
        .arg("payees")
        .assert()
        .success()
        .stdout(predicate::str::contains("Trip"));
}

#[test]
fn test_missing_journal() {
    plainledger()
        .arg("balance")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("LEDGER_FILE"));

    let dir = TempDir::new().unwrap();
    plainledger()
        .arg("-f")
        .arg(dir.path().join("missing.ledger"))
        .arg("balance")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("missing.ledger"));
}

#[test]
fn test_parse_error_reports_line() {
    let dir = TempDir::new().unwrap();
    let path = write_journal(
        &dir,
        "2011/01/01 Broken\n    Expenses:Food  $5\n    Assets:Cash\n    Assets:Bank\n",
    );

    plainledger()
        .arg("-f")
        .arg(&path)
        .arg("balance")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("Error: "))
        .stderr(predicate::str::contains("line 1"))
        .stderr(predicate::str::contains("only one posting can have an elided amount"));
}

#[test]
fn test_unknown_command_fails() {
    plainledger().arg("frobnicate").assert().failure();
}
