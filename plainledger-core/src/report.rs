//! Report computations over a loaded journal
//!
//! Each report here is plain data: the CLI decides how it is laid out.
//! [`BalanceReport`] groups accounts for the balance command, [`register`]
//! produces per-posting lines with a running total, [`JournalStats`]
//! summarises activity and [`OpeningBalances`] carries balances forward.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Duration, NaiveDate};
use plainledger_math::{Amount, Balance};

use crate::account::{parent_name, top_level_name, ACCOUNT_SEPARATOR};
use crate::journal::Journal;
use crate::transaction::TransactionStatus;

/// Options for the balance report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceReportOptions {
    /// Show every account under its full name without grouping
    pub flat: bool,
    /// Leave out the total line
    pub no_total: bool,
    /// Keep accounts whose balance is zero
    pub show_empty: bool,
    /// Aggregate to top-level accounts only
    pub no_rollup: bool,
}

/// One line of the balance report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceRow {
    /// Full account name
    pub account: String,
    pub balance: Balance,
    /// 1 for a top-level row, one more for each synthesized parent above it
    pub depth: usize,
    /// Nearest synthesized parent row this one is nested under
    pub parent: Option<String>,
}

impl BalanceRow {
    /// Name shown for the row: the full name at the top level, otherwise the
    /// part below its nearest synthesized parent
    pub fn display_name(&self) -> &str {
        self.parent
            .as_deref()
            .and_then(|parent| self.account.strip_prefix(parent))
            .and_then(|rest| rest.strip_prefix(ACCOUNT_SEPARATOR))
            .unwrap_or(&self.account)
    }
}

/// Rows of the balance report, ordered by account name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceReport {
    pub rows: Vec<BalanceRow>,
    /// Sum of every leaf balance; absent with `no_total` or when there are no rows
    pub total: Option<Balance>,
}

impl BalanceReport {
    /// Group the journal's leaf balances for display
    pub fn build(journal: &Journal, options: &BalanceReportOptions) -> Self {
        let leaves: BTreeMap<&str, Balance> = journal
            .all_accounts()
            .iter()
            .map(|name| (name.as_str(), journal.leaf_balance(name)))
            .collect();

        let rows = match (options.no_rollup, options.flat) {
            (true, true) => Vec::new(),
            (true, false) => top_level_rows(&leaves),
            (false, true) => flat_rows(&leaves),
            (false, false) => grouped_rows(&leaves),
        };
        let rows: Vec<BalanceRow> =
            rows.into_iter().filter(|row| options.show_empty || !row.balance.is_zero()).collect();

        let total = (!options.no_total && !rows.is_empty()).then(|| {
            leaves.values().fold(Balance::new(), |mut total, balance| {
                total.add_balance(balance);
                total
            })
        });

        Self { rows, total }
    }
}

fn flat_rows(leaves: &BTreeMap<&str, Balance>) -> Vec<BalanceRow> {
    leaves
        .iter()
        .map(|(name, balance)| BalanceRow {
            account: name.to_string(),
            balance: balance.clone(),
            depth: 1,
            parent: None,
        })
        .collect()
}

fn top_level_rows(leaves: &BTreeMap<&str, Balance>) -> Vec<BalanceRow> {
    let mut tops: BTreeMap<&str, Balance> = BTreeMap::new();
    for (name, balance) in leaves {
        tops.entry(top_level_name(name)).or_default().add_balance(balance);
    }
    tops.into_iter()
        .map(|(name, balance)| BalanceRow {
            account: name.to_string(),
            balance,
            depth: 1,
            parent: None,
        })
        .collect()
}

/// Parent names from nearest to furthest
fn ancestors<'a>(name: &'a str) -> impl Iterator<Item = &'a str> {
    std::iter::successors(parent_name(name), |&name: &&'a str| parent_name(name))
}

/// Leaves sharing an immediate parent get a synthesized parent row and are
/// nested under it; a leaf that is its parent's only posted child is shown
/// on its own under its full name.
///
/// A synthesized row holds the sum of every leaf below it, and nests under
/// any synthesized row further up.
fn grouped_rows(leaves: &BTreeMap<&str, Balance>) -> Vec<BalanceRow> {
    let mut children: BTreeMap<&str, usize> = BTreeMap::new();
    for name in leaves.keys() {
        if let Some(parent) = parent_name(name) {
            *children.entry(parent).or_default() += 1;
        }
    }
    let parents: BTreeSet<&str> =
        children.into_iter().filter(|(_, count)| *count > 1).map(|(parent, _)| parent).collect();

    let mut rows: BTreeMap<&str, Balance> = BTreeMap::new();
    for (name, balance) in leaves {
        rows.entry(*name).or_default().add_balance(balance);
        for ancestor in ancestors(name).filter(|ancestor| parents.contains(ancestor)) {
            rows.entry(ancestor).or_default().add_balance(balance);
        }
    }

    rows.into_iter()
        .map(|(name, balance)| {
            let enclosing: Vec<&str> =
                ancestors(name).filter(|ancestor| parents.contains(ancestor)).collect();
            BalanceRow {
                account: name.to_string(),
                balance,
                depth: enclosing.len() + 1,
                parent: enclosing.first().map(|parent| parent.to_string()),
            }
        })
        .collect()
}

/// One posting line of the register
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterEntry {
    pub date: NaiveDate,
    pub payee: String,
    pub account: String,
    /// Absent for a posting whose amount could not be determined
    pub amount: Option<Amount>,
    /// Sum of every shown posting up to and including this one
    pub running_total: Balance,
    /// Whether this is the first shown posting of its transaction
    pub first_in_transaction: bool,
}

/// Postings in file order, optionally restricted to accounts containing
/// `pattern` (case-insensitive)
pub fn register(journal: &Journal, pattern: Option<&str>) -> Vec<RegisterEntry> {
    let pattern = pattern.map(str::to_lowercase);
    let mut running = Balance::new();
    let mut entries = Vec::new();

    for transaction in journal.transactions() {
        let mut first = true;
        for posting in &transaction.postings {
            let account = journal.account_name(posting.account);
            if let Some(pattern) = &pattern {
                if !account.to_lowercase().contains(pattern.as_str()) {
                    continue;
                }
            }
            if let Some(amount) = &posting.amount {
                running.add_amount(amount);
            }
            entries.push(RegisterEntry {
                date: transaction.date,
                payee: transaction.payee.clone(),
                account: account.to_string(),
                amount: posting.amount.clone(),
                running_total: running.clone(),
                first_in_transaction: first,
            });
            first = false;
        }
    }
    entries
}

/// Activity summary of a journal
#[derive(Debug, Clone, PartialEq)]
pub struct JournalStats {
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    /// Days covered, counting both ends
    pub days: i64,
    pub unique_payees: usize,
    pub unique_accounts: usize,
    pub postings: usize,
    pub postings_per_day: f64,
    /// Postings of pending transactions
    pub uncleared_postings: usize,
    pub days_since_last_post: i64,
    pub postings_last_7_days: usize,
    pub postings_last_30_days: usize,
    pub postings_this_month: usize,
}

impl JournalStats {
    /// Summarise the journal relative to `today`; `None` when it has no transactions
    pub fn compute(journal: &Journal, today: NaiveDate) -> Option<Self> {
        let transactions = journal.transactions();
        let first_date = transactions.iter().map(|t| t.date).min()?;
        let last_date = transactions.iter().map(|t| t.date).max()?;
        let days = (last_date - first_date).num_days() + 1;

        let payees: BTreeSet<&str> = transactions
            .iter()
            .map(|t| t.payee.as_str())
            .filter(|payee| !payee.is_empty())
            .collect();
        let accounts: BTreeSet<_> =
            transactions.iter().flat_map(|t| t.postings.iter().map(|p| p.account)).collect();

        let postings = transactions.iter().map(|t| t.postings.len()).sum();
        let uncleared_postings = transactions
            .iter()
            .filter(|t| t.status == TransactionStatus::Pending)
            .map(|t| t.postings.len())
            .sum();

        let since = |cutoff: NaiveDate| -> usize {
            transactions.iter().filter(|t| t.date >= cutoff).map(|t| t.postings.len()).sum()
        };
        let month_start = today.with_day(1).unwrap_or(today);

        Some(Self {
            first_date,
            last_date,
            days,
            unique_payees: payees.len(),
            unique_accounts: accounts.len(),
            postings,
            postings_per_day: postings as f64 / days as f64,
            uncleared_postings,
            days_since_last_post: (today - last_date).num_days(),
            postings_last_7_days: since(today - Duration::days(7)),
            postings_last_30_days: since(today - Duration::days(30)),
            postings_this_month: since(month_start),
        })
    }
}

/// Balances carried into a fresh journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpeningBalances {
    /// Date of the latest transaction
    pub date: Option<NaiveDate>,
    /// Non-zero amounts per account, ordered by account then commodity
    pub postings: Vec<(String, Amount)>,
    /// Offsetting equity amounts, most negative first
    pub equity: Vec<Amount>,
}

impl OpeningBalances {
    /// Equity account the offsets are booked to
    pub const EQUITY_ACCOUNT: &'static str = "Equity:Opening Balances";

    /// Collect leaf balances of accounts containing `pattern` (case-insensitive)
    pub fn build(journal: &Journal, pattern: Option<&str>) -> Self {
        let pattern = pattern.map(str::to_lowercase);
        let postings: Vec<(String, Amount)> = journal
            .all_accounts()
            .iter()
            .filter(|name| match &pattern {
                Some(pattern) => name.to_lowercase().contains(pattern.as_str()),
                None => true,
            })
            .flat_map(|name| {
                journal
                    .leaf_balance(name)
                    .amounts()
                    .filter(|amount| !amount.is_zero())
                    .map(|amount| (name.clone(), amount.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut equity: Vec<Amount> = postings.iter().map(|(_, amount)| amount.negated()).collect();
        equity.sort_by(|a, b| a.quantity().cmp(b.quantity()));

        Self { date: journal.transactions().iter().map(|t| t.date).max(), postings, equity }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::JournalParser;

    fn journal(text: &str) -> Journal {
        JournalParser::new().parse_journal(&textwrap::dedent(text)).unwrap()
    }

    fn dollars(value: i64) -> Balance {
        Balance::from_amount(&Amount::from_i64(value, "$"))
    }

    fn summary(report: &BalanceReport) -> Vec<(&str, usize)> {
        report.rows.iter().map(|row| (row.display_name(), row.depth)).collect()
    }

    fn sample() -> Journal {
        journal(
            "
            2011-01-01 Paycheck
                Assets:Bank:Checking  $5
                Assets:Bank:Savings  $3
                Income:Salary

            2011-01-02 Lunch
                Expenses:Food  $2
                Assets:Cash  $-2
            ",
        )
    }

    #[test]
    fn test_siblings_expand_under_parent() {
        let report = BalanceReport::build(&sample(), &BalanceReportOptions::default());
        assert_eq!(
            summary(&report),
            [
                ("Assets:Bank", 1),
                ("Checking", 2),
                ("Savings", 2),
                ("Assets:Cash", 1),
                ("Expenses:Food", 1),
                ("Income:Salary", 1),
            ]
        );
        assert_eq!(report.rows[0].balance, dollars(8));
        assert_eq!(report.total, Some(Balance::new()));
    }

    #[test]
    fn test_nested_parents_roll_up_every_leaf() {
        let journal = journal(
            "
            2011-01-01 Spread
                Assets:Bank:Checking  $5
                Assets:Bank:Savings  $3
                Assets:Cash  $2
                Assets:Wallet  $1
                Equity:Opening
            ",
        );
        let report = BalanceReport::build(&journal, &BalanceReportOptions::default());
        assert_eq!(
            summary(&report),
            [
                ("Assets", 1),
                ("Bank", 2),
                ("Checking", 3),
                ("Savings", 3),
                ("Cash", 2),
                ("Wallet", 2),
                ("Equity:Opening", 1),
            ]
        );
        assert_eq!(report.rows[0].balance, journal.rolled_up_balance("Assets"));
        assert_eq!(report.rows[0].balance, dollars(11));
        assert_eq!(report.rows[1].balance, dollars(8));
        assert_eq!(report.total, Some(Balance::new()));
    }

    #[test]
    fn test_nested_row_keeps_segments_below_its_parent() {
        let journal = journal(
            "
            2011-01-01 Invest
                Assets:Broker:Fund:Bonds  $4
                Assets:Broker:Fund:Stocks  $6
                Assets:Cash  $2
                Assets:Wallet  $1
                Equity:Opening
            ",
        );
        let report = BalanceReport::build(&journal, &BalanceReportOptions::default());
        assert_eq!(
            summary(&report),
            [
                ("Assets", 1),
                ("Broker:Fund", 2),
                ("Bonds", 3),
                ("Stocks", 3),
                ("Cash", 2),
                ("Wallet", 2),
                ("Equity:Opening", 1),
            ]
        );
        assert_eq!(report.rows[0].balance, dollars(13));
        assert_eq!(report.rows[1].balance, dollars(10));
    }

    #[test]
    fn test_single_child_collapses() {
        let journal = journal(
            "
            2011-01-01 Cash
                Assets:Cash  $10
                Equity:Opening
            ",
        );
        let report = BalanceReport::build(&journal, &BalanceReportOptions::default());
        assert_eq!(summary(&report), [("Assets:Cash", 1), ("Equity:Opening", 1)]);
    }

    #[test]
    fn test_flat_lists_leaves() {
        let options = BalanceReportOptions { flat: true, ..Default::default() };
        let report = BalanceReport::build(&sample(), &options);
        let names: Vec<_> = report.rows.iter().map(|row| row.account.as_str()).collect();
        assert_eq!(
            names,
            [
                "Assets:Bank:Checking",
                "Assets:Bank:Savings",
                "Assets:Cash",
                "Expenses:Food",
                "Income:Salary",
            ]
        );
        assert!(report.rows.iter().all(|row| row.depth == 1));
    }

    #[test]
    fn test_no_rollup_aggregates_to_top_level() {
        let options = BalanceReportOptions { no_rollup: true, ..Default::default() };
        let report = BalanceReport::build(&sample(), &options);
        assert_eq!(summary(&report), [("Assets", 1), ("Expenses", 1), ("Income", 1)]);
        assert_eq!(report.rows[0].balance, dollars(6));
    }

    #[test]
    fn test_no_rollup_with_flat_is_empty() {
        let options = BalanceReportOptions { no_rollup: true, flat: true, ..Default::default() };
        let report = BalanceReport::build(&sample(), &options);
        assert!(report.rows.is_empty());
        assert!(report.total.is_none());
    }

    #[test]
    fn test_zero_rows_hidden_unless_empty_requested() {
        let journal = journal(
            "
            2011-01-01 Move
                Assets:Cash  $10
                Assets:Bank

            2011-01-02 Move back
                Assets:Bank  $10
                Assets:Cash
            ",
        );
        let report = BalanceReport::build(&journal, &BalanceReportOptions::default());
        assert!(report.rows.is_empty());

        let options =
            BalanceReportOptions { show_empty: true, no_total: true, ..Default::default() };
        let report = BalanceReport::build(&journal, &options);
        assert_eq!(summary(&report), [("Assets", 1), ("Bank", 2), ("Cash", 2)]);
        assert!(report.total.is_none());
    }

    #[test]
    fn test_total_counts_leaves_once() {
        let journal = journal(
            "
            2011-01-01 Budget
                (Budget:Food)  $30
                (Budget:Rent)  $70
            ",
        );
        let report = BalanceReport::build(&journal, &BalanceReportOptions::default());
        assert_eq!(report.rows[0].balance, dollars(100));
        assert_eq!(report.total, Some(dollars(100)));
    }

    #[test]
    fn test_register_running_total_over_shown_postings() {
        let entries = register(&sample(), Some("assets"));
        let accounts: Vec<_> = entries.iter().map(|e| e.account.as_str()).collect();
        assert_eq!(accounts, ["Assets:Bank:Checking", "Assets:Bank:Savings", "Assets:Cash"]);
        assert!(entries[0].first_in_transaction);
        assert!(!entries[1].first_in_transaction);
        assert!(entries[2].first_in_transaction);
        assert_eq!(entries[2].running_total, dollars(6));

        let all = register(&sample(), None);
        assert_eq!(all.len(), 5);
        assert!(all.last().unwrap().running_total.is_zero());
    }

    #[test]
    fn test_stats() {
        let today = NaiveDate::from_ymd_opt(2011, 1, 10).unwrap();
        let stats = JournalStats::compute(&sample(), today).unwrap();
        assert_eq!(stats.days, 2);
        assert_eq!(stats.unique_payees, 2);
        assert_eq!(stats.unique_accounts, 5);
        assert_eq!(stats.postings, 5);
        assert_eq!(stats.uncleared_postings, 5);
        assert_eq!(stats.days_since_last_post, 8);
        assert_eq!(stats.postings_last_7_days, 0);
        assert_eq!(stats.postings_last_30_days, 5);
        assert_eq!(stats.postings_this_month, 5);
        assert!((stats.postings_per_day - 2.5).abs() < f64::EPSILON);

        assert!(JournalStats::compute(&Journal::new(), today).is_none());
    }

    #[test]
    fn test_opening_balances() {
        let opening = OpeningBalances::build(&sample(), Some("ASSETS"));
        assert_eq!(opening.date, NaiveDate::from_ymd_opt(2011, 1, 2));
        let accounts: Vec<_> = opening.postings.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(accounts, ["Assets:Bank:Checking", "Assets:Bank:Savings", "Assets:Cash"]);
        assert_eq!(
            opening.equity,
            [Amount::from_i64(-5, "$"), Amount::from_i64(-3, "$"), Amount::from_i64(2, "$")]
        );
    }
}
