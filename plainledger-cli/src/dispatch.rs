//! Command dispatch and report rendering
//!
//! Every command loads the session's journal, asks the core for the data it
//! needs and renders it as text.

use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use log::debug;
use plainledger_core::report::register;
use plainledger_core::{
    BalanceReport, BalanceReportOptions, Journal, JournalStats, OpeningBalances, RegisterEntry,
};

use crate::cli::{Command, PatternArgs, PricesArgs};
use crate::session::Session;

const BALANCE_WIDTH: usize = 20;
const REGISTER_DATE_WIDTH: usize = 9;
const REGISTER_PAYEE_WIDTH: usize = 21;
const REGISTER_ACCOUNT_WIDTH: usize = 22;
const REGISTER_AMOUNT_WIDTH: usize = 12;
const EQUITY_LINE_WIDTH: usize = 59;

/// Main command dispatcher
pub struct Dispatcher {
    session: Session,
}

impl Dispatcher {
    /// Create a new dispatcher with the given session
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Load the journal and run one command, writing its report to `out`
    pub fn execute(&self, command: &Command, out: &mut dyn Write) -> Result<()> {
        let journal = self.session.load_journal()?;
        debug!("running {}", command.command_name());

        match command {
            Command::Balance(args) => {
                let report = BalanceReport::build(&journal, &BalanceReportOptions::from(args));
                write_balance(&journal, &report, out)?;
            }
            Command::Register(PatternArgs { pattern }) => {
                write_register(&journal, &register(&journal, pattern.as_deref()), out)?;
            }
            Command::Print => journal.write_transactions(out)?,
            Command::Accounts(PatternArgs { pattern }) => {
                let accounts = match pattern {
                    Some(pattern) => journal.accounts_matching(pattern),
                    None => journal.all_accounts().to_vec(),
                };
                write_lines(&accounts, out)?;
            }
            Command::Payees(PatternArgs { pattern }) => {
                let payees = match pattern {
                    Some(pattern) => journal.payees_matching(pattern),
                    None => journal.all_payees().to_vec(),
                };
                write_lines(&payees, out)?;
            }
            Command::Commodities(PatternArgs { pattern }) => {
                let commodities = match pattern {
                    Some(pattern) => journal.commodities_for_account(pattern),
                    None => journal.all_commodities().to_vec(),
                };
                write_lines(&commodities, out)?;
            }
            Command::Stats => {
                let stats = JournalStats::compute(&journal, self.session.today());
                write_stats(stats.as_ref(), self.session.journal_path(), out)?;
            }
            Command::Equity(PatternArgs { pattern }) => {
                let opening = OpeningBalances::build(&journal, pattern.as_deref());
                write_equity(&journal, &opening, self.session.today(), out)?;
            }
            Command::Prices(PricesArgs { commodity }) => {
                write_prices(&journal, commodity.as_deref(), out)?;
            }
        }
        out.flush()?;
        Ok(())
    }
}

fn write_lines(lines: &[String], out: &mut dyn Write) -> io::Result<()> {
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

/// Balance report: amounts right-aligned in a 20-column field, one line per
/// commodity, with the account name on the last line of each row
pub fn write_balance(
    journal: &Journal,
    report: &BalanceReport,
    out: &mut dyn Write,
) -> io::Result<()> {
    let pool = journal.commodities();
    for row in &report.rows {
        let lines = pool.format_balance_lines(&row.balance);
        let (last, leading) = match lines.split_last() {
            Some(split) => split,
            None => continue,
        };
        for line in leading {
            writeln!(out, "{:>width$}", line, width = BALANCE_WIDTH)?;
        }
        let indent = "  ".repeat(row.depth.saturating_sub(1));
        writeln!(out, "{:>width$}  {}{}", last, indent, row.display_name(), width = BALANCE_WIDTH)?;
    }

    if let Some(total) = &report.total {
        writeln!(out, "{}", "-".repeat(BALANCE_WIDTH))?;
        for line in pool.format_balance_lines(total) {
            writeln!(out, "{:>width$}", line, width = BALANCE_WIDTH)?;
        }
    }
    Ok(())
}

/// Shorten text to `width` characters, marking the cut with `..`
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(width.saturating_sub(2)).collect();
    shortened.push_str("..");
    shortened
}

/// Register report: date, payee, account, amount and running total columns
pub fn write_register(
    journal: &Journal,
    entries: &[RegisterEntry],
    out: &mut dyn Write,
) -> io::Result<()> {
    let pool = journal.commodities();
    for entry in entries {
        let (date, payee) = if entry.first_in_transaction {
            (
                entry.date.format("%y-%b-%d").to_string(),
                truncate(&entry.payee, REGISTER_PAYEE_WIDTH),
            )
        } else {
            (String::new(), String::new())
        };
        let amount =
            entry.amount.as_ref().map(|amount| pool.format_amount(amount)).unwrap_or_default();
        let totals = pool.format_balance_lines(&entry.running_total);
        let (first_total, more_totals) = match totals.split_first() {
            Some((first, rest)) => (first.as_str(), rest),
            None => ("0", &[][..]),
        };

        writeln!(
            out,
            "{:<dw$} {:<pw$} {:<aw$} {:>mw$} {:>mw$}",
            date,
            payee,
            entry.account,
            amount,
            first_total,
            dw = REGISTER_DATE_WIDTH,
            pw = REGISTER_PAYEE_WIDTH,
            aw = REGISTER_ACCOUNT_WIDTH,
            mw = REGISTER_AMOUNT_WIDTH,
        )?;
        for total in more_totals {
            writeln!(
                out,
                "{:<dw$} {:<pw$} {:<aw$} {:>mw$} {:>mw$}",
                "",
                "",
                "",
                "",
                total,
                dw = REGISTER_DATE_WIDTH,
                pw = REGISTER_PAYEE_WIDTH,
                aw = REGISTER_ACCOUNT_WIDTH,
                mw = REGISTER_AMOUNT_WIDTH,
            )?;
        }
    }
    Ok(())
}

/// Statistics summary, or a notice when the journal is empty
pub fn write_stats(
    stats: Option<&JournalStats>,
    source: &Path,
    out: &mut dyn Write,
) -> io::Result<()> {
    let Some(stats) = stats else {
        return writeln!(out, "No transactions found");
    };

    writeln!(
        out,
        "Time period: {} to {} ({} days)",
        stats.first_date.format("%y-%b-%d"),
        stats.last_date.format("%y-%b-%d"),
        stats.days
    )?;
    writeln!(out)?;
    writeln!(out, "  Files these postings came from:")?;
    writeln!(out, "    {}", source.display())?;
    writeln!(out)?;
    writeln!(out, "  Unique payees:               {}", stats.unique_payees)?;
    writeln!(out, "  Unique accounts:             {}", stats.unique_accounts)?;
    writeln!(out)?;
    writeln!(
        out,
        "  Number of postings:          {} ({:.2} per day)",
        stats.postings, stats.postings_per_day
    )?;
    writeln!(out, "  Uncleared postings:          {}", stats.uncleared_postings)?;
    writeln!(out)?;
    writeln!(out, "  Days since last post:        {}", stats.days_since_last_post)?;
    writeln!(out, "  Posts in last 7 days:        {}", stats.postings_last_7_days)?;
    writeln!(out, "  Posts in last 30 days:       {}", stats.postings_last_30_days)?;
    writeln!(out, "  Posts seen this month:       {}", stats.postings_this_month)
}

fn write_equity_line(account: &str, amount: &str, out: &mut dyn Write) -> io::Result<()> {
    let spacing = EQUITY_LINE_WIDTH.saturating_sub(account.len() + amount.len()).max(2);
    writeln!(out, "    {}{}{}", account, " ".repeat(spacing), amount)
}

/// Opening balances transaction dated at the latest transaction, or `today`
pub fn write_equity(
    journal: &Journal,
    opening: &OpeningBalances,
    today: NaiveDate,
    out: &mut dyn Write,
) -> io::Result<()> {
    let date = opening.date.unwrap_or(today);
    writeln!(out, "{} Opening Balances", date.format("%Y/%m/%d"))?;
    for (account, amount) in &opening.postings {
        write_equity_line(account, &journal.format_amount(amount), out)?;
    }
    for amount in &opening.equity {
        write_equity_line(OpeningBalances::EQUITY_ACCOUNT, &journal.format_amount(amount), out)?;
    }
    Ok(())
}

/// Price list, optionally limited to commodities starting with `filter`
pub fn write_prices(
    journal: &Journal,
    filter: Option<&str>,
    out: &mut dyn Write,
) -> io::Result<()> {
    for entry in journal.price_entries() {
        if let Some(filter) = filter {
            if !entry.symbol.starts_with(filter) && !entry.price.commodity().starts_with(filter) {
                continue;
            }
        }
        writeln!(
            out,
            "{} {:<12}{:>12}",
            entry.date.format("%Y/%m/%d"),
            entry.symbol,
            journal.format_amount(&entry.price)
        )?;
    }
    Ok(())
}
