//! Command-line interface definitions using Clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use plainledger_core::BalanceReportOptions;

/// plainledger - reports over ledger-format journals
#[derive(Parser, Debug)]
#[command(name = "plainledger")]
#[command(version, long_about = None)]
#[command(about = "Balance, register and price reports over ledger-format journals")]
pub struct Cli {
    /// Journal file to read (defaults to $LEDGER_FILE)
    #[arg(short = 'f', long = "file", global = true)]
    pub file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Log level selected by the verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::Debug
        } else if self.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Warn
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show account balances (alias: bal)
    #[command(name = "balance", aliases = &["bal"])]
    Balance(BalanceArgs),

    /// Show postings with a running total (aliases: reg, r)
    #[command(name = "register", aliases = &["reg", "r"])]
    Register(PatternArgs),

    /// Print transactions in journal syntax
    #[command(name = "print")]
    Print,

    /// List accounts that have postings
    #[command(name = "accounts")]
    Accounts(PatternArgs),

    /// List payees
    #[command(name = "payees")]
    Payees(PatternArgs),

    /// List commodities, optionally only those posted to matching accounts
    #[command(name = "commodities")]
    Commodities(PatternArgs),

    /// Show journal statistics
    #[command(name = "stats")]
    Stats,

    /// Print an opening balances transaction for the current balances
    #[command(name = "equity")]
    Equity(PatternArgs),

    /// List known commodity prices
    #[command(name = "prices")]
    Prices(PricesArgs),
}

impl Command {
    /// Get the command name as a string
    pub fn command_name(&self) -> &'static str {
        match self {
            Command::Balance(_) => "balance",
            Command::Register(_) => "register",
            Command::Print => "print",
            Command::Accounts(_) => "accounts",
            Command::Payees(_) => "payees",
            Command::Commodities(_) => "commodities",
            Command::Stats => "stats",
            Command::Equity(_) => "equity",
            Command::Prices(_) => "prices",
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct BalanceArgs {
    /// Show every account under its full name
    #[arg(long = "flat")]
    pub flat: bool,

    /// Don't show the total line
    #[arg(long = "no-total")]
    pub no_total: bool,

    /// Show accounts with a zero balance
    #[arg(short = 'E', long = "empty")]
    pub empty: bool,

    /// Only show top-level accounts
    #[arg(short = 'n', long = "no-rollup")]
    pub no_rollup: bool,
}

impl From<&BalanceArgs> for BalanceReportOptions {
    fn from(args: &BalanceArgs) -> Self {
        BalanceReportOptions {
            flat: args.flat,
            no_total: args.no_total,
            show_empty: args.empty,
            no_rollup: args.no_rollup,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct PatternArgs {
    /// Case-insensitive substring to match
    pub pattern: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct PricesArgs {
    /// Only show prices of, or quoted in, commodities starting with this
    pub commodity: Option<String>,
}
