//! Journal data structure for storing transactions
//!
//! A [`Journal`] owns everything one load produces: the transactions in file
//! order, the account tree, the commodity pool and the directives seen. The
//! sorted indices of accounts, commodities and payees are kept up to date as
//! transactions are added; after loading the journal is only read.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use log::info;
use plainledger_math::{format_amount, Amount, Balance, BalanceResult, CommodityPool, PricePoint};

use crate::account::{AccountId, AccountTree, AccountType, ACCOUNT_SEPARATOR};
use crate::directive::Directive;
use crate::parser::{JournalParseError, JournalParser};
use crate::posting::{AssertionKind, Posting, PostingKind};
use crate::transaction::Transaction;

/// Minimum width of the account column when printing postings
const ACCOUNT_COLUMN_WIDTH: usize = 36;
/// Width amounts are right-aligned to when printing postings
const AMOUNT_COLUMN_WIDTH: usize = 10;

/// A price point together with the commodity it prices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceEntry {
    pub date: NaiveDate,
    pub symbol: String,
    pub price: Amount,
}

/// Main journal containing all transactions
#[derive(Debug, Default, Clone)]
pub struct Journal {
    transactions: Vec<Transaction>,
    accounts: AccountTree,
    commodities: CommodityPool,
    directives: Vec<Directive>,
    account_aliases: HashMap<String, String>,
    accounts_used: Vec<String>,
    commodities_used: Vec<String>,
    payees: Vec<String>,
}

fn insert_sorted(list: &mut Vec<String>, value: &str) {
    if let Err(index) = list.binary_search_by(|probe| probe.as_str().cmp(value)) {
        list.insert(index, value.to_string());
    }
}

fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    needle_lower.is_empty() || haystack.to_lowercase().contains(needle_lower)
}

impl Journal {
    /// Create a new empty journal
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a journal from any reader
    pub fn load_from_reader(mut reader: impl Read) -> Result<Journal, JournalParseError> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|source| JournalParseError::IoError { path: "<input>".into(), source })?;
        JournalParser::new().parse_journal(&text)
    }

    /// Read and parse a journal file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Journal, JournalParseError> {
        let path = path.as_ref();
        info!("loading journal from {}", path.display());
        let text = std::fs::read_to_string(path)
            .map_err(|source| JournalParseError::IoError { path: path.to_path_buf(), source })?;
        JournalParser::new().parse_journal(&text)
    }

    /// Add a transaction, updating the derived indices
    pub fn add_transaction(&mut self, mut transaction: Transaction) {
        let index = self.transactions.len();
        for posting in &mut transaction.postings {
            posting.transaction = index;
            insert_sorted(&mut self.accounts_used, self.accounts.full_name(posting.account));
            let symbols = [
                posting.amount.as_ref(),
                posting.cost.as_ref().map(|c| &c.amount),
                posting.price.as_ref().map(|p| &p.amount),
            ];
            for amount in symbols.into_iter().flatten() {
                insert_sorted(&mut self.commodities_used, amount.commodity());
            }
        }
        insert_sorted(&mut self.payees, &transaction.payee);
        self.transactions.push(transaction);
    }

    /// Record a directive seen while loading
    pub fn add_directive(&mut self, directive: Directive) {
        self.directives.push(directive);
    }

    /// Make `alias` refer to `account` in later postings
    pub fn add_account_alias(&mut self, alias: &str, account: &str) {
        self.account_aliases.insert(alias.to_string(), account.to_string());
    }

    /// Map an account alias to the account it stands for
    pub fn resolve_account<'a>(&'a self, name: &'a str) -> &'a str {
        self.account_aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn accounts(&self) -> &AccountTree {
        &self.accounts
    }

    pub fn accounts_mut(&mut self) -> &mut AccountTree {
        &mut self.accounts
    }

    pub fn commodities(&self) -> &CommodityPool {
        &self.commodities
    }

    pub fn commodities_mut(&mut self) -> &mut CommodityPool {
        &mut self.commodities
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// All transactions in file order
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Every posting with its transaction, in file order
    pub fn postings(&self) -> impl Iterator<Item = (&Transaction, &Posting)> {
        self.transactions.iter().flat_map(|t| t.postings.iter().map(move |p| (t, p)))
    }

    /// Full name of a posting's account
    pub fn account_name(&self, id: AccountId) -> &str {
        self.accounts.full_name(id)
    }

    /// Sorted full names of every account posted to
    pub fn all_accounts(&self) -> &[String] {
        &self.accounts_used
    }

    /// Accounts posted to whose name contains `pattern`, ignoring case
    pub fn accounts_matching(&self, pattern: &str) -> Vec<String> {
        let pattern = pattern.to_lowercase();
        self.accounts_used.iter().filter(|a| contains_ignore_case(a, &pattern)).cloned().collect()
    }

    /// Sorted symbols of every commodity used by a posting amount, cost or price
    pub fn all_commodities(&self) -> &[String] {
        &self.commodities_used
    }

    /// Sorted unique payees
    pub fn all_payees(&self) -> &[String] {
        &self.payees
    }

    /// Payees containing `pattern`, ignoring case
    pub fn payees_matching(&self, pattern: &str) -> Vec<String> {
        let pattern = pattern.to_lowercase();
        self.payees.iter().filter(|p| contains_ignore_case(p, &pattern)).cloned().collect()
    }

    /// Commodities of the amounts posted to accounts matching `pattern`
    pub fn commodities_for_account(&self, pattern: &str) -> Vec<String> {
        let pattern = pattern.to_lowercase();
        let mut symbols = Vec::new();
        for (_, posting) in self.postings() {
            if let Some(amount) = &posting.amount {
                if contains_ignore_case(self.account_name(posting.account), &pattern) {
                    insert_sorted(&mut symbols, amount.commodity());
                }
            }
        }
        symbols
    }

    /// Classification of an account by name
    pub fn account_type(&self, name: &str) -> AccountType {
        match self.accounts.find(name) {
            Some(id) if id != self.accounts.root() => self.accounts.get(id).account_type,
            _ => AccountType::from_path(name),
        }
    }

    fn sum_where(&self, mut include: impl FnMut(&str) -> bool) -> Balance {
        let mut balance = Balance::new();
        for (_, posting) in self.postings() {
            if let Some(amount) = &posting.amount {
                if include(self.account_name(posting.account)) {
                    balance.add_amount(amount);
                }
            }
        }
        balance
    }

    /// Sum of the amounts posted to exactly `name`
    pub fn leaf_balance(&self, name: &str) -> Balance {
        self.sum_where(|account| account == name)
    }

    /// Sum of the amounts posted to `name` or any account below it
    pub fn rolled_up_balance(&self, name: &str) -> Balance {
        self.sum_where(|account| {
            account == name
                || (account.starts_with(name)
                    && account[name.len()..].starts_with(ACCOUNT_SEPARATOR))
        })
    }

    /// Sum of every posting amount
    pub fn total_balance(&self) -> Balance {
        self.sum_where(|_| true)
    }

    /// Most recent price of `symbol` quoted in `target`
    pub fn latest_price(&self, symbol: &str, target: &str) -> Option<&PricePoint> {
        self.commodities.find(symbol)?.latest_price(target)
    }

    /// Price of `symbol` in `target` in effect on `date`
    pub fn price_at(&self, symbol: &str, date: NaiveDate, target: &str) -> Option<&PricePoint> {
        self.commodities.find(symbol)?.price_at(date, target)
    }

    /// Value a balance in `target`, using the latest prices or those on `date`
    pub fn value_in(
        &self,
        balance: &Balance,
        target: &str,
        date: Option<NaiveDate>,
    ) -> BalanceResult<Amount> {
        balance.convert_to(&self.commodities, target, date)
    }

    /// Every known price point, sorted by date, commodity and quote commodity
    pub fn price_entries(&self) -> Vec<PriceEntry> {
        let mut entries: Vec<PriceEntry> = self
            .commodities
            .iter()
            .flat_map(|commodity| {
                commodity.price_history().iter().map(|point| PriceEntry {
                    date: point.date,
                    symbol: commodity.symbol().to_string(),
                    price: point.price.clone(),
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            (a.date, &a.symbol, a.price.commodity()).cmp(&(b.date, &b.symbol, b.price.commodity()))
        });
        entries
    }

    /// Transactions rendered in journal syntax
    pub fn printed(&self) -> PrintedJournal<'_> {
        PrintedJournal { journal: self }
    }

    /// Format all transactions and write them to the given writer.
    pub fn write_transactions<W: std::io::Write + ?Sized>(
        &self,
        writer: &mut W,
    ) -> std::io::Result<()> {
        write!(writer, "{}", self.printed())
    }

    /// Format all transactions and return them as a String
    pub fn format_transactions(&self) -> String {
        self.printed().to_string()
    }

    /// Format an amount with its commodity's learned style
    pub fn format_amount(&self, amount: &Amount) -> String {
        self.commodities.format_amount(amount)
    }

    fn format_print_amount(&self, amount: &Amount) -> String {
        let config = self.commodities.format_config(amount);
        let precision = config.precision.unwrap_or(0).max(amount.precision());
        format_amount(amount, &config.with_precision(precision))
    }

    fn display_account(&self, posting: &Posting) -> String {
        let name = self.account_name(posting.account);
        match posting.kind {
            PostingKind::Normal => name.to_string(),
            PostingKind::Virtual => format!("({})", name),
            PostingKind::Bracketed => format!("[{}]", name),
        }
    }

    fn posting_amount_text(&self, posting: &Posting) -> String {
        let mut text = String::new();
        if let Some(expression) = &posting.expression {
            text.push_str(expression);
        } else if let (Some(amount), false) = (&posting.amount, posting.generated) {
            text.push_str(&self.format_print_amount(amount));
        }
        if let Some(cost) = &posting.cost {
            let amount = self.format_print_amount(&cost.amount);
            if cost.is_total {
                text.push_str(&format!(" {{{{{}}}}}", amount));
            } else {
                text.push_str(&format!(" {{{}}}", amount));
            }
        }
        if let Some(price) = &posting.price {
            let op = if price.is_total { "@@" } else { "@" };
            text.push_str(&format!(" {} {}", op, self.format_print_amount(&price.amount)));
        }
        if let Some(assertion) = &posting.assertion {
            let op = match assertion.kind {
                AssertionKind::Assertion => "==",
                AssertionKind::Assignment => "=",
            };
            text.push_str(&format!(" {} {}", op, self.format_print_amount(&assertion.amount)));
        }
        text.trim_start().to_string()
    }

    fn fmt_transaction(
        &self,
        f: &mut fmt::Formatter<'_>,
        transaction: &Transaction,
    ) -> fmt::Result {
        write!(f, "{}", transaction.date.format("%Y/%m/%d"))?;
        if let Some(aux) = transaction.aux_date {
            write!(f, "={}", aux.format("%Y/%m/%d"))?;
        }
        if let Some(marker) = transaction.status.marker() {
            write!(f, " {}", marker)?;
        }
        if let Some(code) = &transaction.code {
            write!(f, " ({})", code)?;
        }
        write!(f, " {}", transaction.payee)?;
        fmt_note(f, transaction.note.as_deref(), "  ; ")?;
        writeln!(f)?;

        let accounts: Vec<String> =
            transaction.postings.iter().map(|p| self.display_account(p)).collect();
        let longest = accounts.iter().map(|a| a.chars().count()).max().unwrap_or(0);

        let account_width = longest.max(ACCOUNT_COLUMN_WIDTH) + 2;
        let amount_width = AMOUNT_COLUMN_WIDTH;
        for (posting, account) in transaction.postings.iter().zip(&accounts) {
            let amount = self.posting_amount_text(posting);
            if amount.is_empty() {
                write!(f, "    {}", account)?;
            } else if amount.chars().count() > amount_width + 2 {
                write!(f, "    {account:account_width$}{amount}")?;
            } else {
                write!(f, "    {account:account_width$}{amount:>amount_width$}")?;
            }
            fmt_note(f, posting.note.as_deref(), "  ; ")?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Write the first line of a note inline and the rest as indented comments
fn fmt_note(f: &mut fmt::Formatter<'_>, note: Option<&str>, inline_prefix: &str) -> fmt::Result {
    let Some(note) = note else {
        return Ok(());
    };
    let mut lines = note.lines();
    if let Some(first) = lines.next() {
        write!(f, "{}{}", inline_prefix, first)?;
    }
    for line in lines {
        write!(f, "\n    ; {}", line)?;
    }
    Ok(())
}

/// Display adapter printing a journal's transactions separated by blank lines
pub struct PrintedJournal<'a> {
    journal: &'a Journal,
}

impl fmt::Display for PrintedJournal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, transaction) in self.journal.transactions.iter().enumerate() {
            if i != 0 {
                writeln!(f)?;
            }
            self.journal.fmt_transaction(f, transaction)?;
        }
        Ok(())
    }
}
