//! Journal parsing engine
//!
//! The parser walks the input one line at a time. Each line is classified by
//! [`crate::lexer`]; a header opens a transaction that collects indented
//! postings and notes until the next non-indented line, and directive blocks
//! collect their indented sub-lines the same way. A finished transaction has
//! balance assignments resolved, its elided amount inferred and its balance
//! verified before it is added to the [`Journal`]. Running account balances
//! are tracked so balance assertions can be checked in file order.
//!
//! The first error aborts the load; no partial journal is returned.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info};
use plainledger_math::{Amount, Balance};
use thiserror::Error;

use crate::account::AccountId;
use crate::directive::Directive;
use crate::journal::Journal;
use crate::lexer::{classify_line, collect_tags, LineKind, TransactionHeader};
use crate::posting::{AssertionKind, BalanceAssertion, CostSpec, Posting, PriceSpec};
use crate::transaction::{Position, Transaction, TransactionError};
use crate::transaction_parser::{
    intern_literal, parse_posting_line, AssertionOp, PostingParseError,
};

/// Errors that abort loading a journal
#[derive(Debug, Error)]
pub enum JournalParseError {
    #[error("line {line}: {message}\n  {context}")]
    ParseError { line: usize, message: String, context: String },
    #[error("line {line}: invalid date '{text}'\n  {context}")]
    InvalidDate { line: usize, text: String, context: String },
    #[error("line {line}: invalid amount '{text}'\n  {context}")]
    InvalidAmount { line: usize, text: String, context: String },
    #[error("line {line}: transaction '{description}': {source}")]
    UnbalancedTransaction {
        line: usize,
        description: String,
        #[source]
        source: TransactionError,
    },
    #[error("line {line}: assertion failed for {account}: expected {expected}, found {actual}")]
    AssertionFailed { line: usize, account: String, expected: String, actual: String },
    #[error("IO error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl JournalParseError {
    /// 1-based line the error was found on, if it came from journal text
    pub fn line(&self) -> Option<usize> {
        match self {
            JournalParseError::ParseError { line, .. }
            | JournalParseError::InvalidDate { line, .. }
            | JournalParseError::InvalidAmount { line, .. }
            | JournalParseError::UnbalancedTransaction { line, .. }
            | JournalParseError::AssertionFailed { line, .. } => Some(*line),
            JournalParseError::IoError { .. } => None,
        }
    }
}

/// A transaction still collecting postings
#[derive(Debug)]
struct PendingTransaction {
    transaction: Transaction,
    line: usize,
    end_line: usize,
    posting_lines: Vec<usize>,
}

/// A directive still collecting indented sub-lines
#[derive(Debug)]
struct PendingDirective {
    directive: Directive,
    line: usize,
    context: String,
}

/// Line-oriented journal parser
#[derive(Debug, Default)]
pub struct JournalParser {
    journal: Journal,
    pending: Option<PendingTransaction>,
    block: Option<PendingDirective>,
    running: HashMap<AccountId, Balance>,
}

impl JournalParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a journal file
    pub fn parse_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Journal, JournalParseError> {
        let path = path.as_ref();
        info!("reading journal {}", path.display());
        let text = std::fs::read_to_string(path)
            .map_err(|source| JournalParseError::IoError { path: path.to_path_buf(), source })?;
        self.parse_journal(&text)
    }

    /// Parse journal text into a fresh journal
    pub fn parse_journal(&mut self, input: &str) -> Result<Journal, JournalParseError> {
        *self = Self::default();
        for (index, raw) in input.lines().enumerate() {
            self.parse_line(raw, index + 1)?;
        }
        self.finish_transaction()?;
        self.close_block()?;

        let journal = std::mem::take(&mut self.journal);
        info!(
            "parsed {} transactions over {} accounts",
            journal.transactions().len(),
            journal.all_accounts().len()
        );
        *self = Self::default();
        Ok(journal)
    }

    fn parse_line(&mut self, raw: &str, line: usize) -> Result<(), JournalParseError> {
        match classify_line(raw) {
            LineKind::Blank | LineKind::Comment(_) => {
                self.finish_transaction()?;
                self.close_block()
            }
            LineKind::Header(header) => {
                self.finish_transaction()?;
                self.close_block()?;
                self.start_transaction(header, line);
                Ok(())
            }
            LineKind::MalformedHeader(text) => Err(JournalParseError::InvalidDate {
                line,
                text: text.to_string(),
                context: raw.trim_end().to_string(),
            }),
            LineKind::Note(text) => {
                self.add_note(text, line);
                Ok(())
            }
            LineKind::Posting(text) => {
                if self.pending.is_some() {
                    self.add_posting(text, raw, line)
                } else if let Some(block) = &mut self.block {
                    block.directive.add_sub_line(text);
                    Ok(())
                } else {
                    debug!("ignoring indented line {} outside a transaction", line);
                    Ok(())
                }
            }
            LineKind::Directive(text) => {
                self.finish_transaction()?;
                self.close_block()?;
                self.start_directive(text, raw, line)
            }
        }
    }

    fn start_transaction(&mut self, header: TransactionHeader, line: usize) {
        let mut transaction = Transaction::new(header.date, header.payee);
        transaction.aux_date = header.aux_date;
        transaction.status = header.status;
        transaction.code = header.code;
        if let Some(note) = header.note {
            collect_tags(&note, &mut transaction.metadata);
            transaction.note = Some(note);
        }
        self.pending = Some(PendingTransaction {
            transaction,
            line,
            end_line: line,
            posting_lines: Vec::new(),
        });
    }

    fn add_note(&mut self, text: &str, line: usize) {
        let Some(pending) = &mut self.pending else {
            debug!("ignoring indented comment on line {} outside a transaction", line);
            return;
        };
        pending.end_line = line;
        let transaction = &mut pending.transaction;
        match transaction.postings.last_mut() {
            Some(posting) => {
                posting.append_note(text);
                collect_tags(text, &mut posting.metadata);
            }
            None => {
                transaction.append_note(text);
                collect_tags(text, &mut transaction.metadata);
            }
        }
    }

    fn add_posting(&mut self, text: &str, raw: &str, line: usize) -> Result<(), JournalParseError> {
        let context = || raw.trim_end().to_string();
        let parsed = parse_posting_line(text).map_err(|error| match error {
            PostingParseError::InvalidAmount(text) => {
                JournalParseError::InvalidAmount { line, text, context: context() }
            }
            other => JournalParseError::ParseError {
                line,
                message: other.to_string(),
                context: context(),
            },
        })?;

        let account_name = self.journal.resolve_account(parsed.account).to_string();
        let account = self.journal.accounts_mut().find_or_create(&account_name);
        let pool = self.journal.commodities_mut();

        let mut posting = Posting::new(account);
        posting.kind = parsed.kind;
        posting.amount = parsed.amount.as_ref().map(|literal| intern_literal(pool, literal));
        if let Some(expression) = parsed.expression {
            posting.expression = Some(expression.to_string());
            posting.amount = Some(Amount::zero(pool.default_symbol()));
        }
        posting.cost = parsed.cost.map(|(literal, is_total)| CostSpec {
            amount: intern_literal(pool, &literal),
            is_total,
        });
        posting.price = parsed.price.map(|(literal, is_total)| PriceSpec {
            amount: intern_literal(pool, &literal),
            is_total,
        });
        let has_amount = posting.amount.is_some();
        posting.assertion = parsed.assertion.map(|(literal, op)| BalanceAssertion {
            amount: intern_literal(pool, &literal),
            kind: if op == AssertionOp::Double || has_amount {
                AssertionKind::Assertion
            } else {
                AssertionKind::Assignment
            },
        });
        if let Some(note) = parsed.note.filter(|note| !note.is_empty()) {
            posting.append_note(note);
            collect_tags(note, &mut posting.metadata);
        }

        if let Some(pending) = &mut self.pending {
            pending.transaction.add_posting(posting);
            pending.posting_lines.push(line);
            pending.end_line = line;
        }
        Ok(())
    }

    fn start_directive(
        &mut self,
        text: &str,
        raw: &str,
        line: usize,
    ) -> Result<(), JournalParseError> {
        let context = raw.trim_end().to_string();
        match Directive::parse(text) {
            Some(Ok(directive)) if directive.takes_sub_lines() => {
                self.block = Some(PendingDirective { directive, line, context });
                Ok(())
            }
            Some(Ok(directive)) => {
                self.block = Some(PendingDirective { directive, line, context });
                self.close_block()
            }
            Some(Err(error)) => {
                Err(JournalParseError::ParseError { line, message: error.to_string(), context })
            }
            None => {
                debug!("ignoring unrecognised line {}: {}", line, text);
                Ok(())
            }
        }
    }

    fn close_block(&mut self) -> Result<(), JournalParseError> {
        let Some(PendingDirective { directive, line, context }) = self.block.take() else {
            return Ok(());
        };
        directive.apply(&mut self.journal).map_err(|error| JournalParseError::ParseError {
            line,
            message: error.to_string(),
            context,
        })?;
        self.journal.add_directive(directive);
        Ok(())
    }

    fn finish_transaction(&mut self) -> Result<(), JournalParseError> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        let PendingTransaction { mut transaction, line, end_line, posting_lines } = pending;
        let unbalanced = |transaction: &Transaction, source: TransactionError| {
            JournalParseError::UnbalancedTransaction {
                line,
                description: transaction.payee.clone(),
                source,
            }
        };

        if let Err(source) = self.resolve_assignments(&mut transaction) {
            return Err(unbalanced(&transaction, source));
        }
        let default_symbol = self.journal.commodities().default_symbol().to_string();
        if let Err(source) = transaction.finalize(&default_symbol) {
            return Err(unbalanced(&transaction, source));
        }
        self.check_assertions(&transaction, &posting_lines)?;
        self.record_posting_prices(&transaction);

        transaction.pos = Some(Position { beg_line: line, end_line });
        debug!(
            "parsed transaction '{}' on line {} with {} postings",
            transaction.payee,
            line,
            transaction.postings.len()
        );
        self.journal.add_transaction(transaction);
        Ok(())
    }

    /// Give each assigned posting the amount that brings its account to the target
    fn resolve_assignments(&self, transaction: &mut Transaction) -> Result<(), TransactionError> {
        for index in 0..transaction.postings.len() {
            let (earlier, rest) = transaction.postings.split_at_mut(index);
            let posting = &mut rest[0];
            let target = match &posting.assertion {
                Some(BalanceAssertion { amount, kind: AssertionKind::Assignment })
                    if posting.amount.is_none() =>
                {
                    amount.clone()
                }
                _ => continue,
            };

            let mut current = self.running.get(&posting.account).cloned().unwrap_or_default();
            for amount in earlier
                .iter()
                .filter(|p| p.account == posting.account)
                .filter_map(|p| p.amount.as_ref())
            {
                current.add_amount(amount);
            }
            let current = current
                .amount(target.commodity())
                .cloned()
                .unwrap_or_else(|| Amount::zero(target.commodity()));

            posting.amount = Some(target.checked_sub(&current)?);
            posting.generated = true;
        }
        Ok(())
    }

    /// Apply postings to the running balances, checking assertions as they pass
    fn check_assertions(
        &mut self,
        transaction: &Transaction,
        posting_lines: &[usize],
    ) -> Result<(), JournalParseError> {
        for (index, posting) in transaction.postings.iter().enumerate() {
            let running = self.running.entry(posting.account).or_default();
            if let Some(amount) = &posting.amount {
                running.add_amount(amount);
            }

            let Some(assertion) = &posting.assertion else {
                continue;
            };
            if assertion.kind != AssertionKind::Assertion {
                continue;
            }
            let expected = &assertion.amount;
            let actual = running
                .amount(expected.commodity())
                .cloned()
                .unwrap_or_else(|| Amount::zero(expected.commodity()));
            if &actual != expected {
                let pool = self.journal.commodities();
                return Err(JournalParseError::AssertionFailed {
                    line: posting_lines.get(index).copied().unwrap_or_default(),
                    account: self.journal.account_name(posting.account).to_string(),
                    expected: pool.format_amount(expected),
                    actual: pool.format_amount(&actual),
                });
            }
        }
        Ok(())
    }

    /// Add each posting price to the priced commodity's history
    fn record_posting_prices(&mut self, transaction: &Transaction) {
        for posting in &transaction.postings {
            let (Some(amount), Ok(Some(unit))) = (&posting.amount, posting.unit_price()) else {
                continue;
            };
            if amount.commodity() != unit.commodity() {
                self.journal.commodities_mut().add_price(
                    amount.commodity(),
                    transaction.date,
                    unit,
                );
            }
        }
    }
}
