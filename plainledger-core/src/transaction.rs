//! Transaction representation, amount elision and balance verification

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use log::debug;
use plainledger_math::{Amount, AmountError, Balance, CommodityPool, Precision};
use serde::Serialize;
use thiserror::Error;

use crate::posting::{Metadata, Posting};

/// Errors raised while completing a transaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction must have at least 2 postings, found {0}")]
    TooFewPostings(usize),
    #[error("only one posting can have an elided amount")]
    MultipleElided,
    #[error("cannot elide amount with multiple commodities: {}", .0.join(", "))]
    AmbiguousElision(Vec<String>),
    #[error("transaction does not balance: {residual} remaining")]
    Unbalanced { residual: Balance },
    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// Source lines a transaction was read from (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub beg_line: usize,
    pub end_line: usize,
}

/// Transaction status (state)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TransactionStatus {
    /// No marker
    #[default]
    Pending,
    /// `*`
    Cleared,
    /// `!`
    Reconciled,
}

impl TransactionStatus {
    /// Map a header marker to a status
    pub fn from_marker(marker: Option<char>) -> Self {
        match marker {
            Some('*') => TransactionStatus::Cleared,
            Some('!') => TransactionStatus::Reconciled,
            _ => TransactionStatus::Pending,
        }
    }

    /// Marker written for this status in journal syntax
    pub fn marker(&self) -> Option<char> {
        match self {
            TransactionStatus::Pending => None,
            TransactionStatus::Cleared => Some('*'),
            TransactionStatus::Reconciled => Some('!'),
        }
    }
}

/// A dated, balanced group of postings
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Transaction date
    pub date: NaiveDate,
    /// Optional auxiliary/effective date
    pub aux_date: Option<NaiveDate>,
    /// Status marker
    pub status: TransactionStatus,
    /// Code written in parentheses
    pub code: Option<String>,
    /// Payee/description
    pub payee: String,
    /// Note/comment
    pub note: Option<String>,
    /// Postings in file order
    pub postings: Vec<Posting>,
    /// Tags parsed out of the note
    pub metadata: Metadata,
    /// Source position information
    pub pos: Option<Position>,
}

impl Transaction {
    /// Create a new transaction with required fields
    pub fn new(date: NaiveDate, payee: impl Into<String>) -> Self {
        Self {
            date,
            aux_date: None,
            status: TransactionStatus::default(),
            code: None,
            payee: payee.into(),
            note: None,
            postings: Vec::new(),
            metadata: Metadata::new(),
            pos: None,
        }
    }

    /// Start building a transaction
    pub fn builder(date: NaiveDate, payee: impl Into<String>) -> TransactionBuilder {
        TransactionBuilder::new(date, payee)
    }

    /// Add a posting to this transaction
    pub fn add_posting(&mut self, posting: Posting) {
        self.postings.push(posting);
    }

    /// Get the effective date (aux_date if present, otherwise date)
    pub fn effective_date(&self) -> NaiveDate {
        self.aux_date.unwrap_or(self.date)
    }

    /// Append a line of comment text to the note
    pub fn append_note(&mut self, text: &str) {
        match &mut self.note {
            Some(note) => {
                note.push('\n');
                note.push_str(text);
            }
            None => self.note = Some(text.to_string()),
        }
    }

    /// Check if any posting holds an unevaluated expression
    pub fn has_expression(&self) -> bool {
        self.postings.iter().any(Posting::is_expression)
    }

    /// Sum of the weights of every posting that must balance
    pub fn residual(&self) -> Balance {
        self.balancing_weights().fold(Balance::new(), |mut balance, weight| {
            balance.add_amount(&weight);
            balance
        })
    }

    /// Weights of the postings that take part in balancing
    fn balancing_weights(&self) -> impl Iterator<Item = Amount> + '_ {
        self.postings.iter().filter(|p| p.must_balance()).filter_map(Posting::weight)
    }

    /// Infer a missing amount, then check the transaction balances
    ///
    /// Bare amounts without a commodity are grouped under `default_symbol`.
    pub fn finalize(&mut self, default_symbol: &str) -> Result<(), TransactionError> {
        if self.postings.len() < 2 {
            return Err(TransactionError::TooFewPostings(self.postings.len()));
        }

        self.assign_default_commodity(default_symbol);

        let elided: Vec<usize> = self
            .postings
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_elided())
            .map(|(i, _)| i)
            .collect();
        if elided.len() > 1 {
            return Err(TransactionError::MultipleElided);
        }

        if self.has_expression() {
            if !elided.is_empty() {
                debug!(
                    "leaving elided amount of '{}' unresolved next to an expression",
                    self.payee
                );
            }
            return Ok(());
        }

        if let Some(&index) = elided.first() {
            let amount = self.infer_elided_amount(default_symbol)?;
            let posting = &mut self.postings[index];
            posting.amount = Some(amount);
            posting.generated = true;
        }

        self.verify_balance()
    }

    /// Move bare amounts without a commodity onto `default_symbol`
    fn assign_default_commodity(&mut self, default_symbol: &str) {
        for posting in &mut self.postings {
            let amounts = [
                posting.amount.as_mut(),
                posting.cost.as_mut().map(|c| &mut c.amount),
                posting.price.as_mut().map(|p| &mut p.amount),
                posting.assertion.as_mut().map(|a| &mut a.amount),
            ];
            for amount in amounts.into_iter().flatten() {
                if amount.commodity().is_empty() {
                    *amount = Amount::new(amount.quantity().clone(), default_symbol)
                        .with_precision(amount.precision());
                }
            }
        }
    }

    fn infer_elided_amount(&self, default_symbol: &str) -> Result<Amount, TransactionError> {
        let mut sums = Balance::new();
        let mut symbols = BTreeSet::new();

        for weight in self.balancing_weights() {
            symbols.insert(weight.commodity().to_string());
            sums.add_amount(&weight);
        }

        if symbols.len() > 1 {
            return Err(TransactionError::AmbiguousElision(symbols.into_iter().collect()));
        }

        let symbol = symbols.into_iter().next().unwrap_or_else(|| default_symbol.to_string());
        Ok(match sums.amount(&symbol) {
            Some(sum) => sum.negated(),
            None => Amount::zero(symbol),
        })
    }

    /// Verify every commodity's weights sum to zero
    ///
    /// Each residual is rounded to the largest precision of the weights in
    /// that commodity before comparing, so totals computed from prices do not
    /// fail on digits nobody wrote down.
    pub fn verify_balance(&self) -> Result<(), TransactionError> {
        if self.has_expression() {
            return Ok(());
        }

        let mut precisions: BTreeMap<String, Precision> = BTreeMap::new();
        for weight in self.balancing_weights() {
            let entry = precisions.entry(weight.commodity().to_string()).or_default();
            *entry = (*entry).max(weight.precision());
        }

        let residual: Balance = self
            .residual()
            .amounts()
            .map(|amount| amount.rounded(precisions.get(amount.commodity()).copied().unwrap_or(0)))
            .collect::<Vec<_>>()
            .iter()
            .collect();

        if residual.is_zero() {
            Ok(())
        } else {
            Err(TransactionError::Unbalanced { residual })
        }
    }

    /// Check if the transaction's weights sum to zero
    pub fn is_balanced(&self) -> bool {
        self.verify_balance().is_ok()
    }
}

/// Builder for transactions assembled in code
#[derive(Debug)]
pub struct TransactionBuilder {
    transaction: Transaction,
}

impl TransactionBuilder {
    pub fn new(date: NaiveDate, payee: impl Into<String>) -> Self {
        Self { transaction: Transaction::new(date, payee) }
    }

    pub fn aux_date(mut self, aux_date: NaiveDate) -> Self {
        self.transaction.aux_date = Some(aux_date);
        self
    }

    pub fn status(mut self, status: TransactionStatus) -> Self {
        self.transaction.status = status;
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.transaction.code = Some(code.into());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.transaction.note = Some(note.into());
        self
    }

    pub fn posting(mut self, posting: Posting) -> Self {
        self.transaction.postings.push(posting);
        self
    }

    /// Finalize with the default commodity and return the transaction
    pub fn build(mut self) -> Result<Transaction, TransactionError> {
        self.transaction.finalize(CommodityPool::DEFAULT_SYMBOL)?;
        Ok(self.transaction)
    }
}
