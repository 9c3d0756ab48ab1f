//! Journal engine for plainledger
//!
//! This crate turns ledger-style journal text into accounts, transactions
//! and postings, validates that every transaction balances, and answers
//! balance, register and price queries over the result.

#![warn(clippy::all)]

/// Module for the hierarchical account tree
pub mod account;

/// Module for posting representation
pub mod posting;

/// Module for transactions, amount elision and balance verification
pub mod transaction;

/// Module for journal line classification
pub mod lexer;

/// Module for posting and amount parsing using nom combinators
pub mod transaction_parser;

/// Module for journal directives
pub mod directive;

/// Module for the line-oriented journal parser
pub mod parser;

/// Module for the journal data structure and its queries
pub mod journal;

/// Module for report computations
pub mod report;

pub use account::{AccountId, AccountTree, AccountType};
pub use journal::{Journal, PriceEntry};
pub use parser::{JournalParseError, JournalParser};
pub use posting::{Posting, PostingKind};
pub use report::{BalanceReport, BalanceReportOptions, JournalStats, OpeningBalances, RegisterEntry};
pub use transaction::{Transaction, TransactionError, TransactionStatus};
