//! Exact commodity arithmetic for plainledger
//!
//! This crate provides the numeric foundation of the journal engine: amounts
//! are `BigRational` quantities tagged with a commodity symbol, balances sum
//! amounts per commodity, and the commodity pool tracks display style and
//! price history for every commodity a journal references.

#![warn(clippy::all)]

pub mod amount;
pub mod balance;
pub mod commodity;
pub mod formatting;

// Re-export main types
pub use amount::{Amount, AmountError, AmountResult, Precision};
pub use balance::{Balance, BalanceError, BalanceResult};
pub use commodity::{Commodity, CommodityFlags, CommodityPool, PricePoint};
pub use formatting::{
    apply_width_formatting, format_amount, format_balance, format_rational, parse_format_sample,
    FormatConfig, FormatSample,
};

// Re-export for convenience
pub use num_bigint::BigInt;
pub use num_rational::BigRational;
pub use rust_decimal::Decimal;
