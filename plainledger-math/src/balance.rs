//! Multi-commodity balances
//!
//! A [`Balance`] keeps one [`Amount`] per commodity symbol. Entries that sum to
//! exactly zero are removed immediately, so an empty balance is a zero
//! balance and every stored amount is non-zero.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{AddAssign, Neg, SubAssign};

use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::amount::{Amount, AmountError};
use crate::commodity::CommodityPool;
use crate::formatting::format_balance;

/// Errors that can occur during balance operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    #[error("Balance entry '{key}' holds an amount of commodity '{commodity}'")]
    CommodityMismatch { key: String, commodity: String },
    #[error("Balance entry '{0}' is zero")]
    ZeroEntry(String),
    #[error("No price to convert '{from}' into '{to}'")]
    NoPrice { from: String, to: String },
    #[error(transparent)]
    AmountError(#[from] AmountError),
}

/// Result type for balance operations
pub type BalanceResult<T> = Result<T, BalanceError>;

/// A sum of amounts, partitioned by commodity
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Balance {
    amounts: BTreeMap<String, Amount>,
}

impl Balance {
    /// Create an empty balance
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a balance holding a single amount
    pub fn from_amount(amount: &Amount) -> Self {
        let mut balance = Self::new();
        balance.add_amount(amount);
        balance
    }

    /// Add an amount, dropping the entry if it becomes zero
    pub fn add_amount(&mut self, amount: &Amount) {
        if amount.is_zero() {
            return;
        }
        let symbol = amount.commodity();
        match self.amounts.get_mut(symbol) {
            Some(existing) => {
                // Same key, so the commodities always agree
                let sum = Amount::new(existing.quantity() + amount.quantity(), symbol)
                    .with_precision(existing.precision().max(amount.precision()));
                if sum.is_zero() {
                    self.amounts.remove(symbol);
                } else {
                    *existing = sum;
                }
            }
            None => {
                self.amounts.insert(symbol.to_string(), amount.clone());
            }
        }
    }

    /// Subtract an amount, dropping the entry if it becomes zero
    pub fn subtract_amount(&mut self, amount: &Amount) {
        self.add_amount(&amount.negated());
    }

    /// Add every amount of another balance
    pub fn add_balance(&mut self, other: &Balance) {
        for amount in other.amounts.values() {
            self.add_amount(amount);
        }
    }

    /// Subtract every amount of another balance
    pub fn subtract_balance(&mut self, other: &Balance) {
        for amount in other.amounts.values() {
            self.subtract_amount(amount);
        }
    }

    /// Return the negated balance
    pub fn negated(&self) -> Balance {
        Balance {
            amounts: self.amounts.iter().map(|(k, a)| (k.clone(), a.negated())).collect(),
        }
    }

    /// Return a balance with every amount made non-negative
    pub fn abs(&self) -> Balance {
        Balance { amounts: self.amounts.iter().map(|(k, a)| (k.clone(), a.abs())).collect() }
    }

    /// A balance with no entries is zero
    pub fn is_zero(&self) -> bool {
        self.amounts.is_empty()
    }

    /// Number of commodities held
    pub fn commodity_count(&self) -> usize {
        self.amounts.len()
    }

    /// Amount held in `symbol`, if any
    pub fn amount(&self, symbol: &str) -> Option<&Amount> {
        self.amounts.get(symbol)
    }

    /// The only amount, when exactly one commodity is held
    pub fn single_amount(&self) -> Option<&Amount> {
        if self.amounts.len() == 1 {
            self.amounts.values().next()
        } else {
            None
        }
    }

    /// Amounts sorted by commodity symbol
    pub fn amounts(&self) -> impl Iterator<Item = &Amount> {
        self.amounts.values()
    }

    /// Commodity symbols held, sorted
    pub fn commodities(&self) -> impl Iterator<Item = &str> {
        self.amounts.keys().map(String::as_str)
    }

    /// Check the zero-pruning and key invariants
    pub fn validate(&self) -> BalanceResult<()> {
        for (key, amount) in &self.amounts {
            if amount.commodity() != key {
                return Err(BalanceError::CommodityMismatch {
                    key: key.clone(),
                    commodity: amount.commodity().to_string(),
                });
            }
            if amount.is_zero() {
                return Err(BalanceError::ZeroEntry(key.clone()));
            }
        }
        Ok(())
    }

    /// Value the whole balance in `target` using the pool's price history
    pub fn convert_to(
        &self,
        pool: &CommodityPool,
        target: &str,
        date: Option<NaiveDate>,
    ) -> BalanceResult<Amount> {
        let mut total = Amount::zero(target);
        for amount in self.amounts.values() {
            let converted =
                pool.convert(amount, target, date).ok_or_else(|| BalanceError::NoPrice {
                    from: amount.commodity().to_string(),
                    to: target.to_string(),
                })?;
            total = total.checked_add(&converted)?;
        }
        Ok(total)
    }
}

impl AddAssign<&Amount> for Balance {
    fn add_assign(&mut self, amount: &Amount) {
        self.add_amount(amount);
    }
}

impl AddAssign<&Balance> for Balance {
    fn add_assign(&mut self, other: &Balance) {
        self.add_balance(other);
    }
}

impl SubAssign<&Amount> for Balance {
    fn sub_assign(&mut self, amount: &Amount) {
        self.subtract_amount(amount);
    }
}

impl SubAssign<&Balance> for Balance {
    fn sub_assign(&mut self, other: &Balance) {
        self.subtract_balance(other);
    }
}

impl Neg for Balance {
    type Output = Balance;

    fn neg(self) -> Self::Output {
        self.negated()
    }
}

impl<'a> FromIterator<&'a Amount> for Balance {
    fn from_iter<I: IntoIterator<Item = &'a Amount>>(iter: I) -> Self {
        let mut balance = Balance::new();
        for amount in iter {
            balance.add_amount(amount);
        }
        balance
    }
}

impl<'a> Extend<&'a Amount> for Balance {
    fn extend<I: IntoIterator<Item = &'a Amount>>(&mut self, iter: I) {
        for amount in iter {
            self.add_amount(amount);
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_balance(self))
    }
}

impl fmt::Debug for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BALANCE(")?;
        for (i, amount) in self.amounts.values().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}", amount)?;
        }
        write!(f, ")")
    }
}

impl Serialize for Balance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.amounts.len()))?;
        for (symbol, amount) in &self.amounts {
            map.serialize_entry(symbol, &amount.to_string())?;
        }
        map.end()
    }
}
