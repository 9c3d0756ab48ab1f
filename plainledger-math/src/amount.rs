//! Amount module providing exact arithmetic on commodity-tagged quantities
//!
//! An [`Amount`] is a `BigRational` quantity tagged with a commodity symbol.
//! Arithmetic never rounds: rounding only happens when an amount is displayed
//! or when a caller asks for [`Amount::rounded`] explicitly.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::formatting::{format_amount, FormatConfig};

/// Number of decimal places an amount is displayed with
pub type Precision = u16;

/// Errors that can occur during amount operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Cannot combine amounts of different commodities: '{left}' and '{right}'")]
    CommodityMismatch { left: String, right: String },
    #[error("Cannot parse amount from string: {0}")]
    ParseError(String),
}

/// Result type for amount operations
pub type AmountResult<T> = Result<T, AmountError>;

/// An exact quantity of a single commodity
///
/// Equality and hashing consider the quantity and the commodity only; the
/// precision is display metadata carried along from the literal that
/// produced the amount.
#[derive(Clone)]
pub struct Amount {
    quantity: BigRational,
    commodity: String,
    precision: Precision,
}

impl Amount {
    /// Create an amount from a rational quantity
    pub fn new(quantity: BigRational, commodity: impl Into<String>) -> Self {
        Self { quantity, commodity: commodity.into(), precision: 0 }
    }

    /// Create a zero amount of the given commodity
    pub fn zero(commodity: impl Into<String>) -> Self {
        Self::new(BigRational::zero(), commodity)
    }

    /// Create an amount from an integer
    pub fn from_i64(value: i64, commodity: impl Into<String>) -> Self {
        Self::new(BigRational::from_integer(BigInt::from(value)), commodity)
    }

    /// Create an amount from a `Decimal`, keeping its scale as precision
    pub fn from_decimal(decimal: Decimal, commodity: impl Into<String>) -> Self {
        let scale = decimal.scale();
        let numerator = BigInt::from(decimal.mantissa());
        let denominator = BigInt::from(10).pow(scale);

        Self {
            quantity: BigRational::new(numerator, denominator),
            commodity: commodity.into(),
            precision: scale as Precision,
        }
    }

    /// Parse a bare numeric literal such as `-1,234.50`
    ///
    /// Commas are thousands separators and are dropped; the number of digits
    /// after the period becomes the amount's precision.
    pub fn parse_quantity(text: &str, commodity: impl Into<String>) -> AmountResult<Self> {
        let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
        if cleaned.is_empty() || cleaned.ends_with('.') || cleaned.starts_with('.') {
            return Err(AmountError::ParseError(text.to_string()));
        }
        let decimal =
            Decimal::from_str(&cleaned).map_err(|_| AmountError::ParseError(text.to_string()))?;
        Ok(Self::from_decimal(decimal, commodity))
    }

    /// Set the display precision
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// The exact quantity
    pub fn quantity(&self) -> &BigRational {
        &self.quantity
    }

    /// The commodity symbol (empty for a unitless number)
    pub fn commodity(&self) -> &str {
        &self.commodity
    }

    /// Display precision inferred from the originating literal
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Check if the quantity is exactly zero
    pub fn is_zero(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Check if the quantity is below zero
    pub fn is_negative(&self) -> bool {
        self.quantity.is_negative()
    }

    /// Check if the quantity is above zero
    pub fn is_positive(&self) -> bool {
        self.quantity.is_positive()
    }

    /// Sign of the quantity: -1, 0 or 1
    pub fn sign(&self) -> i32 {
        if self.quantity.is_zero() {
            0
        } else if self.quantity.is_positive() {
            1
        } else {
            -1
        }
    }

    /// Return the negated amount
    pub fn negated(&self) -> Self {
        Self {
            quantity: -self.quantity.clone(),
            commodity: self.commodity.clone(),
            precision: self.precision,
        }
    }

    /// Return the absolute value
    pub fn abs(&self) -> Self {
        Self {
            quantity: self.quantity.abs(),
            commodity: self.commodity.clone(),
            precision: self.precision,
        }
    }

    /// Check that `other` can be combined with this amount
    fn check_commodity(&self, other: &Amount) -> AmountResult<()> {
        if self.commodity != other.commodity {
            return Err(AmountError::CommodityMismatch {
                left: self.commodity.clone(),
                right: other.commodity.clone(),
            });
        }
        Ok(())
    }

    /// Add two amounts of the same commodity
    pub fn checked_add(&self, other: &Amount) -> AmountResult<Amount> {
        self.check_commodity(other)?;
        Ok(Self {
            quantity: &self.quantity + &other.quantity,
            commodity: self.commodity.clone(),
            precision: self.precision.max(other.precision),
        })
    }

    /// Subtract an amount of the same commodity
    pub fn checked_sub(&self, other: &Amount) -> AmountResult<Amount> {
        self.check_commodity(other)?;
        Ok(Self {
            quantity: &self.quantity - &other.quantity,
            commodity: self.commodity.clone(),
            precision: self.precision.max(other.precision),
        })
    }

    /// Multiply the quantity by a plain number, keeping the commodity
    pub fn scaled(&self, factor: &BigRational) -> Amount {
        Self {
            quantity: &self.quantity * factor,
            commodity: self.commodity.clone(),
            precision: self.precision,
        }
    }

    /// Divide the quantity by a plain number, keeping the commodity
    pub fn checked_div(&self, divisor: &BigRational) -> AmountResult<Amount> {
        if divisor.is_zero() {
            return Err(AmountError::DivisionByZero);
        }
        Ok(Self {
            quantity: &self.quantity / divisor,
            commodity: self.commodity.clone(),
            precision: self.precision,
        })
    }

    /// Round half away from zero to `places` decimal places
    pub fn rounded(&self, places: Precision) -> Amount {
        let scale = BigRational::from_integer(BigInt::from(10).pow(places as u32));
        let rounded = (&self.quantity * &scale).round() / scale;
        Self { quantity: rounded, commodity: self.commodity.clone(), precision: places }
    }

    /// Lossy conversion for rates and statistics
    pub fn to_f64(&self) -> Option<f64> {
        self.quantity.to_f64()
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        self.commodity == other.commodity && self.quantity == other.quantity
    }
}

impl Eq for Amount {}

impl Hash for Amount {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.commodity.hash(state);
        self.quantity.hash(state);
    }
}

impl PartialOrd for Amount {
    /// Amounts of different commodities are unordered
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.commodity != other.commodity {
            return None;
        }
        Some(self.quantity.cmp(&other.quantity))
    }
}

impl Add<&Amount> for &Amount {
    type Output = AmountResult<Amount>;

    fn add(self, other: &Amount) -> Self::Output {
        self.checked_add(other)
    }
}

impl Sub<&Amount> for &Amount {
    type Output = AmountResult<Amount>;

    fn sub(self, other: &Amount) -> Self::Output {
        self.checked_sub(other)
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Self::Output {
        self.negated()
    }
}

impl Neg for &Amount {
    type Output = Amount;

    fn neg(self) -> Self::Output {
        self.negated()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = FormatConfig::for_symbol(&self.commodity).with_precision(self.precision);
        f.write_str(&format_amount(self, &config))
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AMOUNT({} {})", self.quantity, self.commodity)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
