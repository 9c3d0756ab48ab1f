//! Formatting utilities for amounts and balances
//!
//! Rendering follows the ledger conventions: a commodity is either prefixed
//! (`$12.50`, `$-3.00`) or suffixed with a separating space (`12.50 EUR`),
//! rounding is half away from zero, and thousands separators are optional.

use num_bigint::BigInt;
use num_rational::BigRational;

use crate::amount::{Amount, AmountError, AmountResult, Precision};
use crate::balance::Balance;
use crate::commodity::{Commodity, CommodityFlags};

/// Currency symbols conventionally written before the number
pub const PREFIX_SYMBOLS: [&str; 4] = ["$", "£", "€", "¥"];

/// Format configuration for displaying amounts and balances
#[derive(Debug, Clone, Default)]
pub struct FormatConfig {
    /// Display precision override (None uses the amount's own precision)
    pub precision: Option<Precision>,

    /// Minimum width; shorter output is right-justified
    pub min_width: Option<usize>,

    /// Use thousands separators
    pub thousands_sep: bool,

    /// Commodity placement flags (`STYLE_SUFFIXED`, `STYLE_SEPARATED`)
    pub style: CommodityFlags,
}

impl FormatConfig {
    pub fn new() -> Self {
        Default::default()
    }

    /// Guess the placement for a symbol nothing is known about
    pub fn for_symbol(symbol: &str) -> Self {
        let style = if symbol.is_empty() || PREFIX_SYMBOLS.contains(&symbol) {
            CommodityFlags::empty()
        } else {
            CommodityFlags::STYLE_SUFFIXED | CommodityFlags::STYLE_SEPARATED
        };
        Self { style, ..Default::default() }
    }

    /// Use the style and precision learned for a registered commodity
    pub fn for_commodity(commodity: &Commodity) -> Self {
        let flags = commodity.flags();
        Self {
            precision: Some(commodity.precision()),
            min_width: None,
            thousands_sep: flags.contains(CommodityFlags::STYLE_THOUSANDS),
            style: flags & (CommodityFlags::STYLE_SUFFIXED | CommodityFlags::STYLE_SEPARATED),
        }
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_width(mut self, min: usize) -> Self {
        self.min_width = Some(min);
        self
    }

    pub fn with_thousands_sep(mut self, sep: bool) -> Self {
        self.thousands_sep = sep;
        self
    }
}

/// Format a rational number with exactly `precision` decimal places
pub fn format_rational(
    rational: &BigRational,
    precision: Precision,
    thousands_sep: bool,
) -> String {
    let scale = BigRational::from_integer(BigInt::from(10).pow(precision as u32));
    let rounded_int = (rational * scale).round().to_integer();

    let mut digits = rounded_int.magnitude().to_string();
    let negative = rounded_int.sign() == num_bigint::Sign::Minus;

    // Ensure we have enough digits for the precision
    while digits.len() <= precision as usize {
        digits.insert(0, '0');
    }

    let split_pos = digits.len() - precision as usize;
    let (integer_part, decimal_part) = digits.split_at(split_pos);
    let integer_part = format_integer_with_separators(integer_part, thousands_sep);

    let mut result = String::with_capacity(digits.len() + 4);
    if negative {
        result.push('-');
    }
    result.push_str(&integer_part);
    if precision > 0 {
        result.push('.');
        result.push_str(decimal_part);
    }
    result
}

/// Format integer part with thousands separators
fn format_integer_with_separators(digits: &str, thousands_sep: bool) -> String {
    if !thousands_sep || digits.len() <= 3 {
        return digits.to_string();
    }

    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result
}

/// Format an amount with its commodity according to `config`
pub fn format_amount(amount: &Amount, config: &FormatConfig) -> String {
    let precision = config.precision.unwrap_or_else(|| amount.precision());
    let number = format_rational(amount.quantity(), precision, config.thousands_sep);
    let symbol = amount.commodity();

    let text = if symbol.is_empty() {
        number
    } else {
        let separator =
            if config.style.contains(CommodityFlags::STYLE_SEPARATED) { " " } else { "" };
        if config.style.contains(CommodityFlags::STYLE_SUFFIXED) {
            format!("{number}{separator}{symbol}")
        } else {
            format!("{symbol}{separator}{number}")
        }
    };

    apply_width_formatting(text, config.min_width)
}

/// Right-justify `text` to the minimum width, if any
pub fn apply_width_formatting(text: String, min_width: Option<usize>) -> String {
    match min_width {
        Some(width) if text.chars().count() < width => format!("{text:>width$}"),
        _ => text,
    }
}

/// Format a balance as a comma-separated list, or `0` when empty
pub fn format_balance(balance: &Balance) -> String {
    if balance.is_zero() {
        return "0".to_string();
    }
    balance.amounts().map(|amount| amount.to_string()).collect::<Vec<_>>().join(", ")
}

/// Display style extracted from a sample amount such as `$1,000.00`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSample {
    pub symbol: String,
    pub flags: CommodityFlags,
    pub precision: Precision,
}

/// Learn commodity placement, separators and precision from a sample amount
pub fn parse_format_sample(sample: &str) -> AmountResult<FormatSample> {
    let sample = sample.trim();
    let is_numeric = |c: char| c.is_ascii_digit() || matches!(c, '.' | ',' | '-');

    let number_start =
        sample.find(is_numeric).ok_or_else(|| AmountError::ParseError(sample.into()))?;
    let (leading, rest) = sample.split_at(number_start);
    let number_end = rest.find(|c: char| !is_numeric(c)).unwrap_or(rest.len());
    let (number, trailing) = rest.split_at(number_end);

    if !number.chars().any(|c| c.is_ascii_digit()) {
        return Err(AmountError::ParseError(sample.into()));
    }

    let mut flags = CommodityFlags::empty();
    let symbol = if !leading.trim().is_empty() {
        if leading.ends_with(char::is_whitespace) {
            flags |= CommodityFlags::STYLE_SEPARATED;
        }
        leading.trim().to_string()
    } else {
        flags |= CommodityFlags::STYLE_SUFFIXED;
        if trailing.starts_with(char::is_whitespace) {
            flags |= CommodityFlags::STYLE_SEPARATED;
        }
        trailing.trim().to_string()
    };

    if number.contains(',') {
        flags |= CommodityFlags::STYLE_THOUSANDS;
    }
    let precision = number.split_once('.').map(|(_, frac)| frac.len()).unwrap_or(0);

    Ok(FormatSample { symbol, flags, precision: precision as Precision })
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    fn ratio(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn test_format_rational_precision() {
        assert_eq!(format_rational(&ratio(1, 3), 2, false), "0.33");
        assert_eq!(format_rational(&ratio(2, 3), 2, false), "0.67");
        assert_eq!(format_rational(&ratio(-1, 8), 2, false), "-0.13");
        assert_eq!(format_rational(&ratio(5, 1), 0, false), "5");
        assert_eq!(format_rational(&ratio(5, 1), 3, false), "5.000");
    }

    #[test]
    fn test_format_rational_no_negative_zero() {
        assert_eq!(format_rational(&ratio(-1, 1000), 2, false), "0.00");
    }

    #[test]
    fn test_thousands_separators() {
        let big = BigRational::from_i64(1_234_567).unwrap();
        assert_eq!(format_rational(&big, 2, true), "1,234,567.00");
        assert_eq!(format_rational(&-big, 0, true), "-1,234,567");
        assert_eq!(format_rational(&ratio(999, 1), 0, true), "999");
    }

    #[test]
    fn test_format_amount_placement() {
        let usd = Amount::parse_quantity("-5.25", "$").unwrap();
        assert_eq!(format_amount(&usd, &FormatConfig::for_symbol("$")), "$-5.25");

        let eur = Amount::parse_quantity("10.00", "EUR").unwrap();
        assert_eq!(format_amount(&eur, &FormatConfig::for_symbol("EUR")), "10.00 EUR");
    }

    #[test]
    fn test_format_amount_width() {
        let eur = Amount::parse_quantity("1", "EUR").unwrap();
        let config = FormatConfig::for_symbol("EUR").with_width(8);
        assert_eq!(format_amount(&eur, &config), "   1 EUR");
    }

    #[test]
    fn test_parse_format_sample() {
        let sample = parse_format_sample("$1,000.00").unwrap();
        assert_eq!(sample.symbol, "$");
        assert_eq!(sample.precision, 2);
        assert!(sample.flags.contains(CommodityFlags::STYLE_THOUSANDS));
        assert!(!sample.flags.contains(CommodityFlags::STYLE_SUFFIXED));

        let sample = parse_format_sample("1.000 EUR").unwrap();
        assert_eq!(sample.symbol, "EUR");
        assert_eq!(sample.precision, 3);
        assert!(sample.flags.contains(CommodityFlags::STYLE_SUFFIXED));
        assert!(sample.flags.contains(CommodityFlags::STYLE_SEPARATED));

        assert!(parse_format_sample("EUR").is_err());
    }
}
