//! Commodity definitions, price history and the commodity registry
//!
//! Commodities are identified by their symbol. A [`CommodityPool`] owns every
//! commodity referenced by a journal; it is created per journal rather than
//! shared process-wide, so independent journals never observe each other's
//! precision or price updates.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use log::debug;
use num_traits::Zero;

use crate::amount::{Amount, AmountResult, Precision};
use crate::balance::Balance;
use crate::formatting::{format_amount, parse_format_sample, FormatConfig, FormatSample};

bitflags::bitflags! {
    /// Display and behavior flags learned for a commodity
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CommodityFlags: u8 {
        /// Symbol is written after the number
        const STYLE_SUFFIXED = 0x01;
        /// A space separates symbol and number
        const STYLE_SEPARATED = 0x02;
        /// Integer part is grouped with commas
        const STYLE_THOUSANDS = 0x04;
        /// Precision was fixed by a `format` directive
        const STYLE_FIXED = 0x08;
        /// Commodity has no market price
        const NOMARKET = 0x10;
        /// Commodity was declared by a directive
        const KNOWN = 0x20;
    }
}

/// A dated quote of one commodity in terms of another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricePoint {
    /// Date the quote applies from
    pub date: NaiveDate,
    /// Price of one unit, in the quote commodity
    pub price: Amount,
}

/// A currency or tradeable unit
#[derive(Debug, Clone)]
pub struct Commodity {
    symbol: String,
    precision: Precision,
    flags: CommodityFlags,
    format: Option<String>,
    note: Option<String>,
    aliases: Vec<String>,
    price_history: Vec<PricePoint>,
}

impl Commodity {
    /// Create a commodity with no known style
    pub fn new(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        let style = FormatConfig::for_symbol(&symbol).style;
        Self {
            symbol,
            precision: 0,
            flags: style,
            format: None,
            note: None,
            aliases: Vec::new(),
            price_history: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Number of decimal places used for display
    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn set_precision(&mut self, precision: Precision) {
        self.precision = precision;
    }

    pub fn flags(&self) -> CommodityFlags {
        self.flags
    }

    pub fn has_flags(&self, flags: CommodityFlags) -> bool {
        self.flags.contains(flags)
    }

    pub fn add_flags(&mut self, flags: CommodityFlags) {
        self.flags.insert(flags);
    }

    /// Sample format given by a `format` directive
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn set_note(&mut self, note: impl Into<String>) {
        self.note = Some(note.into());
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Record the style seen on a literal of this commodity
    ///
    /// The latest literal wins, unless the style was pinned by a format
    /// directive.
    pub fn learn_style(&mut self, flags: CommodityFlags, precision: Precision) {
        if self.flags.contains(CommodityFlags::STYLE_FIXED) {
            return;
        }
        let style_bits = CommodityFlags::STYLE_SUFFIXED
            | CommodityFlags::STYLE_SEPARATED
            | CommodityFlags::STYLE_THOUSANDS;
        self.flags = (self.flags - style_bits) | (flags & style_bits);
        self.precision = precision;
    }

    /// Pin precision and placement from a sample such as `$1,000.00`
    pub fn apply_format(&mut self, sample: &str) -> AmountResult<()> {
        let FormatSample { flags, precision, .. } = parse_format_sample(sample)?;
        self.flags.remove(CommodityFlags::STYLE_FIXED);
        self.learn_style(flags, precision);
        self.flags.insert(CommodityFlags::STYLE_FIXED | CommodityFlags::KNOWN);
        self.format = Some(sample.trim().to_string());
        Ok(())
    }

    /// Insert a price point keeping the history ordered by date, then quote
    ///
    /// A point with the same date and quote commodity as an existing one
    /// replaces it.
    pub fn add_price(&mut self, date: NaiveDate, price: Amount) {
        let key = (date, price.commodity().to_string());
        match self
            .price_history
            .binary_search_by(|p| (p.date, p.price.commodity()).cmp(&(key.0, key.1.as_str())))
        {
            Ok(index) => self.price_history[index].price = price,
            Err(index) => self.price_history.insert(index, PricePoint { date, price }),
        }
    }

    /// All known price points in chronological order
    pub fn price_history(&self) -> &[PricePoint] {
        &self.price_history
    }

    /// Most recent price quoted in `target`
    pub fn latest_price(&self, target: &str) -> Option<&PricePoint> {
        self.price_history.iter().rev().find(|p| p.price.commodity() == target)
    }

    /// Latest price quoted in `target` on or before `date`
    pub fn price_at(&self, date: NaiveDate, target: &str) -> Option<&PricePoint> {
        let mut found = None;
        for point in &self.price_history {
            if point.date > date {
                break;
            }
            if point.price.commodity() == target {
                found = Some(point);
            }
        }
        found
    }
}

/// Registry of every commodity referenced by one journal
#[derive(Debug, Clone)]
pub struct CommodityPool {
    commodities: BTreeMap<String, Commodity>,
    aliases: HashMap<String, String>,
    default_symbol: String,
}

impl Default for CommodityPool {
    fn default() -> Self {
        Self::new()
    }
}

impl CommodityPool {
    /// Default symbol for bare numbers
    pub const DEFAULT_SYMBOL: &'static str = "$";

    pub fn new() -> Self {
        Self {
            commodities: BTreeMap::new(),
            aliases: HashMap::new(),
            default_symbol: Self::DEFAULT_SYMBOL.to_string(),
        }
    }

    /// Map an alias to its canonical symbol
    pub fn resolve<'a>(&'a self, symbol: &'a str) -> &'a str {
        self.aliases.get(symbol).map(String::as_str).unwrap_or(symbol)
    }

    /// Look up a commodity, creating it on first reference
    pub fn find_or_create(&mut self, symbol: &str) -> &mut Commodity {
        let symbol = self.resolve(symbol).to_string();
        self.commodities.entry(symbol).or_insert_with_key(|symbol| {
            debug!("registering commodity '{}'", symbol);
            Commodity::new(symbol.clone())
        })
    }

    pub fn find(&self, symbol: &str) -> Option<&Commodity> {
        self.commodities.get(self.resolve(symbol))
    }

    pub fn find_mut(&mut self, symbol: &str) -> Option<&mut Commodity> {
        let symbol = self.resolve(symbol).to_string();
        self.commodities.get_mut(&symbol)
    }

    /// Register `alias` as another name for `symbol`
    pub fn add_alias(&mut self, alias: &str, symbol: &str) {
        self.find_or_create(symbol).aliases.push(alias.to_string());
        self.aliases.insert(alias.to_string(), symbol.to_string());
    }

    pub fn default_symbol(&self) -> &str {
        &self.default_symbol
    }

    pub fn set_default_symbol(&mut self, symbol: &str) {
        self.find_or_create(symbol);
        self.default_symbol = symbol.to_string();
    }

    /// All registered symbols, sorted
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.commodities.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Commodity> {
        self.commodities.values()
    }

    pub fn len(&self) -> usize {
        self.commodities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commodities.is_empty()
    }

    /// Record a price point for `symbol`
    pub fn add_price(&mut self, symbol: &str, date: NaiveDate, price: Amount) {
        self.find_or_create(price.commodity());
        self.find_or_create(symbol).add_price(date, price);
    }

    /// Convert an amount into `target` through price history
    ///
    /// Uses the latest price, or the price in effect on `date` when given.
    /// A direct quote is preferred; otherwise an inverse quote of `target`
    /// in the amount's commodity is used.
    pub fn convert(
        &self,
        amount: &Amount,
        target: &str,
        date: Option<NaiveDate>,
    ) -> Option<Amount> {
        if amount.commodity() == target {
            return Some(amount.clone());
        }
        let lookup = |commodity: &Commodity, quote: &str| match date {
            Some(date) => commodity.price_at(date, quote).cloned(),
            None => commodity.latest_price(quote).cloned(),
        };

        if let Some(point) = self.find(amount.commodity()).and_then(|c| lookup(c, target)) {
            return Some(point.price.scaled(amount.quantity()));
        }

        let inverse = self.find(target).and_then(|c| lookup(c, amount.commodity()))?;
        if inverse.price.is_zero() {
            return None;
        }
        let quantity = amount.quantity() / inverse.price.quantity();
        let precision = self.find(target).map(Commodity::precision).unwrap_or(0);
        Some(Amount::new(quantity, target).with_precision(precision))
    }

    /// Display configuration for an amount of a registered commodity
    pub fn format_config(&self, amount: &Amount) -> FormatConfig {
        match self.find(amount.commodity()) {
            Some(commodity) => FormatConfig::for_commodity(commodity),
            None => FormatConfig::for_symbol(amount.commodity()),
        }
    }

    /// Format an amount using the commodity's learned style and precision
    pub fn format_amount(&self, amount: &Amount) -> String {
        format_amount(amount, &self.format_config(amount))
    }

    /// Format each amount of a balance, sorted by symbol
    pub fn format_balance_lines(&self, balance: &Balance) -> Vec<String> {
        if balance.is_zero() {
            return vec!["0".to_string()];
        }
        balance.amounts().map(|amount| self.format_amount(amount)).collect()
    }

    /// Format a balance on a single line, amounts separated by `", "`
    pub fn format_balance(&self, balance: &Balance) -> String {
        self.format_balance_lines(balance).join(", ")
    }

    /// Check whether an amount rounds to zero at its commodity's precision
    pub fn is_display_zero(&self, amount: &Amount) -> bool {
        let precision = self.find(amount.commodity()).map(Commodity::precision).unwrap_or(0);
        amount.rounded(precision).quantity().is_zero()
    }
}
