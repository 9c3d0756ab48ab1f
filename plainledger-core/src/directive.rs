//! Journal directives
//!
//! Directives are recognised by their leading keyword. `account` and
//! `commodity` open a block whose indented lines refine the declaration;
//! everything else fits on one line. [`Directive::apply`] updates the
//! journal's registries at load time.

use chrono::NaiveDate;
use log::{debug, warn};
use nom::{
    bytes::complete::take_while1,
    character::complete::{char, space0, space1},
    combinator::{opt, recognize, rest},
    sequence::{preceded, tuple},
    IResult,
};
use plainledger_math::CommodityFlags;
use thiserror::Error;

use crate::journal::Journal;
use crate::lexer::parse_date;
use crate::transaction_parser::{intern_literal, parse_amount_literal, AmountLiteral};

type ParseResult<'a, T> = IResult<&'a str, T>;

/// Errors raised while reading or applying a directive
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("'{0}' directive requires an argument")]
    MissingArgument(&'static str),
    #[error("invalid price directive '{0}'")]
    InvalidPrice(String),
    #[error("invalid date '{0}'")]
    InvalidDate(String),
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),
    #[error("invalid commodity format '{0}'")]
    InvalidFormat(String),
    #[error("invalid alias '{0}', expected ALIAS=ACCOUNT")]
    InvalidAlias(String),
}

/// `account` block
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountDirective {
    pub name: String,
    pub note: Option<String>,
    pub aliases: Vec<String>,
}

/// `commodity` block
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommodityDirective {
    pub symbol: String,
    pub format: Option<String>,
    pub note: Option<String>,
    pub aliases: Vec<String>,
    pub nomarket: bool,
    pub default: bool,
}

/// One directive, with one case per kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Account(AccountDirective),
    Commodity(CommodityDirective),
    /// `P DATE SYMBOL PRICE`
    Price { date: NaiveDate, symbol: String, price: AmountLiteral },
    /// `D SAMPLE`
    DefaultCommodity(AmountLiteral),
    /// `alias ALIAS=ACCOUNT`
    Alias { alias: String, account: String },
    Include(String),
    Apply(String),
    End(String),
    Bucket(String),
    Assert(String),
    Check(String),
}

impl Directive {
    /// Parse a column-0 line; `None` if it does not start with a directive keyword
    pub fn parse(line: &str) -> Option<Result<Directive, DirectiveError>> {
        let line = line.trim();
        let (keyword, argument) = match line.split_once(char::is_whitespace) {
            Some((keyword, argument)) => (keyword, argument.trim()),
            None => (line, ""),
        };

        let directive = match keyword {
            "account" => required(argument, "account").map(|name| {
                Directive::Account(AccountDirective {
                    name: name.to_string(),
                    ..Default::default()
                })
            }),
            "commodity" => required(argument, "commodity").map(|symbol| {
                Directive::Commodity(CommodityDirective {
                    symbol: symbol.trim_matches('"').to_string(),
                    ..Default::default()
                })
            }),
            "P" => parse_price(argument),
            "D" => parse_amount_literal(argument)
                .map(Directive::DefaultCommodity)
                .map_err(|_| DirectiveError::InvalidAmount(argument.to_string())),
            "alias" => parse_alias(argument),
            "include" => Ok(Directive::Include(argument.to_string())),
            "apply" => Ok(Directive::Apply(argument.to_string())),
            "end" => Ok(Directive::End(argument.to_string())),
            "bucket" | "A" => Ok(Directive::Bucket(argument.to_string())),
            "assert" => Ok(Directive::Assert(argument.to_string())),
            "check" => Ok(Directive::Check(argument.to_string())),
            _ => return None,
        };
        Some(directive)
    }

    /// Directive keyword as written in a journal
    pub fn keyword(&self) -> &'static str {
        match self {
            Directive::Account(_) => "account",
            Directive::Commodity(_) => "commodity",
            Directive::Price { .. } => "P",
            Directive::DefaultCommodity(_) => "D",
            Directive::Alias { .. } => "alias",
            Directive::Include(_) => "include",
            Directive::Apply(_) => "apply",
            Directive::End(_) => "end",
            Directive::Bucket(_) => "bucket",
            Directive::Assert(_) => "assert",
            Directive::Check(_) => "check",
        }
    }

    /// Check if indented lines after this directive belong to it
    pub fn takes_sub_lines(&self) -> bool {
        matches!(self, Directive::Account(_) | Directive::Commodity(_))
    }

    /// Add an indented sub-line such as `note ...` or `format $1,000.00`
    pub fn add_sub_line(&mut self, line: &str) {
        let (keyword, argument) = match line.trim().split_once(char::is_whitespace) {
            Some((keyword, argument)) => (keyword, argument.trim()),
            None => (line.trim(), ""),
        };

        match (self, keyword) {
            (Directive::Account(account), "note") => account.note = Some(argument.to_string()),
            (Directive::Account(account), "alias") => account.aliases.push(argument.to_string()),
            (Directive::Commodity(commodity), "format") => {
                commodity.format = Some(argument.to_string())
            }
            (Directive::Commodity(commodity), "note") => {
                commodity.note = Some(argument.to_string())
            }
            (Directive::Commodity(commodity), "alias") => {
                commodity.aliases.push(argument.to_string())
            }
            (Directive::Commodity(commodity), "nomarket") => commodity.nomarket = true,
            (Directive::Commodity(commodity), "default") => commodity.default = true,
            (directive, keyword) => {
                debug!("ignoring '{}' inside '{}' directive", keyword, directive.keyword())
            }
        }
    }

    /// Apply the directive to the journal's registries
    pub fn apply(&self, journal: &mut Journal) -> Result<(), DirectiveError> {
        debug!("applying '{}' directive", self.keyword());
        match self {
            Directive::Account(account) => {
                let id = journal.accounts_mut().find_or_create(&account.name);
                let entry = journal.accounts_mut().get_mut(id);
                if account.note.is_some() {
                    entry.note = account.note.clone();
                }
                entry.aliases.extend(account.aliases.iter().cloned());
                for alias in &account.aliases {
                    journal.add_account_alias(alias, &account.name);
                }
            }
            Directive::Commodity(declared) => {
                let pool = journal.commodities_mut();
                let commodity = pool.find_or_create(&declared.symbol);
                commodity.add_flags(CommodityFlags::KNOWN);
                if let Some(format) = &declared.format {
                    commodity
                        .apply_format(format)
                        .map_err(|_| DirectiveError::InvalidFormat(format.clone()))?;
                }
                if let Some(note) = &declared.note {
                    commodity.set_note(note.clone());
                }
                if declared.nomarket {
                    commodity.add_flags(CommodityFlags::NOMARKET);
                }
                for alias in &declared.aliases {
                    pool.add_alias(alias, &declared.symbol);
                }
                if declared.default {
                    pool.set_default_symbol(&declared.symbol);
                }
            }
            Directive::Price { date, symbol, price } => {
                let pool = journal.commodities_mut();
                let price = intern_literal(pool, price);
                let symbol = pool.resolve(symbol).to_string();
                pool.add_price(&symbol, *date, price);
            }
            Directive::DefaultCommodity(sample) => {
                let pool = journal.commodities_mut();
                let symbol = sample.amount.commodity();
                if !symbol.is_empty() {
                    pool.set_default_symbol(symbol);
                    pool.find_or_create(symbol)
                        .learn_style(sample.style, sample.amount.precision());
                }
            }
            Directive::Alias { alias, account } => journal.add_account_alias(alias, account),
            Directive::Include(argument)
            | Directive::Apply(argument)
            | Directive::End(argument)
            | Directive::Bucket(argument)
            | Directive::Assert(argument)
            | Directive::Check(argument) => {
                warn!(
                    "'{} {}' directive is not supported and has no effect",
                    self.keyword(),
                    argument
                )
            }
        }
        Ok(())
    }
}

fn required<'a>(argument: &'a str, keyword: &'static str) -> Result<&'a str, DirectiveError> {
    if argument.is_empty() {
        Err(DirectiveError::MissingArgument(keyword))
    } else {
        Ok(argument)
    }
}

fn token(input: &str) -> ParseResult<&str> {
    take_while1(|c: char| !c.is_whitespace())(input)
}

fn time_of_day(input: &str) -> ParseResult<&str> {
    recognize(tuple((
        take_while1(|c: char| c.is_ascii_digit()),
        char(':'),
        take_while1(|c: char| c.is_ascii_digit() || c == ':'),
    )))(input)
}

/// `DATE [TIME] SYMBOL PRICE`
fn price_fields(input: &str) -> ParseResult<(&str, &str, &str)> {
    let (input, date) = token(input)?;
    let (input, _) = opt(preceded(space1, time_of_day))(input)?;
    let (input, symbol) = preceded(space1, token)(input)?;
    let (input, price) = preceded(space0, rest)(input)?;
    Ok((input, (date, symbol, price)))
}

fn parse_price(argument: &str) -> Result<Directive, DirectiveError> {
    let (_, (date_text, symbol, price_text)) =
        price_fields(argument).map_err(|_| DirectiveError::InvalidPrice(argument.to_string()))?;
    let date = parse_date(date_text).ok_or_else(|| DirectiveError::InvalidDate(date_text.into()))?;
    let price = parse_amount_literal(price_text)
        .map_err(|_| DirectiveError::InvalidAmount(price_text.to_string()))?;
    Ok(Directive::Price { date, symbol: symbol.trim_matches('"').to_string(), price })
}

fn parse_alias(argument: &str) -> Result<Directive, DirectiveError> {
    match argument.split_once('=') {
        Some((alias, account)) if !alias.trim().is_empty() && !account.trim().is_empty() => {
            Ok(Directive::Alias {
                alias: alias.trim().to_string(),
                account: account.trim().to_string(),
            })
        }
        _ => Err(DirectiveError::InvalidAlias(argument.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plainledger_math::Amount;

    fn parse(line: &str) -> Directive {
        Directive::parse(line).unwrap().unwrap()
    }

    #[test]
    fn test_unknown_keyword_is_not_a_directive() {
        assert!(Directive::parse("year 2011").is_none());
        assert!(Directive::parse("Some random text").is_none());
    }

    #[test]
    fn test_price_directive() {
        match parse("P 2011/03/01 12:30:00 EUR $1.35") {
            Directive::Price { date, symbol, price } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2011, 3, 1).unwrap());
                assert_eq!(symbol, "EUR");
                assert_eq!(price.amount, Amount::parse_quantity("1.35", "$").unwrap());
            }
            other => panic!("unexpected directive {:?}", other),
        }
        assert!(matches!(
            Directive::parse("P 2011/13/01 EUR $1"),
            Some(Err(DirectiveError::InvalidDate(_)))
        ));
        assert!(matches!(
            Directive::parse("P 2011/01/01"),
            Some(Err(DirectiveError::InvalidPrice(_)))
        ));
    }

    #[test]
    fn test_alias_directive() {
        assert_eq!(
            parse("alias Checking=Assets:Bank:Checking"),
            Directive::Alias { alias: "Checking".into(), account: "Assets:Bank:Checking".into() }
        );
        assert!(matches!(
            Directive::parse("alias Checking"),
            Some(Err(DirectiveError::InvalidAlias(_)))
        ));
    }

    #[test]
    fn test_sub_lines() {
        let mut directive = parse("commodity EUR");
        assert!(directive.takes_sub_lines());
        directive.add_sub_line("format 1.000,00 EUR");
        directive.add_sub_line("note Euro");
        directive.add_sub_line("nomarket");
        directive.add_sub_line("unknown thing");

        match directive {
            Directive::Commodity(commodity) => {
                assert_eq!(commodity.symbol, "EUR");
                assert_eq!(commodity.format.as_deref(), Some("1.000,00 EUR"));
                assert_eq!(commodity.note.as_deref(), Some("Euro"));
                assert!(commodity.nomarket);
                assert!(!commodity.default);
            }
            other => panic!("unexpected directive {:?}", other),
        }
        assert!(!parse("include other.ledger").takes_sub_lines());
    }

    #[test]
    fn test_account_directive_applies_note_and_alias() {
        let mut journal = Journal::new();
        let mut directive = parse("account Assets:Bank:Checking");
        directive.add_sub_line("note Main account");
        directive.add_sub_line("alias chk");
        directive.apply(&mut journal).unwrap();

        let id = journal.accounts().find("Assets:Bank:Checking").unwrap();
        assert_eq!(journal.accounts().get(id).note.as_deref(), Some("Main account"));
        assert_eq!(journal.resolve_account("chk"), "Assets:Bank:Checking");
    }

    #[test]
    fn test_commodity_directive_pins_format() {
        let mut journal = Journal::new();
        let mut directive = parse("commodity $");
        directive.add_sub_line("format $1,000.00");
        directive.add_sub_line("default");
        directive.apply(&mut journal).unwrap();

        let commodity = journal.commodities().find("$").unwrap();
        assert_eq!(commodity.precision(), 2);
        assert!(commodity.has_flags(CommodityFlags::STYLE_FIXED | CommodityFlags::STYLE_THOUSANDS));
        assert_eq!(journal.commodities().default_symbol(), "$");
    }

    #[test]
    fn test_default_commodity_directive() {
        let mut journal = Journal::new();
        parse("D 1,000.00 EUR").apply(&mut journal).unwrap();
        assert_eq!(journal.commodities().default_symbol(), "EUR");
        assert_eq!(journal.commodities().find("EUR").unwrap().precision(), 2);
    }
}
