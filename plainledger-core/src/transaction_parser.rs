//! Posting line parsing implementation using nom combinators
//!
//! A posting line is split into account name and amount text at the first
//! double space or tab. The amount text follows the grammar
//!
//! ```text
//! <amount> [{cost} | {{total cost}}] [@ price | @@ total price] [= X | == X]
//! ```
//!
//! where `<amount>` is a prefixed currency (`$25.50`, `-$3`), a number with a
//! trailing commodity (`10.00 GBP`), a bare number, or a parenthesized
//! expression that is kept unevaluated. Commas are thousands separators.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1, take_while, take_while1},
    character::complete::{char, digit1, one_of, space0},
    combinator::{map, map_res, opt, recognize},
    error::{Error as NomError, ErrorKind},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use plainledger_math::{Amount, AmountError, CommodityFlags, CommodityPool};
use thiserror::Error;

use crate::posting::PostingKind;

type ParseResult<'a, T> = IResult<&'a str, T>;

/// Errors for a single posting line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PostingParseError {
    #[error("posting has no account name")]
    MissingAccount,
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),
}

/// An amount literal together with the style it was written in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountLiteral {
    /// Parsed amount; the commodity is empty for a bare number
    pub amount: Amount,
    /// Placement and separator flags observed on the literal
    pub style: CommodityFlags,
}

/// `=` or `==` after an amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionOp {
    Single,
    Double,
}

/// Syntactic parts of a posting line, before accounts and commodities resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingLine<'a> {
    pub account: &'a str,
    pub kind: PostingKind,
    pub amount: Option<AmountLiteral>,
    pub expression: Option<&'a str>,
    /// Cost and whether it is a total (`{{}}`)
    pub cost: Option<(AmountLiteral, bool)>,
    /// Price and whether it is a total (`@@`)
    pub price: Option<(AmountLiteral, bool)>,
    pub assertion: Option<(AmountLiteral, AssertionOp)>,
    pub note: Option<&'a str>,
}

#[derive(Debug, Default)]
struct AmountText<'a> {
    amount: Option<AmountLiteral>,
    expression: Option<&'a str>,
    cost: Option<(AmountLiteral, bool)>,
    price: Option<(AmountLiteral, bool)>,
    assertion: Option<(AmountLiteral, AssertionOp)>,
}

/// Parse the trimmed content of an indented posting line
pub fn parse_posting_line(line: &str) -> Result<PostingLine<'_>, PostingParseError> {
    let (content, note) = match line.split_once(';') {
        Some((content, note)) => (content, Some(note.trim())),
        None => (line, None),
    };

    let (account_text, amount_text) = split_account(content.trim());
    let (account, kind) = posting_kind(account_text);
    if account.is_empty() {
        return Err(PostingParseError::MissingAccount);
    }

    let parts = if amount_text.is_empty() {
        AmountText::default()
    } else {
        match amount_expression(amount_text) {
            Ok(("", parts)) => parts,
            _ => return Err(PostingParseError::InvalidAmount(amount_text.to_string())),
        }
    };

    Ok(PostingLine {
        account,
        kind,
        amount: parts.amount,
        expression: parts.expression,
        cost: parts.cost,
        price: parts.price,
        assertion: parts.assertion,
        note,
    })
}

/// Parse a standalone amount such as `$1,000.00` or `-5.25 EUR`
pub fn parse_amount_literal(text: &str) -> Result<AmountLiteral, PostingParseError> {
    match amount_literal(text.trim()) {
        Ok(("", literal)) => Ok(literal),
        _ => Err(PostingParseError::InvalidAmount(text.trim().to_string())),
    }
}

/// Register a literal's commodity in the pool and learn its display style
///
/// Aliases resolve to their commodity and bare numbers take the pool's
/// default commodity, keeping that commodity's placement.
pub fn intern_literal(pool: &mut CommodityPool, literal: &AmountLiteral) -> Amount {
    let amount = &literal.amount;
    let (symbol, style) = if amount.commodity().is_empty() {
        let symbol = pool.default_symbol().to_string();
        let style = pool.find_or_create(&symbol).flags();
        (symbol, style)
    } else {
        (pool.resolve(amount.commodity()).to_string(), literal.style)
    };

    pool.find_or_create(&symbol).learn_style(style, amount.precision());
    Amount::new(amount.quantity().clone(), symbol).with_precision(amount.precision())
}

/// Split at the first double space or tab into account and amount text
pub fn split_account(line: &str) -> (&str, &str) {
    let split = line.find("  ").into_iter().chain(line.find('\t')).min();
    match split {
        Some(index) => (line[..index].trim(), line[index..].trim()),
        None => (line.trim(), ""),
    }
}

fn posting_kind(account: &str) -> (&str, PostingKind) {
    if let Some(inner) = account.strip_prefix('(').and_then(|a| a.strip_suffix(')')) {
        (inner.trim(), PostingKind::Virtual)
    } else if let Some(inner) = account.strip_prefix('[').and_then(|a| a.strip_suffix(']')) {
        (inner.trim(), PostingKind::Bracketed)
    } else {
        (account, PostingKind::Normal)
    }
}

fn amount_expression(input: &str) -> ParseResult<AmountText<'_>> {
    let (input, value) = opt(alt((
        map(expression, |expr| (None::<AmountLiteral>, Some(expr))),
        map(amount_literal, |amount| (Some(amount), None::<&str>)),
    )))(input)?;
    let (input, cost) = preceded(space0, opt(cost))(input)?;
    let (input, price) = preceded(space0, opt(price))(input)?;
    let (input, cost) = match cost {
        Some(cost) => (input, Some(cost)),
        None => preceded(space0, opt(self::cost))(input)?,
    };
    let (input, assertion) = preceded(space0, opt(assertion))(input)?;
    let (input, _) = space0(input)?;

    let (amount, expression) = value.unwrap_or((None, None));
    Ok((input, AmountText { amount, expression, cost, price, assertion }))
}

/// A parenthesized expression, including nested parentheses
fn expression(input: &str) -> ParseResult<&str> {
    let mut depth = 0usize;
    for (index, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[index + 1..], &input[..index + 1]));
                }
            }
            _ if depth == 0 => break,
            _ => {}
        }
    }
    Err(nom::Err::Error(NomError::new(input, ErrorKind::Char)))
}

fn cost(input: &str) -> ParseResult<(AmountLiteral, bool)> {
    alt((
        map(delimited(tag("{{"), delimited(space0, amount_literal, space0), tag("}}")), |a| {
            (a, true)
        }),
        map(delimited(char('{'), delimited(space0, amount_literal, space0), char('}')), |a| {
            (a, false)
        }),
    ))(input)
}

fn price(input: &str) -> ParseResult<(AmountLiteral, bool)> {
    alt((
        map(preceded(tag("@@"), preceded(space0, amount_literal)), |a| (a, true)),
        map(preceded(char('@'), preceded(space0, amount_literal)), |a| (a, false)),
    ))(input)
}

fn assertion(input: &str) -> ParseResult<(AmountLiteral, AssertionOp)> {
    alt((
        map(preceded(tag("=="), preceded(space0, amount_literal)), |a| (a, AssertionOp::Double)),
        map(preceded(char('='), preceded(space0, amount_literal)), |a| (a, AssertionOp::Single)),
    ))(input)
}

fn amount_literal(input: &str) -> ParseResult<AmountLiteral> {
    alt((prefixed_amount, suffixed_amount))(input)
}

fn number(input: &str) -> ParseResult<&str> {
    recognize(tuple((
        digit1,
        take_while(|c: char| c.is_ascii_digit() || c == ','),
        opt(pair(char('.'), digit1)),
    )))(input)
}

fn sign(input: &str) -> ParseResult<bool> {
    map(opt(one_of("+-")), |s| s == Some('-'))(input)
}

fn commodity_symbol(input: &str) -> ParseResult<&str> {
    alt((
        delimited(char('"'), take_till1(|c| c == '"'), char('"')),
        take_while1(|c: char| {
            !c.is_whitespace() && !c.is_ascii_digit() && !"-+.,@{}()[]=;\"".contains(c)
        }),
    ))(input)
}

fn build_literal(
    negative: bool,
    digits: &str,
    symbol: &str,
    mut style: CommodityFlags,
) -> Result<AmountLiteral, AmountError> {
    let amount = Amount::parse_quantity(digits, symbol)?;
    if digits.contains(',') {
        style |= CommodityFlags::STYLE_THOUSANDS;
    }
    let amount = if negative { amount.negated() } else { amount };
    Ok(AmountLiteral { amount, style })
}

/// `$25.50`, `-$3`, `$-3`, `$ 3`
fn prefixed_amount(input: &str) -> ParseResult<AmountLiteral> {
    map_res(
        tuple((sign, recognize(one_of("$£€¥")), space0, sign, number)),
        |(outer, symbol, gap, inner, digits): (bool, &str, &str, bool, &str)| {
            let style = if gap.is_empty() {
                CommodityFlags::empty()
            } else {
                CommodityFlags::STYLE_SEPARATED
            };
            build_literal(outer != inner, digits, symbol, style)
        },
    )(input)
}

/// `10.00 GBP`, `5EUR`, `100`
fn suffixed_amount(input: &str) -> ParseResult<AmountLiteral> {
    map_res(
        tuple((sign, number, opt(pair(space0, commodity_symbol)))),
        |(negative, digits, suffix): (bool, &str, Option<(&str, &str)>)| match suffix {
            Some((gap, symbol)) => {
                let mut style = CommodityFlags::STYLE_SUFFIXED;
                if !gap.is_empty() {
                    style |= CommodityFlags::STYLE_SEPARATED;
                }
                build_literal(negative, digits, symbol, style)
            }
            None => build_literal(negative, digits, "", CommodityFlags::empty()),
        },
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(text: &str, symbol: &str) -> Amount {
        Amount::parse_quantity(text, symbol).unwrap()
    }

    #[test]
    fn test_split_at_double_space_or_tab() {
        assert_eq!(split_account("Assets:Cash  $10"), ("Assets:Cash", "$10"));
        assert_eq!(split_account("Assets:Cash\t$10"), ("Assets:Cash", "$10"));
        assert_eq!(
            split_account("Equity:Opening balance"),
            ("Equity:Opening balance", "")
        );
        assert_eq!(split_account("Expenses:Eating out \t 5 EUR"), ("Expenses:Eating out", "5 EUR"));
    }

    #[test]
    fn test_prefixed_amounts() {
        let literal = parse_amount_literal("$1,234.50").unwrap();
        assert_eq!(literal.amount, amt("1234.50", "$"));
        assert_eq!(literal.amount.precision(), 2);
        assert_eq!(literal.style, CommodityFlags::STYLE_THOUSANDS);

        assert_eq!(parse_amount_literal("-$5.25").unwrap().amount, amt("-5.25", "$"));
        assert_eq!(parse_amount_literal("$-5.25").unwrap().amount, amt("-5.25", "$"));
        assert_eq!(parse_amount_literal("£3").unwrap().amount, amt("3", "£"));
    }

    #[test]
    fn test_suffixed_amounts() {
        let literal = parse_amount_literal("-5.25 EUR").unwrap();
        assert_eq!(literal.amount, amt("-5.25", "EUR"));
        assert_eq!(
            literal.style,
            CommodityFlags::STYLE_SUFFIXED | CommodityFlags::STYLE_SEPARATED
        );

        let literal = parse_amount_literal("10AAPL").unwrap();
        assert_eq!(literal.amount, amt("10", "AAPL"));
        assert_eq!(literal.style, CommodityFlags::STYLE_SUFFIXED);

        let quoted = parse_amount_literal("3 \"Big Shares\"").unwrap();
        assert_eq!(quoted.amount.commodity(), "Big Shares");
    }

    #[test]
    fn test_bare_number_has_no_commodity() {
        let literal = parse_amount_literal("100").unwrap();
        assert_eq!(literal.amount.commodity(), "");
        assert_eq!(literal.amount.precision(), 0);
    }

    #[test]
    fn test_malformed_amounts_rejected() {
        assert!(parse_amount_literal("abc").is_err());
        assert!(parse_amount_literal("$").is_err());
        assert!(parse_posting_line("Assets:Cash  10 USD USD").is_err());
        assert!(parse_posting_line("Assets:Cash  $$10").is_err());
    }

    #[test]
    fn test_posting_with_price_cost_and_assertion() {
        let line =
            parse_posting_line("Assets:Broker  10 AAPL {$50.00} @ $55.00 == 10 AAPL").unwrap();
        assert_eq!(line.account, "Assets:Broker");
        assert_eq!(line.amount.unwrap().amount, amt("10", "AAPL"));
        assert_eq!(line.cost, Some((parse_amount_literal("$50.00").unwrap(), false)));
        assert_eq!(line.price, Some((parse_amount_literal("$55.00").unwrap(), false)));
        let (expected, op) = line.assertion.unwrap();
        assert_eq!(expected.amount, amt("10", "AAPL"));
        assert_eq!(op, AssertionOp::Double);
    }

    #[test]
    fn test_total_price_and_price_before_cost() {
        let line = parse_posting_line("Assets:Broker  -5 AAPL @@ $300 {{$250}}").unwrap();
        assert_eq!(line.price.unwrap(), (parse_amount_literal("$300").unwrap(), true));
        assert_eq!(line.cost.unwrap(), (parse_amount_literal("$250").unwrap(), true));
    }

    #[test]
    fn test_assignment_without_amount() {
        let line = parse_posting_line("Assets:Checking  = $1,000.00").unwrap();
        assert!(line.amount.is_none());
        let (expected, op) = line.assertion.unwrap();
        assert_eq!(expected.amount, amt("1000", "$"));
        assert_eq!(op, AssertionOp::Single);
    }

    #[test]
    fn test_expression_amount() {
        let line = parse_posting_line("Expenses:Food  ($10 * (2 + 1))").unwrap();
        assert_eq!(line.expression, Some("($10 * (2 + 1))"));
        assert!(line.amount.is_none());
    }

    #[test]
    fn test_virtual_kinds_and_note() {
        let line = parse_posting_line("(Budget:Food)  $-20 ; monthly :budget:").unwrap();
        assert_eq!(line.account, "Budget:Food");
        assert_eq!(line.kind, PostingKind::Virtual);
        assert_eq!(line.note, Some("monthly :budget:"));

        let line = parse_posting_line("[Savings:Goal]").unwrap();
        assert_eq!(line.account, "Savings:Goal");
        assert_eq!(line.kind, PostingKind::Bracketed);
        assert!(line.amount.is_none());
    }

    #[test]
    fn test_intern_literal_resolves_default_and_aliases() {
        let mut pool = CommodityPool::new();
        pool.add_alias("USD", "$");

        let bare = intern_literal(&mut pool, &parse_amount_literal("10.50").unwrap());
        assert_eq!(bare, amt("10.50", "$"));
        assert_eq!(pool.format_amount(&bare), "$10.50");

        let aliased = intern_literal(&mut pool, &parse_amount_literal("3 USD").unwrap());
        assert_eq!(aliased.commodity(), "$");

        let euro = intern_literal(&mut pool, &parse_amount_literal("1,000.000 EUR").unwrap());
        assert_eq!(pool.format_amount(&euro), "1,000.000 EUR");
    }

    #[test]
    fn test_missing_account() {
        assert_eq!(parse_posting_line("()  $5"), Err(PostingParseError::MissingAccount));
    }
}
