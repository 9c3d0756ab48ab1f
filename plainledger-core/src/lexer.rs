//! Line classification for journal text
//!
//! Journals are line oriented: every line is classified on its own and the
//! parser assembles transactions and directive blocks from the sequence of
//! classified lines. Transaction headers are decomposed here with nom
//! combinators; posting lines are left to [`crate::transaction_parser`].

use chrono::{Datelike, NaiveDate};
use nom::{
    branch::alt,
    bytes::complete::{take_till, take_until, take_while_m_n},
    character::complete::{char, one_of, space0},
    combinator::{map, map_res, opt, rest},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use crate::posting::Metadata;
use crate::transaction::TransactionStatus;

type ParseResult<'a, T> = IResult<&'a str, T>;

/// Characters that start a comment line at column 0
pub const COMMENT_CHARS: [char; 5] = [';', '#', '%', '|', '*'];

/// Fields of a transaction header line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionHeader {
    pub date: NaiveDate,
    pub aux_date: Option<NaiveDate>,
    pub status: TransactionStatus,
    pub code: Option<String>,
    pub payee: String,
    pub note: Option<String>,
}

/// Classification of a single journal line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// Empty or whitespace-only
    Blank,
    /// Comment at column 0; holds the text after the comment character
    Comment(&'a str),
    /// Start of a transaction
    Header(TransactionHeader),
    /// Starts with a date-shaped token that is not a calendar date
    MalformedHeader(&'a str),
    /// Indented `; text`; holds the text after the semicolon
    Note(&'a str),
    /// Any other indented line, trimmed: a posting or a directive sub-line
    Posting(&'a str),
    /// Any other line at column 0, trimmed
    Directive(&'a str),
}

/// Classify one line of journal text
pub fn classify_line(line: &str) -> LineKind<'_> {
    let line = line.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }

    let first = match line.chars().next() {
        Some(c) => c,
        None => return LineKind::Blank,
    };

    if first.is_whitespace() {
        return match trimmed.strip_prefix(';') {
            Some(note) => LineKind::Note(note.trim()),
            None => LineKind::Posting(trimmed),
        };
    }

    if COMMENT_CHARS.contains(&first) {
        return LineKind::Comment(line[first.len_utf8()..].trim());
    }

    if first.is_ascii_digit() {
        if let Ok((remainder, parts)) = date_parts(line) {
            let date_text = &line[..line.len() - remainder.len()];
            return match calendar_date(parts).and_then(|date| header_fields(date, remainder)) {
                Some(header) => LineKind::Header(header),
                None => LineKind::MalformedHeader(date_text),
            };
        }
    }

    LineKind::Directive(trimmed)
}

/// Parse a full `YYYY-MM-DD` or `YYYY/MM/DD` date
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    match date_parts(text.trim()) {
        Ok(("", parts)) => calendar_date(parts),
        _ => None,
    }
}

fn digits(count: usize) -> impl FnMut(&str) -> ParseResult<&str> {
    move |input| take_while_m_n(count, count, |c: char| c.is_ascii_digit())(input)
}

/// Year, month and day of a date token; separators may be `-` or `/`
fn date_parts(input: &str) -> ParseResult<(i32, u32, u32)> {
    map_res(
        tuple((digits(4), one_of("-/"), digits(2), one_of("-/"), digits(2))),
        |(year, _, month, _, day): (&str, char, &str, char, &str)| {
            Ok::<_, std::num::ParseIntError>((year.parse()?, month.parse()?, day.parse()?))
        },
    )(input)
}

/// Month and day of a short `MM-DD` token
fn month_day(input: &str) -> ParseResult<(u32, u32)> {
    map_res(tuple((digits(2), one_of("-/"), digits(2))), |(month, _, day): (&str, char, &str)| {
        Ok::<_, std::num::ParseIntError>((month.parse()?, day.parse()?))
    })(input)
}

fn calendar_date((year, month, day): (i32, u32, u32)) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Auxiliary date after `=`; a short form inherits the primary year
fn aux_date(input: &str) -> ParseResult<(Option<i32>, u32, u32)> {
    preceded(
        char('='),
        alt((
            map(date_parts, |(year, month, day)| (Some(year), month, day)),
            map(month_day, |(month, day)| (None, month, day)),
        )),
    )(input)
}

fn status_marker(input: &str) -> ParseResult<TransactionStatus> {
    map(opt(one_of("*!")), TransactionStatus::from_marker)(input)
}

fn code(input: &str) -> ParseResult<&str> {
    delimited(char('('), take_until(")"), char(')'))(input)
}

fn payee_and_note(input: &str) -> ParseResult<(&str, Option<&str>)> {
    pair(take_till(|c| c == ';'), opt(preceded(char(';'), rest)))(input)
}

fn header_fields(date: NaiveDate, input: &str) -> Option<TransactionHeader> {
    let parsed: ParseResult<_> = tuple((
        opt(aux_date),
        space0,
        status_marker,
        space0,
        opt(code),
        space0,
        payee_and_note,
    ))(input);
    let (_, (aux, _, status, _, code, _, (payee, note))) = parsed.ok()?;

    let aux_date = match aux {
        Some((year, month, day)) => Some(calendar_date((year.unwrap_or(date.year()), month, day))?),
        None => None,
    };

    Some(TransactionHeader {
        date,
        aux_date,
        status,
        code: code.map(|c| c.trim().to_string()),
        payee: payee.trim().to_string(),
        note: note.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
    })
}

/// Record the tags found in a note
///
/// A line of the form `Key: value` sets `Key`; words such as `:food:travel:`
/// set value-less tags.
pub fn collect_tags(note: &str, metadata: &mut Metadata) {
    for line in note.lines().map(str::trim) {
        if let Some((key, value)) = line.split_once(':') {
            let is_pair = !key.is_empty()
                && !key.contains(char::is_whitespace)
                && (value.is_empty() || value.starts_with(char::is_whitespace));
            if is_pair {
                let value = value.trim();
                metadata
                    .insert(key.to_string(), (!value.is_empty()).then(|| value.to_string()));
                continue;
            }
        }

        for word in line.split_whitespace() {
            if word.len() > 2 && word.starts_with(':') && word.ends_with(':') {
                for tag in word.split(':').filter(|t| !t.is_empty()) {
                    metadata.insert(tag.to_string(), None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(line: &str) -> TransactionHeader {
        match classify_line(line) {
            LineKind::Header(header) => header,
            other => panic!("expected header, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_basic_lines() {
        assert_eq!(classify_line(""), LineKind::Blank);
        assert_eq!(classify_line("    \t"), LineKind::Blank);
        assert_eq!(classify_line("; a comment"), LineKind::Comment("a comment"));
        assert_eq!(classify_line("# hash comment"), LineKind::Comment("hash comment"));
        assert_eq!(classify_line("    ; posting note"), LineKind::Note("posting note"));
        assert_eq!(
            classify_line("    Assets:Cash  $10.00\r\n"),
            LineKind::Posting("Assets:Cash  $10.00")
        );
        assert_eq!(
            classify_line("account Assets:Cash"),
            LineKind::Directive("account Assets:Cash")
        );
    }

    #[test]
    fn test_header_fields() {
        let h = header("2011/03/05=03-07 * (1024) Grocery Store ; weekly :food:");
        assert_eq!(h.date, NaiveDate::from_ymd_opt(2011, 3, 5).unwrap());
        assert_eq!(h.aux_date, NaiveDate::from_ymd_opt(2011, 3, 7));
        assert_eq!(h.status, TransactionStatus::Cleared);
        assert_eq!(h.code.as_deref(), Some("1024"));
        assert_eq!(h.payee, "Grocery Store");
        assert_eq!(h.note.as_deref(), Some("weekly :food:"));
    }

    #[test]
    fn test_status_markers_map_uniformly() {
        assert_eq!(header("2011-01-01 ! Payee").status, TransactionStatus::Reconciled);
        assert_eq!(header("2011-01-01 * Payee").status, TransactionStatus::Cleared);
        assert_eq!(header("2011-01-01 Payee").status, TransactionStatus::Pending);
    }

    #[test]
    fn test_both_separators_normalize() {
        assert_eq!(header("2011-01-02 A").date, header("2011/01/02 A").date);
        assert_eq!(header("2011/01-02 A").date, NaiveDate::from_ymd_opt(2011, 1, 2).unwrap());
    }

    #[test]
    fn test_full_aux_date() {
        let h = header("2011-12-30=2012-01-02 Payee");
        assert_eq!(h.aux_date, NaiveDate::from_ymd_opt(2012, 1, 2));
    }

    #[test]
    fn test_invalid_calendar_date_is_not_a_header() {
        assert_eq!(classify_line("2011-02-30 Payee"), LineKind::MalformedHeader("2011-02-30"));
        assert_eq!(
            classify_line("2011-01-01=13-01 Payee"),
            LineKind::MalformedHeader("2011-01-01")
        );
    }

    #[test]
    fn test_short_numeric_lines_fall_through() {
        assert_eq!(classify_line("2011 is a year"), LineKind::Directive("2011 is a year"));
        assert_eq!(classify_line("11/01/01 Payee"), LineKind::Directive("11/01/01 Payee"));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2012/02/29"), NaiveDate::from_ymd_opt(2012, 2, 29));
        assert_eq!(parse_date("2011/02/29"), None);
        assert_eq!(parse_date("2011/02/01 extra"), None);
    }

    #[test]
    fn test_collect_tags() {
        let mut metadata = Metadata::new();
        collect_tags("Receipt: 1234\n:food:travel:\njust text", &mut metadata);
        assert_eq!(metadata.get("Receipt"), Some(&Some("1234".to_string())));
        assert_eq!(metadata.get("food"), Some(&None));
        assert_eq!(metadata.get("travel"), Some(&None));
        assert_eq!(metadata.len(), 3);
    }
}
