//! Posting/entry representation within transactions

use std::collections::BTreeMap;

use plainledger_math::{Amount, AmountResult};

use crate::account::AccountId;

/// Tags attached to a transaction or posting; flag tags have no value
pub type Metadata = BTreeMap<String, Option<String>>;

/// How a posting's account was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostingKind {
    /// Plain account name
    #[default]
    Normal,
    /// `(Account)`: not required to balance
    Virtual,
    /// `[Account]`: virtual but must balance
    Bracketed,
}

/// A price annotation: `@ unit` or `@@ total`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSpec {
    pub amount: Amount,
    pub is_total: bool,
}

/// A cost basis annotation: `{unit}` or `{{total}}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostSpec {
    pub amount: Amount,
    pub is_total: bool,
}

/// Whether `=`/`==` asserts an existing balance or assigns a missing amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionKind {
    /// `= X` on a posting without an amount
    Assignment,
    /// `== X`, or `= X` on a posting with an amount
    Assertion,
}

/// Expected running balance of the posting's account after it applies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceAssertion {
    pub amount: Amount,
    pub kind: AssertionKind,
}

/// Represents a posting (line item) within a transaction
#[derive(Debug, Clone)]
pub struct Posting {
    /// Account posted to
    pub account: AccountId,
    /// Index of the owning transaction in the journal
    pub transaction: usize,
    /// Amount posted; `None` while elided
    pub amount: Option<Amount>,
    /// Unevaluated `(expr)` text; the amount is then a zero placeholder
    pub expression: Option<String>,
    /// Optional cost basis
    pub cost: Option<CostSpec>,
    /// Optional price
    pub price: Option<PriceSpec>,
    /// Optional balance assertion or assignment
    pub assertion: Option<BalanceAssertion>,
    /// Note from trailing or following comments
    pub note: Option<String>,
    /// Tags parsed out of the note
    pub metadata: Metadata,
    /// How the account was written
    pub kind: PostingKind,
    /// Amount was computed by elision or assignment
    pub generated: bool,
}

impl Posting {
    /// Create a posting with no amount
    pub fn new(account: AccountId) -> Self {
        Self {
            account,
            transaction: 0,
            amount: None,
            expression: None,
            cost: None,
            price: None,
            assertion: None,
            note: None,
            metadata: Metadata::new(),
            kind: PostingKind::Normal,
            generated: false,
        }
    }

    /// Create a posting with account and amount
    pub fn with_amount(account: AccountId, amount: Amount) -> Self {
        let mut posting = Self::new(account);
        posting.amount = Some(amount);
        posting
    }

    /// Check if the posting takes part in transaction balancing
    pub fn must_balance(&self) -> bool {
        self.kind != PostingKind::Virtual
    }

    /// Check if the posting is virtual (enclosed in parentheses)
    pub fn is_virtual(&self) -> bool {
        self.kind == PostingKind::Virtual
    }

    /// Check if the amount is an unevaluated expression
    pub fn is_expression(&self) -> bool {
        self.expression.is_some()
    }

    /// Check if the posting still needs an amount
    pub fn is_elided(&self) -> bool {
        self.amount.is_none() && self.expression.is_none()
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

    /// Price of one unit of the posted commodity
    pub fn unit_price(&self) -> AmountResult<Option<Amount>> {
        let (Some(amount), Some(price)) = (&self.amount, &self.price) else {
            return Ok(None);
        };
        if !price.is_total {
            return Ok(Some(price.amount.clone()));
        }
        price.amount.abs().checked_div(amount.abs().quantity()).map(Some)
    }

    /// Amount this posting contributes when balancing the transaction
    ///
    /// Costs take precedence over prices; a total cost or price carries the
    /// sign of the posted quantity.
    pub fn weight(&self) -> Option<Amount> {
        let amount = self.amount.as_ref()?;
        let conversion = self
            .cost
            .as_ref()
            .map(|c| (&c.amount, c.is_total))
            .or_else(|| self.price.as_ref().map(|p| (&p.amount, p.is_total)));

        match conversion {
            None => Some(amount.clone()),
            Some((per, false)) => Some(per.scaled(amount.quantity())),
            Some((total, true)) => {
                let total = total.abs();
                Some(if amount.is_negative() { total.negated() } else { total })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountTree;

    fn amt(text: &str, symbol: &str) -> Amount {
        Amount::parse_quantity(text, symbol).unwrap()
    }

    fn posting(amount: &str, symbol: &str) -> Posting {
        let mut tree = AccountTree::new();
        let account = tree.find_or_create("Assets:Broker");
        Posting::with_amount(account, amt(amount, symbol))
    }

    #[test]
    fn test_weight_without_price_is_amount() {
        let p = posting("10.00", "USD");
        assert_eq!(p.weight(), Some(amt("10", "USD")));
    }

    #[test]
    fn test_weight_with_unit_price() {
        let mut p = posting("10", "AAPL");
        p.price = Some(PriceSpec { amount: amt("50.25", "$"), is_total: false });
        assert_eq!(p.weight(), Some(amt("502.5", "$")));
    }

    #[test]
    fn test_weight_with_total_price_takes_quantity_sign() {
        let mut p = posting("-10", "AAPL");
        p.price = Some(PriceSpec { amount: amt("600", "$"), is_total: true });
        assert_eq!(p.weight(), Some(amt("-600", "$")));
        assert_eq!(p.unit_price().unwrap(), Some(amt("60", "$")));
    }

    #[test]
    fn test_cost_takes_precedence_over_price() {
        let mut p = posting("2", "AAPL");
        p.cost = Some(CostSpec { amount: amt("40", "$"), is_total: false });
        p.price = Some(PriceSpec { amount: amt("55", "$"), is_total: false });
        assert_eq!(p.weight(), Some(amt("80", "$")));
    }

    #[test]
    fn test_elided_and_virtual_flags() {
        let mut tree = AccountTree::new();
        let mut p = Posting::new(tree.find_or_create("Equity"));
        assert!(p.is_elided());
        assert!(p.weight().is_none());
        p.kind = PostingKind::Virtual;
        assert!(!p.must_balance());
        p.expression = Some("(1 + 2)".into());
        assert!(!p.is_elided());
    }

    #[test]
    fn test_append_note() {
        let mut p = posting("1", "USD");
        p.append_note("first");
        p.append_note("second");
        assert_eq!(p.note.as_deref(), Some("first\nsecond"));
    }
}
