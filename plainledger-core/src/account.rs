//! Hierarchical account structure with parent-child relationships
//!
//! Accounts live in an arena owned by [`AccountTree`]. Parents and children
//! refer to each other through [`AccountId`] indices, so the tree has a single
//! owner and no reference cycles. The root account has an empty name and id 0.

use std::collections::HashMap;
use std::fmt;

use compact_str::CompactString;
use log::debug;
use serde::Serialize;

/// Separator between account name segments
pub const ACCOUNT_SEPARATOR: char = ':';

/// Index of an account inside its [`AccountTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(usize);

impl AccountId {
    /// Position of the account in the arena
    pub fn index(self) -> usize {
        self.0
    }
}

/// Account type classification for ledger semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccountType {
    /// Asset account (normally debit balance)
    Asset,
    /// Liability account (normally credit balance)
    Liability,
    /// Equity account (normally credit balance)
    Equity,
    /// Income account (normally credit balance)
    Income,
    /// Expense account (normally debit balance)
    Expense,
}

impl AccountType {
    /// Classify an account by the first segment of its path
    ///
    /// Unrecognised roots are treated as assets.
    pub fn from_path(path: &str) -> Self {
        let root = path.split(ACCOUNT_SEPARATOR).next().unwrap_or("").to_lowercase();
        if root.starts_with("asset") {
            AccountType::Asset
        } else if root.starts_with("liabilit") {
            AccountType::Liability
        } else if root.starts_with("equit") {
            AccountType::Equity
        } else if root.starts_with("income") || root.starts_with("revenue") {
            AccountType::Income
        } else if root.starts_with("expense") {
            AccountType::Expense
        } else {
            AccountType::Asset
        }
    }

    /// Side of the ledger a positive balance normally sits on
    pub fn normal_balance_side(&self) -> &'static str {
        match self {
            AccountType::Asset | AccountType::Expense => "debit",
            AccountType::Liability | AccountType::Equity | AccountType::Income => "credit",
        }
    }
}

/// A node in the account hierarchy
#[derive(Debug, Clone)]
pub struct Account {
    /// Leaf segment of the name
    pub name: CompactString,
    /// Colon-joined path from the root
    pub full_name: CompactString,
    /// Classification derived from the root segment
    pub account_type: AccountType,
    /// Parent account; `None` only for the root
    pub parent: Option<AccountId>,
    /// Child accounts in creation order
    pub children: Vec<AccountId>,
    /// Distance from the root (top-level accounts have depth 1)
    pub depth: usize,
    /// Note from an `account` directive
    pub note: Option<String>,
    /// Aliases declared by an `account` directive
    pub aliases: Vec<String>,
}

impl Account {
    /// Check if this account is the root of the tree
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Check if this account has no children
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// Arena holding every account of a journal
#[derive(Debug, Clone)]
pub struct AccountTree {
    accounts: Vec<Account>,
    by_name: HashMap<CompactString, AccountId>,
}

impl Default for AccountTree {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountTree {
    /// Create a tree holding only the root account
    pub fn new() -> Self {
        let root = Account {
            name: CompactString::default(),
            full_name: CompactString::default(),
            account_type: AccountType::Asset,
            parent: None,
            children: Vec::new(),
            depth: 0,
            note: None,
            aliases: Vec::new(),
        };
        Self { accounts: vec![root], by_name: HashMap::new() }
    }

    /// Id of the root account
    pub fn root(&self) -> AccountId {
        AccountId(0)
    }

    /// Look up an account by its full name
    pub fn find(&self, full_name: &str) -> Option<AccountId> {
        if full_name.is_empty() {
            return Some(self.root());
        }
        self.by_name.get(full_name).copied()
    }

    /// Look up an account, creating it and any missing ancestors
    pub fn find_or_create(&mut self, full_name: &str) -> AccountId {
        if let Some(id) = self.find(full_name) {
            return id;
        }

        let mut current = self.root();
        let mut path = CompactString::default();
        for segment in full_name.split(ACCOUNT_SEPARATOR) {
            if !path.is_empty() {
                path.push(ACCOUNT_SEPARATOR);
            }
            path.push_str(segment);

            current = match self.by_name.get(&path) {
                Some(id) => *id,
                None => self.insert_child(current, segment, &path),
            };
        }
        current
    }

    fn insert_child(&mut self, parent: AccountId, segment: &str, full_name: &str) -> AccountId {
        let id = AccountId(self.accounts.len());
        let depth = self.accounts[parent.0].depth + 1;
        debug!("creating account '{}'", full_name);

        self.accounts.push(Account {
            name: CompactString::from(segment),
            full_name: CompactString::from(full_name),
            account_type: AccountType::from_path(full_name),
            parent: Some(parent),
            children: Vec::new(),
            depth,
            note: None,
            aliases: Vec::new(),
        });
        self.accounts[parent.0].children.push(id);
        self.by_name.insert(CompactString::from(full_name), id);
        id
    }

    /// Access an account by id
    pub fn get(&self, id: AccountId) -> &Account {
        &self.accounts[id.0]
    }

    /// Mutable access to an account by id
    pub fn get_mut(&mut self, id: AccountId) -> &mut Account {
        &mut self.accounts[id.0]
    }

    /// Full name of an account
    pub fn full_name(&self, id: AccountId) -> &str {
        &self.accounts[id.0].full_name
    }

    /// Parent of an account, `None` for the root
    pub fn parent(&self, id: AccountId) -> Option<AccountId> {
        self.accounts[id.0].parent
    }

    /// Direct children of an account
    pub fn children(&self, id: AccountId) -> &[AccountId] {
        &self.accounts[id.0].children
    }

    /// Check whether `id` sits below `ancestor` (an account is not its own descendant)
    pub fn is_descendant_of(&self, id: AccountId, ancestor: AccountId) -> bool {
        let mut current = self.parent(id);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }

    /// All accounts below `id`, depth first
    pub fn descendants(&self, id: AccountId) -> Vec<AccountId> {
        let mut result = Vec::new();
        let mut stack: Vec<AccountId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            result.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        result
    }

    /// Every account except the root, in creation order
    pub fn iter(&self) -> impl Iterator<Item = (AccountId, &Account)> {
        self.accounts.iter().enumerate().skip(1).map(|(i, account)| (AccountId(i), account))
    }

    /// Number of accounts, excluding the root
    pub fn len(&self) -> usize {
        self.accounts.len() - 1
    }

    /// Check if only the root exists
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immediate parent path of an account name (`None` for a top-level name)
pub fn parent_name(full_name: &str) -> Option<&str> {
    full_name.rsplit_once(ACCOUNT_SEPARATOR).map(|(parent, _)| parent)
}

/// First segment of an account name
pub fn top_level_name(full_name: &str) -> &str {
    full_name.split(ACCOUNT_SEPARATOR).next().unwrap_or(full_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_or_create_builds_ancestors() {
        let mut tree = AccountTree::new();
        let checking = tree.find_or_create("Assets:Bank:Checking");

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.full_name(checking), "Assets:Bank:Checking");
        assert_eq!(tree.get(checking).name, "Checking");
        assert_eq!(tree.get(checking).depth, 3);

        let bank = tree.parent(checking).unwrap();
        assert_eq!(tree.full_name(bank), "Assets:Bank");
        let assets = tree.parent(bank).unwrap();
        assert_eq!(tree.parent(assets), Some(tree.root()));
        assert!(tree.get(tree.root()).is_root());
    }

    #[test]
    fn test_find_or_create_is_idempotent() {
        let mut tree = AccountTree::new();
        let a = tree.find_or_create("Assets:Cash");
        let b = tree.find_or_create("Assets:Cash");
        tree.find_or_create("Assets:Bank");

        assert_eq!(a, b);
        assert_eq!(tree.len(), 3);
        let assets = tree.find("Assets").unwrap();
        assert_eq!(tree.children(assets).len(), 2);
        assert!(!tree.get(assets).is_leaf());
    }

    #[test]
    fn test_is_descendant_of() {
        let mut tree = AccountTree::new();
        let checking = tree.find_or_create("Assets:Bank:Checking");
        let assets = tree.find("Assets").unwrap();
        let expenses = tree.find_or_create("Expenses");

        assert!(tree.is_descendant_of(checking, assets));
        assert!(!tree.is_descendant_of(assets, checking));
        assert!(!tree.is_descendant_of(checking, expenses));
        assert!(!tree.is_descendant_of(assets, assets));
    }

    #[test]
    fn test_descendants_depth_first() {
        let mut tree = AccountTree::new();
        tree.find_or_create("Assets:Bank:Checking");
        tree.find_or_create("Assets:Cash");
        let assets = tree.find("Assets").unwrap();

        let names: Vec<_> =
            tree.descendants(assets).into_iter().map(|id| tree.full_name(id).to_string()).collect();
        assert_eq!(names, vec!["Assets:Bank", "Assets:Bank:Checking", "Assets:Cash"]);
    }

    #[test]
    fn test_account_type_from_path() {
        assert_eq!(AccountType::from_path("Assets:Cash"), AccountType::Asset);
        assert_eq!(AccountType::from_path("Liabilities:Visa"), AccountType::Liability);
        assert_eq!(AccountType::from_path("Equity:Opening"), AccountType::Equity);
        assert_eq!(AccountType::from_path("Revenue:Sales"), AccountType::Income);
        assert_eq!(AccountType::from_path("income"), AccountType::Income);
        assert_eq!(AccountType::from_path("Expenses:Food"), AccountType::Expense);
        assert_eq!(AccountType::from_path("Misc"), AccountType::Asset);
        assert_eq!(AccountType::Income.normal_balance_side(), "credit");
    }

    #[test]
    fn test_name_helpers() {
        assert_eq!(parent_name("Assets:Bank:Checking"), Some("Assets:Bank"));
        assert_eq!(parent_name("Assets"), None);
        assert_eq!(top_level_name("Assets:Bank:Checking"), "Assets");
    }
}
