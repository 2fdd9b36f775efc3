//! Ledger aggregation - totals, balance and expense breakdown
//!
//! Pure functions over a materialized list of transactions. No I/O and no
//! hidden state, so the same snapshot always yields the same summary.

use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::transaction::{Transaction, TransactionKind};

/// Expense total for one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotal {
    pub category: String,
    pub amount: Decimal,
}

/// Expense totals per category, in first-seen order
///
/// Serializes as a JSON object (`{"food": "250"}`) keeping that order, which
/// is what chart renderers consume. An empty breakdown means "nothing to
/// display".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryBreakdown(Vec<CategoryTotal>);

impl CategoryBreakdown {
    fn add(&mut self, category: &str, amount: Decimal) {
        match self.0.iter_mut().find(|c| c.category == category) {
            Some(existing) => existing.amount += amount,
            None => self.0.push(CategoryTotal {
                category: category.to_string(),
                amount,
            }),
        }
    }

    pub fn get(&self, category: &str) -> Option<Decimal> {
        self.0
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.amount)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryTotal> {
        self.0.iter()
    }

    pub fn total(&self) -> Decimal {
        self.0.iter().map(|c| c.amount).sum()
    }
}

impl Serialize for CategoryBreakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in &self.0 {
            map.serialize_entry(&entry.category, &entry.amount)?;
        }
        map.end()
    }
}

/// Derived figures for one owner's ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    /// `total_income - total_expenses`
    pub balance: Decimal,
    pub category_breakdown: CategoryBreakdown,
}

/// Aggregate a ledger snapshot
pub fn aggregate<'a, I>(transactions: I) -> Summary
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut summary = Summary::default();

    for tx in transactions {
        match tx.kind {
            TransactionKind::Income => summary.total_income += tx.amount,
            TransactionKind::Expense => {
                summary.total_expenses += tx.amount;
                summary.category_breakdown.add(&tx.category, tx.amount);
            }
        }
    }

    summary.balance = summary.total_income - summary.total_expenses;
    summary
}
