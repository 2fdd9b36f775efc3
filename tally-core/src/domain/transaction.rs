//! Transaction domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::{Error, Result};

/// Maximum fractional digits accepted for an amount
pub const MAX_AMOUNT_SCALE: u32 = 4;

/// Integer digits the ledger column holds (DECIMAL(18,4)); amounts must stay
/// below 10^14
pub const MAX_AMOUNT_INTEGER_DIGITS: u32 = 14;

fn max_amount() -> Decimal {
    Decimal::from(10i64.pow(MAX_AMOUNT_INTEGER_DIGITS))
}

/// Income or expense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(Error::invalid_input(format!(
                "kind must be 'income' or 'expense', got '{}'",
                other
            ))),
        }
    }
}

/// A single ledger entry owned by one identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    /// Never changes after creation
    pub owner_id: Uuid,
    pub kind: TransactionKind,
    pub category: String,
    /// Always >= 0; the kind carries the sign
    pub amount: Decimal,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a transaction from a validated draft
    ///
    /// A draft without a date is stamped with `now`.
    pub fn from_draft(owner_id: Uuid, draft: TransactionDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            kind: draft.kind,
            category: draft.category,
            amount: draft.amount,
            description: draft.description,
            date: draft.date.unwrap_or(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Signed contribution to the balance
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionKind::Income => self.amount,
            TransactionKind::Expense => -self.amount,
        }
    }
}

/// Read-only view of a transaction for the shared feed
///
/// Carries the owner's display name and nothing else about the owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicTransaction {
    pub id: Uuid,
    pub owner_name: Option<String>,
    pub kind: TransactionKind,
    pub category: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
}

/// Validated field set for add and update
///
/// On update every field replaces the stored one, except a missing date
/// which keeps the stored date.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub kind: TransactionKind,
    pub category: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl TransactionDraft {
    pub fn new(kind: TransactionKind, category: impl Into<String>, amount: Decimal) -> Result<Self> {
        let category = category.into().trim().to_string();
        if category.is_empty() {
            return Err(Error::invalid_input("category must not be empty"));
        }
        check_amount(amount)?;
        Ok(Self {
            kind,
            category,
            amount,
            description: None,
            date: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = if description.trim().is_empty() {
            None
        } else {
            Some(description)
        };
        self
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }
}

/// Raw transaction fields as they arrive from a form or command line
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionInput {
    pub kind: String,
    pub category: String,
    pub amount: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl TransactionInput {
    /// Parse into a draft; bad kind, amount, category or date is `InvalidInput`
    pub fn parse(&self) -> Result<TransactionDraft> {
        let kind: TransactionKind = self.kind.parse()?;
        let amount = parse_amount(&self.amount)?;
        let mut draft = TransactionDraft::new(kind, self.category.as_str(), amount)?;

        if let Some(description) = &self.description {
            draft = draft.with_description(description.as_str());
        }
        if let Some(date) = self.date.as_deref().filter(|d| !d.trim().is_empty()) {
            draft = draft.with_date(parse_date(date)?);
        }
        Ok(draft)
    }
}

/// Parse a non-negative decimal amount
///
/// Numeric coercion never falls back to zero: anything unparseable is
/// reported as `InvalidInput`.
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if digits.is_empty() {
        return Err(Error::invalid_input("amount is required"));
    }

    let amount = Decimal::from_str(digits)
        .map_err(|_| Error::invalid_input(format!("'{}' is not a valid amount", trimmed)))?;
    check_amount(amount)?;
    Ok(amount.normalize())
}

fn check_amount(amount: Decimal) -> Result<()> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(Error::invalid_input("amount must not be negative"));
    }
    if amount >= max_amount() {
        return Err(Error::invalid_input(format!(
            "amount must be less than {}",
            max_amount()
        )));
    }
    if amount.normalize().scale() > MAX_AMOUNT_SCALE {
        return Err(Error::invalid_input(format!(
            "amount supports at most {} decimal places",
            MAX_AMOUNT_SCALE
        )));
    }
    Ok(())
}

/// Parse a date given as `YYYY-MM-DD` (midnight UTC) or RFC 3339
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            Error::invalid_input(format!(
                "'{}' is not a valid date (use YYYY-MM-DD or RFC 3339)",
                trimmed
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn input(kind: &str, category: &str, amount: &str) -> TransactionInput {
        TransactionInput {
            kind: kind.to_string(),
            category: category.to_string(),
            amount: amount.to_string(),
            description: None,
            date: None,
        }
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("income".parse::<TransactionKind>().unwrap(), TransactionKind::Income);
        assert_eq!(" Expense ".parse::<TransactionKind>().unwrap(), TransactionKind::Expense);
        assert!(matches!(
            "transfer".parse::<TransactionKind>(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1000").unwrap(), Decimal::new(1000, 0));
        assert_eq!(parse_amount(" 12.50 ").unwrap(), Decimal::new(125, 1));
        assert_eq!(parse_amount("+3").unwrap(), Decimal::new(3, 0));
        assert_eq!(parse_amount("0").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_parse_amount_rejects_garbage_instead_of_zero() {
        for raw in ["", "abc", "12,50", "1e3x", "NaN"] {
            assert!(
                matches!(parse_amount(raw), Err(Error::InvalidInput(_))),
                "expected '{}' to be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_parse_amount_rejects_negative_and_overprecise() {
        assert!(matches!(parse_amount("-5"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_amount("0.00001"), Err(Error::InvalidInput(_))));
        // Trailing zeros don't count against the scale limit
        assert!(parse_amount("1.50000").is_ok());
    }

    #[test]
    fn test_parse_amount_rejects_what_the_ledger_cannot_hold() {
        assert!(matches!(
            parse_amount("1000000000000000"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            parse_amount("100000000000000"),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(
            parse_amount("99999999999999.9999").unwrap(),
            Decimal::from_str("99999999999999.9999").unwrap()
        );
        assert!(matches!(
            TransactionDraft::new(TransactionKind::Income, "Salary", Decimal::from(10i64.pow(15))),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_parse_date_formats() {
        let day = parse_date("2024-03-05").unwrap();
        assert_eq!(day, Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap());

        let precise = parse_date("2024-03-05T10:30:00+02:00").unwrap();
        assert_eq!(precise, Utc.with_ymd_and_hms(2024, 3, 5, 8, 30, 0).unwrap());

        assert!(matches!(parse_date("05/03/2024"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_input_parse() {
        let mut raw = input("expense", " food ", "12.5");
        raw.description = Some("lunch".to_string());
        raw.date = Some("2024-01-02".to_string());

        let draft = raw.parse().unwrap();
        assert_eq!(draft.kind, TransactionKind::Expense);
        assert_eq!(draft.category, "food");
        assert_eq!(draft.amount, Decimal::new(125, 1));
        assert_eq!(draft.description.as_deref(), Some("lunch"));
        assert!(draft.date.is_some());
    }

    #[test]
    fn test_input_blank_category_rejected() {
        assert!(matches!(
            input("income", "   ", "10").parse(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_date_defaults_to_now() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let draft = input("income", "salary", "1000").parse().unwrap();
        let tx = Transaction::from_draft(Uuid::new_v4(), draft, now);
        assert_eq!(tx.date, now);
        assert_eq!(tx.created_at, now);
    }

    #[test]
    fn test_signed_amount() {
        let now = Utc::now();
        let owner = Uuid::new_v4();
        let income = Transaction::from_draft(owner, input("income", "salary", "10").parse().unwrap(), now);
        let expense = Transaction::from_draft(owner, input("expense", "food", "4").parse().unwrap(), now);
        assert_eq!(income.signed_amount(), Decimal::new(10, 0));
        assert_eq!(expense.signed_amount(), Decimal::new(-4, 0));
    }
}
