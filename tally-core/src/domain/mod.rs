//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod identity;
mod password;
mod registration;
mod session;
pub mod summary;
mod transaction;
pub mod result;

pub use identity::{normalize_email, Identity, ProviderAssertion};
pub use password::Argon2Params;
pub use registration::{
    RegistrationForm, MIN_PASSWORD_LEN, MSG_EMAIL_TAKEN, MSG_MISSING_FIELDS,
    MSG_PASSWORD_MISMATCH, MSG_PASSWORD_TOO_SHORT,
};
pub use session::{expiry_after, Session, SessionToken};
pub use summary::{aggregate, CategoryBreakdown, CategoryTotal, Summary};
pub use transaction::{
    parse_amount, parse_date, PublicTransaction, Transaction, TransactionDraft,
    TransactionInput, TransactionKind,
};
