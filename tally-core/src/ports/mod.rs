//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod clock;
mod repository;

pub use clock::{Clock, SystemClock};
pub use repository::{CredentialStore, LedgerStore, SessionStore};
