//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the credential, session and ledger stores
//! - A hand-driven clock for tests

pub mod clock;
pub mod duckdb;
