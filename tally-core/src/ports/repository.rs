//! Store ports - durable record storage abstractions
//!
//! Each operation is atomic at single-record granularity. Implementations
//! map low-level failures to `Error::StoreUnavailable` and unique-field
//! collisions to `Error::Conflict`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{Identity, PublicTransaction, Session, Transaction, TransactionDraft};

/// Identity records and their uniqueness invariants
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up by (already lowercased) email
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>>;

    /// Look up by provider-qualified external id
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Identity>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>>;

    /// Persist a new identity; `Conflict` if email or external id is taken
    async fn create_identity(&self, identity: Identity) -> Result<Identity>;

    /// Bind an external id to an existing identity
    ///
    /// The avatar is only filled in when the identity has none. Returns the
    /// updated identity, `NotFound` if it doesn't exist, `Conflict` if the
    /// external id belongs to someone else.
    async fn link_external_id(
        &self,
        id: Uuid,
        external_id: &str,
        avatar_ref: Option<&str>,
    ) -> Result<Identity>;
}

/// Session records, keyed by token digest
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: &Session) -> Result<()>;

    async fn get_session(&self, token_hash: &str) -> Result<Option<Session>>;

    /// Move the expiry of a live session
    async fn touch_session(&self, token_hash: &str, expires_at: DateTime<Utc>) -> Result<()>;

    /// Returns whether a session was removed
    async fn delete_session(&self, token_hash: &str) -> Result<bool>;

    /// Remove every session expired at `now`; returns how many went
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Transaction records, always addressed by id AND owner together
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn insert_transaction(&self, tx: &Transaction) -> Result<()>;

    /// Owner's transactions, newest date first
    async fn list_transactions(&self, owner_id: Uuid, limit: Option<usize>) -> Result<Vec<Transaction>>;

    /// Every owner's transactions, newest date first
    async fn list_all_transactions(&self) -> Result<Vec<PublicTransaction>>;

    async fn get_transaction(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Transaction>>;

    /// Replace the mutable fields; `None` when no such (id, owner) pair exists
    async fn update_transaction(
        &self,
        id: Uuid,
        owner_id: Uuid,
        draft: &TransactionDraft,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Transaction>>;

    /// Returns whether a row with that (id, owner) pair was removed
    async fn delete_transaction(&self, id: Uuid, owner_id: Uuid) -> Result<bool>;
}
