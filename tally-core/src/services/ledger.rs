//! Ledger service - owner-scoped transaction records
//!
//! Every call takes the resolved identity explicitly. Lookups always go by
//! id and owner together, so someone else's transaction and a missing one
//! both come back as `NotFound`.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Identity, PublicTransaction, Transaction, TransactionDraft};
use crate::ports::{Clock, LedgerStore};

pub struct LedgerService {
    ledger: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

fn not_found(id: Uuid) -> Error {
    Error::not_found(format!("transaction {}", id))
}

impl LedgerService {
    pub fn new(ledger: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { ledger, clock }
    }

    /// Record a transaction; the date defaults to now
    pub async fn add(&self, owner: &Identity, draft: TransactionDraft) -> Result<Transaction> {
        let tx = Transaction::from_draft(owner.id, draft, self.clock.now());
        self.ledger.insert_transaction(&tx).await?;
        tracing::debug!(transaction_id = %tx.id, "transaction added");
        Ok(tx)
    }

    /// Owner's transactions, newest date first, optionally capped
    pub async fn list(&self, owner: &Identity, limit: Option<usize>) -> Result<Vec<Transaction>> {
        self.ledger.list_transactions(owner.id, limit).await
    }

    /// Everyone's transactions, read-only, newest date first
    pub async fn list_all(&self) -> Result<Vec<PublicTransaction>> {
        self.ledger.list_all_transactions().await
    }

    pub async fn get(&self, owner: &Identity, id: Uuid) -> Result<Transaction> {
        self.ledger
            .get_transaction(id, owner.id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Replace kind, category, amount and description
    ///
    /// A draft without a date keeps the stored date. The owner never
    /// changes. Concurrent updates are last-write-wins.
    pub async fn update(
        &self,
        owner: &Identity,
        id: Uuid,
        draft: &TransactionDraft,
    ) -> Result<Transaction> {
        self.ledger
            .update_transaction(id, owner.id, draft, self.clock.now())
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Remove a transaction; a second delete reports `NotFound`
    pub async fn delete(&self, owner: &Identity, id: Uuid) -> Result<()> {
        if self.ledger.delete_transaction(id, owner.id).await? {
            Ok(())
        } else {
            Err(not_found(id))
        }
    }
}
