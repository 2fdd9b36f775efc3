//! Dashboard service - recent activity plus derived totals

use std::sync::Arc;

use serde::Serialize;

use crate::domain::result::Result;
use crate::domain::{aggregate, Identity, PublicTransaction, Summary, Transaction};
use crate::ports::LedgerStore;

/// Default number of recent transactions shown
pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// What an owner sees on their dashboard
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    /// Newest first
    pub recent: Vec<Transaction>,
    /// Over the owner's whole ledger, not just `recent`
    pub summary: Summary,
    pub transaction_count: usize,
}

pub struct DashboardService {
    ledger: Arc<dyn LedgerStore>,
    recent_limit: usize,
}

impl DashboardService {
    pub fn new(ledger: Arc<dyn LedgerStore>, recent_limit: usize) -> Self {
        Self {
            ledger,
            recent_limit,
        }
    }

    pub async fn dashboard(&self, owner: &Identity) -> Result<Dashboard> {
        let snapshot = self.ledger.list_transactions(owner.id, None).await?;
        let summary = aggregate(&snapshot);
        let transaction_count = snapshot.len();

        let mut recent = snapshot;
        recent.truncate(self.recent_limit);

        Ok(Dashboard {
            recent,
            summary,
            transaction_count,
        })
    }

    /// Summary only, for callers that don't need the recent list
    pub async fn summary(&self, owner: &Identity) -> Result<Summary> {
        let snapshot = self.ledger.list_transactions(owner.id, None).await?;
        Ok(aggregate(&snapshot))
    }

    /// Shared read-only feed across all owners
    pub async fn public_feed(&self) -> Result<Vec<PublicTransaction>> {
        self.ledger.list_all_transactions().await
    }
}
