use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::bid::{Bid, Site, StoredBid};
use crate::error::StoreError;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Durable home of every bid ever discovered.
#[async_trait]
pub trait BidStore: Send + Sync {
    /// Opens the scope of one listing page. Nothing staged in it is visible
    /// until [`StoreSession::commit`], dropping it rolls back.
    async fn session(&self) -> Result<Box<dyn StoreSession>, StoreError>;

    /// Stored bids, newest first.
    async fn recent(&self, site: Option<Site>, limit: usize)
        -> Result<Vec<StoredBid>, StoreError>;
}

#[async_trait]
pub trait StoreSession: Send {
    /// The subset of `ids` already recorded for `site`, in a single query.
    async fn existing(
        &mut self,
        site: Site,
        ids: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, StoreError>;

    fn insert_all(&mut self, bids: Vec<Bid>);

    /// Persists everything staged as one atomic unit and returns how many
    /// bids were actually inserted. Pairs recorded concurrently by another
    /// session are left untouched.
    async fn commit(self: Box<Self>) -> Result<usize, StoreError>;
}

/// Returns the candidates not yet recorded for `site`. Read only.
pub async fn filter_new(
    session: &mut dyn StoreSession,
    site: Site,
    candidates: &BTreeSet<String>,
) -> Result<BTreeSet<String>, StoreError> {
    if candidates.is_empty() {
        return Ok(BTreeSet::new());
    }
    let existing = session.existing(site, candidates).await?;
    Ok(candidates.difference(&existing).cloned().collect())
}
