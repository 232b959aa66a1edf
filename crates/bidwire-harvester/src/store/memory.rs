use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use super::{BidStore, StoreSession};
use crate::bid::{Bid, Site, StoredBid};
use crate::error::StoreError;

/// Keeps bids in process memory, for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<Vec<StoredBid>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bids(bids: impl IntoIterator<Item = Bid>) -> Self {
        let store = Self::new();
        store.rows().extend(bids.into_iter().map(|bid| StoredBid {
            bid,
            created_at: Utc::now(),
        }));
        store
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, site: Site, identifier: &str) -> bool {
        self.rows()
            .iter()
            .any(|row| row.bid.site == site && row.bid.identifier == identifier)
    }

    pub fn bids(&self) -> Vec<Bid> {
        self.rows().iter().map(|row| row.bid.clone()).collect()
    }

    fn rows(&self) -> MutexGuard<'_, Vec<StoredBid>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BidStore for MemoryStore {
    async fn session(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        Ok(Box::new(MemorySession {
            store: self.clone(),
            staged: vec![],
        }))
    }

    async fn recent(
        &self,
        site: Option<Site>,
        limit: usize,
    ) -> Result<Vec<StoredBid>, StoreError> {
        Ok(self
            .rows()
            .iter()
            .rev()
            .filter(|row| site.map_or(true, |site| row.bid.site == site))
            .take(limit)
            .cloned()
            .collect())
    }
}

struct MemorySession {
    store: MemoryStore,
    staged: Vec<Bid>,
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn existing(
        &mut self,
        site: Site,
        ids: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, StoreError> {
        Ok(self
            .store
            .rows()
            .iter()
            .filter(|row| row.bid.site == site && ids.contains(&row.bid.identifier))
            .map(|row| row.bid.identifier.clone())
            .collect())
    }

    fn insert_all(&mut self, bids: Vec<Bid>) {
        self.staged.extend(bids);
    }

    async fn commit(self: Box<Self>) -> Result<usize, StoreError> {
        let Self { store, staged } = *self;
        let mut rows = store.rows();
        let created_at = Utc::now();
        let mut inserted = 0;
        for bid in staged {
            let seen = rows
                .iter()
                .any(|row| row.bid.site == bid.site && row.bid.identifier == bid.identifier);
            if !seen {
                rows.push(StoredBid { bid, created_at });
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}
