mod bid;
mod config;
mod error;
mod fetch;
mod harvester;
mod listing;
pub mod store;

pub use bid::{Bid, Site, StoredBid};
pub use config::HarvesterConfig;
pub use error::{BidError, FetchError, PageError, ParseError, StoreError};
pub use fetch::{Fetch, HttpFetcher, Page};
pub use harvester::{
    Harvester, PageOutcome, PageReport, RunReport, SiteReport, SiteScraper, StopHandle,
};
pub use listing::{ListingEntry, ListingParser};
pub use store::{filter_new, BidStore, MemoryStore, SqliteStore, StoreSession};

pub use anyhow;
