use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, Transaction};

use super::{BidStore, StoreSession};
use crate::bid::{Bid, Site, StoredBid};
use crate::error::StoreError;

const CREATE_BIDS: &str = r#"
    CREATE TABLE IF NOT EXISTS bids (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        site TEXT NOT NULL,
        identifier TEXT NOT NULL,
        description TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (site, identifier)
    )
"#;

/// Rows per `INSERT` statement, keeps each statement far below SQLite's bound
/// variable limit.
const INSERT_CHUNK: usize = 1000;

/// SQLite backed store. The pool holds a single connection so page sessions
/// never contend for the write lock.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating it if needed) and migrates the database at `url`,
    /// e.g. `sqlite://bidwire.db` or `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_BIDS).execute(&self.pool).await?;
        Ok(())
    }

    fn row_to_bid(row: &SqliteRow) -> Result<StoredBid, StoreError> {
        let site: String = row.try_get("site")?;
        let site = Site::from_str(&site).map_err(StoreError::Decode)?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        Ok(StoredBid {
            bid: Bid {
                identifier: row.try_get("identifier")?,
                description: row.try_get("description")?,
                site,
            },
            created_at,
        })
    }
}

#[async_trait]
impl BidStore for SqliteStore {
    async fn session(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteSession { tx, staged: vec![] }))
    }

    async fn recent(
        &self,
        site: Option<Site>,
        limit: usize,
    ) -> Result<Vec<StoredBid>, StoreError> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT site, identifier, description, created_at FROM bids",
        );
        if let Some(site) = site {
            query.push(" WHERE site = ").push_bind(site.as_str());
        }
        query
            .push(" ORDER BY id DESC LIMIT ")
            .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_bid).collect()
    }
}

struct SqliteSession {
    tx: Transaction<'static, Sqlite>,
    staged: Vec<Bid>,
}

#[async_trait]
impl StoreSession for SqliteSession {
    async fn existing(
        &mut self,
        site: Site,
        ids: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, StoreError> {
        if ids.is_empty() {
            return Ok(BTreeSet::new());
        }

        // A single JSON array parameter, whatever the number of candidates
        let ids = serde_json::to_string(ids).map_err(|e| StoreError::Encode(e.to_string()))?;
        let found: Vec<String> = sqlx::query_scalar(
            "SELECT identifier FROM bids \
             WHERE site = ? AND identifier IN (SELECT value FROM json_each(?))",
        )
        .bind(site.as_str())
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(found.into_iter().collect())
    }

    fn insert_all(&mut self, bids: Vec<Bid>) {
        self.staged.extend(bids);
    }

    async fn commit(self: Box<Self>) -> Result<usize, StoreError> {
        let Self { mut tx, staged } = *self;

        let created_at = Utc::now();
        let mut inserted = 0;
        let mut staged = staged.into_iter().peekable();
        while staged.peek().is_some() {
            let mut query = QueryBuilder::<Sqlite>::new(
                "INSERT INTO bids (site, identifier, description, created_at) ",
            );
            query.push_values(staged.by_ref().take(INSERT_CHUNK), |mut row, bid| {
                row.push_bind(bid.site.as_str())
                    .push_bind(bid.identifier)
                    .push_bind(bid.description)
                    .push_bind(created_at);
            });
            query.push(" ON CONFLICT (site, identifier) DO NOTHING");
            inserted += query.build().execute(&mut *tx).await?.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(inserted)
    }
}
