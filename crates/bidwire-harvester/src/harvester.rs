use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{stream, StreamExt};

use crate::bid::{Bid, Site};
use crate::config::HarvesterConfig;
use crate::error::{BidError, PageError};
use crate::fetch::Fetch;
use crate::listing::{ListingEntry, ListingParser};
use crate::store::{filter_new, BidStore};

/// Everything needed to harvest one site: its listing pages, each with the
/// parser that understands its markup.
pub struct SiteScraper {
    site: Site,
    url_prefix: String,
    pages: Vec<(String, Arc<dyn ListingParser>)>,
    target: String,
}

impl fmt::Debug for SiteScraper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteScraper")
            .field("site", &self.site)
            .field("url_prefix", &self.url_prefix)
            .field("sub_paths", &self.sub_paths().collect::<Vec<_>>())
            .finish()
    }
}

impl SiteScraper {
    pub fn new(site: Site, url_prefix: impl Into<String>) -> Self {
        Self {
            site,
            url_prefix: url_prefix.into(),
            pages: vec![],
            target: format!("bidwire::{}", site.as_str().to_ascii_lowercase()),
        }
    }

    /// Registers the parser of the listing page at `url_prefix + sub_path`.
    pub fn page(
        mut self,
        sub_path: impl Into<String>,
        parser: impl ListingParser + 'static,
    ) -> Self {
        let parser: Arc<dyn ListingParser> = Arc::new(parser);
        self.pages.push((sub_path.into(), parser));
        self
    }

    pub fn site(&self) -> Site {
        self.site
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn sub_paths(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().map(|(sub_path, _)| sub_path.as_str())
    }

    pub fn parser(&self, sub_path: &str) -> Option<&dyn ListingParser> {
        self.pages
            .iter()
            .find(|(p, _)| p == sub_path)
            .map(|(_, parser)| parser.as_ref())
    }

    pub fn url(&self, sub_path: &str) -> String {
        format!("{}{}", self.url_prefix, sub_path)
    }

    /// Harvests every listing page of the site. A failing page never keeps
    /// the others from being processed.
    pub async fn scrape(&self, harvester: &Harvester) -> SiteReport {
        let pages = stream::iter(&self.pages)
            .map(|(sub_path, parser)| self.scrape_page(harvester, sub_path, parser.as_ref()))
            .buffered(harvester.config.concurrent_pages.max(1))
            .collect::<Vec<_>>()
            .await;

        SiteReport {
            site: self.site,
            pages,
        }
    }

    async fn scrape_page(
        &self,
        harvester: &Harvester,
        sub_path: &str,
        parser: &dyn ListingParser,
    ) -> PageReport {
        let report = |outcome| PageReport {
            site: self.site,
            sub_path: sub_path.to_string(),
            outcome,
        };
        let target = self.target.as_str();

        if harvester.is_stopped() {
            log::info!(target: target, "Stopped before {sub_path}");
            return report(PageOutcome::Cancelled);
        }

        let url = self.url(sub_path);
        let entries = match self.fetch_entries(harvester, &url, parser).await {
            Ok(entries) => entries,
            Err(e) => {
                log::error!(target: target, "Skipping page {sub_path} ({url}) got: {e}");
                return report(PageOutcome::Failed(e));
            }
        };

        let candidates: BTreeSet<String> =
            entries.iter().map(|e| e.identifier.clone()).collect();
        log::debug!(target: target, "Found docs on {sub_path}: {candidates:?}");

        match self
            .record_new(harvester, sub_path, &entries, &candidates)
            .await
        {
            Ok(outcome) => report(outcome),
            Err(e) => {
                log::error!(
                    target: target,
                    "Nothing recorded for {sub_path} ({url}), ids {candidates:?} got: {e}"
                );
                report(PageOutcome::Failed(e))
            }
        }
    }

    async fn fetch_entries(
        &self,
        harvester: &Harvester,
        url: &str,
        parser: &dyn ListingParser,
    ) -> Result<Vec<ListingEntry>, PageError> {
        let page = harvester.fetcher.get(url).await?;
        log::debug!(
            target: self.target.as_str(),
            "Fetched {} ({}, {} bytes)",
            page.url,
            page.status,
            page.content.len()
        );
        Ok(parser.scrape_results_page(&page.text())?)
    }

    async fn record_new(
        &self,
        harvester: &Harvester,
        sub_path: &str,
        entries: &[ListingEntry],
        candidates: &BTreeSet<String>,
    ) -> Result<PageOutcome, PageError> {
        if candidates.is_empty() {
            return Ok(PageOutcome::Committed {
                found: 0,
                new: 0,
                inserted: 0,
            });
        }

        let mut session = harvester.store.session().await?;
        let new_ids = filter_new(session.as_mut(), self.site, candidates).await?;
        log::info!(target: self.target.as_str(), "New docs on {sub_path}: {new_ids:?}");

        let bids = build_bids(self.site, entries, &new_ids)?;
        let new = bids.len();
        session.insert_all(bids);

        if harvester.is_stopped() {
            log::info!(
                target: self.target.as_str(),
                "Stopped, discarding {new} new docs of {sub_path}"
            );
            return Ok(PageOutcome::Cancelled);
        }

        let inserted = session.commit().await?;
        Ok(PageOutcome::Committed {
            found: candidates.len(),
            new,
            inserted,
        })
    }
}

/// Bids for the new entries, in document order. An identifier listed twice on
/// the same page keeps its first description.
fn build_bids(
    site: Site,
    entries: &[ListingEntry],
    new_ids: &BTreeSet<String>,
) -> Result<Vec<Bid>, BidError> {
    let mut seen = BTreeSet::new();
    entries
        .iter()
        .filter(|e| new_ids.contains(&e.identifier) && seen.insert(e.identifier.as_str()))
        .map(|e| Bid::new(e.identifier.clone(), &e.description, site))
        .collect()
}

/// Requests a cooperative stop: pages not started yet are skipped and a page
/// that has not committed yet is rolled back.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Harvester {
    config: HarvesterConfig,
    fetcher: Arc<dyn Fetch>,
    store: Arc<dyn BidStore>,
    stop: StopHandle,
}

impl Harvester {
    pub fn new(
        config: HarvesterConfig,
        fetcher: Arc<dyn Fetch>,
        store: Arc<dyn BidStore>,
    ) -> Self {
        Self {
            config,
            fetcher,
            store,
            stop: StopHandle::default(),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Harvests all `scrapers`, sites running concurrently.
    pub async fn run(&self, scrapers: &[SiteScraper]) -> RunReport {
        let sigint = self.config.handle_sigint.then(|| {
            let stop = self.stop_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupted, finishing pages in progress");
                    stop.stop();
                }
            })
        });

        let sites = stream::iter(scrapers)
            .map(|scraper| scraper.scrape(self))
            .buffered(self.config.concurrent_sites.max(1))
            .collect::<Vec<_>>()
            .await;

        if let Some(handle) = sigint {
            handle.abort();
        }

        RunReport { sites }
    }
}

#[derive(Debug)]
pub enum PageOutcome {
    Committed {
        /// Distinct identifiers listed on the page
        found: usize,
        /// Identifiers absent from storage when the page was checked
        new: usize,
        /// Rows written by the commit, lower than `new` only when a concurrent
        /// run recorded some of them first
        inserted: usize,
    },
    Failed(PageError),
    Cancelled,
}

#[derive(Debug)]
pub struct PageReport {
    pub site: Site,
    pub sub_path: String,
    pub outcome: PageOutcome,
}

impl PageReport {
    pub fn inserted(&self) -> usize {
        match self.outcome {
            PageOutcome::Committed { inserted, .. } => inserted,
            _ => 0,
        }
    }

    pub fn error(&self) -> Option<&PageError> {
        match &self.outcome {
            PageOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct SiteReport {
    pub site: Site,
    pub pages: Vec<PageReport>,
}

impl SiteReport {
    pub fn inserted(&self) -> usize {
        self.pages.iter().map(PageReport::inserted).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &PageReport> {
        self.pages.iter().filter(|page| page.error().is_some())
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub sites: Vec<SiteReport>,
}

impl RunReport {
    pub fn pages(&self) -> impl Iterator<Item = &PageReport> {
        self.sites.iter().flat_map(|site| site.pages.iter())
    }

    pub fn inserted(&self) -> usize {
        self.sites.iter().map(SiteReport::inserted).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &PageReport> {
        self.pages().filter(|page| page.error().is_some())
    }

    pub fn cancelled(&self) -> usize {
        self.pages()
            .filter(|page| matches!(page.outcome, PageOutcome::Cancelled))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_bids_keeps_document_order_and_first_duplicate() {
        let entries = vec![
            ListingEntry::new("/c.pdf", "Gamma"),
            ListingEntry::new("/a.pdf", "Alpha"),
            ListingEntry::new("/b.pdf", "Beta"),
            ListingEntry::new("/c.pdf", "Gamma again"),
        ];
        let new_ids = BTreeSet::from(["/c.pdf".to_string(), "/b.pdf".to_string()]);

        let bids = build_bids(Site::MassgovEopss, &entries, &new_ids).unwrap();

        assert_eq!(
            vec![
                Bid::new("/c.pdf", "Gamma", Site::MassgovEopss).unwrap(),
                Bid::new("/b.pdf", "Beta", Site::MassgovEopss).unwrap(),
            ],
            bids
        );
    }

    #[test]
    fn build_bids_rejects_empty_identifier() {
        let entries = vec![ListingEntry::new("", "Nameless")];
        let new_ids = BTreeSet::from([String::new()]);

        assert_eq!(
            Err(BidError::EmptyIdentifier),
            build_bids(Site::MassgovEopss, &entries, &new_ids)
        );
    }
}
