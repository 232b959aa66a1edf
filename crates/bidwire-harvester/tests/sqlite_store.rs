use std::sync::Arc;

use async_trait::async_trait;
use bidwire_harvester::{
    BidStore, Fetch, FetchError, Harvester, HarvesterConfig, ListingEntry, Page, ParseError,
    Site, SiteScraper, SqliteStore,
};

struct StaticPage(String);

#[async_trait]
impl Fetch for StaticPage {
    async fn get(&self, url: &str) -> Result<Page, FetchError> {
        Ok(Page {
            url: url.to_string(),
            status: 200,
            content: self.0.clone().into_bytes(),
        })
    }
}

fn comma_parser(page: &str) -> Result<Vec<ListingEntry>, ParseError> {
    Ok(page
        .split(',')
        .filter(|id| !id.is_empty())
        .map(|id| ListingEntry::new(id, format!("Document {id}")))
        .collect())
}

async fn harvest(url: &str, page: &str) -> usize {
    let store = SqliteStore::connect(url).await.unwrap();
    let config = HarvesterConfig {
        handle_sigint: false,
        ..Default::default()
    };
    let harvester = Harvester::new(config, Arc::new(StaticPage(page.into())), Arc::new(store));
    let scraper =
        SiteScraper::new(Site::CityOfBoston, "http://city.test/").page("bids/", comma_parser);

    let report = harvester.run(&[scraper]).await;
    assert!(report.is_success());
    report.inserted()
}

#[tokio::test]
async fn records_survive_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("bids.db").display());

    assert_eq!(2, harvest(&url, "/1,/2").await);
    assert_eq!(1, harvest(&url, "/1,/2,/3").await);
    assert_eq!(0, harvest(&url, "/3,/2,/1").await);

    let store = SqliteStore::connect(&url).await.unwrap();
    let stored = store.recent(Some(Site::CityOfBoston), 10).await.unwrap();
    let identifiers = stored
        .iter()
        .map(|s| s.bid.identifier.as_str())
        .collect::<Vec<_>>();

    assert_eq!(vec!["/3", "/2", "/1"], identifiers);
    assert_eq!("Document /3", stored[0].bid.description);
    assert!(stored[0].created_at >= stored[2].created_at);
    assert!(store.recent(Some(Site::Commbuys), 10).await.unwrap().is_empty());
    assert_eq!(1, store.recent(None, 1).await.unwrap().len());
}

#[tokio::test]
async fn large_page_is_recorded_in_one_run() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("bids.db").display());
    let page = (0..9500).map(|i| format!("/{i}.pdf,")).collect::<String>();

    assert_eq!(9500, harvest(&url, &page).await);

    let more = format!("{page}/9500.pdf,/9501.pdf");
    assert_eq!(2, harvest(&url, &more).await);
    assert_eq!(0, harvest(&url, &more).await);
}
