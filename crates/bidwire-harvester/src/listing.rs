use crate::error::ParseError;

/// One item of a listing page: a site scoped identifier (the relative URL of
/// the document) and its trimmed title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub identifier: String,
    pub description: String,
}

impl ListingEntry {
    pub fn new(identifier: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            description: description.into(),
        }
    }
}

/// Turns the markup of one listing page into its entries, in document order.
///
/// Implementations must be pure: no network, no storage.
pub trait ListingParser: Send + Sync {
    fn scrape_results_page(&self, page: &str) -> Result<Vec<ListingEntry>, ParseError>;
}

impl<F> ListingParser for F
where
    F: Fn(&str) -> Result<Vec<ListingEntry>, ParseError> + Send + Sync,
{
    fn scrape_results_page(&self, page: &str) -> Result<Vec<ListingEntry>, ParseError> {
        self(page)
    }
}
