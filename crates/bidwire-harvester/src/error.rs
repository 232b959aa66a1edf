use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("couldn't decode body of {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// The markup no longer has the structure a listing parser expects.
///
/// Usually means the source site changed its layout and the parser needs an
/// update. Items are never skipped silently, the whole page is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("structural mismatch in list item #{item}: expected {expected}")]
    StructuralMismatch { item: usize, expected: &'static str },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("unexpected stored value: {0}")]
    Decode(String),

    #[error("couldn't encode query parameter: {0}")]
    Encode(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BidError {
    #[error("a bid identifier cannot be empty")]
    EmptyIdentifier,
}

/// Why one listing page produced no records.
#[derive(Error, Debug)]
pub enum PageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Bid(#[from] BidError),
}
