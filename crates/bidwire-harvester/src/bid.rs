use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::BidError;

/// The external source a bid was discovered on.
///
/// Identifiers are only unique within one site, storage always checks
/// `(site, identifier)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Site {
    MassgovEopss,
    Commbuys,
    CityOfBoston,
}

impl Site {
    pub const ALL: [Site; 3] = [Site::MassgovEopss, Site::Commbuys, Site::CityOfBoston];

    /// The name stored alongside every bid of this site.
    pub fn as_str(&self) -> &'static str {
        match self {
            Site::MassgovEopss => "MASSGOV_EOPSS",
            Site::Commbuys => "COMMBUYS",
            Site::CityOfBoston => "CITYOFBOSTON",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Site {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Site::ALL
            .into_iter()
            .find(|site| site.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown site: {s}"))
    }
}

/// A newly discovered announcement, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bid {
    pub identifier: String,
    pub description: String,
    pub site: Site,
}

impl Bid {
    pub fn new(
        identifier: impl Into<String>,
        description: impl Into<String>,
        site: Site,
    ) -> Result<Self, BidError> {
        let identifier = identifier.into();
        if identifier.is_empty() {
            return Err(BidError::EmptyIdentifier);
        }
        Ok(Self {
            identifier,
            description: description.into(),
            site,
        })
    }

    /// Absolute link to the announcement, relative identifiers are resolved
    /// against `domain`.
    pub fn url(&self, domain: &str) -> String {
        if self.identifier.starts_with('/') {
            format!("{}{}", domain.trim_end_matches('/'), self.identifier)
        } else {
            self.identifier.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBid {
    pub bid: Bid,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bid_keeps_description_as_parsed() {
        let bid = Bid::new("/docs/a.pdf", "Alpha Report", Site::MassgovEopss).unwrap();
        let padded = Bid::new("/docs/a.pdf", " Alpha Report ", Site::MassgovEopss).unwrap();

        assert_eq!("/docs/a.pdf", bid.identifier);
        assert_eq!("Alpha Report", bid.description);
        assert_eq!(" Alpha Report ", padded.description);
        assert_eq!(Site::MassgovEopss, bid.site);
    }

    #[test]
    fn bid_requires_identifier() {
        assert_eq!(
            Err(BidError::EmptyIdentifier),
            Bid::new("", "Nameless", Site::Commbuys)
        );
    }

    #[test]
    fn bid_url() {
        let bid = Bid::new("/eopss/docs/a.pdf", "A", Site::MassgovEopss).unwrap();
        assert_eq!(
            "http://www.mass.gov/eopss/docs/a.pdf",
            bid.url("http://www.mass.gov/")
        );

        let bid = Bid::new("https://example.org/b.pdf", "B", Site::MassgovEopss).unwrap();
        assert_eq!("https://example.org/b.pdf", bid.url("http://www.mass.gov"));
    }

    #[test]
    fn site_names() {
        for site in Site::ALL {
            assert_eq!(Ok(site), site.as_str().parse());
        }
        assert_eq!(Ok(Site::MassgovEopss), "massgov_eopss".parse());
        assert!("nowhere".parse::<Site>().is_err());
    }
}
