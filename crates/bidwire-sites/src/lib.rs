use bidwire_harvester::{Site, SiteScraper};

pub mod massgov_eopss;

/// Every site bidwire knows how to harvest.
pub fn registry() -> Vec<SiteScraper> {
    vec![massgov_eopss::scraper()]
}

pub fn find(site: Site) -> Option<SiteScraper> {
    registry().into_iter().find(|scraper| scraper.site() == site)
}

/// Domain that relative identifiers of `site` are resolved against.
pub fn domain(site: Site) -> Option<&'static str> {
    match site {
        Site::MassgovEopss => Some(massgov_eopss::DOMAIN_NAME),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_sites_are_unique() {
        let mut sites = registry().iter().map(SiteScraper::site).collect::<Vec<_>>();
        let registered = sites.len();
        sites.sort();
        sites.dedup();

        assert_eq!(registered, sites.len());
        assert!(find(Site::MassgovEopss).is_some());
        assert!(find(Site::Commbuys).is_none());
    }
}
