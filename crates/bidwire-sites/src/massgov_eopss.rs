//! Grant documents of the Massachusetts Executive Office of Public Safety and
//! Security.

use bidwire_harvester::{ListingEntry, ListingParser, ParseError, Site, SiteScraper};
use select::document::Document;
use select::node::Node;
use select::predicate::{Class, Name, Predicate};

pub const URL_PREFIX: &str = "http://www.mass.gov/eopss/funding-and-training/";
pub const DOMAIN_NAME: &str = "http://www.mass.gov";

pub const HOMELAND_SEC_DOCS: &str = "homeland-sec/grants/docs/";

pub fn scraper() -> SiteScraper {
    SiteScraper::new(Site::MassgovEopss, URL_PREFIX)
        .page(HOMELAND_SEC_DOCS, HomelandSecDocsParser)
}

/// Parses `homeland-sec/grants/docs/`: documents are `ul.category > li` items,
/// each linking to its document with `h2 > span > a.titlelink`. The anchor
/// must sit directly under the item, anchors of nested lists belong to their
/// own items.
#[derive(Debug, Clone, Copy, Default)]
pub struct HomelandSecDocsParser;

impl ListingParser for HomelandSecDocsParser {
    fn scrape_results_page(&self, page: &str) -> Result<Vec<ListingEntry>, ParseError> {
        let document = Document::from(page);

        document
            .find(Name("ul").and(Class("category")).child(Name("li")))
            .enumerate()
            .map(|(item, doc)| -> Result<ListingEntry, ParseError> {
                let anchor = title_anchor(doc).ok_or(ParseError::StructuralMismatch {
                    item,
                    expected: "h2 > span > a.titlelink",
                })?;

                let href = anchor
                    .attr("href")
                    .filter(|href| !href.is_empty())
                    .ok_or(ParseError::StructuralMismatch {
                        item,
                        expected: "href on a.titlelink",
                    })?;

                Ok(ListingEntry::new(href, anchor.text().trim()))
            })
            .collect()
    }
}

fn title_anchor(item: Node) -> Option<Node> {
    item.children()
        .filter(|n| n.is(Name("h2")))
        .flat_map(|h2| h2.children().filter(|n| n.is(Name("span"))))
        .flat_map(|span| {
            span.children()
                .filter(|n| n.is(Name("a").and(Class("titlelink"))))
        })
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(href: &str, title: &str) -> String {
        format!(
            r#"<li><h2><span><a class="titlelink" href="{href}">{title}</a></span></h2><p>Posted</p></li>"#
        )
    }

    fn page(items: &[String]) -> String {
        format!(
            r#"<html><body>
                <ul class="menu"><li><a href="/eopss/">Home</a></li></ul>
                <ul class="category">{}</ul>
            </body></html>"#,
            items.concat()
        )
    }

    #[test]
    fn entries_follow_document_order() {
        let page = page(&[
            item("/docs/a.pdf", " Alpha Report "),
            item("/docs/b.pdf", "Beta Report"),
        ]);

        let entries = HomelandSecDocsParser.scrape_results_page(&page).unwrap();

        assert_eq!(
            vec![
                ListingEntry::new("/docs/a.pdf", "Alpha Report"),
                ListingEntry::new("/docs/b.pdf", "Beta Report"),
            ],
            entries
        );
        assert_eq!(entries, HomelandSecDocsParser.scrape_results_page(&page).unwrap());
    }

    #[test]
    fn page_without_items() {
        let entries = HomelandSecDocsParser
            .scrape_results_page(&page(&[]))
            .unwrap();

        assert!(entries.is_empty());
    }

    #[test]
    fn item_without_anchor_is_a_mismatch() {
        let page = page(&[
            item("/docs/a.pdf", "Alpha Report"),
            "<li><h2><span>Withdrawn</span></h2></li>".to_string(),
        ]);

        assert_eq!(
            Err(ParseError::StructuralMismatch {
                item: 1,
                expected: "h2 > span > a.titlelink",
            }),
            HomelandSecDocsParser.scrape_results_page(&page)
        );
    }

    #[test]
    fn nested_lists_list_each_document_once() {
        let nested = format!(
            r#"<li><h2><span><a class="titlelink" href="/docs/a.pdf">Alpha</a></span></h2>
                <ul class="category">{}</ul></li>"#,
            item("/docs/b.pdf", "Beta")
        );
        let page = page(&[nested, item("/docs/c.pdf", "Gamma")]);

        assert_eq!(
            vec![
                ListingEntry::new("/docs/a.pdf", "Alpha"),
                ListingEntry::new("/docs/b.pdf", "Beta"),
                ListingEntry::new("/docs/c.pdf", "Gamma"),
            ],
            HomelandSecDocsParser.scrape_results_page(&page).unwrap()
        );
    }

    #[test]
    fn anchor_below_the_item_is_a_mismatch() {
        let wrapper = format!(
            r#"<li><ul class="category">{}</ul></li>"#,
            item("/docs/b.pdf", "Beta")
        );
        let wrapped = r#"<li><div><h2><span><a class="titlelink" href="/docs/d.pdf">Delta</a>
            </span></h2></div></li>"#;

        for li in [wrapper, wrapped.to_string()] {
            assert_eq!(
                Err(ParseError::StructuralMismatch {
                    item: 0,
                    expected: "h2 > span > a.titlelink",
                }),
                HomelandSecDocsParser.scrape_results_page(&page(&[li]))
            );
        }
    }

    #[test]
    fn anchor_without_href_is_a_mismatch() {
        let page = page(&[
            r#"<li><h2><span><a class="titlelink">Draft</a></span></h2></li>"#.to_string(),
        ]);

        assert!(matches!(
            HomelandSecDocsParser.scrape_results_page(&page),
            Err(ParseError::StructuralMismatch { item: 0, .. })
        ));
    }

    #[test]
    fn registered_page() {
        let scraper = scraper();

        assert_eq!(Site::MassgovEopss, scraper.site());
        assert_eq!(
            "http://www.mass.gov/eopss/funding-and-training/homeland-sec/grants/docs/",
            scraper.url(HOMELAND_SEC_DOCS)
        );
        assert!(scraper.parser(HOMELAND_SEC_DOCS).is_some());
    }
}
