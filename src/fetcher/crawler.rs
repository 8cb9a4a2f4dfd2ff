//! Listing page crawler
//!
//! Pure HTML interpretation: page-count discovery from the pagination block
//! and report-link extraction by CSS marker class. Fetching stays in
//! [`super::listing_source`] so this logic is testable on fixture markup.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::error;

use crate::fetcher::SetupError;

static PAGINATION: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.bx-pagination").expect("valid selector"));
static PAGE_ANCHORS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("ul a").expect("valid selector"));

/// Extracts page counts and report links from listing markup.
#[derive(Debug, Clone)]
pub struct ListingCrawler {
    link_selector: Selector,
}

impl ListingCrawler {
    /// Create a crawler with the configured report-link selector.
    pub fn new(link_selector: &str) -> Result<Self, SetupError> {
        let link_selector = Selector::parse(link_selector)
            .map_err(|_| SetupError::Selector(link_selector.to_string()))?;
        Ok(Self { link_selector })
    }

    /// Read the total page count from the pagination control.
    ///
    /// The final anchor is a "next" control, so the second-to-last anchor's
    /// label is the highest page number. Returns 0 (with a diagnostic) when
    /// the pagination block or its anchors are absent or unreadable -
    /// callers must treat 0 as "abort, nothing to do".
    pub fn total_pages(&self, html: &str) -> u32 {
        let document = Html::parse_document(html);

        let Some(pagination) = document.select(&PAGINATION).next() else {
            error!("pagination container not found on listing page");
            return 0;
        };

        let anchors: Vec<_> = pagination.select(&PAGE_ANCHORS).collect();
        if anchors.len() < 2 {
            error!(anchors = anchors.len(), "pagination has no page-number anchors");
            return 0;
        }

        let label: String = anchors[anchors.len() - 2].text().collect();
        match label.trim().parse() {
            Ok(pages) => pages,
            Err(_) => {
                error!(label = label.trim(), "pagination label is not a page number");
                0
            }
        }
    }

    /// Extract report-file hrefs from one listing page, in listing order.
    ///
    /// Hrefs are returned verbatim (relative); joining with the file host
    /// happens downstream. An empty result is normal for a page with no
    /// reports.
    pub fn extract_links(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.link_selector)
            .filter_map(|a| a.value().attr("href"))
            .map(str::to_string)
            .collect()
    }
}
