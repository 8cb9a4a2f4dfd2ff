//! Listing crawler tests on realistic fixture markup.

use trade_results_ingestor::fetcher::ListingCrawler;

const LISTING_FIXTURE: &str = r#"
<html><body>
  <div class="page-content">
    <div class="accordeon-inner">
      <a class="accordeon-inner__item-title link xls"
         href="/upload/reports/oil_xls/oil_xls_20240614162000.xls?r=1234">
        Бюллетень за 14.06.2024</a>
      <a class="accordeon-inner__item-title link xls"
         href="/upload/reports/oil_xls/oil_xls_20240613162000.xls?r=5678">
        Бюллетень за 13.06.2024</a>
      <a class="link pdf" href="/upload/reports/oil_pdf/oil_20240614.pdf">PDF</a>
    </div>
    <div class="bx-pagination">
      <ul>
        <li><a href="?page=page-1"><span>1</span></a></li>
        <li><a href="?page=page-2"><span>2</span></a></li>
        <li><a href="?page=page-54"><span>54</span></a></li>
        <li><a href="?page=page-2"><span>Следующая</span></a></li>
      </ul>
    </div>
  </div>
</body></html>
"#;

fn crawler() -> ListingCrawler {
    ListingCrawler::new("a.xls").unwrap()
}

#[test]
fn test_total_pages_from_realistic_listing() {
    assert_eq!(crawler().total_pages(LISTING_FIXTURE), 54);
}

#[test]
fn test_links_preserve_listing_order_and_skip_other_anchors() {
    let links = crawler().extract_links(LISTING_FIXTURE);
    assert_eq!(
        links,
        vec![
            "/upload/reports/oil_xls/oil_xls_20240614162000.xls?r=1234",
            "/upload/reports/oil_xls/oil_xls_20240613162000.xls?r=5678",
        ]
    );
}

#[test]
fn test_pagination_missing_yields_zero() {
    let html = r#"<html><body><a class="xls" href="/upload/reports/a.xls">x</a></body></html>"#;
    assert_eq!(crawler().total_pages(html), 0);
}

#[test]
fn test_custom_selector() {
    let crawler = ListingCrawler::new("a.report-link").unwrap();
    let html = r#"
        <a class="report-link" href="/upload/reports/a.xlsx">A</a>
        <a class="xls" href="/upload/reports/b.xls">B</a>"#;
    assert_eq!(crawler.extract_links(html), vec!["/upload/reports/a.xlsx"]);
}

#[test]
fn test_invalid_selector_rejected() {
    assert!(ListingCrawler::new("a[").is_err());
}
