mod common;

use tokio_test::{assert_err, assert_ok};

use common::{fast_timings, token, uniform_pages, FakeSite, Harness, Row, REPORT};
use taqeem_worker::site;
use taqeem_worker::workflow::{count_outer_pages, ScanStatus, TabCtx, TableLayout, TableScanner};

#[tokio::test]
async fn walks_every_sub_page_until_next_is_disabled() {
    let site = FakeSite::with_pages(vec![vec![
        (1..=5).map(|i| Row::complete(100 + i)).collect(),
        (1..=5).map(|i| Row::complete(200 + i)).collect(),
        vec![Row::complete(301), Row::complete(302)],
    ]]);
    let h = Harness::new(site);
    let timings = fast_timings();
    let token = token("b1");
    let layout = TableLayout::macros();
    let ctx = TabCtx::new(REPORT, 0);
    let tab = h.ctx.browser.primary_tab().await.unwrap();

    let scanner = TableScanner::new(tab.as_ref(), &token, &timings, &layout, &ctx);
    let scan = scanner.scan_page(&site::report_page_url(REPORT, 1), 1).await.unwrap();

    assert_eq!(scan.status, ScanStatus::Complete);
    assert_eq!(scan.sub_pages, 3);
    assert_eq!(scan.rows.len(), 12);
    assert_eq!(scan.rows[0].macro_id, 101);
    assert_eq!(scan.rows[11].macro_id, 302);
    assert_eq!(scan.rows[11].sub_page, 3);
    assert!(scan.rows.iter().all(|r| r.page_number == 1));
}

#[tokio::test]
async fn unchanged_table_after_next_ends_the_page() {
    let site = FakeSite::with_pages(uniform_pages(1, 3, 4));
    site.set_stuck_next();
    let h = Harness::new(site);
    let timings = fast_timings();
    let token = token("b1");
    let layout = TableLayout::macros();
    let ctx = TabCtx::new(REPORT, 0);
    let tab = h.ctx.browser.primary_tab().await.unwrap();

    let scanner = TableScanner::new(tab.as_ref(), &token, &timings, &layout, &ctx);
    let scan = scanner.scan_page(&site::report_page_url(REPORT, 1), 1).await.unwrap();

    assert_eq!(scan.status, ScanStatus::Complete);
    assert_eq!(scan.sub_pages, 1);
    assert_eq!(scan.rows.len(), 4);
}

#[tokio::test]
async fn blank_and_non_numeric_rows_are_skipped() {
    let site = FakeSite::with_pages(vec![vec![vec![
        Row::complete(11),
        Row::raw(""),
        Row::raw("n/a"),
        Row::complete(12),
    ]]]);
    let h = Harness::new(site);
    let timings = fast_timings();
    let token = token("b1");
    let layout = TableLayout::macros();
    let ctx = TabCtx::new(REPORT, 0);
    let tab = h.ctx.browser.primary_tab().await.unwrap();

    let scanner = TableScanner::new(tab.as_ref(), &token, &timings, &layout, &ctx);
    let scan = scanner.scan_page(&site::report_page_url(REPORT, 1), 1).await.unwrap();

    let ids: Vec<u64> = scan.rows.iter().map(|r| r.macro_id).collect();
    assert_eq!(ids, vec![11, 12]);
    assert_eq!(scan.skipped_rows, 2);
}

#[tokio::test]
async fn status_column_is_read_per_row() {
    let site = FakeSite::with_pages(vec![vec![vec![Row::complete(7), Row::incomplete(8)]]]);
    let h = Harness::new(site);
    let timings = fast_timings();
    let token = token("b1");
    let layout = TableLayout::macros_with_status();
    let ctx = TabCtx::new(REPORT, 0);
    let tab = h.ctx.browser.primary_tab().await.unwrap();

    let scanner = TableScanner::new(tab.as_ref(), &token, &timings, &layout, &ctx);
    let scan = scanner.scan_page(&site::report_page_url(REPORT, 1), 1).await.unwrap();

    assert!(!site::is_incomplete(&scan.rows[0].fields["status"]));
    assert!(site::is_incomplete(&scan.rows[1].fields["status"]));
}

#[tokio::test]
async fn empty_page_reports_no_rows() {
    let h = Harness::new(FakeSite::with_pages(uniform_pages(1, 1, 3)));
    let timings = fast_timings();
    let token = token("b1");
    let layout = TableLayout::macros();
    let ctx = TabCtx::new(REPORT, 0);
    let tab = h.ctx.browser.primary_tab().await.unwrap();

    let scanner = TableScanner::new(tab.as_ref(), &token, &timings, &layout, &ctx);
    let scan = scanner.scan_page(&site::report_page_url(REPORT, 4), 4).await.unwrap();

    assert_eq!(scan.status, ScanStatus::NoRows);
    assert!(scan.rows.is_empty());
}

#[tokio::test]
async fn failed_navigation_aborts_the_page_after_fallback() {
    let site = FakeSite::with_pages(uniform_pages(2, 1, 3));
    let url = site::report_page_url(REPORT, 2);
    site.fail_url(url.clone());
    let h = Harness::new(site.clone());
    let timings = fast_timings();
    let token = token("b1");
    let layout = TableLayout::macros();
    let ctx = TabCtx::new(REPORT, 0);
    let tab = h.ctx.browser.primary_tab().await.unwrap();

    let scanner = TableScanner::new(tab.as_ref(), &token, &timings, &layout, &ctx);
    let scan = assert_ok!(scanner.scan_page(&url, 2).await);

    assert!(scan.is_aborted());
    assert_eq!(site.navigations().len(), 1);
}

#[tokio::test]
async fn stopped_token_ends_the_scan() {
    let h = Harness::new(FakeSite::with_pages(uniform_pages(1, 2, 3)));
    let timings = fast_timings();
    let token = token("b1");
    token.stop();
    let layout = TableLayout::macros();
    let ctx = TabCtx::new(REPORT, 0);
    let tab = h.ctx.browser.primary_tab().await.unwrap();

    let scanner = TableScanner::new(tab.as_ref(), &token, &timings, &layout, &ctx);
    assert_err!(scanner.scan_page(&site::report_page_url(REPORT, 1), 1).await);
    assert!(h.site.navigations().is_empty());
}

#[tokio::test]
async fn outer_page_count_is_highest_numeric_link() {
    let h = Harness::new(FakeSite::with_pages(uniform_pages(7, 1, 1)));
    let timings = fast_timings();
    let token = token("b1");
    let tab = h.ctx.browser.primary_tab().await.unwrap();
    tab.navigate(&site::report_url(REPORT)).await.unwrap();

    assert_eq!(count_outer_pages(tab.as_ref(), &timings, &token).await.unwrap(), 7);
}
